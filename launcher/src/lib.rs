use std::{
    env,
    path::{Path, PathBuf},
};

use clap::Parser;
use log::info;

use envkit::{
    BootstrapError, CommandRunner, CondaRoot, ConfigRecord, Invocation, Result, cli::ProjectArgs,
};

/// Step name of the training entrypoint invocation.
pub const LAUNCH_STEP: &str = "launch";

/// Entrypoint spawned when `--entrypoint` is not given.
pub const DEFAULT_ENTRYPOINT: &str = "train_models.py";

/// Runs the training entrypoint inside the provisioned environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "launch")]
pub struct LaunchArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Training script, relative to the project root.
    #[arg(long, default_value = DEFAULT_ENTRYPOINT)]
    pub entrypoint: PathBuf,
}

/// What to launch and with which arguments.
#[derive(Debug, Clone)]
pub struct LaunchRequest<'a> {
    pub project: &'a Path,
    pub config: &'a Path,
    pub entrypoint: &'a Path,
}

/// Loads the project's config and launches the entrypoint in its environment.
///
/// # Errors
/// Config errors, `EnvironmentNotFound`, or `Launch` carrying the
/// entrypoint's exit code.
pub fn run(args: &LaunchArgs, runner: &mut dyn CommandRunner) -> Result<()> {
    let project = &args.project.project_path;
    let config = ConfigRecord::load(project, &args.project.config)?;
    let conda = config.conda_root(project);

    let request = LaunchRequest {
        project,
        config: &args.project.config,
        entrypoint: &args.entrypoint,
    };
    launch(&conda, &request, runner)
}

/// Spawns `python <entrypoint> -c <config> -p <project>` with the named
/// environment activated for the child only.
///
/// The child inherits stdio and runs from the project root. Nothing is
/// spawned when the environment does not exist.
///
/// # Errors
/// `EnvironmentNotFound` before provisioning, `ExternalTool` if the
/// interpreter cannot be started, `Launch` for any non-zero exit.
pub fn launch(
    conda: &CondaRoot,
    request: &LaunchRequest<'_>,
    runner: &mut dyn CommandRunner,
) -> Result<()> {
    let python = conda.require_env()?;
    let activation = conda.activation_vars(env::var_os("PATH"))?;

    let invocation = Invocation::new(LAUNCH_STEP, python)
        .path_arg(request.entrypoint)
        .arg("-c")
        .path_arg(request.config)
        .arg("-p")
        .path_arg(request.project)
        .current_dir(request.project)
        .envs(activation);

    info!(
        "launching {} in environment '{}'",
        request.entrypoint.display(),
        conda.env_name()
    );
    log::debug!("{LAUNCH_STEP}: {invocation}");

    match runner.run(&invocation) {
        Ok(0) => {
            info!("training finished");
            Ok(())
        }
        Ok(code) => Err(BootstrapError::Launch { code }),
        Err(e) => invocation.check(Err(e)),
    }
}
