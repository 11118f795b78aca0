pub mod provisioner;

use std::path::PathBuf;

use clap::Parser;
use envkit::{CommandRunner, ConfigRecord, Result, cli::ProjectArgs};

pub use provisioner::{Provisioner, steps};

/// Installs OS packages, conda, the named environment and its requirements.
#[derive(Debug, Clone, Parser)]
#[command(name = "provision")]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Directory the conda installer is cached in, defaults to the project root.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

/// Provisions the machine described by the project's config.
///
/// The config is loaded and validated before anything is installed.
///
/// # Errors
/// Returns a `BootstrapError` for a bad config or the first failing tool.
pub fn run(args: &ProvisionArgs, runner: &mut dyn CommandRunner) -> Result<()> {
    let project = &args.project.project_path;
    let config = ConfigRecord::load(project, &args.project.config)?;

    let mut provisioner = Provisioner::new(&config, project);
    if let Some(dir) = &args.cache_dir {
        provisioner = provisioner.with_cache_dir(dir);
    }
    provisioner.provision(runner)
}
