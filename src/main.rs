use std::{env, process::ExitCode};

use clap::{Parser, Subcommand};

use dispatcher::TrainArgs;
use envkit::{cli, runner};
use launcher::LaunchArgs;
use provisioner::ProvisionArgs;

/// Provision the inflection environment and run training inside it.
#[derive(Debug, Parser)]
#[command(name = "inflection")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Install OS packages, conda, the environment and its requirements.
    Provision(ProvisionArgs),
    /// Run the training entrypoint inside the provisioned environment.
    Launch(LaunchArgs),
    /// Train every configured model on every configured language.
    Train(TrainArgs),
}

impl Mode {
    fn dry_run(&self) -> bool {
        match self {
            Mode::Provision(args) => args.project.dry_run,
            Mode::Launch(args) => args.project.dry_run,
            Mode::Train(args) => args.project.dry_run,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let result = cli::parse_args::<Cli, _, _>(env::args_os()).and_then(|cli| {
        let mut runner = runner::select(cli.mode.dry_run());
        match &cli.mode {
            Mode::Provision(args) => provisioner::run(args, runner.as_mut()),
            Mode::Launch(args) => launcher::run(args, runner.as_mut()),
            Mode::Train(args) => dispatcher::run(args, runner.as_mut()),
        }
    });
    cli::report(result)
}
