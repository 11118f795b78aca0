use std::{env, process::ExitCode};

use envkit::{cli, runner};
use provisioner::ProvisionArgs;

fn main() -> ExitCode {
    env_logger::init();

    let result = cli::parse_args::<ProvisionArgs, _, _>(env::args_os()).and_then(|args| {
        let mut runner = runner::select(args.project.dry_run);
        provisioner::run(&args, runner.as_mut())
    });
    cli::report(result)
}
