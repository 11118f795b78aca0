use std::{env, process::ExitCode};

use dispatcher::TrainArgs;
use envkit::{cli, runner};

fn main() -> ExitCode {
    env_logger::init();

    let result = cli::parse_args::<TrainArgs, _, _>(env::args_os()).and_then(|args| {
        let mut runner = runner::select(args.project.dry_run);
        dispatcher::run(&args, runner.as_mut())
    });
    cli::report(result)
}
