use std::{ffi::OsString, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, error::ErrorKind};

use crate::{
    config::DEFAULT_CONFIG_NAME,
    error::{BootstrapError, Result},
};

/// Flags shared by every command that reads the project's config.
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Project root; the config and requirements paths resolve against it.
    #[arg(short = 'p', long = "project_path")]
    pub project_path: PathBuf,
    /// Config file, relative to the project root.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_NAME)]
    pub config: PathBuf,
    /// Print each command instead of running it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Parses command line arguments.
///
/// `--help` and `--version` print and exit 0 right away.
///
/// # Errors
/// `Usage` with clap's error line and usage line for anything it rejects.
pub fn parse_args<T, I, S>(args: I) -> Result<T>
where
    T: Parser,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    T::try_parse_from(args).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
        _ => BootstrapError::Usage(usage_summary(&e.render().to_string())),
    })
}

/// Keeps the `error:` line and the `Usage:` line of clap's rendered error.
fn usage_summary(rendered: &str) -> String {
    let mut lines = rendered.lines().map(str::trim).filter(|l| !l.is_empty());
    let error = lines.next().unwrap_or("error: invalid arguments");
    match lines.find(|l| l.starts_with("Usage:")) {
        Some(usage) => format!("{error}\n{usage}"),
        None => error.to_string(),
    }
}

/// Turns a command's outcome into the process exit code, reporting the error on stderr.
pub fn report(result: Result<()>) -> ExitCode {
    let err = match result {
        Ok(()) => return ExitCode::SUCCESS,
        Err(err) => err,
    };

    match &err {
        BootstrapError::Usage(usage) => eprintln!("{usage}"),
        other => {
            log::error!("{other}");
            eprintln!("error: {other}");
        }
    }

    ExitCode::from(process_code(&err))
}

/// The error's exit code, or 1 when it does not fit a non-zero `u8`.
fn process_code(err: &BootstrapError) -> u8 {
    u8::try_from(err.exit_code())
        .ok()
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Parser)]
    struct TestArgs {
        #[command(flatten)]
        project: ProjectArgs,
    }

    #[test]
    fn config_defaults_to_config_json() {
        let args: TestArgs = parse_args(["bin", "-p", "/proj"]).unwrap();
        assert_eq!(args.project.project_path, PathBuf::from("/proj"));
        assert_eq!(args.project.config, PathBuf::from("config.json"));
        assert!(!args.project.dry_run);
    }

    #[test]
    fn long_flags_match_short_ones() {
        let args: TestArgs =
            parse_args(["bin", "--project_path", "/proj", "--config", "other.json"]).unwrap();
        assert_eq!(args.project.config, PathBuf::from("other.json"));
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        let err = parse_args::<TestArgs, _, _>(["bin", "-p", "/proj", "-x"]).unwrap_err();
        match err {
            BootstrapError::Usage(usage) => {
                let lines: Vec<&str> = usage.lines().collect();
                assert_eq!(lines.len(), 2, "{usage}");
                assert!(lines[0].starts_with("error:") && lines[0].contains("-x"), "{usage}");
                assert!(lines[1].starts_with("Usage: bin"), "{usage}");
            }
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn usage_summary_drops_tips_and_help_hint() {
        let rendered = concat!(
            "error: unexpected argument '-x' found\n\n",
            "  tip: to pass '-x' as a value, use '-- -x'\n\n",
            "Usage: provision --project_path <PROJECT_PATH>\n\n",
            "For more information, try '--help'.\n",
        );
        assert_eq!(
            usage_summary(rendered),
            "error: unexpected argument '-x' found\nUsage: provision --project_path <PROJECT_PATH>"
        );
        assert_eq!(usage_summary("error: bad\n"), "error: bad");
    }

    #[test]
    fn process_code_keeps_valid_codes_and_falls_back_to_one() {
        let launch = |code| BootstrapError::Launch { code };
        assert_eq!(process_code(&launch(137)), 137);
        assert_eq!(process_code(&launch(2)), 2);
        assert_eq!(process_code(&launch(-1)), 1);
        assert_eq!(process_code(&launch(256)), 1);
        assert_eq!(process_code(&launch(0)), 1);
        assert_eq!(process_code(&BootstrapError::Usage(String::new())), 1);
    }

    #[test]
    fn missing_project_is_a_usage_error() {
        let err = parse_args::<TestArgs, _, _>(["bin", "-c", "config.json"]).unwrap_err();
        assert!(matches!(err, BootstrapError::Usage(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
