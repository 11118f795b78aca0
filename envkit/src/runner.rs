use std::{
    collections::HashMap,
    ffi::OsString,
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use crate::error::{BootstrapError, Result, ToolFailure};

/// A single external command, described but not yet run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Name of the workflow step this command belongs to.
    pub step: &'static str,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, OsString)>,
}

impl Invocation {
    pub fn new(step: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            step,
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a path argument byte for byte, even when it is not UTF-8.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, OsString)>) -> Self {
        self.envs.extend(vars);
        self
    }

    /// The program name as shown in errors and logs.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Maps the outcome of running this invocation to the workflow's error type.
    ///
    /// # Errors
    /// `ExternalTool` for a spawn failure or any non-zero exit code.
    pub fn check(&self, outcome: io::Result<i32>) -> Result<()> {
        let failure = match outcome {
            Ok(0) => return Ok(()),
            Ok(code) => ToolFailure::Exit(code),
            Err(e) => ToolFailure::Spawn(e),
        };
        Err(BootstrapError::ExternalTool {
            step: self.step,
            program: self.program_name(),
            failure,
        })
    }
}

impl fmt::Display for Invocation {
    /// Renders the command the way it would be typed in a shell.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.cwd {
            write!(f, "(cd {} && ", quote(&dir.display().to_string()))?;
        }
        write!(f, "{}", quote(&self.program_name()))?;
        for arg in &self.args {
            write!(f, " {}", quote(&arg.to_string_lossy()))?;
        }
        if self.cwd.is_some() {
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Runs external commands to completion.
///
/// Every call blocks until the child exits; output streams go wherever the
/// implementation sends them, unmodified.
pub trait CommandRunner {
    /// Runs the invocation and returns its exit code.
    fn run(&mut self, invocation: &Invocation) -> io::Result<i32>;

    /// Runs the invocation and fails on any non-zero exit.
    fn run_checked(&mut self, invocation: &Invocation) -> Result<()> {
        log::debug!("{}: {invocation}", invocation.step);
        let outcome = self.run(invocation);
        invocation.check(outcome)
    }
}

/// Spawns real processes with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> io::Result<i32> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(invocation.envs.iter().map(|(k, v)| (k, v)));

        let status = cmd.status()?;
        Ok(exit_code(status))
    }
}

/// Shell convention: a child killed by signal `n` reports `128 + n`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Prints each command instead of running it.
///
/// Writes to stdout unless built with [`DryRunner::with_output`].
#[derive(Debug)]
pub struct DryRunner<W = io::Stdout> {
    out: W,
}

impl DryRunner {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for DryRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> DryRunner<W> {
    pub fn with_output(out: W) -> Self {
        Self { out }
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

impl<W: Write> CommandRunner for DryRunner<W> {
    fn run(&mut self, invocation: &Invocation) -> io::Result<i32> {
        writeln!(self.out, "{invocation}")?;
        Ok(0)
    }
}

/// Picks the runner for a command line's `--dry-run` flag.
pub fn select(dry_run: bool) -> Box<dyn CommandRunner> {
    if dry_run {
        Box::new(DryRunner::new())
    } else {
        Box::new(SystemRunner)
    }
}

type Responder = Box<dyn FnMut(&Invocation) -> io::Result<i32>>;

/// Records invocations without spawning anything.
///
/// Each step answers with exit code 0 unless a responder was registered for it.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Vec<Invocation>,
    responders: HashMap<&'static str, Responder>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every invocation of `step` exit with `code`.
    pub fn exit_with(self, step: &'static str, code: i32) -> Self {
        self.on(step, move |_| Ok(code))
    }

    /// Registers a callback that runs in place of `step`.
    pub fn on<F>(mut self, step: &'static str, responder: F) -> Self
    where
        F: FnMut(&Invocation) -> io::Result<i32> + 'static,
    {
        self.responders.insert(step, Box::new(responder));
        self
    }

    pub fn calls(&self) -> &[Invocation] {
        &self.calls
    }

    /// The step names in the order they ran.
    pub fn steps(&self) -> Vec<&'static str> {
        self.calls.iter().map(|c| c.step).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, invocation: &Invocation) -> io::Result<i32> {
        self.calls.push(invocation.clone());
        match self.responders.get_mut(invocation.step) {
            Some(responder) => responder(invocation),
            None => Ok(0),
        }
    }
}
