use std::{error::Error, fmt, io, path::PathBuf};

/// The bootstrap result type.
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Why an external tool did not complete.
#[derive(Debug)]
pub enum ToolFailure {
    /// The process ran and exited with a non-zero code.
    Exit(i32),
    /// The process could not be started at all.
    Spawn(io::Error),
}

/// All errors that can occur while provisioning or launching.
#[derive(Debug)]
pub enum BootstrapError {
    /// Bad or missing command line flags, carries the rendered usage text.
    Usage(String),
    /// The configuration file does not exist.
    ConfigNotFound { path: PathBuf },
    /// The configuration file exists but is not a valid record.
    ConfigParse { path: PathBuf, reason: String },
    /// A package manager, installer or build tool failed.
    ExternalTool {
        step: &'static str,
        program: String,
        failure: ToolFailure,
    },
    /// The named environment was never provisioned.
    EnvironmentNotFound { name: String, path: PathBuf },
    /// The training entrypoint exited with a non-zero code.
    Launch { code: i32 },
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl BootstrapError {
    /// Returns the process exit code this error should terminate with.
    ///
    /// Failing tools and the training entrypoint propagate their own code,
    /// everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExternalTool {
                failure: ToolFailure::Exit(code),
                ..
            } => *code,
            Self::Launch { code } => *code,
            _ => 1,
        }
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(usage) => write!(f, "usage error: {}", usage.trim_end()),
            Self::ConfigNotFound { path } => {
                write!(f, "config not found: {}", path.display())
            }
            Self::ConfigParse { path, reason } => {
                write!(f, "invalid config {}: {reason}", path.display())
            }
            Self::ExternalTool {
                step,
                program,
                failure: ToolFailure::Exit(code),
            } => write!(f, "{step}: `{program}` exited with code {code}"),
            Self::ExternalTool {
                step,
                program,
                failure: ToolFailure::Spawn(e),
            } => write!(f, "{step}: failed to start `{program}`: {e}"),
            Self::EnvironmentNotFound { name, path } => write!(
                f,
                "environment '{name}' not found at {}, run provision first",
                path.display()
            ),
            Self::Launch { code } => write!(f, "training entrypoint exited with code {code}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ExternalTool {
                failure: ToolFailure::Spawn(e),
                ..
            } => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BootstrapError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
