use std::{
    env,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use crate::error::{BootstrapError, Result};

/// Handle over a conda install root and the named environment inside it.
///
/// All on-disk state the provisioner writes and the launcher reads goes
/// through this handle, so tests can point it at a temporary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondaRoot {
    root: PathBuf,
    env_name: String,
}

impl CondaRoot {
    /// Creates a new `CondaRoot`.
    ///
    /// # Args
    /// * `root` - The conda installation prefix.
    /// * `env_name` - The name of the environment under `<root>/envs`.
    pub fn new(root: impl Into<PathBuf>, env_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            env_name: env_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// The `conda` executable of this install.
    pub fn conda_bin(&self) -> PathBuf {
        self.root.join("bin").join("conda")
    }

    pub fn env_dir(&self) -> PathBuf {
        self.root.join("envs").join(&self.env_name)
    }

    pub fn env_bin_dir(&self) -> PathBuf {
        self.env_dir().join("bin")
    }

    pub fn env_python(&self) -> PathBuf {
        self.env_bin_dir().join("python")
    }

    /// An environment exists once its interpreter does.
    pub fn env_exists(&self) -> bool {
        self.env_python().is_file()
    }

    /// Returns the environment's interpreter.
    ///
    /// # Errors
    /// `EnvironmentNotFound` if the environment has not been provisioned.
    pub fn require_env(&self) -> Result<PathBuf> {
        if !self.env_exists() {
            return Err(BootstrapError::EnvironmentNotFound {
                name: self.env_name.clone(),
                path: self.env_dir(),
            });
        }
        Ok(self.env_python())
    }

    /// Environment variables that activate this environment for a child process.
    ///
    /// # Args
    /// * `inherited_path` - The `PATH` to extend, usually the current process's.
    ///
    /// # Returns
    /// `PATH` with the environment's `bin/` first, plus `CONDA_PREFIX` and
    /// `CONDA_DEFAULT_ENV`, or an io error if the bin dir cannot be joined
    /// into a `PATH` value.
    pub fn activation_vars(
        &self,
        inherited_path: Option<OsString>,
    ) -> io::Result<Vec<(String, OsString)>> {
        let mut paths = vec![self.env_bin_dir()];
        if let Some(inherited) = inherited_path {
            paths.extend(env::split_paths(&inherited));
        }
        let path = env::join_paths(paths).map_err(io::Error::other)?;

        Ok(vec![
            ("PATH".to_string(), path),
            ("CONDA_PREFIX".to_string(), self.env_dir().into_os_string()),
            ("CONDA_DEFAULT_ENV".to_string(), OsString::from(&self.env_name)),
        ])
    }
}
