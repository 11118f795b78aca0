use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{info, warn};

use envkit::{CommandRunner, CondaRoot, ConfigRecord, Invocation, Result};

/// Step names attached to every invocation the provisioner issues.
pub mod steps {
    pub const APT_UPDATE: &str = "apt_update";
    pub const APT_INSTALL: &str = "apt_install";
    pub const FETCH_INSTALLER: &str = "fetch_installer";
    pub const INSTALL_CONDA: &str = "install_conda";
    pub const CREATE_ENV: &str = "create_env";
    pub const INSTALL_REQUIREMENTS: &str = "install_requirements";
}

const FALLBACK_INSTALLER_NAME: &str = "conda-installer.sh";

/// Brings a machine from bare OS to a provisioned conda environment.
///
/// Steps run strictly in order and the first failing tool aborts the rest.
/// Nothing already installed is rolled back.
pub struct Provisioner<'a> {
    config: &'a ConfigRecord,
    project: &'a Path,
    conda: CondaRoot,
    cache_dir: PathBuf,
}

impl<'a> Provisioner<'a> {
    /// Creates a new `Provisioner`.
    ///
    /// # Args
    /// * `config` - The loaded configuration record.
    /// * `project` - The project root the config's paths resolve against.
    ///
    /// # Returns
    /// A provisioner targeting the config's conda root and caching the
    /// installer in the project root.
    pub fn new(config: &'a ConfigRecord, project: &'a Path) -> Self {
        Self {
            config,
            project,
            conda: config.conda_root(project),
            cache_dir: project.to_path_buf(),
        }
    }

    /// Replaces the conda root, e.g. with a sandbox directory.
    pub fn with_conda_root(mut self, conda: CondaRoot) -> Self {
        self.conda = conda;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Runs every provisioning step.
    ///
    /// # Errors
    /// `ExternalTool` naming the step and exit code of the first tool that fails.
    pub fn provision(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        self.install_system_packages(runner)?;
        let installer = self.fetch_installer(runner)?;
        self.install_conda(runner, &installer)?;
        self.create_env(runner)?;
        self.install_requirements(runner)?;

        info!(
            "environment '{}' ready at {}",
            self.conda.env_name(),
            self.conda.env_dir().display()
        );
        Ok(())
    }

    fn install_system_packages(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        info!("installing system packages");
        runner.run_checked(&Invocation::new(steps::APT_UPDATE, "apt-get").arg("update"))?;

        let install = Invocation::new(steps::APT_INSTALL, "apt-get")
            .args(["install", "-y"])
            .args(self.config.system_packages().iter().cloned());
        runner.run_checked(&install)
    }

    /// Downloads the installer unless a previous run already did.
    ///
    /// wget writes to `<dest>.part`, which only becomes `dest` after a clean
    /// exit. A failed download leaves no file behind.
    fn fetch_installer(&self, runner: &mut dyn CommandRunner) -> Result<PathBuf> {
        let url = self.config.installer_url();
        let dest = self.cache_dir.join(installer_file_name(url));
        if dest.is_file() {
            info!("using cached installer {}", dest.display());
            return Ok(dest);
        }

        info!("downloading {url}");
        let partial = partial_path(&dest);
        let fetch = Invocation::new(steps::FETCH_INSTALLER, "wget")
            .args(["-q", "-O"])
            .path_arg(&partial)
            .arg(url);
        if let Err(e) = runner.run_checked(&fetch) {
            discard(&partial);
            return Err(e);
        }

        // Dry runs download nothing.
        if partial.is_file() {
            fs::rename(&partial, &dest)?;
        }
        Ok(dest)
    }

    /// `-u` lets the installer update an existing prefix in place.
    fn install_conda(&self, runner: &mut dyn CommandRunner, installer: &Path) -> Result<()> {
        info!("installing conda into {}", self.conda.root().display());
        let install = Invocation::new(steps::INSTALL_CONDA, "bash")
            .path_arg(installer)
            .args(["-b", "-u", "-p"])
            .path_arg(self.conda.root());
        runner.run_checked(&install)
    }

    fn create_env(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        let name = self.conda.env_name();
        if self.conda.env_exists() {
            info!("environment '{name}' already exists, skipping create");
            return Ok(());
        }

        info!(
            "creating environment '{name}' with python {}",
            self.config.python_version()
        );
        let create = Invocation::new(steps::CREATE_ENV, self.conda.conda_bin())
            .args(["create", "-y", "-p"])
            .path_arg(&self.conda.env_dir())
            .arg(format!("python={}", self.config.python_version()));
        runner.run_checked(&create)
    }

    fn install_requirements(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        let requirements = self.config.requirements_in(self.project);
        info!("installing requirements from {}", requirements.display());

        let install = Invocation::new(steps::INSTALL_REQUIREMENTS, self.conda.conda_bin())
            .args(["run", "-p"])
            .path_arg(&self.conda.env_dir())
            .args(["pip", "install", "--no-cache-dir", "-r"])
            .path_arg(&requirements);
        runner.run_checked(&install)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}

fn discard(partial: &Path) {
    match fs::remove_file(partial) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            warn!("could not remove {}: {e}", partial.display());
        }
        _ => {}
    }
}

fn installer_file_name(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_INSTALLER_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installer_name_is_last_url_segment() {
        assert_eq!(
            installer_file_name("https://repo.anaconda.com/miniconda/Miniconda3-latest-Linux-x86_64.sh"),
            "Miniconda3-latest-Linux-x86_64.sh"
        );
        assert_eq!(installer_file_name("https://example.com/"), FALLBACK_INSTALLER_NAME);
    }

    #[test]
    fn partial_download_sits_next_to_installer() {
        assert_eq!(
            partial_path(Path::new("/cache/Miniconda3.sh")),
            PathBuf::from("/cache/Miniconda3.sh.part")
        );
    }
}
