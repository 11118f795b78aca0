use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    conda::CondaRoot,
    error::{BootstrapError, Result},
};

/// Config file name used when `-c` is not given.
pub const DEFAULT_CONFIG_NAME: &str = "config.json";

/// Name of the conda environment when the config does not override it.
pub const DEFAULT_ENV_NAME: &str = "inflection";

const DEFAULT_INSTALLER_URL: &str =
    "https://repo.anaconda.com/miniconda/Miniconda3-latest-Linux-x86_64.sh";

const DEFAULT_SYSTEM_PACKAGES: [&str; 4] = ["build-essential", "wget", "jq", "ca-certificates"];

/// A training script listed in the config, consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub train_path: PathBuf,
}

/// Provisioning and launch parameters, read once from the project's JSON config.
///
/// The record is immutable once loaded: fields are only reachable through
/// accessors and every path is resolved against the project root on demand.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigRecord {
    conda_path: PathBuf,
    python_version: String,
    requirements_path: PathBuf,
    mount_path: PathBuf,
    #[serde(default = "default_env_name")]
    env_name: String,
    #[serde(default = "default_system_packages")]
    system_packages: Vec<String>,
    #[serde(default = "default_installer_url")]
    installer_url: String,
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    languages: Vec<String>,
}

fn default_env_name() -> String {
    DEFAULT_ENV_NAME.to_string()
}

fn default_system_packages() -> Vec<String> {
    DEFAULT_SYSTEM_PACKAGES.iter().map(|p| p.to_string()).collect()
}

fn default_installer_url() -> String {
    DEFAULT_INSTALLER_URL.to_string()
}

impl ConfigRecord {
    /// Loads the record from `<project>/<config>`.
    ///
    /// # Args
    /// * `project` - The project root every relative path resolves against.
    /// * `config` - The config file, relative to `project`.
    ///
    /// # Errors
    /// `ConfigNotFound` when the file is missing, `ConfigParse` when it is
    /// not valid JSON or fails validation.
    pub fn load(project: &Path, config: &Path) -> Result<Self> {
        let path = project.join(config);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BootstrapError::ConfigNotFound { path });
            }
            Err(e) => return Err(e.into()),
        };

        let record = Self::from_json(&raw)
            .map_err(|reason| BootstrapError::ConfigParse { path: path.clone(), reason })?;

        log::info!("loaded config from {}", path.display());
        Ok(record)
    }

    /// Parses and validates a record from a JSON document.
    ///
    /// # Errors
    /// Returns a human-readable string if the document cannot be parsed or a
    /// required value is invalid.
    pub fn from_json(raw: &str) -> std::result::Result<Self, String> {
        let record: Self = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        record.validate()?;
        Ok(record)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let required = [
            ("conda_path", self.conda_path.as_os_str().is_empty()),
            ("python_version", self.python_version.trim().is_empty()),
            ("requirements_path", self.requirements_path.as_os_str().is_empty()),
            ("mount_path", self.mount_path.as_os_str().is_empty()),
            ("env_name", self.env_name.trim().is_empty()),
        ];
        if let Some((key, _)) = required.iter().find(|(_, empty)| *empty) {
            return Err(format!("{key} must not be empty"));
        }

        if !is_python_version(&self.python_version) {
            return Err(format!(
                "python_version must be dotted digits, got '{}'",
                self.python_version
            ));
        }

        if self.env_name.contains('/') || matches!(self.env_name.as_str(), "." | "..") {
            return Err(format!(
                "env_name must be a single directory name, got '{}'",
                self.env_name
            ));
        }

        Ok(())
    }

    pub fn conda_path(&self) -> &Path {
        &self.conda_path
    }

    pub fn python_version(&self) -> &str {
        &self.python_version
    }

    pub fn requirements_path(&self) -> &Path {
        &self.requirements_path
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn system_packages(&self) -> &[String] {
        &self.system_packages
    }

    pub fn installer_url(&self) -> &str {
        &self.installer_url
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// The requirements manifest resolved against the project root.
    pub fn requirements_in(&self, project: &Path) -> PathBuf {
        project.join(&self.requirements_path)
    }

    /// The conda install described by this record, resolved against the project root.
    ///
    /// Absolute `conda_path` values are kept as they are.
    pub fn conda_root(&self, project: &Path) -> CondaRoot {
        CondaRoot::new(project.join(&self.conda_path), self.env_name.clone())
    }
}

fn is_python_version(version: &str) -> bool {
    version
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "conda_path": "/opt/conda",
        "python_version": "3.10",
        "requirements_path": "requirements.txt",
        "mount_path": "/data"
    }"#;

    #[test]
    fn parses_required_fields_and_fills_defaults() {
        let cfg = ConfigRecord::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.conda_path(), Path::new("/opt/conda"));
        assert_eq!(cfg.python_version(), "3.10");
        assert_eq!(cfg.requirements_path(), Path::new("requirements.txt"));
        assert_eq!(cfg.mount_path(), Path::new("/data"));
        assert_eq!(cfg.env_name(), DEFAULT_ENV_NAME);
        assert_eq!(cfg.system_packages().len(), DEFAULT_SYSTEM_PACKAGES.len());
        assert!(cfg.installer_url().ends_with(".sh"));
        assert!(cfg.models().is_empty());
        assert!(cfg.languages().is_empty());
    }

    #[test]
    fn missing_key_is_rejected() {
        let raw = r#"{"conda_path": "/opt/conda", "python_version": "3.10", "mount_path": "/data"}"#;
        let err = ConfigRecord::from_json(raw).unwrap_err();
        assert!(err.contains("requirements_path"), "{err}");
    }

    #[test]
    fn empty_value_is_rejected() {
        let raw = SAMPLE.replace("/data", "");
        let err = ConfigRecord::from_json(&raw).unwrap_err();
        assert_eq!(err, "mount_path must not be empty");
    }

    #[test]
    fn env_name_must_stay_inside_envs_dir() {
        let sample = SAMPLE.trim_end().trim_end_matches('}');
        for bad in [".", "..", "../base", "a/b"] {
            let raw = format!(r#"{sample}, "env_name": "{bad}"}}"#);
            let err = ConfigRecord::from_json(&raw).unwrap_err();
            assert!(err.starts_with("env_name"), "{bad}: {err}");
        }
        let raw = format!(r#"{sample}, "env_name": "nlp.v2"}}"#);
        assert_eq!(ConfigRecord::from_json(&raw).unwrap().env_name(), "nlp.v2");
    }

    #[test]
    fn python_version_must_be_dotted_digits() {
        for bad in ["3.x", "three", "3..10", "3.10."] {
            let raw = SAMPLE.replace("3.10", bad);
            assert!(ConfigRecord::from_json(&raw).is_err(), "{bad} accepted");
        }
        for good in ["3", "3.10", "3.10.4"] {
            let raw = SAMPLE.replace("3.10", good);
            assert!(ConfigRecord::from_json(&raw).is_ok(), "{good} rejected");
        }
    }

    #[test]
    fn unknown_keys_are_ignored_and_dispatch_lists_parse() {
        let raw = r#"{
            "conda_path": "conda",
            "python_version": "3.9",
            "requirements_path": "requirements.txt",
            "mount_path": "/mnt",
            "comment": "hand written",
            "env_name": "sandbox",
            "models": [{"name": "lstm", "train_path": "models/lstm/train.py"}],
            "languages": ["deu", "fin"]
        }"#;
        let cfg = ConfigRecord::from_json(raw).unwrap();
        assert_eq!(cfg.env_name(), "sandbox");
        assert_eq!(cfg.models()[0].name, "lstm");
        assert_eq!(cfg.languages(), ["deu".to_string(), "fin".to_string()]);
    }

    #[test]
    fn paths_resolve_against_project_root() {
        let raw = SAMPLE.replace("/opt/conda", "tools/conda");
        let cfg = ConfigRecord::from_json(&raw).unwrap();
        let project = Path::new("/proj");
        assert_eq!(
            cfg.requirements_in(project),
            PathBuf::from("/proj/requirements.txt")
        );
        assert_eq!(cfg.conda_root(project).root(), Path::new("/proj/tools/conda"));

        let absolute = ConfigRecord::from_json(SAMPLE).unwrap();
        assert_eq!(absolute.conda_root(project).root(), Path::new("/opt/conda"));
    }
}
