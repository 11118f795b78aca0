use std::path::Path;

use anyhow::{Context, bail};
use clap::Parser;
use log::info;

use envkit::{BootstrapError, CommandRunner, ConfigRecord, Invocation, Result, cli::ProjectArgs};

/// Step name of every per-model training run.
pub const TRAIN_STEP: &str = "train";

const PYTHON: &str = "python3";

/// Trains every configured model on every configured language.
#[derive(Debug, Clone, Parser)]
#[command(name = "train_models")]
pub struct TrainArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

/// One model trained on one language.
#[derive(Debug, Clone)]
pub struct Job {
    pub model: String,
    pub language: String,
    pub invocation: Invocation,
}

/// Loads the config and runs every job in order.
///
/// # Errors
/// `ConfigParse` when the model or language lists are unusable, otherwise
/// the first failing job's `ExternalTool` error.
pub fn run(args: &TrainArgs, runner: &mut dyn CommandRunner) -> Result<()> {
    let project = &args.project.project_path;
    let config = ConfigRecord::load(project, &args.project.config)?;

    let jobs = plan(&config, project).map_err(|e| BootstrapError::ConfigParse {
        path: project.join(&args.project.config),
        reason: format!("{e:#}"),
    })?;
    dispatch(&jobs, runner)
}

/// Expands models × languages into jobs, models outermost, both in file order.
///
/// Each script runs from its own directory so it can use relative paths.
pub fn plan(config: &ConfigRecord, project: &Path) -> anyhow::Result<Vec<Job>> {
    if config.models().is_empty() {
        bail!("models must not be empty");
    }
    if config.languages().is_empty() {
        bail!("languages must not be empty");
    }

    let mut jobs = Vec::with_capacity(config.models().len() * config.languages().len());
    for model in config.models() {
        let script = project.join(&model.train_path);
        let (dir, file) = script
            .parent()
            .zip(script.file_name())
            .with_context(|| {
                format!(
                    "model '{}': train_path '{}' does not name a script",
                    model.name,
                    model.train_path.display()
                )
            })?;

        for language in config.languages() {
            let invocation = Invocation::new(TRAIN_STEP, PYTHON)
                .arg(file)
                .args(["--language", language.as_str()])
                .current_dir(dir);
            jobs.push(Job {
                model: model.name.clone(),
                language: language.clone(),
                invocation,
            });
        }
    }

    Ok(jobs)
}

/// Runs jobs one after the other, stopping at the first failure.
pub fn dispatch(jobs: &[Job], runner: &mut dyn CommandRunner) -> Result<()> {
    for job in jobs {
        info!("training model {} on {}", job.model, job.language);
        runner.run_checked(&job.invocation)?;
    }
    info!("finished {} training job(s)", jobs.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(models: &str, languages: &str) -> ConfigRecord {
        let raw = format!(
            r#"{{"conda_path": "/opt/conda", "python_version": "3.10",
                "requirements_path": "requirements.txt", "mount_path": "/data",
                "models": {models}, "languages": {languages}}}"#
        );
        ConfigRecord::from_json(&raw).unwrap()
    }

    #[test]
    fn plans_models_outermost() {
        let cfg = config(
            r#"[{"name": "lstm", "train_path": "lstm/train.py"},
                {"name": "hmm", "train_path": "baselines/hmm/fit.py"}]"#,
            r#"["deu", "fin"]"#,
        );
        let jobs = plan(&cfg, Path::new("/proj")).unwrap();

        let order: Vec<_> = jobs
            .iter()
            .map(|j| (j.model.as_str(), j.language.as_str()))
            .collect();
        assert_eq!(
            order,
            [("lstm", "deu"), ("lstm", "fin"), ("hmm", "deu"), ("hmm", "fin")]
        );

        let last = &jobs[3].invocation;
        assert_eq!(last.program, PathBuf::from("python3"));
        assert_eq!(last.args, ["fit.py", "--language", "fin"]);
        assert_eq!(last.cwd, Some(PathBuf::from("/proj/baselines/hmm")));
    }

    #[test]
    fn empty_lists_are_rejected() {
        let cfg = config("[]", r#"["deu"]"#);
        let err = plan(&cfg, Path::new("/proj")).unwrap_err();
        assert_eq!(err.to_string(), "models must not be empty");

        let cfg = config(r#"[{"name": "lstm", "train_path": "train.py"}]"#, "[]");
        assert!(plan(&cfg, Path::new("/proj")).is_err());
    }

    #[test]
    fn train_path_without_file_name_is_rejected() {
        let cfg = config(r#"[{"name": "lstm", "train_path": ".."}]"#, r#"["deu"]"#);
        let err = plan(&cfg, Path::new("/proj")).unwrap_err();
        assert!(format!("{err:#}").contains("lstm"));
    }
}
