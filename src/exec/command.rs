// src/exec/command.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::model::{ConfigFile, ARTIFACT_PLACEHOLDER, NAME_PLACEHOLDER};
use crate::store::Artifact;

/// How an artifact is turned into a process invocation.
///
/// Built once from `[launch]`; `{artifact}` and `{name}` in the program or
/// any argument are substituted per launch.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    env: BTreeMap<String, String>,
}

impl CommandTemplate {
    pub fn new(
        command: &[String],
        extra_args: &[String],
        working_dir: impl Into<PathBuf>,
        env: BTreeMap<String, String>,
    ) -> Self {
        let mut parts = command.iter().chain(extra_args.iter()).cloned();
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            working_dir: working_dir.into(),
            env,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            &cfg.launch.command,
            &cfg.launch.args,
            cfg.effective_working_dir(),
            cfg.launch.env.clone(),
        )
    }

    /// Program and arguments with placeholders substituted.
    pub fn render(&self, artifact: &Artifact) -> (String, Vec<String>) {
        let path = artifact.path.to_string_lossy();
        let substitute = |part: &String| {
            part.replace(ARTIFACT_PLACEHOLDER, &path)
                .replace(NAME_PLACEHOLDER, &artifact.name)
        };
        (
            substitute(&self.program),
            self.args.iter().map(substitute).collect(),
        )
    }

    /// Human-readable command line, for logs and the journal.
    pub fn display(&self, artifact: &Artifact) -> String {
        let (program, args) = self.render(artifact);
        std::iter::once(program)
            .chain(args)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the process command with piped output.
    ///
    /// Children are killed if their supervisor is dropped (e.g. runtime
    /// shutdown), so no process outlives the engine unnoticed.
    pub fn build(&self, artifact: &Artifact) -> Command {
        let (program, args) = self.render(artifact);
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}
