// src/exec/command.rs

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Artifact, Collaborator, OpContext, OpFuture};

/// Number of stderr lines kept in the error of a failed command.
const STDERR_TAIL_LINES: usize = 20;

/// Build a shell command appropriate for the platform.
fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run a shell command to completion, discarding its output.
///
/// Used for fire-and-forget hooks such as the reload command.
pub async fn run_shell(cmd: &str) -> Result<()> {
    debug!(cmd = %cmd, "running shell hook");
    let status = shell(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("spawning shell hook '{cmd}'"))?;

    if !status.success() {
        bail!("shell hook '{cmd}' exited with code {}", status.code().unwrap_or(-1));
    }
    Ok(())
}

/// Pipes each artifact through an external command: the artifact bytes go
/// to stdin, stdout becomes the new contents.
///
/// `{input}` expands to the artifact's source path and `{name}` to its
/// output file name.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    cmd: String,
}

impl ShellCommand {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    fn expand(&self, artifact: &Artifact) -> String {
        let input = artifact
            .origin
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.cmd
            .replace("{input}", &input)
            .replace("{name}", &artifact.file_name())
    }

    async fn pipe(&self, step: &str, artifact: Artifact) -> Result<Artifact> {
        let cmd = self.expand(&artifact);
        info!(step = %step, file = %artifact.path.display(), cmd = %cmd, "running command");

        let mut child = shell(&cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning process for '{cmd}'"))?;

        // Feed stdin from a separate task so a chatty child cannot deadlock
        // on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let contents = artifact.contents.clone();
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&contents).await {
                    debug!(error = %err, "child closed stdin early");
                }
            });
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for process of '{cmd}'"))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(step = %step, "stderr: {}", line);
        }

        if !output.status.success() {
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            bail!(
                "'{cmd}' exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                tail.trim()
            );
        }

        Ok(Artifact {
            contents: output.stdout,
            ..artifact
        })
    }
}

impl Collaborator for ShellCommand {
    fn name(&self) -> &str {
        "exec"
    }

    fn apply<'a>(&'a self, artifacts: Vec<Artifact>, ctx: &'a OpContext) -> OpFuture<'a> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(artifacts.len());
            for artifact in artifacts {
                out.push(self.pipe(&ctx.step, artifact).await?);
            }
            Ok(out)
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::fs::MockFileSystem;

    fn ctx() -> OpContext {
        OpContext {
            step: "test".into(),
            output_dir: PathBuf::from("build"),
            fs: Arc::new(MockFileSystem::new()),
        }
    }

    #[tokio::test]
    async fn pipes_contents_through_stdin_and_stdout() {
        let op = ShellCommand::new("tr a-z A-Z");
        let out = op
            .apply(vec![Artifact::new("main.js", "let x = 1;")], &ctx())
            .await
            .unwrap();
        assert_eq!(out[0].contents, b"LET X = 1;");
        assert_eq!(out[0].path, PathBuf::from("main.js"));
    }

    #[tokio::test]
    async fn expands_placeholders() {
        let op = ShellCommand::new("echo {name} {input}");
        let artifact = Artifact::new("style.css", "").with_origin("src/style.scss");
        let out = op.apply(vec![artifact], &ctx()).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out[0].contents).trim(), "style.css src/style.scss");
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let op = ShellCommand::new("echo broken >&2; exit 3");
        let err = op
            .apply(vec![Artifact::new("a.css", "")], &ctx())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("code 3"), "{err}");
        assert!(err.contains("broken"), "{err}");
    }
}
