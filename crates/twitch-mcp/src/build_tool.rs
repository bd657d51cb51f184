//! The external build tool the artifact builder drives. Maven in production, fakes in tests.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::debug;

/// Captured result of one build invocation.
#[derive(Debug)]
pub struct BuildOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    /// What to show the user when the build fails.
    ///
    /// Maven reports compile errors on stdout, so fall back to its tail when stderr is empty.
    pub fn diagnostics(&self) -> String {
        const TAIL_LINES: usize = 40;
        if !self.stderr.trim().is_empty() {
            return self.stderr.trim_end().to_string();
        }
        let lines: Vec<&str> = self.stdout.lines().collect();
        let start = lines.len().saturating_sub(TAIL_LINES);
        lines[start..].join("\n")
    }
}

pub trait BuildTool {
    /// Human-readable tool name for messages.
    fn name(&self) -> &str;

    /// Whether the tool can be invoked at all.
    fn probe(&self) -> impl Future<Output = bool> + Send;

    /// Package the project at `root` into its build output directory, skipping tests.
    fn package(&self, root: &Path) -> impl Future<Output = io::Result<BuildOutput>> + Send;
}

/// `mvn clean package -DskipTests`.
#[derive(Debug, Clone)]
pub struct Maven {
    program: PathBuf,
}

impl Default for Maven {
    fn default() -> Self {
        let program = if cfg!(windows) { "mvn.cmd" } else { "mvn" };
        Self::new(program)
    }
}

impl Maven {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl BuildTool for Maven {
    fn name(&self) -> &str {
        "Maven"
    }

    async fn probe(&self) -> bool {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        debug!(program = %self.program.display(), ?status, "probed build tool");
        matches!(status, Ok(s) if s.success())
    }

    async fn package(&self, root: &Path) -> io::Result<BuildOutput> {
        debug!(program = %self.program.display(), root = %root.display(), "running clean package");
        let output = Command::new(&self.program)
            .args(["clean", "package", "-DskipTests"])
            .current_dir(root)
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(BuildOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
