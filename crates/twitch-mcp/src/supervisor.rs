//! Runs the server JAR as a child process, relays termination signals to it and reports how it
//! exited.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use console::style;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::LaunchError;
use crate::guard;
use crate::signals::{Signal, SignalRelay};

/// How the child finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    /// Killed by a signal (Unix only).
    Signaled(i32),
}

impl ExitOutcome {
    /// Exit code the launcher should finish with. Signal deaths follow the shell's `128 + n`.
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Exited(code) => code,
            ExitOutcome::Signaled(signal) => 128 + signal,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Signaled(signal);
            }
        }
        ExitOutcome::Exited(status.code().unwrap_or(1))
    }
}

pub struct Supervisor {
    java: PathBuf,
    quiet: bool,
}

impl Supervisor {
    pub fn new(java: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            quiet: false,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// `java -jar <artifact> <passthrough...>` with the config exported through the environment
    /// and stdio inherited. Unresolved optional fields are removed from the inherited environment.
    pub fn command(&self, artifact: &Path, config: &Config, passthrough: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.java);
        for var in config.cleared_env() {
            cmd.env_remove(var);
        }
        cmd.arg("-jar")
            .arg(artifact)
            .args(passthrough)
            .envs(config.runtime_env())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    /// Launch the server and wait for it, relaying SIGINT/SIGTERM until it exits.
    pub async fn launch(
        &self,
        artifact: &Path,
        config: &Config,
        passthrough: &[OsString],
    ) -> Result<ExitOutcome, LaunchError> {
        if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
            return Err(LaunchError::ArtifactMissing {
                path: artifact.to_path_buf(),
            });
        }

        if let Some(dir) = artifact.parent() {
            let staged = guard::staged_artifacts(dir).await;
            if !staged.is_empty() {
                eprintln!(
                    "{} build outputs are staged for commit: {}",
                    style("warning:").yellow().bold(),
                    staged.join(", ")
                );
                eprintln!("  unstage them with: git reset HEAD -- dist/ *.jar");
            }
        }

        let relay = SignalRelay::subscribe().map_err(LaunchError::Signals)?;

        if !self.quiet {
            eprintln!(
                "{} {}",
                style("Launching").cyan().bold(),
                artifact.display()
            );
        }
        let child = self
            .command(artifact, config, passthrough)
            .spawn()
            .map_err(|source| LaunchError::LaunchFailed {
                program: self.java.clone(),
                source,
            })?;
        info!(pid = ?child.id(), "server process started");

        let outcome = self.supervise(child, relay).await?;
        if !self.quiet {
            eprintln!(
                "{} server exited with code {}",
                style("Stopped").dim(),
                outcome.code()
            );
        }
        Ok(outcome)
    }

    /// Wait for `child`, forwarding every signal from `relay` to it. The relay is dropped, and
    /// with it the signal subscription, once the child is gone.
    pub async fn supervise(
        &self,
        mut child: Child,
        mut relay: SignalRelay,
    ) -> Result<ExitOutcome, LaunchError> {
        loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(LaunchError::Wait)?;
                    debug!(%status, "server process exited");
                    return Ok(status.into());
                }
                signal = relay.recv() => {
                    if !self.quiet {
                        eprintln!("{}", style(format!("Received SIG{}, shutting down...", signal.name())).yellow());
                    }
                    forward(signal, &mut child).await;
                }
            }
        }
    }
}

#[cfg(unix)]
async fn forward(signal: Signal, child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = crate::signals::deliver(signal, pid).await {
        warn!("failed to forward SIG{} to {pid}: {e}", signal.name());
    }
}

#[cfg(not(unix))]
async fn forward(signal: Signal, child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("failed to stop server after {:?}: {e}", signal);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Write an executable shell script standing in for `java`.
    fn fake_java(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("java");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn jar(dir: &Path) -> PathBuf {
        let path = dir.join("server.jar");
        std::fs::write(&path, "jar").unwrap();
        path
    }

    fn config() -> Config {
        Config {
            channel: "chan".into(),
            auth: "tok".into(),
            client_id: "cid".into(),
            broadcaster_id: "bid".into(),
            show_connection_message: Some(false),
            jar_path: None,
        }
    }

    #[tokio::test]
    async fn exit_code_is_propagated() {
        let dir = TempDir::new().unwrap();
        let java = fake_java(dir.path(), "exit 7");
        let outcome = Supervisor::new(java)
            .quiet(true)
            .launch(&jar(dir.path()), &config(), &[])
            .await
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Exited(7));
        assert_eq!(outcome.code(), 7);
    }

    #[tokio::test]
    async fn arguments_and_environment_reach_the_child() {
        let dir = TempDir::new().unwrap();
        let record = dir.path().join("record.txt");
        let java = fake_java(
            dir.path(),
            &format!(
                "printf '%s|' \"$@\" > {rec}\necho \"$TWITCH_CHANNEL $TWITCH_AUTH $TWITCH_CLIENT_ID $TWITCH_BROADCASTER_ID $TWITCH_SHOW_CONNECTION_MESSAGE\" >> {rec}",
                rec = record.display()
            ),
        );
        let artifact = jar(dir.path());
        let passthrough: Vec<OsString> = ["--port", "8080", "-Dx=y"]
            .iter()
            .map(OsString::from)
            .collect();

        let outcome = Supervisor::new(java)
            .quiet(true)
            .launch(&artifact, &config(), &passthrough)
            .await
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Exited(0));

        let recorded = std::fs::read_to_string(&record).unwrap();
        assert_eq!(
            recorded,
            format!(
                "-jar|{}|--port|8080|-Dx=y|chan oauth:tok cid bid false\n",
                artifact.display()
            )
        );
    }

    #[test]
    fn unresolved_boolean_is_not_inherited() {
        let supervisor = Supervisor::new("java");
        let unset = Config {
            show_connection_message: None,
            ..config()
        };
        let cmd = supervisor.command(Path::new("server.jar"), &unset, &[]);
        let show = cmd
            .as_std()
            .get_envs()
            .find(|(key, _)| key.to_str() == Some("TWITCH_SHOW_CONNECTION_MESSAGE"));
        assert_eq!(show, Some((std::ffi::OsStr::new("TWITCH_SHOW_CONNECTION_MESSAGE"), None)));

        let cmd = supervisor.command(Path::new("server.jar"), &config(), &[]);
        let show = cmd
            .as_std()
            .get_envs()
            .find(|(key, _)| key.to_str() == Some("TWITCH_SHOW_CONNECTION_MESSAGE"));
        assert_eq!(
            show,
            Some((
                std::ffi::OsStr::new("TWITCH_SHOW_CONNECTION_MESSAGE"),
                Some(std::ffi::OsStr::new("false"))
            ))
        );
    }

    #[tokio::test]
    async fn missing_artifact_is_a_precondition_failure() {
        let dir = TempDir::new().unwrap();
        let java = fake_java(dir.path(), "exit 0");
        let err = Supervisor::new(java)
            .quiet(true)
            .launch(&dir.path().join("absent.jar"), &config(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::ArtifactMissing { .. }));
    }

    #[tokio::test]
    async fn missing_executable_is_launch_failure() {
        let dir = TempDir::new().unwrap();
        let err = Supervisor::new(dir.path().join("no-such-java"))
            .quiet(true)
            .launch(&jar(dir.path()), &config(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailed { .. }));
    }

    #[tokio::test]
    async fn interrupt_is_relayed_and_child_code_wins() {
        let dir = TempDir::new().unwrap();
        let ready = dir.path().join("ready");
        let java = fake_java(
            dir.path(),
            &format!(
                "trap 'exit 42' INT\ntouch {}\nwhile true; do sleep 0.05; done",
                ready.display()
            ),
        );
        let supervisor = Supervisor::new(java).quiet(true);
        let child = supervisor
            .command(&jar(dir.path()), &config(), &[])
            .spawn()
            .unwrap();
        let (tx, relay) = SignalRelay::manual();

        let waiter = tokio::spawn(async move { supervisor.supervise(child, relay).await });

        while !ready.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tx.send(Signal::Interrupt).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(10), waiter)
            .await
            .expect("supervisor did not finish")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Exited(42));
    }

    #[tokio::test]
    async fn terminate_kills_child_without_trap() {
        let dir = TempDir::new().unwrap();
        let ready = dir.path().join("ready");
        let java = fake_java(
            dir.path(),
            &format!("touch {}\nexec sleep 30", ready.display()),
        );
        let supervisor = Supervisor::new(java).quiet(true);
        let child = supervisor
            .command(&jar(dir.path()), &config(), &[])
            .spawn()
            .unwrap();
        let (tx, relay) = SignalRelay::manual();
        let waiter = tokio::spawn(async move { supervisor.supervise(child, relay).await });

        while !ready.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tx.send(Signal::Terminate).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(10), waiter)
            .await
            .expect("supervisor did not finish")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ExitOutcome::Signaled(15));
        assert_eq!(outcome.code(), 143);
    }
}
