//! Pre-launch guardrail: warn when build outputs are staged in git. Never blocks the launch.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Staged paths in the repository containing `dir` that look like build outputs.
///
/// Returns an empty list when git is unavailable or `dir` is not inside a work tree.
pub async fn staged_artifacts(dir: &Path) -> Vec<String> {
    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(dir)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => parse_staged(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            debug!(status = ?out.status, "git status failed, skipping commit guard");
            Vec::new()
        }
        Err(e) => {
            debug!("git not available ({e}), skipping commit guard");
            Vec::new()
        }
    }
}

/// Pick staged build outputs out of `git status --porcelain` (v1) output.
pub fn parse_staged(porcelain: &str) -> Vec<String> {
    porcelain
        .lines()
        .filter_map(|line| {
            let index_status = line.chars().next()?;
            let path = line.get(3..)?;
            matches!(index_status, 'M' | 'A' | 'R' | 'C' | 'T').then_some(path)
        })
        .map(|path| match path.split_once(" -> ") {
            Some((_, renamed)) => renamed,
            None => path,
        })
        .filter(|path| looks_like_build_output(path))
        .map(str::to_string)
        .collect()
}

fn looks_like_build_output(path: &str) -> bool {
    let path = path.trim_matches('"');
    path.ends_with(".jar") || path.starts_with("dist/") || path.contains("/dist/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_jar_is_flagged() {
        let out = "A  dist/twitch-mcp-server.jar\nM  src/Main.java\n";
        assert_eq!(parse_staged(out), ["dist/twitch-mcp-server.jar"]);
    }

    #[test]
    fn unstaged_and_untracked_are_ignored() {
        let out = " M dist/twitch-mcp-server.jar\n?? target/app.jar\n!! dist/ignored.jar\n";
        assert!(parse_staged(out).is_empty());
    }

    #[test]
    fn rename_uses_destination() {
        let out = "R  old.txt -> server/dist/notes.txt\n";
        assert_eq!(parse_staged(out), ["server/dist/notes.txt"]);
    }

    #[test]
    fn staged_sources_are_fine() {
        assert!(parse_staged("M  pom.xml\nA  README.md\n").is_empty());
    }

    #[tokio::test]
    async fn outside_a_repository_nothing_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(staged_artifacts(dir.path()).await.is_empty());
    }
}
