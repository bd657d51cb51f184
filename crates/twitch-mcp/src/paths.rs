//! Project layout: where the Maven descriptor, build output and distributable JAR live.

use std::path::{Path, PathBuf};

/// File name of the canonical server JAR inside the artifact directory.
pub const ARTIFACT_FILE_NAME: &str = "twitch-mcp-server.jar";

/// Locations the artifact builder and supervisor work with, rooted at the Maven project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub descriptor: PathBuf,
    pub build_output: PathBuf,
    pub artifact_dir: PathBuf,
    pub artifact: PathBuf,
}

impl ProjectLayout {
    /// Standard Maven layout: `pom.xml`, `target/`, and the launcher's own `dist/` copy.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let artifact_dir = root.join("dist");
        Self {
            descriptor: root.join("pom.xml"),
            build_output: root.join("target"),
            artifact: artifact_dir.join(ARTIFACT_FILE_NAME),
            artifact_dir,
            root,
        }
    }

    /// Resolve `root` against `cwd` when it is relative.
    pub fn resolve(root: Option<&Path>, cwd: &Path) -> Self {
        match root {
            Some(r) if r.is_absolute() => Self::new(r),
            Some(r) => Self::new(cwd.join(r)),
            None => Self::new(cwd),
        }
    }
}

/// The Java executable: `$JAVA_HOME/bin/java` when set, otherwise `java` from `PATH`.
pub fn java_executable(java_home: Option<&Path>) -> PathBuf {
    let name = if cfg!(windows) { "java.exe" } else { "java" };
    match java_home {
        Some(home) if !home.as_os_str().is_empty() => home.join("bin").join(name),
        _ => PathBuf::from(name),
    }
}
