//! Keeps the server JAR in `dist/` at least as new as `pom.xml`, rebuilding through the build
//! tool when it is missing or stale.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::build_tool::BuildTool;
use crate::error::BuildError;
use crate::paths::ProjectLayout;

/// A built JAR on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// State of the canonical artifact relative to the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh(Artifact),
    Stale(Artifact),
    Missing,
}

pub struct ArtifactBuilder<T> {
    layout: ProjectLayout,
    tool: T,
    quiet: bool,
}

impl<T: BuildTool> ArtifactBuilder<T> {
    pub fn new(layout: ProjectLayout, tool: T) -> Self {
        Self {
            layout,
            tool,
            quiet: false,
        }
    }

    /// Suppress the build spinner.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Compare the canonical artifact against the descriptor without building anything.
    pub async fn freshness(&self) -> Result<Freshness, BuildError> {
        let descriptor_time = modified(&self.layout.descriptor)
            .await
            .map_err(|source| io_error(&self.layout.descriptor, source))?
            .ok_or_else(|| {
                io_error(
                    &self.layout.descriptor,
                    io::Error::new(io::ErrorKind::NotFound, "build descriptor not found"),
                )
            })?;

        let artifact_time = modified(&self.layout.artifact)
            .await
            .map_err(|source| io_error(&self.layout.artifact, source))?;

        Ok(match artifact_time {
            None => Freshness::Missing,
            Some(time) => {
                let artifact = Artifact {
                    path: self.layout.artifact.clone(),
                    modified: time,
                };
                if time > descriptor_time {
                    Freshness::Fresh(artifact)
                } else {
                    Freshness::Stale(artifact)
                }
            }
        })
    }

    /// Return the canonical artifact, rebuilding it first unless it is strictly newer than the
    /// descriptor.
    pub async fn ensure_artifact(&self) -> Result<Artifact, BuildError> {
        match self.freshness().await? {
            Freshness::Fresh(artifact) => {
                info!(path = %artifact.path.display(), "JAR is up to date, skipping build");
                Ok(artifact)
            }
            Freshness::Stale(_) => {
                info!("JAR is older than {}, rebuilding", self.layout.descriptor.display());
                self.build().await
            }
            Freshness::Missing => {
                info!("no JAR at {}, building", self.layout.artifact.display());
                self.build().await
            }
        }
    }

    async fn build(&self) -> Result<Artifact, BuildError> {
        let tool = self.tool.name().to_string();
        if !self.tool.probe().await {
            return Err(BuildError::BuildToolMissing { tool });
        }

        let sp = (!self.quiet).then(|| crate::spinner(&format!("Building JAR with {tool}...")));
        let output = self.tool.package(&self.layout.root).await;
        if let Some(sp) = sp {
            sp.finish_and_clear();
        }
        let output = output.map_err(|source| io_error(&self.layout.root, source))?;

        if !output.status.success() {
            return Err(BuildError::BuildFailed {
                tool,
                status: output.status,
                diagnostics: output.diagnostics(),
            });
        }

        let candidates = find_candidates(&self.layout.build_output).await?;
        let source = candidates
            .into_iter()
            .next()
            .ok_or_else(|| BuildError::NoArtifactProduced {
                dir: self.layout.build_output.clone(),
            })?;
        debug!(source = %source.display(), "selected build output");

        tokio::fs::create_dir_all(&self.layout.artifact_dir)
            .await
            .map_err(|e| io_error(&self.layout.artifact_dir, e))?;
        tokio::fs::copy(&source, &self.layout.artifact)
            .await
            .map_err(|e| io_error(&self.layout.artifact, e))?;

        let modified = modified(&self.layout.artifact)
            .await
            .map_err(|e| io_error(&self.layout.artifact, e))?
            .unwrap_or_else(SystemTime::now);
        info!(path = %self.layout.artifact.display(), "JAR built");

        Ok(Artifact {
            path: self.layout.artifact.clone(),
            modified,
        })
    }
}

/// JARs in `dir` that can be launched, best candidate first.
///
/// Source and javadoc bundles and shade-plugin `original-*` leftovers are skipped. Quarkus
/// uber-jars (`*-runner.jar`) come first, the rest in lexical order, so the choice does not
/// depend on directory listing order.
pub async fn find_candidates(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BuildError::NoArtifactProduced {
                dir: dir.to_path_buf(),
            });
        }
        Err(e) => return Err(io_error(dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && is_launchable_jar(&name) {
            names.push(name);
        }
    }

    names.sort_by(|a, b| {
        let rank = |n: &str| !n.ends_with("-runner.jar");
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
    Ok(names.into_iter().map(|n| dir.join(n)).collect())
}

fn is_launchable_jar(name: &str) -> bool {
    name.ends_with(".jar")
        && !name.contains("sources")
        && !name.contains("javadoc")
        && !name.starts_with("original-")
}

/// Modification time, or `None` when the file does not exist.
async fn modified(path: &Path) -> io::Result<Option<SystemTime>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn io_error(path: &Path, source: io::Error) -> BuildError {
    BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}
