//! Dependency collection and directory staging.
//!
//! Each declared dependency expands into staged sources: file copies for
//! module and project trees or wheel artifacts, and mergeable line files
//! for pinned requirement sets. Merging appends with a separating newline,
//! so several requirement files accumulate into one `requirements.txt`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

pub const REQUIREMENTS_FILE: &str = "requirements.txt";
pub const WHEELS_DIR: &str = "wheels";

#[derive(Debug, Error)]
pub enum StageError {
    #[error("dependency path {0} has no file name")]
    UnnamedPath(PathBuf),
    #[error("dependency path {path} is not under root {root}")]
    OutsideRoot { root: PathBuf, path: PathBuf },
    #[error("i/o error staging {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> StageError {
    let path = path.into();
    move |source| StageError::Io { path, source }
}

/// A declared dependency of the packaged application.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// A pinned requirements file; its lines merge into `requirements.txt`.
    Requirements(PathBuf),
    /// One module (file or directory) somewhere under a project root,
    /// staged at its root-relative location.
    Module { root: PathBuf, path: PathBuf },
    /// A package spec line, `name` or `name==version`.
    Package(String),
    /// A prebuilt artifact staged under `wheels/`.
    Wheel(PathBuf),
    /// A whole project tree, staged at the stage root.
    Project { root: PathBuf },
}

/// One unit of staged content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedSource {
    /// Copy `source` to `target` (relative to the stage root).
    File { source: PathBuf, target: PathBuf },
    /// Append `lines` to the line file at `target`, separated from any
    /// prior content by a newline.
    Merge { target: PathBuf, lines: String },
}

impl Dependency {
    /// Expands the dependency into staged sources.
    pub fn collect(&self) -> Result<Vec<StagedSource>, StageError> {
        match self {
            Self::Requirements(path) => {
                let lines =
                    fs::read_to_string(path).map_err(io_err(path.clone()))?;
                Ok(vec![StagedSource::Merge {
                    target: PathBuf::from(REQUIREMENTS_FILE),
                    lines,
                }])
            }
            Self::Module { root, path } => {
                let relative = path
                    .strip_prefix(root)
                    .map_err(|_| StageError::OutsideRoot {
                        root: root.clone(),
                        path: path.clone(),
                    })?;
                collect_tree(path, relative)
            }
            Self::Package(spec) => Ok(vec![StagedSource::Merge {
                target: PathBuf::from(REQUIREMENTS_FILE),
                lines: spec.clone(),
            }]),
            Self::Wheel(path) => {
                let name = path
                    .file_name()
                    .ok_or_else(|| StageError::UnnamedPath(path.clone()))?;
                Ok(vec![StagedSource::File {
                    source: path.clone(),
                    target: Path::new(WHEELS_DIR).join(name),
                }])
            }
            Self::Project { root } => collect_tree(root, Path::new("")),
        }
    }
}

/// Recursively maps a file or directory tree to file copies rooted at
/// `target`.
fn collect_tree(source: &Path, target: &Path) -> Result<Vec<StagedSource>, StageError> {
    let meta = fs::metadata(source).map_err(io_err(source))?;
    if meta.is_file() {
        let target = if target.as_os_str().is_empty() {
            PathBuf::from(
                source
                    .file_name()
                    .ok_or_else(|| StageError::UnnamedPath(source.to_path_buf()))?,
            )
        } else {
            target.to_path_buf()
        };
        return Ok(vec![StagedSource::File {
            source: source.to_path_buf(),
            target,
        }]);
    }

    let mut sources = Vec::new();
    for entry in fs::read_dir(source).map_err(io_err(source))? {
        let entry = entry.map_err(io_err(source))?;
        let name = entry.file_name();
        sources.extend(collect_tree(&entry.path(), &target.join(&name))?);
    }
    sources.sort_by(|a, b| staged_target(a).cmp(staged_target(b)));
    Ok(sources)
}

fn staged_target(source: &StagedSource) -> &Path {
    match source {
        StagedSource::File { target, .. } | StagedSource::Merge { target, .. } => target,
    }
}

/// Materializes every dependency under `root`. The root directory is
/// created even when there is nothing to stage.
pub fn stage(deps: &[Dependency], root: &Path) -> Result<(), StageError> {
    fs::create_dir_all(root).map_err(io_err(root))?;
    for dep in deps {
        for source in dep.collect()? {
            materialize(&source, root)?;
        }
    }
    Ok(())
}

fn materialize(source: &StagedSource, root: &Path) -> Result<(), StageError> {
    match source {
        StagedSource::File { source, target } => {
            let destination = root.join(target);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            debug!("staging {} -> {}", source.display(), destination.display());
            fs::copy(source, &destination).map_err(io_err(source.clone()))?;
        }
        StagedSource::Merge { target, lines } => {
            let destination = root.join(target);
            let mut merged = match fs::read_to_string(&destination) {
                Ok(existing) if !existing.is_empty() => {
                    let mut merged = existing;
                    if !merged.ends_with('\n') {
                        merged.push('\n');
                    }
                    merged
                }
                _ => String::new(),
            };
            merged.push_str(lines);
            fs::write(&destination, merged).map_err(io_err(destination))?;
        }
    }
    Ok(())
}
