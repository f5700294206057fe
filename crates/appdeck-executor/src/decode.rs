//! Unpacking a packaged artifact into a working application directory.

use std::fs;
use std::io;
use std::path::PathBuf;

use flate2::read::GzDecoder;
use log::info;
use thiserror::Error;
use uuid::Uuid;

use crate::content::FrameData;
use crate::encode::{Manifest, ARCHIVE_FORMAT, MANIFEST_FILE};
use crate::executor::{AppExecutor, ExecutorConfig};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("artifact has no manifest")]
    MissingManifest,
    #[error("malformed manifest: {0}")]
    MalformedManifest(#[from] serde_json::Error),
    #[error("unsupported archive format {0}")]
    UnsupportedFormat(String),
}

pub struct AppDecoder {
    work_dir: PathBuf,
}

impl AppDecoder {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Unpacks the artifact into a fresh directory and builds an executor
    /// over it.
    pub fn decode(&self, frame: &FrameData) -> Result<AppExecutor, DecodeError> {
        let app_dir = self.work_dir.join(format!("app-{}", Uuid::new_v4()));
        fs::create_dir_all(&app_dir).map_err(|source| DecodeError::Io {
            path: app_dir.clone(),
            source,
        })?;

        let mut archive = tar::Archive::new(GzDecoder::new(frame.data.as_slice()));
        archive
            .unpack(&app_dir)
            .map_err(|source| DecodeError::Io {
                path: app_dir.clone(),
                source,
            })?;

        let manifest_path = app_dir.join(MANIFEST_FILE);
        let bytes = fs::read(&manifest_path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => DecodeError::MissingManifest,
            _ => DecodeError::Io {
                path: manifest_path.clone(),
                source,
            },
        })?;
        let manifest: Manifest = serde_json::from_slice(&bytes)?;
        if manifest.format != ARCHIVE_FORMAT {
            return Err(DecodeError::UnsupportedFormat(manifest.format));
        }

        info!("unpacked application into {}", app_dir.display());
        Ok(AppExecutor::new(
            app_dir,
            manifest,
            ExecutorConfig::default(),
        ))
    }
}
