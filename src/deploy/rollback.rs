// ABOUTME: Filesystem store holding the last successfully deployed package per application.
// ABOUTME: One package plus a JSON record per app name; each save replaces the previous one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::DeployError;
use crate::artifact::{Artifact, ArtifactType};
use crate::types::AppName;

const KNOWN_KINDS: &[ArtifactType] = &[
    ArtifactType::Ear,
    ArtifactType::War,
    ArtifactType::Jar,
    ArtifactType::Rar,
    ArtifactType::Unknown,
];

/// Record written next to a saved package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPackage {
    pub app: String,
    pub kind: ArtifactType,
    pub file_name: String,
    pub source: PathBuf,
    pub saved_at: DateTime<Utc>,
}

/// What happened when a failed deployment tried to restore the previous version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "kebab-case")]
pub enum RollbackOutcome {
    /// Rollback is disabled for this run.
    NotAttempted,
    /// No earlier package was saved for the application.
    NothingSaved,
    Restored,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RollbackStore {
    dir: PathBuf,
}

impl RollbackStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn package_path(&self, app: &str, kind: ArtifactType) -> PathBuf {
        self.dir.join(format!("{app}.{}", kind.extension()))
    }

    fn record_path(&self, app: &str) -> PathBuf {
        self.dir.join(format!("{app}.json"))
    }

    fn store_error(path: &Path, reason: impl ToString) -> DeployError {
        DeployError::RollbackStore {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Keep a copy of `artifact`'s package, replacing whatever was saved for
    /// the same application before.
    pub async fn save(&self, artifact: &Artifact) -> Result<SavedPackage, DeployError> {
        let app = artifact.app_name().as_str();
        let kind = artifact.kind();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::store_error(&self.dir, e))?;

        let destination = self.package_path(app, kind);
        let staging = self.dir.join(format!(".{app}.{}.partial", kind.extension()));
        tokio::fs::copy(artifact.source_path(), &staging)
            .await
            .map_err(|e| Self::store_error(artifact.source_path(), e))?;
        tokio::fs::rename(&staging, &destination)
            .await
            .map_err(|e| Self::store_error(&destination, e))?;

        for other in KNOWN_KINDS.iter().copied().filter(|k| *k != kind) {
            let stale = self.package_path(app, other);
            match tokio::fs::remove_file(&stale).await {
                Ok(()) => tracing::debug!(path = %stale.display(), "removed older saved package"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Self::store_error(&stale, e)),
            }
        }

        let saved = SavedPackage {
            app: app.to_string(),
            kind,
            file_name: format!("{app}.{}", kind.extension()),
            source: artifact.source_path().to_path_buf(),
            saved_at: Utc::now(),
        };
        let record_path = self.record_path(app);
        let json =
            serde_json::to_vec_pretty(&saved).map_err(|e| Self::store_error(&record_path, e))?;
        tokio::fs::write(&record_path, json)
            .await
            .map_err(|e| Self::store_error(&record_path, e))?;

        tracing::info!(%app, path = %destination.display(), "saved package for rollback");
        Ok(saved)
    }

    /// The saved package for `app`, if one exists and its file is still there.
    pub async fn find(&self, app: &AppName) -> Result<Option<SavedPackage>, DeployError> {
        let record_path = self.record_path(app.as_str());
        let bytes = match tokio::fs::read(&record_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::store_error(&record_path, e)),
        };

        let saved: SavedPackage =
            serde_json::from_slice(&bytes).map_err(|e| Self::store_error(&record_path, e))?;

        let package = self.dir.join(&saved.file_name);
        if tokio::fs::try_exists(&package).await.unwrap_or(false) {
            Ok(Some(saved))
        } else {
            tracing::warn!(%app, path = %package.display(), "rollback record has no package");
            Ok(None)
        }
    }

    /// Absolute location of a saved package.
    pub fn path_of(&self, saved: &SavedPackage) -> PathBuf {
        self.dir.join(&saved.file_name)
    }
}
