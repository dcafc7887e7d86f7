use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::DatasetDescription;
use crate::error::MirrorError;
use crate::fs_util;
use crate::store::DatasetRepo;

pub const MARKER_FILE: &str = ".osf-mirror.json";

/// Last synced remote version of a mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub version: String,
    pub title: String,
}

impl From<&DatasetDescription> for VersionMarker {
    fn from(value: &DatasetDescription) -> Self {
        Self {
            version: value.version.clone(),
            title: value.title.clone(),
        }
    }
}

/// Which entry point is asking. A mirror without marker means different things to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlow {
    AddNew,
    UpdateExisting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    FirstSync,
    UpToDate,
    Outdated { previous: String },
    /// Update requested on a directory that was never synced by us.
    Untracked,
}

impl SyncDecision {
    pub fn requires_sync(&self) -> bool {
        matches!(self, SyncDecision::FirstSync | SyncDecision::Outdated { .. })
    }
}

pub struct VersionTracker;

impl VersionTracker {
    pub fn marker_path(dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(MARKER_FILE)
    }

    pub fn read(dir: &Utf8Path) -> Result<Option<VersionMarker>, MirrorError> {
        let path = Self::marker_path(dir);
        if !path.as_std_path().is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| MirrorError::Filesystem(format!("read {path}: {err}")))?;
        let marker = serde_json::from_str(&content)
            .map_err(|err| MirrorError::Filesystem(format!("parse {path}: {err}")))?;
        Ok(Some(marker))
    }

    pub fn decide(
        dir: &Utf8Path,
        remote: &DatasetDescription,
        flow: SyncFlow,
    ) -> Result<SyncDecision, MirrorError> {
        match (Self::read(dir)?, flow) {
            (Some(marker), _) => Ok(match Self::outdated_version(dir, &marker, remote)? {
                None => SyncDecision::UpToDate,
                Some(previous) => SyncDecision::Outdated { previous },
            }),
            (None, SyncFlow::AddNew) => Ok(SyncDecision::FirstSync),
            (None, SyncFlow::UpdateExisting) => {
                Self::report_untracked(dir);
                Ok(SyncDecision::Untracked)
            }
        }
    }

    /// Previous version when `marker` lags behind `remote`, `None` when it is current.
    ///
    /// A marker written for another title means two projects map to the same directory; that
    /// mirror is never replaced.
    pub fn outdated_version(
        dir: &Utf8Path,
        marker: &VersionMarker,
        remote: &DatasetDescription,
    ) -> Result<Option<String>, MirrorError> {
        if marker.title != remote.title {
            return Err(MirrorError::MirrorClaimed {
                path: dir.to_path_buf(),
                owner: marker.title.clone(),
            });
        }

        if marker.version == remote.version {
            tracing::info!(
                title = %remote.title,
                version = %remote.version,
                "version same as OSF version, no need to update"
            );
            return Ok(None);
        }

        tracing::info!(
            title = %remote.title,
            previous = %marker.version,
            current = %remote.version,
            "version differs from OSF version, updating"
        );
        Ok(Some(marker.version.clone()))
    }

    pub fn report_untracked(dir: &Utf8Path) {
        let err = MirrorError::MissingTracker(Self::marker_path(dir));
        tracing::warn!("{err}");
    }

    pub fn should_sync(
        dir: &Utf8Path,
        remote: &DatasetDescription,
        flow: SyncFlow,
    ) -> Result<bool, MirrorError> {
        Ok(Self::decide(dir, remote, flow)?.requires_sync())
    }

    /// Overwrites the marker; never merges with a previous one.
    pub fn persist(dir: &Utf8Path, description: &DatasetDescription) -> Result<(), MirrorError> {
        let marker = VersionMarker::from(description);
        let content = serde_json::to_vec_pretty(&marker)
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        fs_util::write_atomic(&Self::marker_path(dir), &content)
    }

    /// Drops every top-level entry except dotfiles and `README.md` ahead of a re-download.
    pub fn clear_for_update<R: DatasetRepo>(repo: &R) -> Result<Vec<String>, MirrorError> {
        let names = fs_util::replaceable_entries(repo.root())?;
        for name in &names {
            tracing::debug!(entry = %name, "removing before update");
            repo.remove(Utf8Path::new(name))?;
        }
        Ok(names)
    }
}
