use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;

use crate::client::OsfTransport;
use crate::config::ResolvedConfig;
use crate::domain::{DatasetDescription, mirror_dir_name};
use crate::error::MirrorError;
use crate::fs_util;
use crate::metadata::MetadataAssembler;
use crate::readme::{README_FILE, readme_content};
use crate::store::{DatasetRepo, DatasetStore};
use crate::tracker::{MARKER_FILE, SyncDecision, SyncFlow, VersionTracker};
use crate::tree::{SyncSummary, TreeSynchronizer};

pub const DESCRIPTION_FILE: &str = "DATS.json";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub root: Utf8PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: String,
    pub items: Vec<SyncItemResult>,
}

impl SyncReport {
    pub fn failures(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.action == SyncAction::Failed)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    Added,
    Updated,
    UpToDate,
    Untracked,
    WouldAdd,
    WouldUpdate,
    Failed,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Added => "added",
            SyncAction::Updated => "updated",
            SyncAction::UpToDate => "up-to-date",
            SyncAction::Untracked => "untracked",
            SyncAction::WouldAdd => "would-add",
            SyncAction::WouldUpdate => "would-update",
            SyncAction::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncItemResult {
    pub title: String,
    pub directory: String,
    pub action: SyncAction,
    pub version: Option<String>,
    pub previous_version: Option<String>,
    pub size: Option<f64>,
    pub unit: Option<String>,
    pub files: usize,
    pub skipped_files: Vec<String>,
    pub error: Option<String>,
}

impl SyncItemResult {
    fn new(title: &str, directory: &Utf8Path, action: SyncAction) -> Self {
        Self {
            title: title.to_string(),
            directory: directory.to_string(),
            action,
            version: None,
            previous_version: None,
            size: None,
            unit: None,
            files: 0,
            skipped_files: Vec::new(),
            error: None,
        }
    }

    fn synced(
        dataset: &DatasetDescription,
        directory: &Utf8Path,
        action: SyncAction,
        summary: SyncSummary,
    ) -> Self {
        let mut item = Self::new(&dataset.title, directory, action);
        item.version = Some(dataset.version.clone());
        if let Some(distribution) = dataset.distribution() {
            item.size = Some(distribution.size);
            item.unit = Some(distribution.unit.value.clone());
        }
        item.files = summary.files;
        item.skipped_files = summary.skipped;
        item
    }

    fn failed(title: &str, directory: &Utf8Path, err: &MirrorError) -> Self {
        let mut item = Self::new(title, directory, SyncAction::Failed);
        item.error = Some(err.to_string());
        item
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    UpToDate,
    Untracked,
    Updated {
        previous: String,
        summary: SyncSummary,
    },
}

/// Runs the whole mirror: list tagged projects, then add or update one directory per project.
pub struct App<T: OsfTransport, S: DatasetStore> {
    config: ResolvedConfig,
    transport: T,
    store: S,
}

impl<T: OsfTransport, S: DatasetStore> App<T, S> {
    pub fn new(config: ResolvedConfig, transport: T, store: S) -> Self {
        Self {
            config,
            transport,
            store,
        }
    }

    /// Descriptions of every tagged project. Any failure aborts the listing.
    pub fn describe_all(&self) -> Result<Vec<DatasetDescription>, MirrorError> {
        let assembler = MetadataAssembler::new(&self.transport);
        let descriptions = assembler
            .list_datasets(&self.config.query_url())?
            .iter()
            .map(|raw| assembler.assemble(raw))
            .collect::<Result<Vec<_>, _>>()?;
        for dataset in &descriptions {
            tracing::info!(title = %dataset.title, last_modified = %dataset.version, "retrieved OSF dataset");
        }
        Ok(descriptions)
    }

    pub fn add_new_dataset(
        &self,
        dataset: &mut DatasetDescription,
        dir: &Utf8Path,
    ) -> Result<SyncSummary, MirrorError> {
        let repo = self.store.create_or_open(dir)?;
        repo.exclude_from_tracking(Utf8Path::new(MARKER_FILE))?;
        repo.save("[osf-mirror] keep version marker out of the annex")?;

        let summary = self.sync_tree(&repo, dataset)?;
        self.finish(&repo, dataset, &summary, "[osf-mirror] add dataset")?;
        Ok(summary)
    }

    pub fn update_if_necessary(
        &self,
        dataset: &mut DatasetDescription,
        dir: &Utf8Path,
    ) -> Result<UpdateOutcome, MirrorError> {
        let Some(marker) = VersionTracker::read(dir)? else {
            VersionTracker::report_untracked(dir);
            return Ok(UpdateOutcome::Untracked);
        };
        let Some(previous) = VersionTracker::outdated_version(dir, &marker, dataset)? else {
            return Ok(UpdateOutcome::UpToDate);
        };

        let repo = self.store.create_or_open(dir)?;
        VersionTracker::clear_for_update(&repo)?;
        let summary = self.sync_tree(&repo, dataset)?;
        self.finish(&repo, dataset, &summary, "[osf-mirror] update dataset")?;
        Ok(UpdateOutcome::Updated { previous, summary })
    }

    pub fn run(&self, options: &SyncOptions) -> Result<SyncReport, MirrorError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        if !options.dry_run {
            fs::create_dir_all(options.root.as_std_path())
                .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        }

        let assembler = MetadataAssembler::new(&self.transport);
        let raw_datasets = assembler.list_datasets(&self.config.query_url())?;

        let mut items = Vec::with_capacity(raw_datasets.len());
        for raw in &raw_datasets {
            let mut dataset = match assembler.assemble(raw) {
                Ok(dataset) => dataset,
                Err(err) => {
                    let title = raw_title(raw);
                    tracing::error!(title = %title, error = %err, "failed to describe dataset");
                    let dir = options.root.join(mirror_dir_name(&title));
                    items.push(SyncItemResult::failed(&title, &dir, &err));
                    continue;
                }
            };
            tracing::info!(title = %dataset.title, last_modified = %dataset.version, "retrieved OSF dataset");
            let dir = options.root.join(mirror_dir_name(&dataset.title));
            items.push(self.process(&mut dataset, &dir, options.dry_run));
        }

        Ok(SyncReport { started_at, items })
    }

    fn process(&self, dataset: &mut DatasetDescription, dir: &Utf8Path, dry_run: bool) -> SyncItemResult {
        let exists = dir.as_std_path().exists();
        if dry_run {
            return self.preview(dataset, dir, exists);
        }

        if !exists {
            return match self.add_new_dataset(dataset, dir) {
                Ok(summary) => SyncItemResult::synced(dataset, dir, SyncAction::Added, summary),
                Err(err) => {
                    tracing::error!(title = %dataset.title, error = %err, "failed to add dataset");
                    if let Err(cleanup) = fs::remove_dir_all(dir.as_std_path()) {
                        tracing::warn!(path = %dir, error = %cleanup, "failed to remove partial mirror");
                    }
                    SyncItemResult::failed(&dataset.title, dir, &err)
                }
            };
        }

        match self.update_if_necessary(dataset, dir) {
            Ok(UpdateOutcome::UpToDate) => {
                let mut item = SyncItemResult::new(&dataset.title, dir, SyncAction::UpToDate);
                item.version = Some(dataset.version.clone());
                item
            }
            Ok(UpdateOutcome::Untracked) => {
                SyncItemResult::new(&dataset.title, dir, SyncAction::Untracked)
            }
            Ok(UpdateOutcome::Updated { previous, summary }) => {
                let mut item = SyncItemResult::synced(dataset, dir, SyncAction::Updated, summary);
                item.previous_version = Some(previous);
                item
            }
            Err(err) => {
                tracing::error!(title = %dataset.title, error = %err, "failed to update dataset");
                SyncItemResult::failed(&dataset.title, dir, &err)
            }
        }
    }

    fn preview(&self, dataset: &DatasetDescription, dir: &Utf8Path, exists: bool) -> SyncItemResult {
        let decision = if exists {
            VersionTracker::decide(dir, dataset, SyncFlow::UpdateExisting)
        } else {
            Ok(SyncDecision::FirstSync)
        };
        let mut item = match decision {
            Ok(SyncDecision::FirstSync) => SyncItemResult::new(&dataset.title, dir, SyncAction::WouldAdd),
            Ok(SyncDecision::UpToDate) => SyncItemResult::new(&dataset.title, dir, SyncAction::UpToDate),
            Ok(SyncDecision::Untracked) => {
                SyncItemResult::new(&dataset.title, dir, SyncAction::Untracked)
            }
            Ok(SyncDecision::Outdated { previous }) => {
                let mut item = SyncItemResult::new(&dataset.title, dir, SyncAction::WouldUpdate);
                item.previous_version = Some(previous);
                item
            }
            Err(err) => return SyncItemResult::failed(&dataset.title, dir, &err),
        };
        item.version = Some(dataset.version.clone());
        item
    }

    fn sync_tree(
        &self,
        repo: &S::Repo,
        dataset: &DatasetDescription,
    ) -> Result<SyncSummary, MirrorError> {
        let Some(files_link) = dataset.files.as_deref() else {
            return Ok(SyncSummary::default());
        };
        TreeSynchronizer::new(&self.transport, &self.config.login_url, repo)
            .sync(files_link, Utf8Path::new(""))
    }

    /// Records size, description files and, once content is committed, the version marker.
    fn finish(
        &self,
        repo: &S::Repo,
        dataset: &mut DatasetDescription,
        summary: &SyncSummary,
        message: &str,
    ) -> Result<(), MirrorError> {
        dataset.set_distribution_size(summary.total_bytes);
        let root = repo.root();

        let description = serde_json::to_vec_pretty(dataset)
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        fs_util::write_atomic(&root.join(DESCRIPTION_FILE), &description)?;
        let readme = root.join(README_FILE);
        if !readme.as_std_path().exists() {
            fs_util::write_atomic(&readme, readme_content(dataset).as_bytes())?;
        }
        repo.save(message)?;

        VersionTracker::persist(root, dataset)?;
        repo.save(&format!("[osf-mirror] record version {}", dataset.version))
    }
}

fn raw_title(raw: &Value) -> String {
    raw.get("attributes")
        .and_then(|attributes| attributes.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("untitled")
        .to_string()
}
