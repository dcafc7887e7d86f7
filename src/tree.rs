use std::fs;
use std::ops::{Add, AddAssign};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;

use crate::access::{Access, AccessResolver};
use crate::client::OsfTransport;
use crate::error::MirrorError;
use crate::paging::PagedFetcher;
use crate::response::{related_href, str_at, u64_at};
use crate::store::DatasetRepo;

const ARCHIVE_EXTENSION: &str = "zip";

/// One entry of an OSF folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Folder {
        name: String,
        children_link: String,
    },
    File {
        name: String,
        download_link: String,
        declared_size: u64,
    },
}

impl TreeNode {
    /// Names must be a single path component; anything else could land outside the mirror.
    pub fn from_record(record: &Value, url: &str) -> Result<Self, MirrorError> {
        let name = str_at(record, &["attributes", "name"], url)?;
        if !is_plain_name(name) {
            return Err(MirrorError::malformed(url, "attributes.name"));
        }
        let name = name.to_string();
        match str_at(record, &["attributes", "kind"], url)? {
            "folder" => Ok(TreeNode::Folder {
                name,
                children_link: related_href(record, "files", url)?.to_string(),
            }),
            "file" => Ok(TreeNode::File {
                name,
                download_link: str_at(record, &["links", "download"], url)?.to_string(),
                declared_size: u64_at(record, &["attributes", "size"], url)?,
            }),
            _ => Err(MirrorError::malformed(url, "attributes.kind")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total_bytes: u64,
    pub files: usize,
    /// Download links that could not be resolved with the configured token.
    pub skipped: Vec<String>,
}

impl Add for SyncSummary {
    type Output = SyncSummary;

    fn add(mut self, rhs: SyncSummary) -> SyncSummary {
        self += rhs;
        self
    }
}

impl AddAssign for SyncSummary {
    fn add_assign(&mut self, rhs: SyncSummary) {
        self.total_bytes += rhs.total_bytes;
        self.files += rhs.files;
        self.skipped.extend(rhs.skipped);
    }
}

/// Mirrors an OSF folder hierarchy into a dataset repository.
pub struct TreeSynchronizer<'a, T, R> {
    fetcher: PagedFetcher<&'a T>,
    resolver: AccessResolver<'a, &'a T>,
    repo: &'a R,
}

impl<'a, T: OsfTransport, R: DatasetRepo> TreeSynchronizer<'a, T, R> {
    pub fn new(transport: &'a T, login_url: &'a str, repo: &'a R) -> Self {
        Self {
            fetcher: PagedFetcher::new(transport),
            resolver: AccessResolver::new(transport, login_url),
            repo,
        }
    }

    /// Depth-first walk from `files_link`, placing its children under `relative`.
    pub fn sync(&self, files_link: &str, relative: &Utf8Path) -> Result<SyncSummary, MirrorError> {
        let mut pending = vec![(files_link.to_string(), relative.to_path_buf())];
        let mut summary = SyncSummary::default();
        while let Some((link, folder)) = pending.pop() {
            let (folder_summary, subfolders) = self.sync_folder(&link, &folder)?;
            summary += folder_summary;
            pending.extend(subfolders.into_iter().rev());
        }
        Ok(summary)
    }

    /// Files of a single folder. Subfolders are created and handed back for the caller to visit.
    fn sync_folder(
        &self,
        link: &str,
        folder: &Utf8Path,
    ) -> Result<(SyncSummary, Vec<(String, Utf8PathBuf)>), MirrorError> {
        let records = self.fetcher.fetch_all(link)?;
        let mut summary = SyncSummary::default();
        let mut subfolders = Vec::new();

        for record in &records {
            match TreeNode::from_record(record, link)? {
                TreeNode::Folder {
                    name,
                    children_link,
                } => {
                    let relative = folder.join(&name);
                    let local = self.repo.root().join(&relative);
                    fs::create_dir_all(local.as_std_path())
                        .map_err(|err| MirrorError::Filesystem(format!("mkdir {local}: {err}")))?;
                    subfolders.push((children_link, relative));
                }
                TreeNode::File {
                    name,
                    download_link,
                    declared_size,
                } => {
                    summary += self.sync_file(folder, &name, &download_link, declared_size)?;
                }
            }
        }
        Ok((summary, subfolders))
    }

    fn sync_file(
        &self,
        folder: &Utf8Path,
        name: &str,
        download_link: &str,
        declared_size: u64,
    ) -> Result<SyncSummary, MirrorError> {
        let url = match self.resolver.resolve(download_link)? {
            Access::Public(url) | Access::PrivateResolved(url) => url,
            Access::PrivateDenied => {
                let err = MirrorError::AccessDenied(download_link.to_string());
                tracing::warn!("{err}, skipping file");
                return Ok(SyncSummary {
                    skipped: vec![download_link.to_string()],
                    ..SyncSummary::default()
                });
            }
        };

        let path = folder.join(name);
        if is_archive(name) {
            tracing::debug!(%path, "extracting archive");
            self.repo.extract_archive_from_url(&url, folder)?;
        } else {
            tracing::debug!(%path, "registering remote file");
            self.repo.add_remote_file(&url, &path, true)?;
            self.repo.save(&format!("[osf-mirror] add {path}"))?;
        }

        Ok(SyncSummary {
            total_bytes: declared_size,
            files: 1,
            skipped: Vec::new(),
        })
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

pub fn is_archive(name: &str) -> bool {
    Utf8Path::new(name)
        .extension()
        .map(|ext| ext == ARCHIVE_EXTENSION)
        .unwrap_or(false)
}
