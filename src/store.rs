use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use tempfile::Builder;

use crate::error::MirrorError;
use crate::fs_util;

/// Opens version-controlled mirror directories.
pub trait DatasetStore {
    type Repo: DatasetRepo;

    fn create_or_open(&self, dir: &Utf8Path) -> Result<Self::Repo, MirrorError>;
}

/// File persistence inside one mirror. Paths are relative to the mirror root.
pub trait DatasetRepo {
    fn root(&self) -> &Utf8Path;

    /// Keep `path` in plain git history instead of the annex.
    fn exclude_from_tracking(&self, path: &Utf8Path) -> Result<(), MirrorError>;

    fn save(&self, message: &str) -> Result<(), MirrorError>;

    /// Register `url` as the content source of `path`. With `fast`, content is not fetched now.
    fn add_remote_file(&self, url: &str, path: &Utf8Path, fast: bool) -> Result<(), MirrorError>;

    /// Download the archive at `url` and unpack it under `dest_dir`.
    fn extract_archive_from_url(&self, url: &str, dest_dir: &Utf8Path) -> Result<(), MirrorError>;

    /// Remove `path` from the mirror. An absent path is not an error.
    fn remove(&self, path: &Utf8Path) -> Result<(), MirrorError>;
}

/// Git-annex backed store driving the `git` executable.
#[derive(Clone)]
pub struct AnnexStore {
    git: Option<PathBuf>,
    annex: Option<PathBuf>,
    client: Client,
}

impl AnnexStore {
    pub fn new() -> Result<Self, MirrorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .user_agent(format!("osf-mirror/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| MirrorError::Http(err.to_string()))?;
        Ok(Self {
            git: find_in_path("git"),
            annex: find_in_path("git-annex"),
            client,
        })
    }

    /// `git annex` is a separate executable dispatched through `git`; both must be installed.
    fn require_git(&self) -> Result<&PathBuf, MirrorError> {
        if self.annex.is_none() {
            return Err(MirrorError::MissingTool("git-annex".to_string()));
        }
        self.git
            .as_ref()
            .ok_or_else(|| MirrorError::MissingTool("git".to_string()))
    }
}

impl DatasetStore for AnnexStore {
    type Repo = AnnexRepo;

    fn create_or_open(&self, dir: &Utf8Path) -> Result<AnnexRepo, MirrorError> {
        let git = self.require_git()?.clone();
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        let repo = AnnexRepo {
            root: dir.to_path_buf(),
            git,
            client: self.client.clone(),
        };
        if !dir.join(".git").as_std_path().exists() {
            tracing::info!(path = %dir, "initializing dataset repository");
            repo.git(&["init", "--quiet"])?;
            repo.git(&["annex", "init", "--quiet"])?;
        } else if !dir.join(".git").join("annex").as_std_path().exists() {
            repo.git(&["annex", "init", "--quiet"])?;
        }
        Ok(repo)
    }
}

pub struct AnnexRepo {
    root: Utf8PathBuf,
    git: PathBuf,
    client: Client,
}

impl AnnexRepo {
    fn git(&self, args: &[&str]) -> Result<String, MirrorError> {
        let output = Command::new(&self.git)
            .args(args)
            .current_dir(self.root.as_std_path())
            .output()
            .map_err(|err| MirrorError::StoreCommand(err.to_string()))?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("git {} failed", args.join(" "))
        } else {
            format!("git {}: {stderr}", args.join(" "))
        };
        Err(MirrorError::StoreCommand(message))
    }

    fn download_to_temp(&self, url: &str) -> Result<tempfile::NamedTempFile, MirrorError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| MirrorError::Http(err.to_string()))?;
        if !response.status().is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "archive download failed".to_string());
            return Err(MirrorError::RequestFailure {
                url: url.to_string(),
                body,
            });
        }
        let mut temp = Builder::new()
            .prefix("osf-mirror-archive")
            .suffix(".zip")
            .tempfile()
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        Ok(temp)
    }
}

impl DatasetRepo for AnnexRepo {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn exclude_from_tracking(&self, path: &Utf8Path) -> Result<(), MirrorError> {
        let attributes = self.root.join(".gitattributes");
        let rule = format!("{path} annex.largefiles=nothing");
        let existing = fs::read_to_string(attributes.as_std_path()).unwrap_or_default();
        if existing.lines().any(|line| line.trim() == rule) {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(attributes.as_std_path())
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            writeln!(file).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        }
        writeln!(file, "{rule}").map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn save(&self, message: &str) -> Result<(), MirrorError> {
        self.git(&["annex", "add", "--quiet", "."])?;
        self.git(&["add", "--all"])?;
        let status = self.git(&["status", "--porcelain"])?;
        if status.trim().is_empty() {
            return Ok(());
        }
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    fn add_remote_file(&self, url: &str, path: &Utf8Path, fast: bool) -> Result<(), MirrorError> {
        let mut args = vec!["annex", "addurl"];
        if fast {
            args.push("--fast");
        }
        args.extend(["--file", path.as_str(), url]);
        self.git(&args)?;
        Ok(())
    }

    fn extract_archive_from_url(&self, url: &str, dest_dir: &Utf8Path) -> Result<(), MirrorError> {
        let archive = self.download_to_temp(url)?;
        fs_util::validate_zip(archive.path())?;
        let target = self.root.join(dest_dir);
        let files = fs_util::extract_zip(archive.path(), target.as_std_path())?;
        tracing::debug!(url, files = files.len(), dest = %target, "extracted archive");
        self.save(&format!("[osf-mirror] extract archive into {dest_dir}"))
    }

    fn remove(&self, path: &Utf8Path) -> Result<(), MirrorError> {
        self.git(&["rm", "-r", "--quiet", "--ignore-unmatch", "--", path.as_str()])?;
        let full = self.root.join(path);
        let std_path = full.as_std_path();
        if std_path.is_dir() {
            fs::remove_dir_all(std_path).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        } else if std_path.exists() || std_path.is_symlink() {
            fs::remove_file(std_path).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    locate(name, &std::env::var_os("PATH")?)
}

/// First regular file called `name` in a `PATH`-style directory list.
fn locate(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
