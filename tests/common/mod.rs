#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};

use osf_mirror::client::OsfTransport;
use osf_mirror::config::{Config, ConfigLoader, ResolvedConfig};
use osf_mirror::error::MirrorError;
use osf_mirror::store::{DatasetRepo, DatasetStore};

pub const API: &str = "https://api.osf.io/v2";
pub const LOGIN: &str = "https://accounts.osf.io/login";

/// In-memory OSF: JSON pages by URL plus redirect targets for download probes.
#[derive(Default)]
pub struct FakeOsf {
    pages: HashMap<String, Value>,
    anonymous: HashMap<String, String>,
    authorized: HashMap<String, String>,
    pub requests: Mutex<Vec<String>>,
    pub probes: Mutex<Vec<(String, bool)>>,
}

impl FakeOsf {
    pub fn page(mut self, url: &str, body: Value) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    /// Anonymous probe lands on the login page; the token resolves to `target`.
    pub fn gated(mut self, download: &str, target: &str) -> Self {
        self.anonymous
            .insert(download.to_string(), format!("{LOGIN}?service={download}"));
        self.authorized
            .insert(download.to_string(), target.to_string());
        self
    }

    /// Login page for both probes.
    pub fn denied(mut self, download: &str) -> Self {
        let login = format!("{LOGIN}?service={download}");
        self.anonymous.insert(download.to_string(), login.clone());
        self.authorized.insert(download.to_string(), login);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl OsfTransport for FakeOsf {
    fn get_json(&self, url: &str) -> Result<Value, MirrorError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| MirrorError::RequestFailure {
                url: url.to_string(),
                body: "{\"errors\": [{\"detail\": \"Not found.\"}]}".to_string(),
            })
    }

    fn redirect_target(&self, url: &str, authorized: bool) -> Result<Option<String>, MirrorError> {
        self.probes
            .lock()
            .unwrap()
            .push((url.to_string(), authorized));
        let targets = if authorized {
            &self.authorized
        } else {
            &self.anonymous
        };
        Ok(targets.get(url).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Open(String),
    Exclude(String),
    Save(String),
    AddRemote { url: String, path: String, fast: bool },
    Extract { url: String, dest: String },
    Remove(String),
}

/// Records every store call; remote files are written as small text files holding their URL.
#[derive(Default, Clone)]
pub struct FakeStore {
    pub calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl FakeStore {
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn added_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::AddRemote { url, .. } => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Remove(path) => Some(path),
                _ => None,
            })
            .collect()
    }
}

impl DatasetStore for FakeStore {
    type Repo = FakeRepo;

    fn create_or_open(&self, dir: &Utf8Path) -> Result<FakeRepo, MirrorError> {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        self.calls
            .lock()
            .unwrap()
            .push(StoreCall::Open(dir.to_string()));
        Ok(FakeRepo {
            root: dir.to_path_buf(),
            calls: Arc::clone(&self.calls),
        })
    }
}

pub struct FakeRepo {
    root: Utf8PathBuf,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl FakeRepo {
    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DatasetRepo for FakeRepo {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn exclude_from_tracking(&self, path: &Utf8Path) -> Result<(), MirrorError> {
        self.record(StoreCall::Exclude(path.to_string()));
        Ok(())
    }

    fn save(&self, message: &str) -> Result<(), MirrorError> {
        self.record(StoreCall::Save(message.to_string()));
        Ok(())
    }

    fn add_remote_file(&self, url: &str, path: &Utf8Path, fast: bool) -> Result<(), MirrorError> {
        let target = self.root.join(path);
        fs::write(target.as_std_path(), url)
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        self.record(StoreCall::AddRemote {
            url: url.to_string(),
            path: path.to_string(),
            fast,
        });
        Ok(())
    }

    fn extract_archive_from_url(&self, url: &str, dest_dir: &Utf8Path) -> Result<(), MirrorError> {
        self.record(StoreCall::Extract {
            url: url.to_string(),
            dest: dest_dir.to_string(),
        });
        Ok(())
    }

    fn remove(&self, path: &Utf8Path) -> Result<(), MirrorError> {
        let target = self.root.join(path);
        if target.as_std_path().is_dir() {
            fs::remove_dir_all(target.as_std_path())
                .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        } else if target.as_std_path().exists() {
            fs::remove_file(target.as_std_path())
                .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        }
        self.record(StoreCall::Remove(path.to_string()));
        Ok(())
    }
}

pub fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

pub fn config() -> ResolvedConfig {
    ConfigLoader::resolve_config(Config {
        osf_token: Some("secret".to_string()),
        ..Config::default()
    })
    .unwrap()
}

pub fn query_url() -> String {
    config().query_url()
}

/// Single-page JSON:API listing.
pub fn listing(records: Vec<Value>) -> Value {
    let total = records.len();
    json!({
        "data": records,
        "links": { "next": null, "meta": { "total": total, "per_page": 10 } }
    })
}

/// One page of a listing reporting `total` records, linking to `next`.
pub fn listing_page(records: Vec<Value>, total: usize, next: Option<&str>) -> Value {
    json!({
        "data": records,
        "links": { "next": next, "meta": { "total": total, "per_page": 2 } }
    })
}

pub fn folder(name: &str, children: &str) -> Value {
    json!({
        "attributes": { "kind": "folder", "name": name },
        "relationships": { "files": { "links": { "related": { "href": children } } } }
    })
}

pub fn file(name: &str, download: &str, size: u64) -> Value {
    json!({
        "attributes": { "kind": "file", "name": name, "size": size },
        "links": { "download": download }
    })
}

pub fn node(id: &str, title: &str, modified: &str, with_license: bool) -> Value {
    let mut relationships = json!({
        "contributors": { "links": { "related": { "href": format!("{API}/nodes/{id}/contributors/") } } },
        "files": { "links": { "related": { "href": format!("{API}/nodes/{id}/files/") } } }
    });
    if with_license {
        relationships["license"] =
            json!({ "links": { "related": { "href": format!("{API}/licenses/{id}-license/") } } });
    }
    json!({
        "id": id,
        "attributes": {
            "title": title,
            "description": format!("{title} description"),
            "date_modified": modified,
            "tags": ["canadian-open-neuroscience-platform", "mri"]
        },
        "links": {
            "html": format!("https://osf.io/{id}/"),
            "self": format!("{API}/nodes/{id}/")
        },
        "relationships": relationships
    })
}

pub fn contributor(full_name: &str) -> Value {
    json!({ "embeds": { "users": { "data": { "attributes": { "full_name": full_name } } } } })
}

pub fn root_children(id: &str) -> String {
    format!("{API}/nodes/{id}/files/osfstorage/")
}

/// Registers contributors, license, storage provider and root folder pages for `id`.
/// The root folder's children listing is left to the caller, at [`root_children`].
pub fn with_node_resources(osf: FakeOsf, id: &str, creators: &[&str]) -> FakeOsf {
    let provider = json!({
        "relationships": { "root_folder": { "links": { "related": { "href": format!("{API}/files/{id}-root/") } } } }
    });
    let root_folder = json!({
        "data": {
            "attributes": { "kind": "folder", "name": "" },
            "relationships": { "files": { "links": { "related": { "href": root_children(id) } } } }
        }
    });
    osf.page(
        &format!("{API}/nodes/{id}/contributors/"),
        listing(creators.iter().map(|name| contributor(name)).collect()),
    )
    .page(
        &format!("{API}/licenses/{id}-license/"),
        json!({ "data": { "attributes": { "name": "CC-By Attribution 4.0 International" } } }),
    )
    .page(&format!("{API}/nodes/{id}/files/"), listing(vec![provider]))
    .page(&format!("{API}/files/{id}-root/"), root_folder)
}
