use serde_json::Value;

use crate::client::OsfTransport;
use crate::domain::{Creator, DatasetDescription, Distribution, ExtraProperty, Keyword, License};
use crate::error::MirrorError;
use crate::paging::PagedFetcher;
use crate::response::{has_relationship, related_href, str_at, text_at, value_at};

pub const NO_LICENSE: &str = "None";

/// Turns raw OSF node records into [`DatasetDescription`]s.
pub struct MetadataAssembler<T> {
    fetcher: PagedFetcher<T>,
}

impl<T: OsfTransport> MetadataAssembler<T> {
    pub fn new(transport: T) -> Self {
        Self {
            fetcher: PagedFetcher::new(transport),
        }
    }

    /// Every node returned by the tagged listing, across all pages.
    pub fn list_datasets(&self, query_url: &str) -> Result<Vec<Value>, MirrorError> {
        let datasets = self.fetcher.fetch_all(query_url)?;
        tracing::info!(query = query_url, count = datasets.len(), "OSF query");
        Ok(datasets)
    }

    pub fn assemble(&self, raw: &Value) -> Result<DatasetDescription, MirrorError> {
        let source = str_at(raw, &["links", "self"], "dataset").unwrap_or("dataset");
        let title = str_at(raw, &["attributes", "title"], source)?.to_string();
        let homepage = str_at(raw, &["links", "html"], source)?.to_string();
        let version = str_at(raw, &["attributes", "date_modified"], source)?.to_string();
        let description = text_at(raw, &["attributes", "description"], source)?;
        let keywords = keywords(raw, source)?;

        let creators = self
            .contributors(related_href(raw, "contributors", source)?)?
            .into_iter()
            .map(|name| Creator { name })
            .collect();

        let license = if has_relationship(raw, "license") {
            self.license(related_href(raw, "license", source)?)?
        } else {
            NO_LICENSE.to_string()
        };

        let files = self.files_link(related_href(raw, "files", source)?)?;

        Ok(DatasetDescription {
            title,
            files,
            distributions: vec![Distribution::public(&homepage)],
            homepage,
            creators,
            description,
            version,
            licenses: vec![License { name: license }],
            keywords,
            extra_properties: vec![ExtraProperty::osf_logo()],
        })
    }

    fn contributors(&self, link: &str) -> Result<Vec<String>, MirrorError> {
        self.fetcher
            .fetch_all(link)?
            .iter()
            .map(|contributor| {
                str_at(
                    contributor,
                    &["embeds", "users", "data", "attributes", "full_name"],
                    link,
                )
                .map(str::to_string)
            })
            .collect()
    }

    fn license(&self, link: &str) -> Result<String, MirrorError> {
        let record = self.fetcher.fetch_record(link)?;
        Ok(str_at(&record, &["attributes", "name"], link)?.to_string())
    }

    /// Storage providers → first provider's root folder → the root folder's children listing.
    fn files_link(&self, providers_link: &str) -> Result<Option<String>, MirrorError> {
        let providers = self.fetcher.fetch_all(providers_link)?;
        let Some(provider) = providers.first() else {
            tracing::warn!(link = providers_link, "dataset has no storage provider, mirroring an empty tree");
            return Ok(None);
        };
        let root_folder_link = related_href(provider, "root_folder", providers_link)?;
        let root_folder = self.fetcher.fetch_record(root_folder_link)?;
        Ok(Some(
            related_href(&root_folder, "files", root_folder_link)?.to_string(),
        ))
    }
}

/// Tags in first-seen order, duplicates dropped.
fn keywords(raw: &Value, source: &str) -> Result<Vec<Keyword>, MirrorError> {
    let tags = value_at(raw, &["attributes", "tags"], source)?
        .as_array()
        .ok_or_else(|| MirrorError::malformed(source, "attributes.tags"))?;
    let mut keywords: Vec<Keyword> = Vec::with_capacity(tags.len());
    for tag in tags {
        let value = tag
            .as_str()
            .ok_or_else(|| MirrorError::malformed(source, "attributes.tags"))?;
        if keywords.iter().all(|existing| existing.value != value) {
            keywords.push(Keyword {
                value: value.to_string(),
            });
        }
    }
    Ok(keywords)
}
