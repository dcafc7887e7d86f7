use serde_json::Value;

use crate::client::OsfTransport;
use crate::error::MirrorError;
use crate::response::value_at;

/// Collects every record behind a cursor-paged OSF endpoint.
#[derive(Debug, Clone, Copy)]
pub struct PagedFetcher<T> {
    transport: T,
}

impl<T: OsfTransport> PagedFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Records of every page, in the order the pages were visited.
    pub fn fetch_all(&self, url: &str) -> Result<Vec<Value>, MirrorError> {
        let first = self.transport.get_json(url)?;
        let mut records = page_data(&first, url)?;

        if !has_more_pages(&first, url)? {
            return Ok(records);
        }

        let mut next = next_link(&first, url)?;
        let mut pages = 1usize;
        while let Some(page_url) = next {
            let page = self.transport.get_json(&page_url)?;
            records.extend(page_data(&page, &page_url)?);
            next = next_link(&page, &page_url)?;
            pages += 1;
        }
        tracing::debug!(url, pages, records = records.len(), "fetched paged listing");
        Ok(records)
    }

    /// The `data` object of a single-resource endpoint.
    pub fn fetch_record(&self, url: &str) -> Result<Value, MirrorError> {
        let mut payload = self.transport.get_json(url)?;
        match payload.get_mut("data").map(Value::take) {
            Some(record @ Value::Object(_)) => Ok(record),
            _ => Err(MirrorError::malformed(url, "data")),
        }
    }
}

fn page_data(page: &Value, url: &str) -> Result<Vec<Value>, MirrorError> {
    value_at(page, &["data"], url)?
        .as_array()
        .cloned()
        .ok_or_else(|| MirrorError::malformed(url, "data"))
}

/// `links.meta.total > links.meta.per_page`; a page without `links` stands alone.
fn has_more_pages(page: &Value, url: &str) -> Result<bool, MirrorError> {
    let Some(links) = page.get("links") else {
        return Ok(false);
    };
    let Some(meta) = links.get("meta") else {
        return Ok(false);
    };
    let total = meta
        .get("total")
        .and_then(Value::as_u64)
        .ok_or_else(|| MirrorError::malformed(url, "links.meta.total"))?;
    let per_page = meta
        .get("per_page")
        .and_then(Value::as_u64)
        .ok_or_else(|| MirrorError::malformed(url, "links.meta.per_page"))?;
    Ok(total > per_page)
}

fn next_link(page: &Value, url: &str) -> Result<Option<String>, MirrorError> {
    match page.get("links").and_then(|links| links.get("next")) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(next)) => Ok(Some(next.clone())),
        Some(_) => Err(MirrorError::malformed(url, "links.next")),
    }
}
