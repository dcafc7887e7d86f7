mod common;

use assert_matches::assert_matches;
use serde_json::json;

use osf_mirror::error::MirrorError;
use osf_mirror::metadata::{MetadataAssembler, NO_LICENSE};

use common::{API, FakeOsf, listing, node, query_url, root_children, with_node_resources};

#[test]
fn assembles_description_from_linked_resources() {
    let osf = with_node_resources(
        FakeOsf::default(),
        "abc12",
        &["Ada Lovelace", "Alan Turing"],
    );
    let raw = node("abc12", "Brain Atlas", "2021-03-04T05:06:07.123456", true);

    let dataset = MetadataAssembler::new(&osf).assemble(&raw).unwrap();

    assert_eq!(dataset.title, "Brain Atlas");
    assert_eq!(dataset.homepage, "https://osf.io/abc12/");
    assert_eq!(dataset.version, "2021-03-04T05:06:07.123456");
    assert_eq!(dataset.description, "Brain Atlas description");
    assert_eq!(dataset.creator_names(), vec!["Ada Lovelace", "Alan Turing"]);
    assert_eq!(
        dataset.licenses[0].name,
        "CC-By Attribution 4.0 International"
    );
    assert_eq!(dataset.files.as_deref(), Some(root_children("abc12").as_str()));
    let keywords: Vec<&str> = dataset.keywords.iter().map(|k| k.value.as_str()).collect();
    assert_eq!(keywords, vec!["canadian-open-neuroscience-platform", "mri"]);

    let distribution = dataset.distribution().unwrap();
    assert_eq!(distribution.access.landing_page, "https://osf.io/abc12/");
    assert_eq!(distribution.access.authorizations[0].value, "public");
}

#[test]
fn missing_license_relationship_reads_as_none() {
    let osf = with_node_resources(FakeOsf::default(), "nolic", &["Grace Hopper"]);
    let raw = node("nolic", "Unlicensed", "2020-01-01T00:00:00", false);

    let dataset = MetadataAssembler::new(&osf).assemble(&raw).unwrap();
    assert_eq!(dataset.licenses[0].name, NO_LICENSE);
    assert!(
        !osf.requested()
            .iter()
            .any(|url| url.contains("/licenses/"))
    );
}

#[test]
fn project_without_storage_provider_has_no_files_link() {
    let osf = FakeOsf::default()
        .page(&format!("{API}/nodes/empty/contributors/"), listing(Vec::new()))
        .page(&format!("{API}/nodes/empty/files/"), listing(Vec::new()));
    let raw = node("empty", "Empty", "2020-01-01T00:00:00", false);

    let dataset = MetadataAssembler::new(&osf).assemble(&raw).unwrap();
    assert_eq!(dataset.files, None);
    assert!(dataset.creators.is_empty());
}

#[test]
fn null_description_becomes_empty() {
    let osf = with_node_resources(FakeOsf::default(), "nodesc", &[]);
    let mut raw = node("nodesc", "No Description", "2020-01-01T00:00:00", false);
    raw["attributes"]["description"] = json!(null);

    let dataset = MetadataAssembler::new(&osf).assemble(&raw).unwrap();
    assert_eq!(dataset.description, "");
}

#[test]
fn root_folder_without_files_relationship_is_malformed() {
    let osf = with_node_resources(FakeOsf::default(), "broken", &[]).page(
        &format!("{API}/files/broken-root/"),
        json!({ "data": { "attributes": { "kind": "folder", "name": "" } } }),
    );
    let raw = node("broken", "Broken", "2020-01-01T00:00:00", false);

    let err = MetadataAssembler::new(&osf).assemble(&raw).unwrap_err();
    assert_matches!(err, MirrorError::MalformedResponse { url, .. } if url == format!("{API}/files/broken-root/"));
}

#[test]
fn missing_title_is_malformed() {
    let osf = with_node_resources(FakeOsf::default(), "untitled", &[]);
    let mut raw = node("untitled", "x", "2020-01-01T00:00:00", false);
    raw["attributes"].as_object_mut().unwrap().remove("title");

    let err = MetadataAssembler::new(&osf).assemble(&raw).unwrap_err();
    assert_matches!(err, MirrorError::MalformedResponse { path, .. } if path == "attributes.title");
}

#[test]
fn lists_every_tagged_node_across_pages() {
    let second = format!("{}&page=2", query_url());
    let osf = FakeOsf::default()
        .page(
            &query_url(),
            common::listing_page(
                vec![
                    node("n1", "One", "2020", false),
                    node("n2", "Two", "2020", false),
                ],
                3,
                Some(&second),
            ),
        )
        .page(
            &second,
            common::listing_page(vec![node("n3", "Three", "2020", false)], 3, None),
        );

    let datasets = MetadataAssembler::new(&osf)
        .list_datasets(&query_url())
        .unwrap();
    assert_eq!(datasets.len(), 3);
    assert_eq!(datasets[2]["id"], "n3");
}
