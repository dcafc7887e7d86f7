//! Mirror tagged OSF projects into git-annex datasets.
//!
//! The sync engine walks paged OSF listings, probes every file for access gating, registers file
//! URLs with a [`store::DatasetStore`] and records the synced project version in a small marker so
//! that unchanged projects are never downloaded twice.

pub mod access;
pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod metadata;
pub mod output;
pub mod paging;
pub mod readme;
pub mod response;
pub mod store;
pub mod tracker;
pub mod tree;
