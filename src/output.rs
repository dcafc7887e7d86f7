use std::io::{self, Write};

use serde::Serialize;

use crate::app::{SyncAction, SyncReport};
use crate::domain::DatasetDescription;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &SyncReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_descriptions(descriptions: &[DatasetDescription]) -> io::Result<()> {
        Self::print_json(&descriptions)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &SyncReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(Self::render_report(report).as_bytes())
    }

    pub fn render_report(report: &SyncReport) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "OSF mirror summary ({} datasets, {} failed)\n",
            report.items.len(),
            report.failures()
        ));
        for item in &report.items {
            out.push_str(&format!("- {} [{}]\n", item.title, item.action.as_str()));
            out.push_str(&format!("    directory: {}\n", item.directory));
            match item.action {
                SyncAction::Added | SyncAction::Updated => {
                    if let (Some(size), Some(unit)) = (item.size, &item.unit) {
                        out.push_str(&format!("    size: {size} {unit} in {} files\n", item.files));
                    }
                    if let Some(previous) = &item.previous_version {
                        out.push_str(&format!("    previous version: {previous}\n"));
                    }
                    for skipped in &item.skipped_files {
                        out.push_str(&format!("    skipped: {skipped}\n"));
                    }
                }
                SyncAction::WouldUpdate => {
                    if let Some(previous) = &item.previous_version {
                        out.push_str(&format!("    previous version: {previous}\n"));
                    }
                }
                SyncAction::Failed => {
                    if let Some(error) = &item.error {
                        out.push_str(&format!("    error: {error}\n"));
                    }
                }
                SyncAction::UpToDate | SyncAction::Untracked | SyncAction::WouldAdd => {}
            }
            if let Some(version) = &item.version {
                out.push_str(&format!("    version: {version}\n"));
            }
        }
        out
    }
}
