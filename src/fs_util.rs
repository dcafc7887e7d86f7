use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use zip::ZipArchive;

use crate::error::MirrorError;

fn open_archive(zip_path: &Path) -> Result<ZipArchive<fs::File>, MirrorError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| MirrorError::Archive(format!("open {}: {err}", zip_path.display())))?;
    ZipArchive::new(file)
        .map_err(|err| MirrorError::Archive(format!("{}: {err}", zip_path.display())))
}

/// Unpacks every entry under `target_dir`, returning the files written.
///
/// Call [`validate_zip`] first: a corrupt entry found here leaves earlier entries on disk.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<Vec<Utf8PathBuf>, MirrorError> {
    let mut archive = open_archive(zip_path)?;
    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| MirrorError::Archive(err.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(MirrorError::Archive(format!(
                "entry {} escapes the extraction directory",
                entry.name()
            )));
        };
        let destination = Utf8PathBuf::from_path_buf(target_dir.join(relative))
            .map_err(|path| MirrorError::Archive(format!("non-utf8 entry {}", path.display())))?;

        if entry.is_dir() {
            fs::create_dir_all(destination.as_std_path())
                .map_err(|err| MirrorError::Filesystem(format!("mkdir {destination}: {err}")))?;
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| MirrorError::Filesystem(format!("mkdir {parent}: {err}")))?;
        }
        let mut output = fs::File::create(destination.as_std_path())
            .map_err(|err| MirrorError::Filesystem(format!("create {destination}: {err}")))?;
        io::copy(&mut entry, &mut output)
            .map_err(|err| MirrorError::Archive(format!("{}: {err}", entry.name())))?;
        extracted.push(destination);
    }
    Ok(extracted)
}

/// Reads every entry through its checksum without writing anything; unsafe entry names fail too.
pub fn validate_zip(zip_path: &Path) -> Result<(), MirrorError> {
    let mut archive = open_archive(zip_path)?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| MirrorError::Archive(err.to_string()))?;
        if entry.enclosed_name().is_none() {
            return Err(MirrorError::Archive(format!(
                "entry {} escapes the extraction directory",
                entry.name()
            )));
        }
        if !entry.is_dir() {
            io::copy(&mut entry, &mut io::sink())
                .map_err(|err| MirrorError::Archive(format!("{}: {err}", entry.name())))?;
        }
    }
    Ok(())
}

/// Top-level entry names of a mirror that an update is allowed to replace:
/// everything except dotfiles and `README.md`.
pub fn replaceable_entries(dir: &Utf8Path) -> Result<Vec<String>, MirrorError> {
    let entries =
        fs::read_dir(dir.as_std_path()).map_err(|err| MirrorError::Filesystem(err.to_string()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| MirrorError::Filesystem("non-utf8 entry in mirror".to_string()))?;
        if name.starts_with('.') || name == "README.md" {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), MirrorError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
    }
    let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
    fs::write(tmp_path.as_std_path(), content)
        .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
    fs::rename(tmp_path.as_std_path(), path.as_std_path())
        .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn replaceable_entries_skip_readme_and_dotfiles() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::write(dir.join("data.csv"), b"a,b").unwrap();
        fs::write(dir.join("README.md"), b"# t").unwrap();
        fs::write(dir.join(".osf-mirror.json"), b"{}").unwrap();
        fs::create_dir(dir.join("sub")).unwrap();

        assert_eq!(
            replaceable_entries(&dir).unwrap(),
            vec!["data.csv".to_string(), "sub".to_string()]
        );
    }

    #[test]
    fn validate_zip_reports_archive_errors() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("missing.zip");
        assert!(matches!(validate_zip(&missing), Err(MirrorError::Archive(_))));

        let garbage = temp.path().join("garbage.zip");
        fs::write(&garbage, b"not a zip").unwrap();
        assert!(matches!(validate_zip(&garbage), Err(MirrorError::Archive(_))));

        let escaping = temp.path().join("escaping.zip");
        {
            let mut writer = zip::ZipWriter::new(fs::File::create(&escaping).unwrap());
            writer
                .start_file("../outside.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"x").unwrap();
            writer.finish().unwrap();
        }
        assert!(matches!(validate_zip(&escaping), Err(MirrorError::Archive(_))));
    }

    #[test]
    fn extract_zip_writes_nested_entries() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("bundle.zip");
        {
            let file = fs::File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("inner/a.txt", options).unwrap();
            writer.write_all(b"hello").unwrap();
            writer.finish().unwrap();
        }
        validate_zip(&zip_path).unwrap();
        let out = temp.path().join("out");
        let files = extract_zip(&zip_path, &out).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(fs::read(out.join("inner/a.txt")).unwrap(), b"hello");
    }
}
