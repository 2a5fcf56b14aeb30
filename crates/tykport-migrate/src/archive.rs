//! Reading WSO2 export archives.
//!
//! `apictl` writes one zip per API, named `<Name>_<Version>.zip`. Inside, the
//! Swagger document lives at `<Name>-<Version>/Definitions/swagger.json`.

use crate::error::{MigrationError, Result};
use crate::types::ApiRecord;

use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Location of the description document relative to the archive prefix.
pub const DESCRIPTION_SUFFIX: &str = "Definitions/swagger.json";

const ARCHIVE_EXTENSION: &str = "zip";

/// Derive the in-archive directory from the archive file name.
///
/// `PizzaShackAPI_1.0.0.zip` becomes `PizzaShackAPI-1.0.0`. Only the last
/// underscore separates name from version, so names containing underscores
/// keep them.
pub fn archive_prefix(file_name: &str) -> String {
    let path = Path::new(file_name);
    let stem = match (path.file_stem().and_then(|s| s.to_str()), path.extension()) {
        (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION) => stem,
        _ => file_name,
    };

    match stem.rfind('_') {
        Some(idx) => format!("{}-{}", &stem[..idx], &stem[idx + 1..]),
        None => stem.to_string(),
    }
}

/// Full in-archive path of the description document.
pub fn description_path(file_name: &str) -> String {
    format!("{}/{DESCRIPTION_SUFFIX}", archive_prefix(file_name))
}

/// List export archives in `dir`, sorted by file name.
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_zip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
        if path.is_file() && is_zip {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

fn file_name_of(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            MigrationError::ArchiveError(format!("invalid file name: {}", path.display()))
        })
}

/// Whether `entry` is a `Definitions/swagger.json` document, at the root or
/// under any directory.
fn is_description_entry(entry: &str) -> bool {
    entry == DESCRIPTION_SUFFIX
        || entry
            .strip_suffix(DESCRIPTION_SUFFIX)
            .is_some_and(|dir| dir.ends_with('/'))
}

/// Decompress the description document of one archive, returning its bytes
/// untouched.
pub fn read_description(path: &Path) -> Result<Vec<u8>> {
    let file_name = file_name_of(path)?;
    let expected = description_path(file_name);

    let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;

    // Re-zipped exports sometimes lose the original top-level directory name.
    let entry_name = if zip.index_for_name(&expected).is_some() {
        expected
    } else {
        zip.file_names()
            .find(|n| is_description_entry(n))
            .map(str::to_string)
            .ok_or_else(|| {
                MigrationError::ArchiveError(format!("{file_name}: no entry {expected}"))
            })?
    };

    let mut entry = zip.by_name(&entry_name)?;
    let mut document = Vec::new();
    entry.read_to_end(&mut document)?;
    Ok(document)
}

fn required_str(doc: &Value, pointer: &str, field: &'static str) -> Result<String> {
    doc.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(MigrationError::MissingField(field))
}

impl ApiRecord {
    /// Build a record from the raw bytes of a description document.
    pub fn from_description(archive: &str, document: Vec<u8>) -> Result<Self> {
        let description: Value = serde_json::from_slice(&document)?;

        let name = required_str(&description, "/info/title", "info.title")?;
        let version = required_str(&description, "/info/version", "info.version")?;
        let listen_path = required_str(&description, "/x-wso2-basePath", "x-wso2-basePath")
            .or_else(|_| required_str(&description, "/basePath", "x-wso2-basePath"))?;
        let target_url = required_str(
            &description,
            "/x-wso2-production-endpoints/urls/0",
            "x-wso2-production-endpoints.urls[0]",
        )?;

        Ok(Self {
            archive: archive.to_string(),
            name,
            version,
            listen_path,
            target_url,
            description,
            document,
        })
    }
}

/// Read one archive into an [`ApiRecord`].
pub fn extract_record(path: &Path) -> Result<ApiRecord> {
    let file_name = file_name_of(path)?;
    let document = read_description(path)?;
    ApiRecord::from_description(file_name, document)
}
