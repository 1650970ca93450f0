//! Single-entry zip archives, the shape workflow artifacts are uploaded and downloaded in.

use std::io::{Cursor, Read, Write};

use sha2::{Digest, Sha256};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Packs `contents` as the only file of a new archive.
pub fn pack_single_entry(entry_name: &str, contents: &str) -> Result<Vec<u8>, String> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer
        .start_file(entry_name, options)
        .map_err(|error| format!("failed to start entry '{entry_name}': {error}"))?;
    writer
        .write_all(contents.as_bytes())
        .map_err(|error| format!("failed to write entry '{entry_name}': {error}"))?;
    let cursor = writer
        .finish()
        .map_err(|error| format!("failed to finish archive: {error}"))?;
    Ok(cursor.into_inner())
}

/// Reads one text entry; a missing entry is `Ok(None)`, a corrupt archive is an error.
pub fn read_text_entry(archive: &[u8], entry_name: &str) -> Result<Option<String>, String> {
    let mut archive = ZipArchive::new(Cursor::new(archive))
        .map_err(|error| format!("failed to open archive: {error}"))?;
    let mut entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(format!("failed to open entry '{entry_name}': {error}")),
    };
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|error| format!("failed to read entry '{entry_name}': {error}"))?;
    Ok(Some(text))
}

/// `sha256:<hex>` digest the results service expects when an upload is finalized.
pub fn archive_digest(archive: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(archive))
}
