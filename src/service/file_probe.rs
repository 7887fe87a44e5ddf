use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::model::error::probe_errors::ProbeError;
use crate::model::repository::{ProbedItem, FOLDER_CONTENT_TYPE};

pub static DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// how many leading bytes are inspected when sniffing a content type
const SNIFF_LENGTH: usize = 512;

/// mapping of lowercase file extension => content type, consulted when a file
/// is too short for its leading bytes to be conclusive
static EXTENSION_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("aac", "audio/aac"),
        ("avi", "video/x-msvideo"),
        ("bin", "application/octet-stream"),
        ("bmp", "image/bmp"),
        ("bz2", "application/x-bzip2"),
        ("css", "text/css; charset=utf-8"),
        ("csv", "text/csv; charset=utf-8"),
        ("doc", "application/msword"),
        ("epub", "application/epub+zip"),
        ("gif", "image/gif"),
        ("gz", "application/gzip"),
        ("htm", "text/html; charset=utf-8"),
        ("html", "text/html; charset=utf-8"),
        ("ico", "image/vnd.microsoft.icon"),
        ("jpeg", "image/jpeg"),
        ("jpg", "image/jpeg"),
        ("js", "text/javascript; charset=utf-8"),
        ("json", "application/json"),
        ("md", "text/markdown; charset=utf-8"),
        ("mid", "audio/midi"),
        ("midi", "audio/midi"),
        ("mp3", "audio/mpeg"),
        ("mp4", "video/mp4"),
        ("mpeg", "video/mpeg"),
        ("oga", "audio/ogg"),
        ("ogg", "audio/ogg"),
        ("ogv", "video/ogg"),
        ("opus", "audio/opus"),
        ("otf", "font/otf"),
        ("pdf", "application/pdf"),
        ("png", "image/png"),
        ("ppt", "application/vnd.ms-powerpoint"),
        ("rar", "application/vnd.rar"),
        ("rtf", "application/rtf"),
        ("sh", "application/x-sh"),
        ("svg", "image/svg+xml"),
        ("tar", "application/x-tar"),
        ("tif", "image/tiff"),
        ("tiff", "image/tiff"),
        ("toml", "text/plain; charset=utf-8"),
        ("ttf", "font/ttf"),
        ("txt", "text/plain; charset=utf-8"),
        ("wav", "audio/wav"),
        ("weba", "audio/webm"),
        ("webm", "video/webm"),
        ("webp", "image/webp"),
        ("woff", "font/woff"),
        ("woff2", "font/woff2"),
        ("xhtml", "application/xhtml+xml"),
        ("xls", "application/vnd.ms-excel"),
        ("xml", "text/xml; charset=utf-8"),
        ("zip", "application/zip"),
        ("7z", "application/x-7z-compressed"),
    ])
});

/// whole-second epoch timestamps `(cdate, mdate)` for a stat record
#[cfg(unix)]
pub fn file_timestamps(meta: &Metadata) -> (i64, i64) {
    use std::os::unix::fs::MetadataExt;
    (meta.ctime(), meta.mtime())
}

#[cfg(not(unix))]
pub fn file_timestamps(meta: &Metadata) -> (i64, i64) {
    use std::time::UNIX_EPOCH;
    let seconds = |time: std::io::Result<std::time::SystemTime>| {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    };
    (seconds(meta.created()), seconds(meta.modified()))
}

/// describes the item at `path`. Symlinks are not followed; anything that is
/// neither a regular file nor a directory comes back as `Skipped`.
pub fn probe(path: &Path) -> Result<ProbedItem, ProbeError> {
    let meta = fs::symlink_metadata(path).map_err(|_| ProbeError::NotFound)?;
    let file_type = meta.file_type();
    if !file_type.is_file() && !file_type.is_dir() {
        return Err(ProbeError::Skipped);
    }
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return Err(ProbeError::NotFound),
    };
    let (cdate, mdate) = file_timestamps(&meta);
    if file_type.is_dir() {
        return Ok(ProbedItem {
            name,
            is_dir: true,
            size: countable_children(path),
            ctype: FOLDER_CONTENT_TYPE.to_string(),
            cdate,
            mdate,
        });
    }
    let ctype = content_type_of(path, &name);
    Ok(ProbedItem {
        name,
        is_dir: false,
        size: meta.len() as i64,
        ctype,
        cdate,
        mdate,
    })
}

/// number of immediate children that are regular files or directories
fn countable_children(dir: &Path) -> i64 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_type()
                .map(|t| t.is_file() || t.is_dir())
                .unwrap_or(false)
        })
        .count() as i64
}

/// content type of a regular file. A file shorter than the sniff window is
/// classified by extension; longer files by their leading bytes.
fn content_type_of(path: &Path, name: &str) -> String {
    let mut buffer = Vec::with_capacity(SNIFF_LENGTH);
    if let Ok(file) = fs::File::open(path) {
        let _ = file.take(SNIFF_LENGTH as u64).read_to_end(&mut buffer);
    }
    let detected = if buffer.len() < SNIFF_LENGTH {
        type_by_extension(name)
    } else {
        Some(detect_content_type(&buffer))
    };
    detected.unwrap_or(DEFAULT_CONTENT_TYPE).to_string()
}

/// looks up the content type for the (lowercased) extension of `name`
pub fn type_by_extension(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_string_lossy().to_lowercase();
    EXTENSION_TYPES.get(extension.as_str()).copied()
}

/// classifies a buffer of leading bytes by well-known signatures, falling
/// back to `text/plain` for printable content
pub fn detect_content_type(buffer: &[u8]) -> &'static str {
    static SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"PK\x03\x04", "application/zip"),
        (b"Rar!\x1a\x07", "application/vnd.rar"),
        (b"\x1f\x8b\x08", "application/gzip"),
        (b"OggS", "application/ogg"),
        (b"ID3", "audio/mpeg"),
        (b"BM", "image/bmp"),
        (b"\x00\x00\x01\x00", "image/vnd.microsoft.icon"),
    ];
    for (signature, ctype) in SIGNATURES {
        if buffer.starts_with(signature) {
            return ctype;
        }
    }
    if buffer.starts_with(b"RIFF") && buffer.len() >= 12 {
        match &buffer[8..12] {
            b"WAVE" => return "audio/wav",
            b"AVI " => return "video/x-msvideo",
            b"WEBP" => return "image/webp",
            _ => {}
        }
    }
    let trimmed = trim_leading_whitespace(buffer);
    for tag in [&b"<!DOCTYPE "[..], b"<html", b"<HTML", b"<head", b"<body"] {
        if trimmed.starts_with(tag) {
            return "text/html; charset=utf-8";
        }
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    if looks_like_text(buffer) {
        return "text/plain; charset=utf-8";
    }
    DEFAULT_CONTENT_TYPE
}

fn trim_leading_whitespace(buffer: &[u8]) -> &[u8] {
    let start = buffer
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(buffer.len());
    &buffer[start..]
}

fn looks_like_text(buffer: &[u8]) -> bool {
    std::str::from_utf8(buffer).is_ok_and(|text| {
        !text
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
    })
}


#[cfg(test)]
mod detect_content_type_tests {
    use super::*;

    #[test]
    fn known_signatures_win() {
        assert_eq!("application/pdf", detect_content_type(b"%PDF-1.7 ..."));
        assert_eq!("application/zip", detect_content_type(b"PK\x03\x04rest"));
        assert_eq!("image/jpeg", detect_content_type(b"\xff\xd8\xff\xe0"));
    }

    #[test]
    fn riff_containers_are_told_apart() {
        assert_eq!("audio/wav", detect_content_type(b"RIFF\x00\x00\x00\x00WAVEfmt "));
        assert_eq!(
            "video/x-msvideo",
            detect_content_type(b"RIFF\x00\x00\x00\x00AVI LIST")
        );
    }

    #[test]
    fn html_is_detected_through_leading_whitespace() {
        assert_eq!(
            "text/html; charset=utf-8",
            detect_content_type(b"\n  <!DOCTYPE html><html>")
        );
    }

    #[test]
    fn printable_bytes_are_text() {
        assert_eq!(
            "text/plain; charset=utf-8",
            detect_content_type(b"just some words\n")
        );
    }

    #[test]
    fn binary_garbage_is_octet_stream() {
        assert_eq!(DEFAULT_CONTENT_TYPE, detect_content_type(b"\x00\x01\x02\x03"));
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(Some("image/png"), type_by_extension("photo.PNG"));
        assert_eq!(None, type_by_extension("no-extension"));
    }
}
