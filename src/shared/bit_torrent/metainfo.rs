//! Parsing and validation of a torrent's `info` dictionary.
//!
//! The metadata exchange hands the crawler the raw bencoded `info`
//! dictionary. This module turns it into the normalised
//! [`TorrentMetadata`] record:
//!
//! - `name` is decoded as UTF-8 with invalid sequences replaced by U+FFFD.
//! - Multi-file torrents keep their `files` entries; the `name` is the
//!   directory prefix and is not repeated inside each path.
//! - Single-file torrents are normalised to a one-element file list whose
//!   path is `[name]`.
//!
//! Hostile dictionaries are rejected rather than sanitised: negative lengths,
//! NUL bytes in path components and `..` components are all fatal. A file
//! whose path is empty after dropping empty components is silently skipped.
use bencode::{Bencode, Dict};
use serde::Serialize;
use thiserror::Error;

/// Largest `piece length` accepted, 2 GiB.
const MAX_PIECE_LENGTH: i64 = 1 << 31;

/// The normalised content description of a torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMetadata {
    /// The torrent name. For single-file torrents this is also the file name.
    pub name: String,
    /// All files in the torrent. Never empty.
    pub files: Vec<TorrentFile>,
}

impl TorrentMetadata {
    /// Sum of all file lengths.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.length).sum()
    }
}

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentFile {
    /// Path components, without the torrent name prefix.
    pub path: Vec<String>,
    /// File size in bytes.
    pub length: u64,
}

/// Why an `info` dictionary was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed bencode: {0}")]
    Bencode(#[from] bencode::ParseError),

    #[error("the info value is not a dictionary")]
    NotADictionary,

    #[error("missing field: {field}")]
    MissingField { field: &'static str },

    #[error("wrong type for field: {field}")]
    WrongType { field: &'static str },

    #[error("piece length {length} is out of range")]
    InvalidPieceLength { length: i64 },

    #[error("the pieces field is not a multiple of 20 bytes")]
    InvalidPieces,

    #[error("both length and files are present")]
    ConflictingFileModes,

    #[error("negative file length")]
    NegativeFileLength,

    #[error("NUL byte in a path component")]
    NulInPath,

    #[error("path escapes the torrent directory")]
    PathEscapesDirectory,

    #[error("the torrent contains no files")]
    NoFiles,
}

/// Parses raw bencoded bytes as an `info` dictionary.
///
/// # Errors
///
/// Will return an [`enum@Error`] if the bytes are not a well-formed,
/// acceptable `info` dictionary.
pub fn parse_info_dict(bytes: &[u8]) -> Result<TorrentMetadata, Error> {
    let value = Bencode::decode(bytes)?;
    parse_info_value(&value)
}

/// Parses an already decoded `info` value.
///
/// # Errors
///
/// Will return an [`enum@Error`] if the value is not an acceptable `info`
/// dictionary.
pub fn parse_info_value(value: &Bencode) -> Result<TorrentMetadata, Error> {
    let info = value.as_dict().ok_or(Error::NotADictionary)?;

    let name_bytes = require_bytes(info, "name")?;
    let name = String::from_utf8_lossy(name_bytes).into_owned();

    check_piece_fields(info)?;

    let files = match (info.lookup(b"length"), info.lookup(b"files")) {
        (Some(_), Some(_)) => Err(Error::ConflictingFileModes),
        (Some(length), None) => single_file(&name, length),
        (None, Some(files)) => multi_file(files),
        (None, None) => Err(Error::MissingField { field: "length" }),
    }?;

    if files.is_empty() {
        return Err(Error::NoFiles);
    }

    Ok(TorrentMetadata { name, files })
}

fn check_piece_fields(info: &Dict) -> Result<(), Error> {
    let piece_length = require_int(info, "piece length")?;
    if piece_length <= 0 || piece_length > MAX_PIECE_LENGTH {
        return Err(Error::InvalidPieceLength { length: piece_length });
    }

    let pieces = require_bytes(info, "pieces")?;
    if pieces.len() % 20 != 0 {
        return Err(Error::InvalidPieces);
    }

    Ok(())
}

fn single_file(name: &str, length: &Bencode) -> Result<Vec<TorrentFile>, Error> {
    let length = file_length(length)?;

    let path = sanitize_path(std::iter::once(name.to_string()))?;

    // A nameless single-file torrent has nothing to synthesize a path from.
    Ok(path.map(|path| vec![TorrentFile { path, length }]).unwrap_or_default())
}

fn multi_file(files: &Bencode) -> Result<Vec<TorrentFile>, Error> {
    let entries = files.as_list().ok_or(Error::WrongType { field: "files" })?;

    let mut parsed = Vec::with_capacity(entries.len());

    for entry in entries {
        let entry = entry.as_dict().ok_or(Error::WrongType { field: "files" })?;

        let length = file_length(entry.lookup(b"length").ok_or(Error::MissingField { field: "length" })?)?;

        let components = entry
            .lookup(b"path")
            .ok_or(Error::MissingField { field: "path" })?
            .as_list()
            .ok_or(Error::WrongType { field: "path" })?;

        let components = components
            .iter()
            .map(|component| {
                component
                    .as_bytes()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .ok_or(Error::WrongType { field: "path" })
            })
            .collect::<Result<Vec<String>, Error>>()?;

        // Files whose path vanishes after filtering are skipped, not fatal.
        if let Some(path) = sanitize_path(components.into_iter())? {
            parsed.push(TorrentFile { path, length });
        }
    }

    Ok(parsed)
}

fn file_length(value: &Bencode) -> Result<u64, Error> {
    let length = value.as_int().ok_or(Error::WrongType { field: "length" })?;

    u64::try_from(length).map_err(|_| Error::NegativeFileLength)
}

/// Drops empty components and validates the rest. Returns `None` when no
/// component survives.
fn sanitize_path(components: impl Iterator<Item = String>) -> Result<Option<Vec<String>>, Error> {
    let mut path = Vec::new();

    for component in components {
        if component.is_empty() {
            continue;
        }
        if component.contains('\0') {
            return Err(Error::NulInPath);
        }
        if component == ".." {
            return Err(Error::PathEscapesDirectory);
        }
        path.push(component);
    }

    Ok(if path.is_empty() { None } else { Some(path) })
}

fn require_bytes<'a>(dict: &'a Dict, field: &'static str) -> Result<&'a [u8], Error> {
    dict.lookup(field.as_bytes())
        .ok_or(Error::MissingField { field })?
        .as_bytes()
        .ok_or(Error::WrongType { field })
}

fn require_int(dict: &Dict, field: &'static str) -> Result<i64, Error> {
    dict.lookup(field.as_bytes())
        .ok_or(Error::MissingField { field })?
        .as_int()
        .ok_or(Error::WrongType { field })
}
