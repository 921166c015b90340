//! Legacy record reader.
//!
//! Reads a whole export file into memory (legacy files are bounded in size)
//! and yields live records lazily. The sequence is restartable: calling
//! [`LegacyFile::records`] again re-walks the same snapshot.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SyncError};
use crate::legacy::schema::FileSchema;
use crate::legacy::DELETED_MARKER;

/// An opened legacy export file.
#[derive(Debug)]
pub struct LegacyFile {
    path: PathBuf,
    schema: FileSchema,
    data: Vec<u8>,
}

impl LegacyFile {
    /// Open a legacy file and parse its header.
    ///
    /// A missing or unreadable file is a `SourceUnavailable` error carrying
    /// the path verbatim; a readable file with a bad header is `Malformed`.
    /// Both are fatal for the entity run that requested the read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| SyncError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = FileSchema::parse(path, &data)?;
        debug!(
            file = %schema.file_name,
            records = schema.record_count,
            fields = schema.fields.len(),
            "opened legacy file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            data,
        })
    }

    /// Parsed layout of this file.
    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    /// Iterate the live records of this file.
    ///
    /// Rows carrying the soft-delete marker are skipped here and never reach
    /// coercion, aggregation, or the target store. Delete propagation is
    /// intentionally absent; the sync is insert/update only.
    pub fn records(&self) -> Records<'_> {
        Records {
            file: self,
            index: 0,
            failed: false,
        }
    }
}

/// Iterator over the live records of a [`LegacyFile`].
pub struct Records<'a> {
    file: &'a LegacyFile,
    index: usize,
    failed: bool,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<LegacyRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let schema = &self.file.schema;
        loop {
            if self.index >= schema.record_count {
                return None;
            }
            let start = schema.header_len + self.index * schema.record_len;
            let end = start + schema.record_len;
            if end > self.file.data.len() {
                self.failed = true;
                return Some(Err(SyncError::malformed(
                    &self.file.path,
                    format!("record {} truncated", self.index),
                )));
            }
            self.index += 1;
            let bytes = &self.file.data[start..end];
            if bytes[0] == DELETED_MARKER {
                continue;
            }
            return Some(Ok(LegacyRecord { schema, bytes }));
        }
    }
}

/// One live record: field-name → raw-bytes access over a fixed-width row.
///
/// Borrowed from the file's snapshot; produced and consumed within a single
/// reader pass, never persisted.
#[derive(Clone, Copy)]
pub struct LegacyRecord<'a> {
    schema: &'a FileSchema,
    bytes: &'a [u8],
}

impl<'a> LegacyRecord<'a> {
    /// Raw bytes of a field by name, or `None` if the schema lacks it.
    pub fn raw(&self, name: &str) -> Option<&'a [u8]> {
        self.schema.field_index(name).map(|i| self.raw_at(i))
    }

    /// Raw bytes of a field by schema index.
    pub fn raw_at(&self, index: usize) -> &'a [u8] {
        let offset = self.schema.offsets[index];
        &self.bytes[offset..offset + self.schema.fields[index].width]
    }
}
