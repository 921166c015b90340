//! Legacy file header and field-descriptor parsing.

use std::path::Path;

use crate::error::{Result, SyncError};
use crate::legacy::{DESCRIPTOR_LEN, DESCRIPTOR_TERMINATOR, HEADER_LEN};

/// Field type tag from the legacy descriptor block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Fixed-width character data, space-padded.
    Character,
    /// Fixed-width numeric text, right-aligned, may carry pad artifacts.
    Numeric,
    /// Floating-point numeric text.
    Float,
    /// `YYYYMMDD` date text.
    Date,
    /// Single-byte logical (`T`/`F`/`Y`/`N`/`?`).
    Logical,
}

impl FieldType {
    /// Map a descriptor type byte. Unknown tags are treated as character
    /// data so a foreign field never aborts a read; coercion decides later.
    fn from_tag(tag: u8) -> Self {
        match tag {
            b'N' => FieldType::Numeric,
            b'F' => FieldType::Float,
            b'D' => FieldType::Date,
            b'L' => FieldType::Logical,
            _ => FieldType::Character,
        }
    }
}

/// One field of the legacy file layout.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name, as stored (upper-case, at most 10 characters).
    pub name: String,
    /// Declared type tag.
    pub field_type: FieldType,
    /// Width of the field within a record, in bytes.
    pub width: usize,
    /// Declared decimal places (numeric fields only).
    pub decimals: u8,
}

/// Parsed layout of one legacy file.
#[derive(Debug, Clone)]
pub struct FileSchema {
    /// File name, kept for error reporting.
    pub file_name: String,
    /// Field descriptors in file order.
    pub fields: Vec<FieldDescriptor>,
    /// Byte offset of each field within a record (after the deletion byte).
    pub offsets: Vec<usize>,
    /// Number of records the header claims.
    pub record_count: usize,
    /// Total header length (start of record data).
    pub header_len: usize,
    /// Length of one record including the deletion byte.
    pub record_len: usize,
}

impl FileSchema {
    /// Parse the header and descriptor block from raw file contents.
    pub fn parse(path: &Path, data: &[u8]) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if data.len() < HEADER_LEN + 1 {
            return Err(SyncError::malformed(path, "file shorter than header"));
        }

        let record_count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
        let record_len = u16::from_le_bytes([data[10], data[11]]) as usize;

        if header_len < HEADER_LEN + 1 || (header_len - HEADER_LEN - 1) % DESCRIPTOR_LEN != 0 {
            return Err(SyncError::malformed(
                path,
                format!("invalid header length {header_len}"),
            ));
        }
        if data.len() < header_len {
            return Err(SyncError::malformed(path, "descriptor block truncated"));
        }
        if data[header_len - 1] != DESCRIPTOR_TERMINATOR {
            return Err(SyncError::malformed(path, "descriptor terminator missing"));
        }

        let field_count = (header_len - HEADER_LEN - 1) / DESCRIPTOR_LEN;
        let mut fields = Vec::with_capacity(field_count);
        let mut offsets = Vec::with_capacity(field_count);
        let mut offset = 1usize; // deletion byte

        for i in 0..field_count {
            let d = &data[HEADER_LEN + i * DESCRIPTOR_LEN..HEADER_LEN + (i + 1) * DESCRIPTOR_LEN];
            let name_end = d[..11].iter().position(|&b| b == 0).unwrap_or(11);
            let name = String::from_utf8_lossy(&d[..name_end]).trim().to_string();
            if name.is_empty() {
                return Err(SyncError::malformed(path, format!("field {i} has no name")));
            }
            let width = d[16] as usize;
            fields.push(FieldDescriptor {
                name,
                field_type: FieldType::from_tag(d[11]),
                width,
                decimals: d[17],
            });
            offsets.push(offset);
            offset += width;
        }

        if record_len != offset {
            return Err(SyncError::malformed(
                path,
                format!("record length {record_len} does not match field widths ({offset})"),
            ));
        }

        Ok(Self {
            file_name,
            fields,
            offsets,
            record_count,
            header_len,
            record_len,
        })
    }

    /// Index of a field by name (legacy names are case-insensitive).
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Fail fast if any declared field is absent from the file schema.
    ///
    /// Runs once per entity sync, before any record is read, so a missing
    /// column surfaces as a named error instead of silent skips.
    pub fn require_fields<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            if self.field_index(name).is_none() {
                return Err(SyncError::SchemaMismatch {
                    file: self.file_name.clone(),
                    field: name.to_string(),
                });
            }
        }
        Ok(())
    }
}
