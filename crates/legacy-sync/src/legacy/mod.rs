//! Legacy export file access.
//!
//! The predecessor desktop database writes fixed-schema flat files: a 32-byte
//! header (record count, header length, record length), one 32-byte
//! descriptor per field (11-byte name, type tag, width, decimal count), a
//! `0x0D` terminator, then fixed-width records. Each record starts with a
//! deletion byte: `0x2A` marks the row soft-deleted, anything else is live.
//!
//! [`schema`] parses the header and performs the required-column check;
//! [`reader`] yields live records as field-name → raw-bytes lookups. Rows
//! carrying the soft-delete marker never leave the reader.

pub mod reader;
pub mod schema;

pub use reader::{LegacyFile, LegacyRecord};
pub use schema::{FieldDescriptor, FieldType, FileSchema};

/// Deletion marker byte at the start of each record.
pub(crate) const DELETED_MARKER: u8 = b'*';

/// Fixed size of the file header, in bytes.
pub(crate) const HEADER_LEN: usize = 32;

/// Fixed size of one field descriptor, in bytes.
pub(crate) const DESCRIPTOR_LEN: usize = 32;

/// Terminator byte after the descriptor block.
pub(crate) const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
