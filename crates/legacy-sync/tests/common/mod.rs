//! Shared fixtures: builds legacy export files on disk for pipeline tests.

use std::path::Path;

/// Route engine logs through a test subscriber honoring `RUST_LOG`.
/// Idempotent; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builder for a fixed-layout legacy export file.
pub struct LegacyFileBuilder {
    fields: Vec<(String, u8, u8)>,
    rows: Vec<(bool, Vec<String>)>,
}

impl LegacyFileBuilder {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Declare a field: name, type tag (`C`/`N`/`D`/`L`), width.
    pub fn field(mut self, name: &str, tag: u8, width: u8) -> Self {
        self.fields.push((name.to_string(), tag, width));
        self
    }

    /// Append a live row. Values are laid out left-aligned, space-padded.
    pub fn row(mut self, values: &[&str]) -> Self {
        assert_eq!(values.len(), self.fields.len(), "row arity mismatch");
        self.rows
            .push((false, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    /// Append a soft-deleted row.
    pub fn deleted_row(mut self, values: &[&str]) -> Self {
        assert_eq!(values.len(), self.fields.len(), "row arity mismatch");
        self.rows
            .push((true, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    /// Serialize to the legacy on-disk layout.
    pub fn build(&self) -> Vec<u8> {
        const HEADER_LEN: usize = 32;
        const DESCRIPTOR_LEN: usize = 32;

        let record_len: usize = 1 + self.fields.iter().map(|f| f.2 as usize).sum::<usize>();
        let header_len = HEADER_LEN + self.fields.len() * DESCRIPTOR_LEN + 1;

        let mut data = vec![0u8; HEADER_LEN];
        data[0] = 0x03;
        data[4..8].copy_from_slice(&(self.rows.len() as u32).to_le_bytes());
        data[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
        data[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());

        for (name, tag, width) in &self.fields {
            let mut d = [0u8; DESCRIPTOR_LEN];
            d[..name.len()].copy_from_slice(name.as_bytes());
            d[11] = *tag;
            d[16] = *width;
            data.extend_from_slice(&d);
        }
        data.push(0x0D);

        for (deleted, values) in &self.rows {
            data.push(if *deleted { b'*' } else { b' ' });
            for ((_, _, width), value) in self.fields.iter().zip(values) {
                let mut cell = vec![b' '; *width as usize];
                let bytes = value.as_bytes();
                let n = bytes.len().min(cell.len());
                cell[..n].copy_from_slice(&bytes[..n]);
                data.extend_from_slice(&cell);
            }
        }
        data.push(0x1A);
        data
    }

    /// Write the file into a directory under the given name.
    pub fn write_to(&self, dir: &Path, name: &str) {
        std::fs::write(dir.join(name), self.build()).expect("write legacy fixture");
    }
}

/// The delivery header file used by most scenarios.
pub fn delivery_file() -> LegacyFileBuilder {
    LegacyFileBuilder::new()
        .field("DRNO", b'C', 8)
        .field("CUSTOMER", b'C', 20)
        .field("DATEDEL", b'D', 8)
        .field("PONO", b'C', 10)
}

/// The delivery detail file used by most scenarios.
pub fn delivery_item_file() -> LegacyFileBuilder {
    LegacyFileBuilder::new()
        .field("DRNO", b'C', 8)
        .field("PRODCODE", b'C', 10)
        .field("BATCHNO", b'N', 8)
        .field("QTY", b'N', 10)
}
