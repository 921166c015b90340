//! Typed rows, batches, and run outcomes.

use std::collections::BTreeMap;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::catalog::{ColumnKind, NumericDefault};
use crate::coerce;
use crate::error::Result;

/// One coerced field value, typed for the target column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// SQL NULL.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Arbitrary-precision numeric.
    Number(Decimal),
    /// Trimmed text.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
}

impl FieldValue {
    /// Coerce a raw legacy field for a target column. Total: failure
    /// resolves to the column's declared default, never an error.
    pub fn from_raw(kind: ColumnKind, raw: &[u8]) -> Self {
        match kind {
            ColumnKind::Integer(default) => {
                match coerce::coerce_integer(raw, numeric_default_i64(default)) {
                    Some(v) => FieldValue::Integer(v),
                    None => FieldValue::Null,
                }
            }
            ColumnKind::Number(default) => {
                match coerce::coerce_number(raw, numeric_default_decimal(default)) {
                    Some(v) => FieldValue::Number(v),
                    None => FieldValue::Null,
                }
            }
            ColumnKind::Text => FieldValue::Text(coerce::coerce_text(raw)),
            ColumnKind::Date => match coerce::coerce_date(raw) {
                Some(d) => FieldValue::Date(d),
                None => FieldValue::Null,
            },
        }
    }
}

fn numeric_default_i64(default: NumericDefault) -> Option<i64> {
    match default {
        NumericDefault::Zero => Some(0),
        NumericDefault::Null => None,
    }
}

fn numeric_default_decimal(default: NumericDefault) -> Option<Decimal> {
    match default {
        NumericDefault::Zero => Some(Decimal::ZERO),
        NumericDefault::Null => None,
    }
}

impl ToSql for FieldValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            FieldValue::Null => Ok(IsNull::Yes),
            FieldValue::Integer(v) => v.to_sql(ty, out),
            FieldValue::Number(v) => v.to_sql(ty, out),
            FieldValue::Text(v) => v.to_sql(ty, out),
            FieldValue::Date(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The catalog fixes column types; a mismatch is a write error the
        // transaction rolls back on, not something to pre-filter here.
        true
    }

    to_sql_checked!();
}

/// One coerced parent record, keyed by its natural key.
#[derive(Debug, Clone)]
pub struct ParentRow {
    /// Parsed natural key (watermark comparisons use this).
    pub key: i64,
    /// Non-key column values, aligned with the descriptor's column specs.
    pub values: Vec<FieldValue>,
}

/// One coerced child/detail record.
#[derive(Debug, Clone)]
pub struct ChildRow {
    /// Parent natural key.
    pub parent_key: i64,
    /// Line sequence. Either the durable legacy value or a fresh 1-based
    /// rewrite assigned at batch assembly.
    pub sequence: i64,
    /// Non-key column values, aligned with the child column specs.
    pub values: Vec<FieldValue>,
}

/// One run's unit of work: qualifying parents plus their child groups.
///
/// Invariant: every key in `children` appears in `parents`. Child rows whose
/// parent is below the watermark or absent from the filtered parent set are
/// dropped during assembly and never reach the writer.
#[derive(Debug, Default)]
pub struct SyncBatch {
    /// Parent rows in key order.
    pub parents: Vec<ParentRow>,
    /// Child rows grouped by parent key.
    pub children: BTreeMap<i64, Vec<ChildRow>>,
}

impl SyncBatch {
    /// Total child rows across all groups.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }

    /// True when there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Outcome of one entity sync run. Created once per run, immutable,
/// consumed by the caller for display and logging.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    /// Unique run identifier.
    pub run_id: String,

    /// Entity that was synced.
    pub entity: String,

    /// Whether the run completed without a fatal error.
    pub success: bool,

    /// Human-readable result for the operator.
    pub message: String,

    /// Parent rows written.
    pub parent_count: usize,

    /// Child rows written.
    pub child_count: usize,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl SyncOutcome {
    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
