//! Static sync-entity configuration.
//!
//! One [`SyncEntityDescriptor`] per synchronized entity, fixed at compile
//! time: which legacy files feed it, which field is its natural key and how
//! that key orders against the watermark, and how each legacy field maps to
//! a typed target column. Loaded nowhere, cached nowhere — this is the
//! process-wide static configuration the engine reads at the start of a run.

use tracing::warn;

use crate::coerce;

/// Fallback for a numeric column whose raw value cannot be coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericDefault {
    /// Store zero.
    Zero,
    /// Store SQL NULL.
    Null,
}

/// How a legacy field maps onto a target column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 64-bit integer column.
    Integer(NumericDefault),
    /// Arbitrary-precision numeric column.
    Number(NumericDefault),
    /// Trimmed text column.
    Text,
    /// Date column; blank or garbage stores NULL.
    Date,
}

/// Mapping from one legacy field to one target column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Legacy field name as declared in the export file.
    pub field: &'static str,
    /// Target column name.
    pub column: &'static str,
    /// Target type and coercion fallback.
    pub kind: ColumnKind,
}

/// Natural-key representation in the legacy file.
///
/// The watermark comparison is always an integer comparison; the format
/// decides how the raw field becomes one. Per-entity configuration, not a
/// universal rule: some entities key on a plain sequence id, others on a
/// zero-padded numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Plain integer field.
    Integer,
    /// Fixed-width numeric string, zero- or space-padded, non-negative.
    ZeroPaddedNumeric,
}

impl KeyFormat {
    /// Parse a raw key field. `None` means the row cannot be unambiguously
    /// ordered against the watermark and must be dropped.
    pub fn parse(self, raw: &[u8]) -> Option<i64> {
        match self {
            KeyFormat::Integer => coerce::coerce_integer(raw, None),
            KeyFormat::ZeroPaddedNumeric => {
                let text = coerce::coerce_text(raw);
                let digits = text.trim_start_matches('0');
                if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                if digits.is_empty() {
                    return Some(0);
                }
                digits.parse::<i64>().ok()
            }
        }
    }
}

/// Child/detail file configuration for entities with line items.
#[derive(Debug, Clone, Copy)]
pub struct ChildSpec {
    /// Legacy detail file name.
    pub file: &'static str,
    /// Target detail table.
    pub table: &'static str,
    /// Legacy field holding the parent natural key.
    pub parent_key_field: &'static str,
    /// Target column holding the parent key.
    pub fk_column: &'static str,
    /// Legacy sequence field, when the file carries durable line ordering.
    /// Absent means file order is preserved and a fresh 1-based sequence is
    /// assigned on write.
    pub sequence_field: Option<&'static str>,
    /// Target sequence column.
    pub sequence_column: &'static str,
    /// Replace all of a parent's rows on resync instead of upserting lines.
    pub replace_rows: bool,
    /// Non-key columns.
    pub columns: &'static [ColumnSpec],
}

impl ChildSpec {
    /// Every field the detail file must declare.
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.parent_key_field)
            .chain(self.sequence_field)
            .chain(self.columns.iter().map(|c| c.field))
    }
}

/// Static configuration for one synchronized entity.
#[derive(Debug, Clone, Copy)]
pub struct SyncEntityDescriptor {
    /// Entity name, used in logs and result messages.
    pub name: &'static str,
    /// Legacy parent/header file name.
    pub parent_file: &'static str,
    /// Target parent table.
    pub parent_table: &'static str,
    /// Legacy field holding the natural key.
    pub key_field: &'static str,
    /// Target column holding the natural key (BIGINT, unique).
    pub key_column: &'static str,
    /// How the key field parses and orders.
    pub key_format: KeyFormat,
    /// Target column whose maximum is the sync watermark. For every current
    /// entity this is the key column itself.
    pub watermark_column: &'static str,
    /// Non-key parent columns.
    pub columns: &'static [ColumnSpec],
    /// Detail file, for entities with line items.
    pub child: Option<ChildSpec>,
}

impl SyncEntityDescriptor {
    /// Every field the parent file must declare.
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.key_field).chain(self.columns.iter().map(|c| c.field))
    }

    /// Parse a raw natural-key field, logging rows that cannot be ordered.
    pub fn parse_key(&self, raw: &[u8]) -> Option<i64> {
        let key = self.key_format.parse(raw);
        if key.is_none() {
            warn!(
                entity = self.name,
                raw = %String::from_utf8_lossy(raw).trim(),
                "dropping row: key cannot be ordered against watermark"
            );
        }
        key
    }
}

const FORMULA: SyncEntityDescriptor = SyncEntityDescriptor {
    name: "formula",
    parent_file: "FORMULA.DBF",
    parent_table: "formula",
    key_field: "FORMNO",
    key_column: "formula_no",
    key_format: KeyFormat::ZeroPaddedNumeric,
    watermark_column: "formula_no",
    columns: &[
        ColumnSpec {
            field: "PRODCODE",
            column: "product_code",
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            field: "DESCRIPT",
            column: "description",
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            field: "BATCHWT",
            column: "batch_weight",
            kind: ColumnKind::Number(NumericDefault::Null),
        },
        ColumnSpec {
            field: "DATEMADE",
            column: "created_on",
            kind: ColumnKind::Date,
        },
    ],
    child: Some(ChildSpec {
        file: "FORMITEM.DBF",
        table: "formula_item",
        parent_key_field: "FORMNO",
        fk_column: "formula_no",
        sequence_field: None,
        sequence_column: "line_no",
        replace_rows: true,
        columns: &[
            ColumnSpec {
                field: "RMCODE",
                column: "material_code",
                kind: ColumnKind::Text,
            },
            ColumnSpec {
                field: "QTY",
                column: "quantity",
                kind: ColumnKind::Number(NumericDefault::Zero),
            },
        ],
    }),
};

const PRODUCTION: SyncEntityDescriptor = SyncEntityDescriptor {
    name: "production",
    parent_file: "PRODUCTN.DBF",
    parent_table: "production",
    key_field: "BATCHNO",
    key_column: "batch_no",
    key_format: KeyFormat::Integer,
    watermark_column: "batch_no",
    columns: &[
        ColumnSpec {
            field: "PRODCODE",
            column: "product_code",
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            field: "FORMNO",
            column: "formula_no",
            kind: ColumnKind::Integer(NumericDefault::Null),
        },
        ColumnSpec {
            field: "QTYMADE",
            column: "quantity_made",
            kind: ColumnKind::Number(NumericDefault::Zero),
        },
        ColumnSpec {
            field: "DATEPROD",
            column: "produced_on",
            kind: ColumnKind::Date,
        },
    ],
    child: Some(ChildSpec {
        file: "PRODLOT.DBF",
        table: "production_lot",
        parent_key_field: "BATCHNO",
        fk_column: "batch_no",
        sequence_field: Some("LOTSEQ"),
        sequence_column: "lot_seq",
        replace_rows: false,
        columns: &[
            ColumnSpec {
                field: "LOTNO",
                column: "lot_no",
                kind: ColumnKind::Text,
            },
            ColumnSpec {
                field: "QTY",
                column: "quantity",
                kind: ColumnKind::Number(NumericDefault::Zero),
            },
        ],
    }),
};

const DELIVERY: SyncEntityDescriptor = SyncEntityDescriptor {
    name: "delivery",
    parent_file: "DELIVERY.DBF",
    parent_table: "delivery",
    key_field: "DRNO",
    key_column: "dr_no",
    key_format: KeyFormat::ZeroPaddedNumeric,
    watermark_column: "dr_no",
    columns: &[
        ColumnSpec {
            field: "CUSTOMER",
            column: "customer",
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            field: "DATEDEL",
            column: "delivered_on",
            kind: ColumnKind::Date,
        },
        ColumnSpec {
            field: "PONO",
            column: "po_no",
            kind: ColumnKind::Text,
        },
    ],
    child: Some(ChildSpec {
        file: "DELITEM.DBF",
        table: "delivery_item",
        parent_key_field: "DRNO",
        fk_column: "dr_no",
        sequence_field: None,
        sequence_column: "line_no",
        replace_rows: true,
        columns: &[
            ColumnSpec {
                field: "PRODCODE",
                column: "product_code",
                kind: ColumnKind::Text,
            },
            ColumnSpec {
                field: "BATCHNO",
                column: "batch_no",
                kind: ColumnKind::Integer(NumericDefault::Null),
            },
            ColumnSpec {
                field: "QTY",
                column: "quantity",
                kind: ColumnKind::Number(NumericDefault::Zero),
            },
        ],
    }),
};

const RRF: SyncEntityDescriptor = SyncEntityDescriptor {
    name: "rrf",
    parent_file: "RRF.DBF",
    parent_table: "rrf",
    key_field: "RRFNO",
    key_column: "rrf_no",
    key_format: KeyFormat::ZeroPaddedNumeric,
    watermark_column: "rrf_no",
    columns: &[
        ColumnSpec {
            field: "CUSTOMER",
            column: "customer",
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            field: "DATERET",
            column: "returned_on",
            kind: ColumnKind::Date,
        },
        ColumnSpec {
            field: "REASON",
            column: "reason",
            kind: ColumnKind::Text,
        },
    ],
    child: Some(ChildSpec {
        file: "RRFITEM.DBF",
        table: "rrf_item",
        parent_key_field: "RRFNO",
        fk_column: "rrf_no",
        sequence_field: None,
        sequence_column: "line_no",
        replace_rows: true,
        columns: &[
            ColumnSpec {
                field: "PRODCODE",
                column: "product_code",
                kind: ColumnKind::Text,
            },
            ColumnSpec {
                field: "QTY",
                column: "quantity",
                kind: ColumnKind::Number(NumericDefault::Zero),
            },
        ],
    }),
};

const RAW_MATERIAL_WAREHOUSE: SyncEntityDescriptor = SyncEntityDescriptor {
    name: "raw_material_warehouse",
    parent_file: "RMWHSE.DBF",
    parent_table: "raw_material_warehouse",
    key_field: "REFNO",
    key_column: "ref_no",
    key_format: KeyFormat::Integer,
    watermark_column: "ref_no",
    columns: &[
        ColumnSpec {
            field: "RMCODE",
            column: "material_code",
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            field: "DESCRIPT",
            column: "description",
            kind: ColumnKind::Text,
        },
        ColumnSpec {
            field: "QTYONHAND",
            column: "quantity_on_hand",
            kind: ColumnKind::Number(NumericDefault::Zero),
        },
        ColumnSpec {
            field: "DATERECV",
            column: "received_on",
            kind: ColumnKind::Date,
        },
    ],
    child: None,
};

static ENTITIES: [SyncEntityDescriptor; 5] =
    [FORMULA, PRODUCTION, DELIVERY, RRF, RAW_MATERIAL_WAREHOUSE];

/// All synchronized entities.
pub fn entities() -> &'static [SyncEntityDescriptor] {
    &ENTITIES
}

/// Look up an entity by name.
pub fn entity(name: &str) -> Option<&'static SyncEntityDescriptor> {
    entities().iter().find(|e| e.name == name)
}
