//! Configuration type definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Legacy export source configuration.
    pub legacy: LegacyConfig,

    /// Target database (PostgreSQL) configuration.
    pub target: TargetConfig,
}

/// Legacy export source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// Directory holding the legacy export files (FORMULA.DBF etc.).
    pub data_dir: PathBuf,
}

/// Target database (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Target schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// Connection pool size (default: 4). Each concurrently syncing entity
    /// holds one connection for the duration of its write transaction.
    #[serde(default = "default_pool_size")]
    pub max_connections: usize,
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_pool_size() -> usize {
    4
}
