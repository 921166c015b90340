//! Configuration validation.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// Validate a parsed configuration before any connection is attempted.
pub fn validate(config: &SyncConfig) -> Result<()> {
    if config.legacy.data_dir.as_os_str().is_empty() {
        return Err(SyncError::Config(
            "legacy.data_dir must not be empty".into(),
        ));
    }
    if config.target.host.trim().is_empty() {
        return Err(SyncError::Config("target.host must not be empty".into()));
    }
    if config.target.database.trim().is_empty() {
        return Err(SyncError::Config(
            "target.database must not be empty".into(),
        ));
    }
    if config.target.user.trim().is_empty() {
        return Err(SyncError::Config("target.user must not be empty".into()));
    }
    if config.target.schema.trim().is_empty() {
        return Err(SyncError::Config("target.schema must not be empty".into()));
    }
    if config.target.max_connections == 0 {
        return Err(SyncError::Config(
            "target.max_connections must be at least 1".into(),
        ));
    }
    Ok(())
}
