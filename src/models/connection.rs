//! Connection-related data models.
//!
//! This module defines the database flavor and the connection configuration
//! every tool invocation connects with.

use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for the database every tool call connects to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    /// Database name extracted from the URL, or the file path for SQLite.
    pub database: Option<String>,
}

impl ConnectionConfig {
    /// Validate a connection URL and build a configuration from it.
    pub fn parse(connection_string: impl Into<String>) -> Result<Self, ConnectionConfigError> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(ConnectionConfigError::Empty);
        }

        let db_type = DatabaseType::from_connection_string(&connection_string)
            .ok_or_else(|| ConnectionConfigError::UnknownDatabaseType(mask(&connection_string)))?;

        let database = match db_type {
            DatabaseType::SQLite => {
                let path = connection_string
                    .split_once(':')
                    .map(|(_, rest)| rest.trim_start_matches("//"))
                    .unwrap_or_default();
                let path = path.split('?').next().unwrap_or_default();
                if path.is_empty() {
                    return Err(ConnectionConfigError::MissingSqlitePath);
                }
                Some(path.to_string())
            }
            DatabaseType::PostgreSQL | DatabaseType::MySQL => {
                let parsed = url::Url::parse(&connection_string)
                    .map_err(|e| ConnectionConfigError::InvalidUrl(e.to_string()))?;
                if parsed.host_str().is_none_or(str::is_empty) {
                    return Err(ConnectionConfigError::InvalidUrl(
                        "missing host".to_string(),
                    ));
                }
                let name = parsed.path().trim_start_matches('/');
                (!name.is_empty()).then(|| name.to_string())
            }
        };

        Ok(Self {
            db_type,
            connection_string,
            database,
        })
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        mask(&self.connection_string)
    }
}

fn mask(connection_string: &str) -> String {
    if let Some(at_pos) = connection_string.find('@') {
        if let Some(colon_pos) = connection_string[..at_pos].rfind(':') {
            let prefix = &connection_string[..colon_pos + 1];
            let suffix = &connection_string[at_pos..];
            if !prefix.ends_with("://") {
                return format!("{}****{}", prefix, suffix);
            }
        }
    }
    connection_string.to_string()
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Database URL cannot be empty")]
    Empty,

    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("SQLite URL must name a database file (e.g. sqlite:data.db)")]
    MissingSqlitePath,
}
