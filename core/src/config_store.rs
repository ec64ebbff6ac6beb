//! Connection and file-parse configuration records

use serde::{Deserialize, Serialize};

use crate::domain::{ConnectionConfig, Delimiter, FileParseConfig};

/// A single-field edit of the connection record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEdit {
    Host(String),
    Port(u16),
    Database(String),
    User(String),
    Token(String),
}

/// A single-field edit of the file-parse record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEdit {
    Delimiter(Delimiter),
    HasHeader(bool),
}

impl ConnectionConfig {
    /// New record with exactly one field replaced
    pub fn edited(&self, edit: ConnectionEdit) -> Self {
        let mut next = self.clone();
        match edit {
            ConnectionEdit::Host(host) => next.host = host,
            ConnectionEdit::Port(port) => next.port = port,
            ConnectionEdit::Database(database) => next.database = database,
            ConnectionEdit::User(user) => next.user = user,
            ConnectionEdit::Token(token) => next.jwt_token = token,
        }
        next
    }

    /// Host, database, user and token are all present
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_empty() {
            missing.push("host");
        }
        if self.database.is_empty() {
            missing.push("database");
        }
        if self.user.is_empty() {
            missing.push("user");
        }
        if self.jwt_token.is_empty() {
            missing.push("jwt_token");
        }
        missing
    }
}

impl FileParseConfig {
    pub fn edited(&self, edit: FileEdit) -> Self {
        let mut next = *self;
        match edit {
            FileEdit::Delimiter(delimiter) => next.delimiter = delimiter,
            FileEdit::HasHeader(has_header) => next.has_header = has_header,
        }
        next
    }
}

/// Both configuration records of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigStore {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub file: FileParseConfig,
}

impl ConfigStore {
    pub fn with_connection_edit(&self, edit: ConnectionEdit) -> Self {
        Self {
            connection: self.connection.edited(edit),
            file: self.file,
        }
    }

    pub fn with_file_edit(&self, edit: FileEdit) -> Self {
        Self {
            connection: self.connection.clone(),
            file: self.file.edited(edit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_replaces_one_field() {
        let store = ConfigStore::default();
        let edited = store.with_connection_edit(ConnectionEdit::Host("db.local".to_string()));

        assert_eq!(edited.connection.host, "db.local");
        assert_eq!(edited.connection.port, 8443);
        assert!(store.connection.host.is_empty());
        assert_eq!(edited.file, store.file);
    }

    #[test]
    fn test_complete_requires_all_four_fields() {
        let mut config = ConnectionConfig::default();
        assert_eq!(
            config.missing_fields(),
            vec!["host", "database", "user", "jwt_token"]
        );

        config = config
            .edited(ConnectionEdit::Host("h".to_string()))
            .edited(ConnectionEdit::Database("d".to_string()))
            .edited(ConnectionEdit::User("u".to_string()));
        assert!(!config.is_complete());

        config = config.edited(ConnectionEdit::Token("t".to_string()));
        assert!(config.is_complete());
    }

    #[test]
    fn test_port_is_not_part_of_presence_check() {
        let config = ConnectionConfig {
            host: "h".to_string(),
            port: 0,
            database: "d".to_string(),
            user: "u".to_string(),
            jwt_token: "t".to_string(),
        };
        assert!(config.is_complete());
    }

    #[test]
    fn test_file_edit() {
        let store = ConfigStore::default()
            .with_file_edit(FileEdit::Delimiter(Delimiter::Semicolon))
            .with_file_edit(FileEdit::HasHeader(false));

        assert_eq!(store.file.delimiter, Delimiter::Semicolon);
        assert!(!store.file.has_header);
    }
}
