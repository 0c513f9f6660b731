//! Options controlling a migration run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;

/// Kinds of destructive operation that can be allowed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestructiveKind {
    /// Dropping whole tables.
    Tables,
    /// Dropping columns.
    Columns,
    /// Dropping indexes.
    Indexes,
}

/// Per-kind destructive permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestructiveFlags {
    pub tables: bool,
    pub columns: bool,
    pub indexes: bool,
}

/// Destructive permissions: all-or-nothing, or per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destructive {
    /// Allow or deny every kind.
    All(bool),
    /// Allow selected kinds.
    Only(DestructiveFlags),
}

impl Default for Destructive {
    fn default() -> Self {
        Self::All(false)
    }
}

impl Destructive {
    /// Whether the given kind is allowed.
    pub fn allows(&self, kind: DestructiveKind) -> bool {
        match self {
            Self::All(all) => *all,
            Self::Only(flags) => match kind {
                DestructiveKind::Tables => flags.tables,
                DestructiveKind::Columns => flags.columns,
                DestructiveKind::Indexes => flags.indexes,
            },
        }
    }

    fn flags(&self) -> DestructiveFlags {
        match self {
            Self::All(all) => DestructiveFlags {
                tables: *all,
                columns: *all,
                indexes: *all,
            },
            Self::Only(flags) => *flags,
        }
    }
}

/// Options for a migration run.
///
/// Loads from TOML, either at the top level or under a `[migrate]` table:
///
/// ```toml
/// [migrate]
/// dry_run = false
/// destructive = { tables = false, columns = true }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateOptions {
    /// Which destructive operations may execute.
    pub destructive: Destructive,
    /// Plan and log every operation without executing any.
    pub dry_run: bool,
}

impl MigrateOptions {
    /// Create the default options: nothing destructive, not a dry run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or deny every destructive operation.
    pub fn destructive(mut self, allow: bool) -> Self {
        self.destructive = Destructive::All(allow);
        self
    }

    /// Allow or deny dropping tables.
    pub fn allow_drop_tables(mut self, allow: bool) -> Self {
        let mut flags = self.destructive.flags();
        flags.tables = allow;
        self.destructive = Destructive::Only(flags);
        self
    }

    /// Allow or deny dropping columns.
    pub fn allow_drop_columns(mut self, allow: bool) -> Self {
        let mut flags = self.destructive.flags();
        flags.columns = allow;
        self.destructive = Destructive::Only(flags);
        self
    }

    /// Allow or deny dropping indexes.
    pub fn allow_drop_indexes(mut self, allow: bool) -> Self {
        let mut flags = self.destructive.flags();
        flags.indexes = allow;
        self.destructive = Destructive::Only(flags);
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether the given destructive kind is allowed.
    pub fn allows(&self, kind: DestructiveKind) -> bool {
        self.destructive.allows(kind)
    }

    /// Parse options from TOML.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        let mut document: toml::Table = toml::from_str(content)?;
        let section = match document.remove("migrate") {
            Some(section) => section,
            None => toml::Value::Table(document),
        };
        Ok(section.try_into()?)
    }

    /// Load options from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use std::io::Write;

    #[test]
    fn test_default_options() {
        let options = MigrateOptions::default();
        assert!(!options.dry_run);
        assert!(!options.allows(DestructiveKind::Tables));
        assert!(!options.allows(DestructiveKind::Columns));
        assert!(!options.allows(DestructiveKind::Indexes));
    }

    #[test]
    fn test_builder() {
        let options = MigrateOptions::new().allow_drop_columns(true).dry_run(true);
        assert!(options.dry_run);
        assert!(options.allows(DestructiveKind::Columns));
        assert!(!options.allows(DestructiveKind::Tables));

        let options = MigrateOptions::new().destructive(true).allow_drop_tables(false);
        assert!(!options.allows(DestructiveKind::Tables));
        assert!(options.allows(DestructiveKind::Columns));
    }

    #[test]
    fn test_from_toml_bool() {
        let options = MigrateOptions::from_toml_str("destructive = true\ndry_run = true").unwrap();
        assert_eq!(options.destructive, Destructive::All(true));
        assert!(options.dry_run);
    }

    #[test]
    fn test_from_toml_section() {
        let content = r#"
            [database]
            url = "postgres://localhost/app"

            [migrate]
            destructive = { columns = true }
        "#;
        let options = MigrateOptions::from_toml_str(content).unwrap();
        assert!(options.allows(DestructiveKind::Columns));
        assert!(!options.allows(DestructiveKind::Tables));
        assert!(!options.dry_run);
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = MigrateOptions::from_toml_str("dry_run = \"yes\"").unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[migrate]\ndestructive = {{ tables = true }}").unwrap();

        let options = MigrateOptions::from_file(file.path()).unwrap();
        assert!(options.allows(DestructiveKind::Tables));
    }

    #[test]
    fn test_from_missing_file() {
        let err = MigrateOptions::from_file("/nonexistent/dictate.toml").unwrap_err();
        assert!(matches!(err, MigrationError::Io(_)));
    }
}
