//! Index definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// An index over an ordered list of columns.
///
/// The column list is the index identity when diffing; the name and the
/// unique flag are attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Indexed columns, in order.
    pub columns: Vec<SmolStr>,
    /// Index name. Generated by the backend when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<SmolStr>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    /// Create a non-unique, unnamed index.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            name: None,
            unique: false,
        }
    }

    /// Set the index name.
    pub fn with_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Whether the index covers exactly the given single column.
    pub fn is_on_column(&self, column: &str) -> bool {
        self.columns.len() == 1 && self.columns[0] == column
    }

    /// Name used in DDL: the declared name, or `<table>_<col>_<col>_index`.
    pub fn name_for(&self, table: &str) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => {
                let mut name = table.to_string();
                for column in &self.columns {
                    name.push('_');
                    name.push_str(column);
                }
                name.push_str(if self.unique { "_unique" } else { "_index" });
                name
            }
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.columns.join(", "))?;
        if self.unique {
            f.write_str(" unique")?;
        }
        if let Some(name) = &self.name {
            write!(f, " name: {}", name)?;
        }
        Ok(())
    }
}

/// Options for declaring an index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub(crate) name: Option<SmolStr>,
    pub(crate) unique: bool,
}

impl IndexOptions {
    /// Default options: non-unique, backend-generated name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the index name.
    pub fn name(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Column reference(s) given to an index declaration.
///
/// A single column normalizes to a one-element list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumns(pub(crate) Vec<String>);

impl IndexColumns {
    /// Validate the column references.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.0.is_empty() {
            return Err("no columns given".to_string());
        }
        if let Some(pos) = self.0.iter().position(|c| c.trim().is_empty()) {
            return Err(format!("blank column name at position {}", pos));
        }
        Ok(())
    }
}

impl From<&str> for IndexColumns {
    fn from(column: &str) -> Self {
        Self(vec![column.to_string()])
    }
}

impl From<String> for IndexColumns {
    fn from(column: String) -> Self {
        Self(vec![column])
    }
}

impl From<SmolStr> for IndexColumns {
    fn from(column: SmolStr) -> Self {
        Self(vec![column.to_string()])
    }
}

impl From<Vec<&str>> for IndexColumns {
    fn from(columns: Vec<&str>) -> Self {
        Self(columns.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for IndexColumns {
    fn from(columns: Vec<String>) -> Self {
        Self(columns)
    }
}

impl From<&[&str]> for IndexColumns {
    fn from(columns: &[&str]) -> Self {
        Self(columns.iter().map(|c| c.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for IndexColumns {
    fn from(columns: [&str; N]) -> Self {
        Self(columns.iter().map(|c| c.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_columns_normalize() {
        assert_eq!(IndexColumns::from("email").0, vec!["email".to_string()]);
        assert_eq!(
            IndexColumns::from(["customer_id", "account_id"]).0,
            vec!["customer_id".to_string(), "account_id".to_string()]
        );
    }

    #[test]
    fn test_index_columns_validate() {
        assert!(IndexColumns::from(Vec::<String>::new()).validate().is_err());
        assert!(IndexColumns::from(["a", " "]).validate().is_err());
        assert!(IndexColumns::from("a").validate().is_ok());
    }

    #[test]
    fn test_generated_name() {
        let index = Index::new(["customer_id", "account_id"]).unique();
        assert_eq!(index.name_for("orders"), "orders_customer_id_account_id_unique");
        assert_eq!(Index::new(["email"]).name_for("users"), "users_email_index");
        assert_eq!(
            Index::new(["email"]).with_name("by_email").name_for("users"),
            "by_email"
        );
    }

    #[test]
    fn test_display() {
        let index = Index::new(["a", "b"]).unique();
        assert_eq!(index.to_string(), "[a, b] unique");
    }
}
