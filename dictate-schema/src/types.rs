//! Core value types shared by declared and discovered schemas.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::SchemaError;

/// A supported database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterId {
    /// PostgreSQL.
    #[serde(alias = "postgresql")]
    Postgres,
    /// CockroachDB (PostgreSQL wire protocol, different type system).
    #[serde(alias = "cockroach")]
    CockroachDb,
    /// SQLite.
    #[serde(alias = "sqlite3")]
    Sqlite,
    /// MySQL.
    Mysql,
}

impl AdapterId {
    /// All supported adapters.
    pub const ALL: [AdapterId; 4] = [
        AdapterId::Postgres,
        AdapterId::CockroachDb,
        AdapterId::Sqlite,
        AdapterId::Mysql,
    ];

    /// Get the adapter name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::CockroachDb => "cockroachdb",
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
        }
    }

    /// Whether DDL statements can run inside a transaction on this backend.
    pub fn supports_transactional_ddl(&self) -> bool {
        matches!(self, Self::Postgres | Self::Sqlite)
    }

    /// Whether the backend speaks the PostgreSQL dialect.
    pub fn is_postgres_family(&self) -> bool {
        matches!(self, Self::Postgres | Self::CockroachDb)
    }
}

impl FromStr for AdapterId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "cockroachdb" | "cockroach" => Ok(Self::CockroachDb),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            _ => Err(SchemaError::UnknownAdapter(s.to_string())),
        }
    }
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic column type, independent of any backend.
///
/// Names that are not recognized are kept verbatim in [`ColumnType::Other`]
/// and passed through to the database unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    /// Variable-length string (`string`, `varchar`).
    String,
    /// Unbounded text.
    Text,
    /// Integer (`integer`, `int`).
    Integer,
    /// 64-bit integer.
    BigInt,
    /// 16-bit integer.
    SmallInt,
    /// Exact numeric (`decimal`, `numeric`).
    Decimal,
    /// Floating point (`float`, `double`).
    Float,
    /// Binary data (`bytes`, `bytea`, `blob`).
    Bytes,
    /// Boolean (`bool`, `boolean`).
    Bool,
    /// Calendar date.
    Date,
    /// Date and time (`timestamp`, `datetime`).
    Timestamp,
    /// JSON document.
    Json,
    /// Auto-incrementing primary key.
    PrimaryKey,
    /// Auto-incrementing 64-bit integer.
    BigSerial,
    /// Any other type name.
    Other(SmolStr),
}

impl ColumnType {
    /// Parse a type name, accepting the common aliases.
    pub fn parse(name: &str) -> Self {
        match name {
            "string" | "varchar" => Self::String,
            "text" => Self::Text,
            "integer" | "int" => Self::Integer,
            "bigint" => Self::BigInt,
            "smallint" => Self::SmallInt,
            "decimal" | "numeric" => Self::Decimal,
            "float" | "double" => Self::Float,
            "bytes" | "bytea" | "blob" => Self::Bytes,
            "bool" | "boolean" => Self::Bool,
            "date" => Self::Date,
            "timestamp" | "datetime" => Self::Timestamp,
            "json" => Self::Json,
            "primary_key" => Self::PrimaryKey,
            "bigserial" => Self::BigSerial,
            other => Self::Other(SmolStr::new(other)),
        }
    }

    /// Get the canonical type name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::SmallInt => "smallint",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Bytes => "bytes",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Json => "json",
            Self::PrimaryKey => "primary_key",
            Self::BigSerial => "bigserial",
            Self::Other(name) => name.as_str(),
        }
    }

    /// Whether the backend generates values for this type.
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::PrimaryKey | Self::BigSerial)
    }
}

impl From<&str> for ColumnType {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for ColumnType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared size of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSize {
    /// Length or precision.
    Scalar(u32),
    /// Precision and scale.
    Pair(u32, u32),
}

impl ColumnSize {
    /// The leading component (length or precision).
    pub fn precision(&self) -> u32 {
        match self {
            Self::Scalar(n) | Self::Pair(n, _) => *n,
        }
    }

    /// The scale, if one was given.
    pub fn scale(&self) -> Option<u32> {
        match self {
            Self::Scalar(_) => None,
            Self::Pair(_, s) => Some(*s),
        }
    }
}

impl From<u32> for ColumnSize {
    fn from(n: u32) -> Self {
        Self::Scalar(n)
    }
}

impl From<(u32, u32)> for ColumnSize {
    fn from((p, s): (u32, u32)) -> Self {
        Self::Pair(p, s)
    }
}

impl fmt::Display for ColumnSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(n) => write!(f, "{}", n),
            Self::Pair(p, s) => write!(f, "{},{}", p, s),
        }
    }
}

/// A literal default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    /// SQL `NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating point literal.
    Float(f64),
    /// String literal.
    String(String),
}

impl LiteralValue {
    /// Render the value as an SQL literal.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for LiteralValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for LiteralValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for LiteralValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// A default stored with the column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    /// A literal value.
    Literal(LiteralValue),
    /// A native SQL expression such as `now()`.
    Expression(String),
}

impl ColumnDefault {
    /// Render the default as SQL.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Literal(value) => value.to_sql(),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// Application-side default, evaluated right before a new row is first saved.
#[derive(Clone)]
pub struct DefaultGenerator(Arc<dyn Fn() -> LiteralValue + Send + Sync>);

impl DefaultGenerator {
    /// Wrap a generator function.
    pub fn new(f: impl Fn() -> LiteralValue + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Produce a value.
    pub fn generate(&self) -> LiteralValue {
        (self.0)()
    }
}

impl fmt::Debug for DefaultGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultGenerator(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_from_str() {
        assert_eq!("postgresql".parse::<AdapterId>().unwrap(), AdapterId::Postgres);
        assert_eq!("cockroach".parse::<AdapterId>().unwrap(), AdapterId::CockroachDb);
        assert_eq!("SQLite3".parse::<AdapterId>().unwrap(), AdapterId::Sqlite);
        assert!(matches!(
            "oracle".parse::<AdapterId>(),
            Err(SchemaError::UnknownAdapter(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_adapter_transactional_ddl() {
        assert!(AdapterId::Postgres.supports_transactional_ddl());
        assert!(AdapterId::Sqlite.supports_transactional_ddl());
        assert!(!AdapterId::CockroachDb.supports_transactional_ddl());
        assert!(!AdapterId::Mysql.supports_transactional_ddl());
    }

    #[test]
    fn test_adapter_serde_aliases() {
        let adapter: AdapterId = serde_json::from_str("\"cockroach\"").unwrap();
        assert_eq!(adapter, AdapterId::CockroachDb);
        assert_eq!(serde_json::to_string(&AdapterId::Postgres).unwrap(), "\"postgres\"");
    }

    #[test]
    fn test_column_type_aliases() {
        assert_eq!(ColumnType::parse("varchar"), ColumnType::String);
        assert_eq!(ColumnType::parse("int"), ColumnType::Integer);
        assert_eq!(ColumnType::parse("blob"), ColumnType::Bytes);
        assert_eq!(ColumnType::parse("datetime"), ColumnType::Timestamp);
        assert_eq!(ColumnType::parse("uuid"), ColumnType::Other("uuid".into()));
        assert_eq!(ColumnType::parse("uuid").as_str(), "uuid");
    }

    #[test]
    fn test_column_type_serde() {
        let ty: ColumnType = serde_json::from_str("\"boolean\"").unwrap();
        assert_eq!(ty, ColumnType::Bool);
        assert_eq!(serde_json::to_string(&ColumnType::PrimaryKey).unwrap(), "\"primary_key\"");
    }

    #[test]
    fn test_literal_to_sql() {
        assert_eq!(LiteralValue::from("it's").to_sql(), "'it''s'");
        assert_eq!(LiteralValue::from(true).to_sql(), "true");
        assert_eq!(LiteralValue::from(42).to_sql(), "42");
        assert_eq!(LiteralValue::from(1.5).to_sql(), "1.5");
        assert_eq!(LiteralValue::Null.to_sql(), "NULL");
    }

    #[test]
    fn test_column_size_display() {
        assert_eq!(ColumnSize::Scalar(64).to_string(), "64");
        assert_eq!(ColumnSize::Pair(10, 3).to_string(), "10,3");
        assert_eq!(ColumnSize::Pair(10, 3).scale(), Some(3));
    }

    #[test]
    fn test_default_generator() {
        let generator = DefaultGenerator::new(|| LiteralValue::from("generated"));
        assert_eq!(generator.generate(), LiteralValue::String("generated".into()));
    }
}
