//! Column definitions and field declaration options.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::catalog::TypeCatalog;
use crate::types::{
    AdapterId, ColumnDefault, ColumnSize, ColumnType, DefaultGenerator, LiteralValue,
};

/// A table column, either declared or discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table.
    pub name: SmolStr,
    /// Semantic type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Declared size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ColumnSize>,
    /// Adapter-rendered native type.
    pub native_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub not_null: bool,
    /// Declared default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,
    /// Default expression as the database stores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_default: Option<String>,
}

impl Column {
    /// Create a nullable column with no default.
    pub fn new(
        name: impl Into<SmolStr>,
        column_type: impl Into<ColumnType>,
        native_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            size: None,
            native_type: native_type.into(),
            primary_key: false,
            auto_increment: false,
            not_null: false,
            default: None,
            native_default: None,
        }
    }

    /// Set the size.
    pub fn with_size(mut self, size: ColumnSize) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the primary-key flag.
    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Set the auto-increment flag.
    pub fn with_auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    /// Set the not-null flag.
    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Set the native default expression.
    pub fn with_native_default(mut self, native_default: impl Into<String>) -> Self {
        self.native_default = Some(native_default.into());
        self
    }

    /// Set the declared default. The native default follows it.
    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.native_default = Some(default.to_sql());
        self.default = Some(default);
        self
    }

    /// Equivalence used when diffing.
    ///
    /// Compares native type, primary-key flag, not-null flag and native
    /// default. Auto-increment and the semantic type are not compared because
    /// live introspection cannot always recover them. An empty native default
    /// equals an absent one.
    pub fn is_equivalent(&self, other: &Column) -> bool {
        self.native_type == other.native_type
            && self.primary_key == other.primary_key
            && self.not_null == other.not_null
            && self.native_default_str() == other.native_default_str()
    }

    fn native_default_str(&self) -> &str {
        self.native_default.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(type: {}", self.name, self.native_type)?;
        if let Some(size) = &self.size {
            write!(f, ", size: {}", size)?;
        }
        if self.primary_key {
            f.write_str(", primary_key: true")?;
        }
        if self.auto_increment {
            f.write_str(", auto_increment: true")?;
        }
        if self.not_null {
            f.write_str(", not_null: true")?;
        }
        if let Some(default) = &self.native_default {
            write!(f, ", default: {}", default)?;
        }
        f.write_str(")")
    }
}

/// Default given to a field declaration.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    /// Literal stored in the column definition.
    Literal(LiteralValue),
    /// Native SQL expression stored in the column definition.
    Expression(String),
    /// Generator run by the application before the first save of a row.
    Generated(DefaultGenerator),
}

/// Options for declaring a field.
///
/// The type defaults to `string`.
///
/// ```rust
/// use dictate_schema::FieldOptions;
///
/// let name = FieldOptions::string().size(64).not_null();
/// let price = FieldOptions::decimal().precision(10).scale(2).default(0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    column_type: Option<ColumnType>,
    size: Option<ColumnSize>,
    precision: Option<u32>,
    scale: Option<u32>,
    primary_key: bool,
    auto_increment: bool,
    not_null: Option<bool>,
    default: Option<FieldDefault>,
}

macro_rules! type_constructors {
    ($($(#[$meta:meta])* $name:ident => $variant:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name() -> Self {
                Self::of_type(ColumnType::$variant)
            }
        )*
    };
}

impl FieldOptions {
    /// Options for a string field.
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Options for a field of the given semantic type.
    pub fn of_type(column_type: impl Into<ColumnType>) -> Self {
        Self {
            column_type: Some(column_type.into()),
            ..<Self as Default>::default()
        }
    }

    type_constructors! {
        /// `string` field.
        string => String,
        /// `text` field.
        text => Text,
        /// `integer` field.
        integer => Integer,
        /// `bigint` field.
        bigint => BigInt,
        /// `smallint` field.
        smallint => SmallInt,
        /// `decimal` field.
        decimal => Decimal,
        /// `float` field.
        float => Float,
        /// `bytes` field.
        bytes => Bytes,
        /// `bool` field.
        boolean => Bool,
        /// `date` field.
        date => Date,
        /// `timestamp` field.
        timestamp => Timestamp,
        /// `json` field.
        json => Json,
        /// Auto-incrementing primary key field.
        primary_key => PrimaryKey,
        /// `bigserial` field.
        bigserial => BigSerial,
    }

    /// Set the size (length or precision).
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(ColumnSize::Scalar(size));
        self
    }

    /// Alias of [`size`](Self::size).
    pub fn limit(self, limit: u32) -> Self {
        self.size(limit)
    }

    /// Set the precision.
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set the scale. Only used together with a precision.
    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Mark the field as the primary key.
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the field as auto-incrementing.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Reject `NULL`.
    pub fn not_null(mut self) -> Self {
        self.not_null = Some(true);
        self
    }

    /// Allow `NULL`, even when the type would imply otherwise.
    pub fn nullable(mut self) -> Self {
        self.not_null = Some(false);
        self
    }

    /// Literal default.
    pub fn default(mut self, value: impl Into<LiteralValue>) -> Self {
        self.default = Some(FieldDefault::Literal(value.into()));
        self
    }

    /// Native SQL default expression.
    pub fn default_sql(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(FieldDefault::Expression(expression.into()));
        self
    }

    /// Application-side default generator.
    pub fn default_with(mut self, f: impl Fn() -> LiteralValue + Send + Sync + 'static) -> Self {
        self.default = Some(FieldDefault::Generated(DefaultGenerator::new(f)));
        self
    }

    /// Whether these options declare a primary key.
    pub fn declares_primary_key(&self) -> bool {
        self.primary_key || self.column_type.as_ref().is_some_and(|ty| *ty == ColumnType::PrimaryKey)
    }

    fn resolved_size(&self) -> Option<ColumnSize> {
        self.size.or_else(|| {
            self.precision.map(|p| match self.scale {
                Some(s) => ColumnSize::Pair(p, s),
                None => ColumnSize::Scalar(p),
            })
        })
    }

    /// Resolve the options into a column for `table`.
    ///
    /// Returns the column and, if one was declared, the application-side
    /// default generator.
    pub fn into_column(
        self,
        table: &str,
        name: &str,
        adapter: AdapterId,
        catalog: &TypeCatalog,
    ) -> (Column, Option<DefaultGenerator>) {
        let column_type = self.column_type.clone().unwrap_or(ColumnType::String);
        let size = self.resolved_size();
        let native = catalog.resolve_column(adapter, &column_type, size, table, name);

        let primary_key = self.primary_key || native.overrides.primary_key;
        let auto_increment = self.auto_increment || native.overrides.auto_increment;
        let not_null = self
            .not_null
            .unwrap_or(primary_key || native.overrides.not_null);

        let mut column = Column {
            name: SmolStr::new(name),
            column_type,
            size,
            native_type: native.native_type,
            primary_key,
            auto_increment,
            not_null,
            default: None,
            native_default: native.native_default,
        };

        let generator = match self.default {
            Some(FieldDefault::Literal(value)) => {
                column = column.with_default(ColumnDefault::Literal(value));
                None
            }
            Some(FieldDefault::Expression(expr)) => {
                column = column.with_default(ColumnDefault::Expression(expr));
                None
            }
            Some(FieldDefault::Generated(generator)) => Some(generator),
            None => None,
        };

        (column, generator)
    }
}
