//! Per-adapter type catalog.
//!
//! The catalog maps a semantic [`ColumnType`] to the native type string a
//! backend uses for it. Entries are keyed by `(adapter, semantic type)`; an
//! entry registered without an adapter acts as the fallback for every backend.
//! Types with no entry at all pass through under their semantic name.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::{SchemaError, SchemaResult};
use crate::types::{AdapterId, ColumnSize, ColumnType};

/// Flags a native type forces onto the column that uses it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeOverrides {
    /// The column is the table's primary key.
    pub primary_key: bool,
    /// The backend generates values for the column.
    pub auto_increment: bool,
    /// The column rejects `NULL`.
    pub not_null: bool,
}

impl TypeOverrides {
    /// Overrides for an auto-incrementing primary key.
    pub const PRIMARY_KEY: Self = Self {
        primary_key: true,
        auto_increment: true,
        not_null: true,
    };

    /// Overrides for an auto-incrementing non-key column.
    pub const SERIAL: Self = Self {
        primary_key: false,
        auto_increment: true,
        not_null: true,
    };
}

/// Result of resolving a semantic type for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeType {
    /// Native type string, e.g. `character varying(64)`.
    pub native_type: String,
    /// Native default expression the backend uses for this type.
    pub native_default: Option<String>,
    /// Flags forced by the type.
    pub overrides: TypeOverrides,
}

impl NativeType {
    /// A plain native type with no default and no overrides.
    pub fn new(native_type: impl Into<String>) -> Self {
        Self {
            native_type: native_type.into(),
            native_default: None,
            overrides: TypeOverrides::default(),
        }
    }

    /// Set the native default.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.native_default = Some(default.into());
        self
    }

    /// Set the overrides.
    pub fn with_overrides(mut self, overrides: TypeOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Table and column a type is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity<'a> {
    pub table: &'a str,
    pub column: &'a str,
}

impl Identity<'_> {
    /// Name of the implicit sequence backing a serial column on PostgreSQL.
    pub fn sequence_name(&self) -> String {
        format!("{}_{}_seq", self.table, self.column)
    }
}

/// Input to a renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeRequest<'a> {
    /// Declared size, if any.
    pub size: Option<ColumnSize>,
    /// Owning column, when resolving for a declaration.
    pub identity: Option<Identity<'a>>,
}

type Renderer = Arc<dyn Fn(&TypeRequest<'_>) -> NativeType + Send + Sync>;

/// A catalog entry.
#[derive(Clone)]
pub enum CatalogEntry {
    /// Fixed native type.
    Static(NativeType),
    /// Native type computed from the request.
    Render(Renderer),
}

impl CatalogEntry {
    /// Build a rendering entry.
    pub fn render(f: impl Fn(&TypeRequest<'_>) -> NativeType + Send + Sync + 'static) -> Self {
        Self::Render(Arc::new(f))
    }

    fn resolve(&self, request: &TypeRequest<'_>) -> NativeType {
        match self {
            Self::Static(native) => native.clone(),
            Self::Render(render) => render(request),
        }
    }
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(native) => f.debug_tuple("Static").field(native).finish(),
            Self::Render(_) => f.write_str("Render(..)"),
        }
    }
}

static STANDARD: LazyLock<Arc<TypeCatalog>> = LazyLock::new(|| Arc::new(TypeCatalog::build_standard()));

/// Lookup table from `(adapter, semantic type)` to native type.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    entries: HashMap<(Option<AdapterId>, ColumnType), CatalogEntry>,
}

impl TypeCatalog {
    /// Create an empty catalog. Every type passes through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The shared catalog with the built-in adapter tables.
    pub fn standard() -> Arc<TypeCatalog> {
        Arc::clone(&STANDARD)
    }

    /// Register an entry for one adapter, or the fallback entry when `adapter` is `None`.
    pub fn register(
        &mut self,
        adapter: Option<AdapterId>,
        column_type: ColumnType,
        entry: CatalogEntry,
    ) -> &mut Self {
        self.entries.insert((adapter, column_type), entry);
        self
    }

    /// Register a fixed native type.
    pub fn register_static(
        &mut self,
        adapter: Option<AdapterId>,
        column_type: ColumnType,
        native: NativeType,
    ) -> &mut Self {
        self.register(adapter, column_type, CatalogEntry::Static(native))
    }

    fn lookup(&self, adapter: AdapterId, column_type: &ColumnType) -> Option<&CatalogEntry> {
        self.entries
            .get(&(Some(adapter), column_type.clone()))
            .or_else(|| self.entries.get(&(None, column_type.clone())))
    }

    /// Resolve a type without column context.
    ///
    /// Never fails: unknown types resolve to their semantic name.
    pub fn resolve(
        &self,
        adapter: AdapterId,
        column_type: &ColumnType,
        size: Option<ColumnSize>,
    ) -> NativeType {
        self.resolve_request(adapter, column_type, &TypeRequest { size, identity: None })
    }

    /// Resolve a type for a specific column.
    ///
    /// Identity defaults that depend on the table and column name, such as
    /// PostgreSQL sequence defaults, are only produced here.
    pub fn resolve_column(
        &self,
        adapter: AdapterId,
        column_type: &ColumnType,
        size: Option<ColumnSize>,
        table: &str,
        column: &str,
    ) -> NativeType {
        let request = TypeRequest {
            size,
            identity: Some(Identity { table, column }),
        };
        self.resolve_request(adapter, column_type, &request)
    }

    /// Resolve a type, failing when no entry exists.
    pub fn resolve_strict(
        &self,
        adapter: AdapterId,
        column_type: &ColumnType,
        size: Option<ColumnSize>,
    ) -> SchemaResult<NativeType> {
        self.lookup(adapter, column_type)
            .map(|entry| entry.resolve(&TypeRequest { size, identity: None }))
            .ok_or_else(|| SchemaError::UnresolvedAdapterType {
                adapter: adapter.to_string(),
                column_type: column_type.to_string(),
            })
    }

    fn resolve_request(
        &self,
        adapter: AdapterId,
        column_type: &ColumnType,
        request: &TypeRequest<'_>,
    ) -> NativeType {
        match self.lookup(adapter, column_type) {
            Some(entry) => entry.resolve(request),
            None => NativeType::new(column_type.as_str()),
        }
    }

    /// Whether an entry (adapter-specific or fallback) exists.
    pub fn contains(&self, adapter: AdapterId, column_type: &ColumnType) -> bool {
        self.lookup(adapter, column_type).is_some()
    }

    fn build_standard() -> Self {
        use AdapterId::*;
        use ColumnType as T;

        let mut catalog = Self::empty();

        // Fallback entries
        catalog
            .register(None, T::String, sized("varchar", Some(255)))
            .register_static(None, T::Text, NativeType::new("text"))
            .register_static(None, T::Integer, NativeType::new("integer"))
            .register_static(None, T::BigInt, NativeType::new("bigint"))
            .register_static(None, T::SmallInt, NativeType::new("smallint"))
            .register(None, T::Decimal, decimal("decimal", ","))
            .register_static(None, T::Float, NativeType::new("double precision"))
            .register_static(None, T::Bytes, NativeType::new("blob"))
            .register_static(None, T::Bool, NativeType::new("boolean"))
            .register_static(None, T::Date, NativeType::new("date"))
            .register_static(None, T::Timestamp, NativeType::new("timestamp"))
            .register_static(None, T::Json, NativeType::new("json"))
            .register_static(
                None,
                T::PrimaryKey,
                NativeType::new("integer").with_overrides(TypeOverrides::PRIMARY_KEY),
            )
            .register_static(
                None,
                T::BigSerial,
                NativeType::new("bigint").with_overrides(TypeOverrides::SERIAL),
            );

        // PostgreSQL and CockroachDB share most of their spelling
        for adapter in [Postgres, CockroachDb] {
            catalog
                .register(Some(adapter), T::String, sized("character varying", Some(255)))
                .register(Some(adapter), T::Decimal, decimal_scaled("numeric"))
                .register_static(Some(adapter), T::Bytes, NativeType::new("bytea"))
                .register_static(
                    Some(adapter),
                    T::Timestamp,
                    NativeType::new("timestamp without time zone"),
                )
                .register_static(Some(adapter), T::Json, NativeType::new("jsonb"));
        }
        catalog
            .register(Some(Postgres), T::PrimaryKey, sequence("integer", TypeOverrides::PRIMARY_KEY))
            .register(Some(Postgres), T::BigSerial, sequence("bigint", TypeOverrides::SERIAL));

        let unique_rowid = |overrides| {
            NativeType::new("bigint")
                .with_default("unique_rowid()")
                .with_overrides(overrides)
        };
        catalog
            .register_static(Some(CockroachDb), T::String, NativeType::new("text"))
            .register_static(Some(CockroachDb), T::Integer, NativeType::new("bigint"))
            .register_static(Some(CockroachDb), T::SmallInt, NativeType::new("bigint"))
            .register_static(Some(CockroachDb), T::Decimal, NativeType::new("numeric"))
            .register_static(
                Some(CockroachDb),
                T::PrimaryKey,
                unique_rowid(TypeOverrides::PRIMARY_KEY),
            )
            .register_static(Some(CockroachDb), T::BigSerial, unique_rowid(TypeOverrides::SERIAL));

        catalog
            .register(Some(Sqlite), T::Integer, sized("integer", None))
            .register(Some(Sqlite), T::Decimal, decimal("decimal", ", "))
            .register_static(Some(Sqlite), T::Json, NativeType::new("text"))
            .register_static(
                Some(Sqlite),
                T::BigSerial,
                NativeType::new("integer").with_overrides(TypeOverrides::SERIAL),
            );

        catalog
            .register_static(Some(Mysql), T::Integer, NativeType::new("int"))
            .register_static(Some(Mysql), T::Float, NativeType::new("double"))
            .register_static(Some(Mysql), T::Bool, NativeType::new("tinyint(1)"))
            .register_static(Some(Mysql), T::Timestamp, NativeType::new("datetime"))
            .register_static(
                Some(Mysql),
                T::PrimaryKey,
                NativeType::new("int").with_overrides(TypeOverrides::PRIMARY_KEY),
            );

        catalog
    }
}

/// `keyword(n)`, falling back to `default_len` and then to the bare keyword.
fn sized(keyword: &'static str, default_len: Option<u32>) -> CatalogEntry {
    CatalogEntry::render(move |request| {
        match request.size.map(|size| size.precision()).or(default_len) {
            Some(n) => NativeType::new(format!("{}({})", keyword, n)),
            None => NativeType::new(keyword),
        }
    })
}

/// `keyword(p)` or `keyword(p<sep>s)`.
fn decimal(keyword: &'static str, separator: &'static str) -> CatalogEntry {
    CatalogEntry::render(move |request| match request.size {
        None => NativeType::new(keyword),
        Some(ColumnSize::Scalar(p)) => NativeType::new(format!("{}({})", keyword, p)),
        Some(ColumnSize::Pair(p, s)) => NativeType::new(format!("{}({}{}{})", keyword, p, separator, s)),
    })
}

/// `keyword(p,s)` with the scale defaulting to zero.
fn decimal_scaled(keyword: &'static str) -> CatalogEntry {
    CatalogEntry::render(move |request| match request.size {
        None => NativeType::new(keyword),
        Some(size) => NativeType::new(format!(
            "{}({},{})",
            keyword,
            size.precision(),
            size.scale().unwrap_or(0)
        )),
    })
}

/// Sequence-backed serial type.
fn sequence(keyword: &'static str, overrides: TypeOverrides) -> CatalogEntry {
    CatalogEntry::render(move |request| {
        let native = NativeType::new(keyword).with_overrides(overrides);
        match request.identity {
            Some(identity) => native.with_default(format!(
                "nextval('{}'::regclass)",
                identity.sequence_name()
            )),
            None => native,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn native(adapter: AdapterId, ty: ColumnType, size: Option<ColumnSize>) -> String {
        TypeCatalog::standard().resolve(adapter, &ty, size).native_type
    }

    #[test]
    fn test_postgres_string() {
        assert_eq!(
            native(AdapterId::Postgres, ColumnType::String, Some(ColumnSize::Scalar(64))),
            "character varying(64)"
        );
        assert_eq!(
            native(AdapterId::Postgres, ColumnType::String, None),
            "character varying(255)"
        );
    }

    #[test]
    fn test_postgres_numeric() {
        assert_eq!(
            native(AdapterId::Postgres, ColumnType::Decimal, Some(ColumnSize::Pair(10, 3))),
            "numeric(10,3)"
        );
        assert_eq!(
            native(AdapterId::Postgres, ColumnType::Decimal, Some(ColumnSize::Scalar(10))),
            "numeric(10,0)"
        );
        assert_eq!(native(AdapterId::Postgres, ColumnType::Decimal, None), "numeric");
    }

    #[test]
    fn test_postgres_primary_key_identity() {
        let resolved = TypeCatalog::standard().resolve_column(
            AdapterId::Postgres,
            &ColumnType::PrimaryKey,
            None,
            "users",
            "id",
        );
        assert_eq!(resolved.native_type, "integer");
        assert_eq!(
            resolved.native_default.as_deref(),
            Some("nextval('users_id_seq'::regclass)")
        );
        assert_eq!(resolved.overrides, TypeOverrides::PRIMARY_KEY);

        let bare = TypeCatalog::standard().resolve(AdapterId::Postgres, &ColumnType::PrimaryKey, None);
        assert_eq!(bare.native_default, None);
    }

    #[test]
    fn test_cockroach_overrides() {
        assert_eq!(native(AdapterId::CockroachDb, ColumnType::String, Some(ColumnSize::Scalar(64))), "text");
        assert_eq!(native(AdapterId::CockroachDb, ColumnType::Integer, None), "bigint");
        assert_eq!(native(AdapterId::CockroachDb, ColumnType::SmallInt, None), "bigint");
        assert_eq!(
            native(AdapterId::CockroachDb, ColumnType::Decimal, Some(ColumnSize::Pair(10, 2))),
            "numeric"
        );

        let pk = TypeCatalog::standard().resolve(AdapterId::CockroachDb, &ColumnType::PrimaryKey, None);
        assert_eq!(pk.native_type, "bigint");
        assert_eq!(pk.native_default.as_deref(), Some("unique_rowid()"));
    }

    #[test]
    fn test_sqlite_types() {
        assert_eq!(native(AdapterId::Sqlite, ColumnType::String, None), "varchar(255)");
        assert_eq!(native(AdapterId::Sqlite, ColumnType::Integer, None), "integer");
        assert_eq!(native(AdapterId::Sqlite, ColumnType::Integer, Some(ColumnSize::Scalar(8))), "integer(8)");
        assert_eq!(
            native(AdapterId::Sqlite, ColumnType::Decimal, Some(ColumnSize::Pair(10, 2))),
            "decimal(10, 2)"
        );
        assert_eq!(native(AdapterId::Sqlite, ColumnType::Json, None), "text");
        assert_eq!(native(AdapterId::Sqlite, ColumnType::Bytes, None), "blob");
    }

    #[test]
    fn test_mysql_types() {
        assert_eq!(native(AdapterId::Mysql, ColumnType::Bool, None), "tinyint(1)");
        assert_eq!(native(AdapterId::Mysql, ColumnType::Timestamp, None), "datetime");
        assert_eq!(
            native(AdapterId::Mysql, ColumnType::Decimal, Some(ColumnSize::Pair(8, 2))),
            "decimal(8,2)"
        );
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let ty = ColumnType::parse("uuid");
        assert_eq!(native(AdapterId::Postgres, ty.clone(), None), "uuid");

        let err = TypeCatalog::standard()
            .resolve_strict(AdapterId::Postgres, &ty, None)
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedAdapterType { .. }));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let catalog = TypeCatalog::standard();
        for adapter in AdapterId::ALL {
            let first = catalog.resolve(adapter, &ColumnType::Decimal, Some(ColumnSize::Pair(12, 4)));
            let second = catalog.resolve(adapter, &ColumnType::Decimal, Some(ColumnSize::Pair(12, 4)));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_custom_entry() {
        let mut catalog = TypeCatalog::empty();
        catalog.register_static(
            Some(AdapterId::Postgres),
            ColumnType::parse("uuid"),
            NativeType::new("uuid").with_default("gen_random_uuid()"),
        );
        let resolved = catalog
            .resolve_strict(AdapterId::Postgres, &ColumnType::parse("uuid"), None)
            .unwrap();
        assert_eq!(resolved.native_default.as_deref(), Some("gen_random_uuid()"));
        assert!(!catalog.contains(AdapterId::Sqlite, &ColumnType::parse("uuid")));
    }
}
