//! Native type and default reconstruction for discovered columns.

use std::sync::LazyLock;

use dictate_schema::ColumnSize;
use regex_lite::Regex;

/// A literal followed by one or more `::type` (or CockroachDB `:::TYPE`) casts.
static LITERAL_CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^('(?:[^']|'')*'|-?[0-9]+(?:\.[0-9]+)?|true|false|NULL)((?::{2,3}[A-Za-z_][A-Za-z0-9_ ]*(?:\([0-9, ]*\))?(?:\[\])?)+)$",
    )
    .expect("literal cast pattern")
});

const NUMERIC_CASTS: &[&str] = &[
    "integer",
    "bigint",
    "smallint",
    "numeric",
    "decimal",
    "real",
    "double precision",
    "int",
    "int2",
    "int4",
    "int8",
    "float4",
    "float8",
];

fn is_sized_numeric(data_type: &str) -> bool {
    matches!(data_type, "numeric" | "decimal")
}

/// Rebuild the native type as the type catalog renders it.
///
/// `character varying` with a length becomes `character varying(64)`,
/// `numeric` with a precision becomes `numeric(10,3)`; everything else is
/// the `information_schema` data type verbatim.
pub fn native_type(
    data_type: &str,
    char_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    match column_size(data_type, char_length, precision, scale) {
        Some(ColumnSize::Scalar(n)) => format!("{}({})", data_type, n),
        Some(ColumnSize::Pair(p, s)) => format!("{}({},{})", data_type, p, s),
        None => data_type.to_string(),
    }
}

/// Size of a discovered column, if its type carries one.
pub fn column_size(
    data_type: &str,
    char_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> Option<ColumnSize> {
    if is_sized_numeric(data_type) {
        let p = u32::try_from(precision?).ok()?;
        let s = scale.and_then(|s| u32::try_from(s).ok()).unwrap_or(0);
        return Some(ColumnSize::Pair(p, s));
    }
    char_length
        .and_then(|n| u32::try_from(n).ok())
        .map(ColumnSize::Scalar)
}

/// Strip the casts the server adds to literal defaults.
///
/// `'new'::character varying` becomes `'new'`, `'-1'::integer` becomes `-1`,
/// `0:::INT8` becomes `0`. Expressions such as `nextval('users_id_seq'::regclass)`
/// are returned unchanged.
pub fn normalize_default(raw: &str) -> String {
    let raw = raw.trim();
    let Some(caps) = LITERAL_CAST.captures(raw) else {
        return raw.to_string();
    };
    let literal = &caps[1];
    let cast = caps[2]
        .trim_start_matches(':')
        .split([':', '(', '['])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if NUMERIC_CASTS.contains(&cast.as_str()) {
        if let Some(inner) = literal.strip_prefix('\'').and_then(|l| l.strip_suffix('\'')) {
            if inner.parse::<f64>().is_ok() {
                return inner.to_string();
            }
        }
    }
    literal.to_string()
}

/// Whether a default is generated by the database's identity mechanism.
pub fn is_identity_default(default: &str) -> bool {
    default.starts_with("nextval(") || default == "unique_rowid()"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_native_type_reconstruction() {
        assert_eq!(
            native_type("character varying", Some(64), None, None),
            "character varying(64)"
        );
        assert_eq!(native_type("numeric", None, Some(10), Some(3)), "numeric(10,3)");
        assert_eq!(native_type("numeric", None, Some(10), Some(0)), "numeric(10,0)");
        assert_eq!(native_type("numeric", None, None, None), "numeric");
        assert_eq!(native_type("integer", None, Some(32), Some(0)), "integer");
        assert_eq!(native_type("text", None, None, None), "text");
    }

    #[test]
    fn test_column_size() {
        assert_eq!(
            column_size("character varying", Some(255), None, None),
            Some(ColumnSize::Scalar(255))
        );
        assert_eq!(
            column_size("numeric", None, Some(12), None),
            Some(ColumnSize::Pair(12, 0))
        );
        assert_eq!(column_size("bigint", None, Some(64), Some(0)), None);
    }

    #[test]
    fn test_normalize_default_strips_casts() {
        assert_eq!(normalize_default("'new'::character varying"), "'new'");
        assert_eq!(normalize_default("'it''s'::text"), "'it''s'");
        assert_eq!(normalize_default("'-1'::integer"), "-1");
        assert_eq!(normalize_default("'1.5'::numeric(10,3)"), "1.5");
        assert_eq!(normalize_default("0:::INT8"), "0");
        assert_eq!(normalize_default("'new':::STRING"), "'new'");
        assert_eq!(normalize_default("NULL::character varying"), "NULL");
        assert_eq!(normalize_default("'{}'::jsonb"), "'{}'");
        assert_eq!(normalize_default("true"), "true");
    }

    #[test]
    fn test_normalize_default_keeps_expressions() {
        assert_eq!(
            normalize_default("nextval('users_id_seq'::regclass)"),
            "nextval('users_id_seq'::regclass)"
        );
        assert_eq!(normalize_default("now()"), "now()");
        assert_eq!(normalize_default("unique_rowid()"), "unique_rowid()");
    }

    #[test]
    fn test_identity_defaults() {
        assert!(is_identity_default("nextval('users_id_seq'::regclass)"));
        assert!(is_identity_default("unique_rowid()"));
        assert!(!is_identity_default("0"));
    }
}
