//! MySQL column type conversion.
//!
//! Maps the `COLUMN_TYPE` strings reported by `INFORMATION_SCHEMA.COLUMNS`
//! (e.g. `int(11) unsigned`, `varchar(255)`, `enum('a','b')`) to the
//! destination type the column is stored as.

use sync_core::{ColumnDescriptor, DestinationColumn, DestinationSchema, DestinationType};

/// Convert a MySQL column type string to its destination type.
///
/// The mapping is total: unrecognized or unparseable types fall back to
/// [`DestinationType::String`]. Display widths, precision and the
/// `unsigned`/`zerofill` attributes do not affect the result.
///
/// # Example
///
/// ```
/// use mysql_types::translate;
/// use sync_core::DestinationType;
///
/// assert_eq!(translate("tinyint(1)"), DestinationType::Int64);
/// assert_eq!(translate("DATETIME(6)"), DestinationType::Timestamp);
/// assert_eq!(translate("set('x','y')"), DestinationType::String);
/// ```
pub fn translate(source_type: &str) -> DestinationType {
    match base_type(source_type).as_str() {
        // Integer families (including YEAR)
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "year" => {
            DestinationType::Int64
        }

        // Floating point
        "float" | "double" | "real" => DestinationType::Float64,

        // Fixed point
        "decimal" | "numeric" | "dec" | "fixed" => DestinationType::Numeric,

        // Character data
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" => {
            DestinationType::String
        }

        // Date/Time types
        "date" => DestinationType::Date,
        "datetime" | "timestamp" => DestinationType::Timestamp,
        "time" => DestinationType::Time,

        // Binary data
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "bit" => {
            DestinationType::Bytes
        }

        "bool" | "boolean" => DestinationType::Bool,

        // ENUM and SET keep their member labels
        "enum" | "set" => DestinationType::String,

        "json" => DestinationType::Json,

        _ => DestinationType::String,
    }
}

/// Translate a full source column list into a destination schema.
///
/// Column order is preserved; every column is nullable on the destination.
pub fn translate_columns(columns: &[ColumnDescriptor]) -> DestinationSchema {
    DestinationSchema::from_columns(
        columns
            .iter()
            .map(|c| DestinationColumn::new(c.name.clone(), translate(&c.source_type))),
    )
}

/// Whether a MySQL column type belongs to a numeric family.
///
/// Row coercion treats placeholder strings in these columns as null.
pub fn is_numeric_source(source_type: &str) -> bool {
    translate(source_type).is_numeric()
}

/// Extract the lower-cased base type name of a MySQL column type string.
///
/// E.g., "INT(11) UNSIGNED" -> "int", "double precision" -> "double"
pub fn base_type(source_type: &str) -> String {
    let lowered = source_type.trim().to_lowercase();
    let head = lowered.split('(').next().unwrap_or_default();
    head.split_whitespace()
        .find(|word| !matches!(*word, "unsigned" | "signed" | "zerofill"))
        .unwrap_or_default()
        .to_string()
}
