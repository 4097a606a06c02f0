//! Databricks (Spark SQL) dialect.
//!
//! Databricks features:
//! - Backtick identifier quoting
//! - Delta Lake table format
//! - Unity Catalog for governance
//! - MERGE INTO support
//! - QUALIFY clause (Databricks SQL)
//! - Native PIVOT/UNPIVOT

use super::helpers;
use super::{QuoteStyle, SqlDialect};

/// Databricks (Spark SQL) dialect.
#[derive(Debug, Clone, Copy)]
pub struct Databricks;

impl SqlDialect for Databricks {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::MySql
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn supports_native_pivot(&self) -> bool {
        true
    }

    fn supports_qualify(&self) -> bool {
        true
    }

    fn supports_groups_frame(&self) -> bool {
        true
    }

    fn supports_named_windows(&self) -> bool {
        true
    }

    // Databricks limitations
    fn supports_distinct_on(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_databricks(name)
    }
}
