//! Compiler configuration.
//!
//! Connection, cache, and worker-process settings live elsewhere; this
//! carries the one axis the compiler itself varies on: which SQL dialect to
//! target.

use crate::sql::dialect::Dialect;

/// Options controlling how `mbql_to_native` renders its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub dialect: Dialect,
}

impl CompileOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Set the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
        }
    }
}

impl From<Dialect> for CompileOptions {
    fn from(dialect: Dialect) -> Self {
        Self::new(dialect)
    }
}
