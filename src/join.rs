//! Join-info resolution: turning an `fk-> `/`join-tables` pair of fields
//! into the alias and destination table a `JOIN` clause needs.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::metadata::{FieldId, TableId};

/// The resolved shape of one join: the table being joined, and the alias it
/// should be referenced by in the rest of the query.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinInfo {
    pub dest_table: TableId,
    pub alias: String,
}

/// Resolves join info for an `fk-> ` field pair. Implementations typically
/// consult the same metadata catalog as the [`crate::metadata::MetadataStore`],
/// but the two traits are kept separate since a host application may source
/// join topology (e.g. discovered FK constraints) independently of column
/// metadata.
pub trait JoinInfoResolver {
    fn resolve(&self, source_fk: FieldId, dest_field: FieldId) -> Result<JoinInfo, CompileError>;
}

/// A static map-backed resolver, suitable for tests and for hosts that
/// precompute join topology up front.
#[derive(Debug, Default)]
pub struct StaticJoinInfoResolver {
    entries: HashMap<(FieldId, FieldId), JoinInfo>,
}

impl StaticJoinInfoResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_join(mut self, source_fk: FieldId, dest_field: FieldId, info: JoinInfo) -> Self {
        self.entries.insert((source_fk, dest_field), info);
        self
    }
}

impl JoinInfoResolver for StaticJoinInfoResolver {
    fn resolve(&self, source_fk: FieldId, dest_field: FieldId) -> Result<JoinInfo, CompileError> {
        self.entries
            .get(&(source_fk, dest_field))
            .cloned()
            .ok_or(CompileError::MissingJoinInfo {
                fk: source_fk,
                dest: dest_field,
            })
    }
}
