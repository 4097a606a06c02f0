//! Table and field metadata lookup.
//!
//! The compiler never invents a column or table name: every identifier it
//! emits is resolved through a [`MetadataStore`]. Nested source queries
//! temporarily shadow the store with synthetic records for their own result
//! columns; [`MetadataStore::push_override`] and the returned
//! [`OverrideGuard`] make that shadowing exception-safe.

use std::collections::HashMap;

use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub i64);

/// A field's "special type", used by dialect overrides that need to know a
/// column carries more meaning than its base SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialType {
    UnixTimestampSeconds,
    UnixTimestampMilliseconds,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRecord {
    pub id: TableId,
    pub name: String,
    pub schema: Option<String>,
    /// Set on synthetic records pushed by a scoped override: an `fk->` join
    /// alias or a nested source query's `"source"` alias.
    /// Suppresses schema qualification when resolving identifiers against it.
    pub is_alias: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub id: FieldId,
    pub name: String,
    pub table_id: TableId,
    pub base_type: String,
    pub special_type: SpecialType,
}

/// Resolves the table/field records the compiler needs to turn `field-id`
/// and `source-table` references into real identifiers.
pub trait MetadataStore {
    fn table(&self, id: TableId) -> Result<&TableRecord, CompileError>;
    fn field(&self, id: FieldId) -> Result<&FieldRecord, CompileError>;
}

/// An in-memory metadata store backed by two maps, and a stack of shadow
/// overlays pushed by nested source queries.
///
/// Each overlay is consulted before falling through to the base maps, so a
/// nested query's synthetic field records shadow (rather than replace) the
/// outer query's metadata. Overlays are popped in LIFO order by
/// [`OverrideGuard::drop`], which runs on every exit path — including a `?`
/// early return from inside the pushed scope.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    tables: HashMap<TableId, TableRecord>,
    fields: HashMap<FieldId, FieldRecord>,
    overlays: Vec<(HashMap<TableId, TableRecord>, HashMap<FieldId, FieldRecord>)>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, record: TableRecord) -> Self {
        self.tables.insert(record.id, record);
        self
    }

    pub fn with_field(mut self, record: FieldRecord) -> Self {
        self.fields.insert(record.id, record);
        self
    }

    /// Push a scoped overlay of synthetic records. The overlay is visible to
    /// every lookup until the returned guard is dropped, at which point it
    /// is popped regardless of how the scope was exited.
    pub fn push_override(
        &mut self,
        tables: HashMap<TableId, TableRecord>,
        fields: HashMap<FieldId, FieldRecord>,
    ) -> OverrideGuard<'_> {
        self.overlays.push((tables, fields));
        OverrideGuard { store: self }
    }

    fn pop_override(&mut self) {
        self.overlays.pop();
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn table(&self, id: TableId) -> Result<&TableRecord, CompileError> {
        for (tables, _) in self.overlays.iter().rev() {
            if let Some(record) = tables.get(&id) {
                return Ok(record);
            }
        }
        self.tables
            .get(&id)
            .ok_or(CompileError::UnknownTable(id))
    }

    fn field(&self, id: FieldId) -> Result<&FieldRecord, CompileError> {
        for (_, fields) in self.overlays.iter().rev() {
            if let Some(record) = fields.get(&id) {
                return Ok(record);
            }
        }
        self.fields
            .get(&id)
            .ok_or(CompileError::UnknownField(id))
    }
}

/// Pops the overlay pushed by [`InMemoryMetadataStore::push_override`] when
/// dropped. Holds the store by exclusive reference, so the override cannot
/// outlive the borrow that created it and cannot be forgotten.
pub struct OverrideGuard<'a> {
    store: &'a mut InMemoryMetadataStore,
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.store.pop_override();
    }
}

impl<'a> OverrideGuard<'a> {
    /// Reborrow the store while the overlay is active, for recursing into
    /// code that needs `&mut InMemoryMetadataStore` without taking ownership
    /// of the guard itself.
    pub fn store_mut(&mut self) -> &mut InMemoryMetadataStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryMetadataStore {
        InMemoryMetadataStore::new()
            .with_table(TableRecord {
                id: TableId(1),
                name: "orders".into(),
                schema: None,
                is_alias: false,
            })
            .with_field(FieldRecord {
                id: FieldId(10),
                name: "total".into(),
                table_id: TableId(1),
                base_type: "float".into(),
                special_type: SpecialType::None,
            })
    }

    #[test]
    fn resolves_base_records() {
        let s = store();
        assert_eq!(s.table(TableId(1)).unwrap().name, "orders");
        assert_eq!(s.field(FieldId(10)).unwrap().name, "total");
    }

    #[test]
    fn unknown_ids_error() {
        let s = store();
        assert!(s.table(TableId(99)).is_err());
        assert!(s.field(FieldId(99)).is_err());
    }

    #[test]
    fn override_shadows_and_restores_on_drop() {
        let mut s = store();
        let mut overlay_fields = HashMap::new();
        overlay_fields.insert(
            FieldId(10),
            FieldRecord {
                id: FieldId(10),
                name: "shadowed_total".into(),
                table_id: TableId(1),
                base_type: "float".into(),
                special_type: SpecialType::None,
            },
        );
        {
            let guard = s.push_override(HashMap::new(), overlay_fields);
            assert_eq!(guard.store.field(FieldId(10)).unwrap().name, "shadowed_total");
        }
        assert_eq!(s.field(FieldId(10)).unwrap().name, "total");
    }

    #[test]
    fn override_restores_even_on_early_return() {
        fn inner(s: &mut InMemoryMetadataStore) -> Result<(), CompileError> {
            let mut overlay = HashMap::new();
            overlay.insert(
                FieldId(10),
                FieldRecord {
                    id: FieldId(10),
                    name: "shadowed".into(),
                    table_id: TableId(1),
                    base_type: "float".into(),
                    special_type: SpecialType::None,
                },
            );
            let _guard = s.push_override(HashMap::new(), overlay);
            Err(CompileError::UnknownField(FieldId(404)))
        }

        let mut s = store();
        let _ = inner(&mut s);
        assert_eq!(s.field(FieldId(10)).unwrap().name, "total");
    }
}
