//! Filter clauses.

use super::field::FieldClause;
use super::value::ValueClause;

/// A predicate applied to a query's `filter` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    Eq(FieldClause, ValueClause),
    Ne(FieldClause, ValueClause),
    Lt(FieldClause, ValueClause),
    Lte(FieldClause, ValueClause),
    Gt(FieldClause, ValueClause),
    Gte(FieldClause, ValueClause),
    Between {
        field: FieldClause,
        lo: ValueClause,
        hi: ValueClause,
    },
    /// `starts-with(field, value, case-sensitive)`.
    StartsWith {
        field: FieldClause,
        value: ValueClause,
        case_sensitive: bool,
    },
    Contains {
        field: FieldClause,
        value: ValueClause,
        case_sensitive: bool,
    },
    EndsWith {
        field: FieldClause,
        value: ValueClause,
        case_sensitive: bool,
    },
    And(Vec<FilterClause>),
    Or(Vec<FilterClause>),
    Not(Box<FilterClause>),
}
