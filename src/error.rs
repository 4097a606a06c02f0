//! Compiler error type.

use crate::metadata::FieldId;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("unknown table id {0:?}")]
    UnknownTable(crate::metadata::TableId),

    #[error("unknown field id {0:?}")]
    UnknownField(FieldId),

    #[error("expression '{0}' is not defined in this query's expressions map")]
    UnknownExpression(String),

    #[error("aggregation index {index} has no corresponding aggregation at nesting level {level} (only {available} aggregations defined)")]
    UnknownAggregationIndex {
        index: usize,
        level: usize,
        available: usize,
    },

    #[error("no join info available for fk field {fk:?} -> dest field {dest:?}")]
    MissingJoinInfo { fk: FieldId, dest: FieldId },

    #[error("inner query is invalid: {0}")]
    InvalidInnerQuery(String),

    #[error("failed to format compiled SQL AST: {cause}\n{ast}")]
    SqlFormatError { ast: String, cause: String },
}
