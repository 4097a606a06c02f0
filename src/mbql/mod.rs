//! The MBQL data model: field/value/aggregation/filter clauses and the
//! nested query envelope they compose into.

pub mod aggregation;
pub mod field;
pub mod filter;
pub mod query;
pub mod value;

pub use aggregation::{Aggregand, AggregationClause, ArithOp};
pub use field::{BinningParams, BinningStrategy, FieldClause};
pub use filter::FilterClause;
pub use query::{ExpressionTree, InnerQuery, JoinTableSpec, JoinTarget, OuterQuery, Page, Source, SortDirection};
pub use value::{DateUnit, Scalar, ValueClause};
