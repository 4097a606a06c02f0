//! Field clauses: the tagged variants used to reference a column.

use crate::metadata::FieldId;
use serde::Deserialize;

/// A binning strategy's resolved parameters. `max_value` is carried for
/// completeness but unused at emission time, per the binning rewrite's fixed
/// shape (see `Compiler::compile_binning`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinningParams {
    pub bin_width: f64,
    pub min_value: f64,
    pub max_value: f64,
}

/// A binning strategy kind and its resolved numeric resolution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinningStrategy {
    pub kind: String,
    pub resolution: f64,
    pub params: BinningParams,
}

/// A reference to a column or computed value within a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldClause {
    /// `field-id(id)` — reference to a stored Field.
    FieldId(FieldId),
    /// `field-literal(name, type)` — unresolved column by name, used for
    /// source-query results that have no backing Field record.
    FieldLiteral { name: String, base_type: String },
    /// `fk->(source-fk, dest-field)` — foreign-key navigation.
    Fk {
        source_fk: Box<FieldClause>,
        dest_field: Box<FieldClause>,
    },
    /// `datetime-field(inner, unit)`.
    DatetimeField {
        inner: Box<FieldClause>,
        unit: super::value::DateUnit,
    },
    /// `binning-strategy(inner, kind, resolution, params)`.
    BinningStrategy {
        inner: Box<FieldClause>,
        strategy: BinningStrategy,
    },
    /// `expression(name)` — reference to an entry in `expressions`.
    Expression(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binning_params_deserialize_from_json() {
        let json = r#"{"bin_width": 10.0, "min_value": 0.0, "max_value": 100.0}"#;
        let params: BinningParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.bin_width, 10.0);
        assert_eq!(params.min_value, 0.0);
        assert_eq!(params.max_value, 100.0);
    }

    #[test]
    fn binning_strategy_deserializes_from_json() {
        let json = r#"{
            "kind": "num-bins",
            "resolution": 10.0,
            "params": {"bin_width": 10.0, "min_value": 0.0, "max_value": 100.0}
        }"#;
        let strategy: BinningStrategy = serde_json::from_str(json).unwrap();
        assert_eq!(strategy.kind, "num-bins");
        assert_eq!(strategy.params.bin_width, 10.0);
    }
}
