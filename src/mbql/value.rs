//! Value clauses: literals and relative/absolute time references.

use serde::Deserialize;

/// A scalar literal as it arrives on the wire, before it becomes either a
/// `?` parameter or an inlined SQL literal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// A date/time truncation or extraction unit.
///
/// `Default` leaves the underlying timestamp untouched (the `date` dialect
/// override is the identity function for this unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateUnit {
    Default,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

/// A value clause: a literal tagged with type info, or a datetime reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueClause {
    /// `value(literal, type-info)` — a user-supplied literal. Type info is
    /// carried by the original MBQL wire format for driver hinting; the
    /// compiler only needs the literal itself.
    Value(Scalar),
    /// `absolute-datetime(ts, unit)`.
    AbsoluteDatetime { ts: String, unit: DateUnit },
    /// `relative-datetime(amount, unit)`, `amount == 0` meaning "now".
    RelativeDatetime { amount: i64, unit: DateUnit },
    /// `relative-datetime(field, amount, unit)` — relative to a field rather
    /// than the current datetime.
    RelativeDatetimeOf {
        field: Box<super::field::FieldClause>,
        amount: i64,
        unit: DateUnit,
    },
    /// `time(v, unit)`.
    Time { v: String, unit: DateUnit },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_deserializes_from_untagged_json() {
        assert_eq!(
            serde_json::from_str::<Scalar>("42").unwrap(),
            Scalar::Int(42)
        );
        assert_eq!(
            serde_json::from_str::<Scalar>("1.5").unwrap(),
            Scalar::Float(1.5)
        );
        assert_eq!(
            serde_json::from_str::<Scalar>("\"done\"").unwrap(),
            Scalar::String("done".into())
        );
        assert_eq!(
            serde_json::from_str::<Scalar>("true").unwrap(),
            Scalar::Bool(true)
        );
        assert_eq!(serde_json::from_str::<Scalar>("null").unwrap(), Scalar::Null);
    }

    #[test]
    fn date_unit_deserializes_kebab_case() {
        assert_eq!(
            serde_json::from_str::<DateUnit>("\"day\"").unwrap(),
            DateUnit::Day
        );
        assert_eq!(
            serde_json::from_str::<DateUnit>("\"default\"").unwrap(),
            DateUnit::Default
        );
        assert!(serde_json::from_str::<DateUnit>("\"not-a-unit\"").is_err());
    }
}
