//! Filter evaluation for in-memory document matching.
//!
//! This module evaluates conjunctive equality filters against stored field maps.

use bson::{Bson, DateTime, Timestamp};

use docgate_core::{
    document::Fields,
    error::BackendError,
    query::{FieldFilter, FilterVisitor},
};

/// Comparable representation of scalar BSON values.
///
/// Integers of either width compare exactly. An integer equals a double only when the
/// double is integral and converts to the same integer, so `10`, `10_i64` and `10.0`
/// compare equal while large `i64` values never collapse through `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    DateTime(DateTime),
    Timestamp(Timestamp),
    String(&'a str),
    /// Anything outside the scalar field model; never equal to anything.
    Opaque,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::Timestamp(value) => Comparable::Timestamp(*value),
            Bson::String(value) => Comparable::String(value),
            _ => Comparable::Opaque,
        }
    }
}

/// Exact integer value of `double`, if it has one in `i64` range.
fn integral(double: f64) -> Option<i64> {
    // -2^63 and 2^63 are exact in f64.
    const MIN: f64 = -9_223_372_036_854_775_808.0;
    const MAX: f64 = 9_223_372_036_854_775_808.0;

    (double.is_finite() && double.fract() == 0.0 && (MIN..MAX).contains(&double))
        .then_some(double as i64)
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(left), Comparable::Bool(right)) => left == right,
            (Comparable::Int(left), Comparable::Int(right)) => left == right,
            (Comparable::Double(left), Comparable::Double(right)) => left == right,
            (Comparable::Int(int), Comparable::Double(double))
            | (Comparable::Double(double), Comparable::Int(int)) => integral(*double) == Some(*int),
            (Comparable::DateTime(left), Comparable::DateTime(right)) => left == right,
            (Comparable::Timestamp(left), Comparable::Timestamp(right)) => left == right,
            (Comparable::String(left), Comparable::String(right)) => left == right,
            _ => false,
        }
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    fields: &'a Fields,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(fields: &'a Fields) -> Self {
        Self { fields }
    }

    /// Returns `true` when every filter holds. An empty filter list matches.
    pub fn matches(fields: &'a Fields, filters: &[FieldFilter]) -> bool {
        DocumentEvaluator::new(fields)
            .visit_and(filters)
            .unwrap_or(false)
    }
}

impl FilterVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = BackendError;

    fn visit_and(&mut self, filters: &[FieldFilter]) -> Result<Self::Output, Self::Error> {
        for filter in filters {
            if !self.visit_filter(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        match self.fields.get(field) {
            Some(field_value) => match (Comparable::from(field_value), Comparable::from(value)) {
                (Comparable::Opaque, _) | (_, Comparable::Opaque) => Ok(false),
                (left, right) => Ok(left == right),
            },
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn all_filters_must_hold() {
        let fields = doc! { "status": "inactive", "owner": "u1", "price": 10_i64 };

        assert!(DocumentEvaluator::matches(&fields, &[]));
        assert!(DocumentEvaluator::matches(
            &fields,
            &[FieldFilter::eq("status", "inactive"), FieldFilter::eq("owner", "u1")]
        ));
        assert!(!DocumentEvaluator::matches(
            &fields,
            &[FieldFilter::eq("status", "inactive"), FieldFilter::eq("owner", "u2")]
        ));
    }

    #[test]
    fn numbers_compare_across_widths() {
        let fields = doc! { "price": 10_i64, "ratio": 0.5 };

        assert!(DocumentEvaluator::matches(&fields, &[FieldFilter::eq("price", 10)]));
        assert!(DocumentEvaluator::matches(&fields, &[FieldFilter::eq("price", 10.0)]));
        assert!(!DocumentEvaluator::matches(&fields, &[FieldFilter::eq("price", "10")]));
        assert!(DocumentEvaluator::matches(&fields, &[FieldFilter::eq("ratio", 0.5)]));
        assert!(!DocumentEvaluator::matches(&fields, &[FieldFilter::eq("price", 10.5)]));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let fields = doc! { "seq": 9_007_199_254_740_993_i64 };

        assert!(DocumentEvaluator::matches(&fields, &[FieldFilter::eq("seq", 9_007_199_254_740_993_i64)]));
        assert!(!DocumentEvaluator::matches(&fields, &[FieldFilter::eq("seq", 9_007_199_254_740_992_i64)]));
        // 2^53 + 1 has no exact double.
        assert!(!DocumentEvaluator::matches(&fields, &[FieldFilter::eq("seq", 9_007_199_254_740_992.0)]));

        let max = doc! { "n": i64::MAX };
        assert!(!DocumentEvaluator::matches(&max, &[FieldFilter::eq("n", 9_223_372_036_854_775_808.0)]));
        assert!(!DocumentEvaluator::matches(&max, &[FieldFilter::eq("n", f64::INFINITY)]));
    }

    #[test]
    fn missing_field_never_matches() {
        let fields = doc! { "a": Bson::Null };

        assert!(DocumentEvaluator::matches(&fields, &[FieldFilter::eq("a", Bson::Null)]));
        assert!(!DocumentEvaluator::matches(&fields, &[FieldFilter::eq("b", Bson::Null)]));
    }
}
