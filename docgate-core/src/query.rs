//! Equality filters combined with AND semantics.
//!
//! A list of [`FieldFilter`]s matches a document when every filter's field equals its
//! value. Backends translate a filter list through a [`FilterVisitor`]: the in-memory
//! backend evaluates it, the MongoDB backend turns it into a query document.
//!
//! ```ignore
//! use docgate::query::{FieldFilter, Predicate};
//!
//! let filters = vec![
//!     FieldFilter::eq("status", "inactive"),
//!     FieldFilter::eq("owner", "u1"),
//! ];
//!
//! assert_eq!(
//!     Predicate::new(&filters).to_string(),
//!     r#"status == "inactive" AND owner == "u1""#,
//! );
//! ```

use bson::Bson;
use std::fmt;

use crate::error::BackendError;

/// A single `field == value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// The field name to compare.
    pub field: String,
    /// The value the field must equal.
    pub value: Bson,
}

impl FieldFilter {
    /// Creates an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { field: field.into(), value: value.into() }
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.field, self.value)
    }
}

/// Display adapter rendering a filter list as `a == 1 AND b == "x"`.
pub struct Predicate<'a>(&'a [FieldFilter]);

impl<'a> Predicate<'a> {
    pub fn new(filters: &'a [FieldFilter]) -> Self {
        Self(filters)
    }
}

impl fmt::Display for Predicate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, filter) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{filter}")?;
        }

        Ok(())
    }
}

pub trait FilterVisitor {
    type Output;
    type Error: Into<BackendError>;

    fn visit_and(&mut self, filters: &[FieldFilter]) -> Result<Self::Output, Self::Error>;
    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_filter(&mut self, filter: &FieldFilter) -> Result<Self::Output, Self::Error> {
        self.visit_eq(&filter.field, &filter.value)
    }
}
