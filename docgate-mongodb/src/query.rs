//! Filter translation into MongoDB query syntax.

use bson::{Bson, Document, doc};

use docgate_core::{
    error::BackendError,
    query::{FieldFilter, FilterVisitor},
};

/// Translates equality filters into a MongoDB query document.
///
/// Field names are checked here: a name starting with `$` or containing `.` would be
/// read by the server as an operator or a path.
pub(crate) struct MongoQueryTranslator;

impl FilterVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = BackendError;

    fn visit_and(&mut self, filters: &[FieldFilter]) -> Result<Self::Output, Self::Error> {
        if filters.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": filters
                .iter()
                .map(|filter| self.visit_filter(filter))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_eq(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        if field.is_empty() || field.starts_with('$') || field.contains('.') {
            return Err(BackendError::InvalidArgument(format!("invalid filter field {field:?}")));
        }

        Ok(doc! {
            field: { "$eq": value.clone() },
        })
    }
}
