//! Field maps, ids and sentinel values.
//!
//! Documents are stored as flat [`Fields`] maps keyed by an opaque string id. Callers work
//! with any serde type: [`to_fields`] turns it into a validated field map and
//! [`from_fields`] turns a stored map (plus its id) back into the caller's shape.
//!
//! Only scalar values are accepted at the top level of a field map: null, booleans,
//! integers, doubles, strings, datetimes, timestamps and [`Sentinel`]s.

use bson::{Bson, DateTime, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, Serializer, de::DeserializeOwned, ser::SerializeMap};
use uuid::Uuid;

use crate::error::{BackendError, BackendResult};

/// A flat map from field name to value, as persisted by a backend.
pub type Fields = bson::Document;

/// Field under which the document id is merged into read results.
pub const ID_FIELD: &str = "id";

const SENTINEL_KEY: &str = "$sentinel";

/// Placeholder values resolved by the store at write time.
///
/// # Example
///
/// ```ignore
/// use docgate::document::Sentinel;
/// use bson::doc;
///
/// store.update("items", &id, &doc! {
///     "updatedAt": Sentinel::ServerTimestamp,
///     "legacyFlag": Sentinel::Delete,
/// }, Scope::Auto).await?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Replaced by the commit time of the write.
    ServerTimestamp,
    /// Removes the field. Only valid in updates.
    Delete,
}

impl Sentinel {
    fn name(&self) -> &'static str {
        match self {
            Sentinel::ServerTimestamp => "serverTimestamp",
            Sentinel::Delete => "delete",
        }
    }

    /// Recognizes the encoded form of a sentinel.
    pub fn from_bson(value: &Bson) -> Option<Sentinel> {
        let doc = value.as_document()?;
        if doc.len() != 1 {
            return None;
        }

        match doc.get_str(SENTINEL_KEY).ok()? {
            "serverTimestamp" => Some(Sentinel::ServerTimestamp),
            "delete" => Some(Sentinel::Delete),
            _ => None,
        }
    }
}

impl From<Sentinel> for Bson {
    fn from(sentinel: Sentinel) -> Self {
        let mut doc = bson::Document::new();
        doc.insert(SENTINEL_KEY, sentinel.name());
        Bson::Document(doc)
    }
}

impl Serialize for Sentinel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(SENTINEL_KEY, self.name())?;
        map.end()
    }
}

/// Generates a fresh document id (32 hex characters).
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Rejects ids a backend cannot address.
pub fn validate_id(id: &str) -> BackendResult<()> {
    if id.is_empty() {
        return Err(BackendError::InvalidArgument("document id must not be empty".into()));
    }
    if id.contains('/') {
        return Err(BackendError::InvalidArgument(format!(
            "document id {id:?} must not contain '/'"
        )));
    }

    Ok(())
}

fn validate_field(name: &str, value: &Bson) -> BackendResult<()> {
    if name.is_empty() || name.contains('.') || name.starts_with('$') {
        return Err(BackendError::InvalidDocument(format!("invalid field name {name:?}")));
    }

    match value {
        Bson::Null
        | Bson::Boolean(_)
        | Bson::Int32(_)
        | Bson::Int64(_)
        | Bson::Double(_)
        | Bson::String(_)
        | Bson::DateTime(_)
        | Bson::Timestamp(_) => Ok(()),
        other if Sentinel::from_bson(other).is_some() => Ok(()),
        other => Err(BackendError::InvalidDocument(format!(
            "field {name:?} has unsupported type {:?}",
            other.element_type()
        ))),
    }
}

/// Serializes caller data into a validated field map.
///
/// The data must serialize to a map. An `id` entry is dropped: the document id lives
/// outside the field map and always wins on read.
pub fn to_fields<D: Serialize + ?Sized>(data: &D) -> BackendResult<Fields> {
    let fields = match serialize_to_bson(data)
        .map_err(|e| BackendError::Serialization(e.to_string()))?
    {
        Bson::Document(doc) => doc,
        other => {
            return Err(BackendError::InvalidDocument(format!(
                "expected a field map, got {:?}",
                other.element_type()
            )));
        }
    };

    let mut validated = Fields::new();
    for (name, value) in fields {
        if name == ID_FIELD {
            continue;
        }
        validate_field(&name, &value)?;
        validated.insert(name, value);
    }

    Ok(validated)
}

/// Merges the id into a stored field map and deserializes the result.
pub fn from_fields<D: DeserializeOwned>(id: &str, fields: Fields) -> BackendResult<D> {
    let mut merged = Fields::new();
    merged.insert(ID_FIELD, id);
    for (name, value) in fields {
        if name != ID_FIELD {
            merged.insert(name, value);
        }
    }

    deserialize_from_bson(Bson::Document(merged))
        .map_err(|e| BackendError::Deserialization(e.to_string()))
}

/// Resolves sentinels in a full document write.
///
/// `ServerTimestamp` becomes `now`; `Delete` is rejected because there is nothing to remove.
pub fn resolve_for_set(fields: Fields, now: DateTime) -> BackendResult<Fields> {
    fields
        .into_iter()
        .map(|(name, value)| match Sentinel::from_bson(&value) {
            Some(Sentinel::ServerTimestamp) => Ok((name, Bson::DateTime(now))),
            Some(Sentinel::Delete) => Err(BackendError::InvalidDocument(format!(
                "field {name:?} uses the delete sentinel outside of an update"
            ))),
            None => Ok((name, value)),
        })
        .collect()
}

/// A resolved partial update: fields to overwrite and fields to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub set: Fields,
    pub unset: Vec<String>,
}

impl Patch {
    /// Resolves sentinels in a partial update.
    pub fn resolve(fields: Fields, now: DateTime) -> Self {
        let mut patch = Patch::default();

        for (name, value) in fields {
            match Sentinel::from_bson(&value) {
                Some(Sentinel::ServerTimestamp) => {
                    patch.set.insert(name, Bson::DateTime(now));
                }
                Some(Sentinel::Delete) => patch.unset.push(name),
                None => {
                    patch.set.insert(name, value);
                }
            }
        }

        patch
    }

    /// Merges this patch into an existing field map, leaving unnamed fields untouched.
    pub fn apply_to(&self, target: &mut Fields) {
        for (name, value) in &self.set {
            target.insert(name.clone(), value.clone());
        }
        for name in &self.unset {
            target.remove(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: String,
        name: String,
        price: Option<i64>,
    }

    #[test]
    fn strips_id_and_merges_it_back() {
        let item = Item { id: "ignored".into(), name: "Widget".into(), price: Some(3) };

        let fields = to_fields(&item).unwrap();
        assert_eq!(fields, doc! { "name": "Widget", "price": 3_i64 });

        let back: Item = from_fields("real-id", fields).unwrap();
        assert_eq!(back, Item { id: "real-id".into(), name: "Widget".into(), price: Some(3) });
    }

    #[test]
    fn stored_id_field_never_shadows_document_id() {
        let read: Fields = from_fields("x", doc! { "id": "other", "a": 1 }).unwrap();

        assert_eq!(read, doc! { "id": "x", "a": 1 });
    }

    #[test]
    fn rejects_nested_values_and_bad_names() {
        assert!(matches!(
            to_fields(&doc! { "tags": ["a", "b"] }),
            Err(BackendError::InvalidDocument(_))
        ));
        assert!(matches!(
            to_fields(&doc! { "a.b": 1 }),
            Err(BackendError::InvalidDocument(_))
        ));
        assert!(matches!(to_fields(&5_i32), Err(BackendError::InvalidDocument(_))));
    }

    #[test]
    fn accepts_sentinels() {
        let fields = to_fields(&doc! { "at": Sentinel::ServerTimestamp }).unwrap();

        assert_eq!(
            Sentinel::from_bson(fields.get("at").unwrap()),
            Some(Sentinel::ServerTimestamp)
        );
    }

    #[test]
    fn resolves_patch_sentinels() {
        let now = DateTime::from_millis(1_000);
        let patch = Patch::resolve(
            doc! { "a": 1, "at": Sentinel::ServerTimestamp, "gone": Sentinel::Delete },
            now,
        );

        let mut target = doc! { "a": 0, "b": 2, "gone": true };
        patch.apply_to(&mut target);

        assert_eq!(target, doc! { "a": 1, "b": 2, "at": now });
    }

    #[test]
    fn delete_sentinel_is_rejected_on_set() {
        let result = resolve_for_set(doc! { "gone": Sentinel::Delete }, DateTime::now());

        assert!(matches!(result, Err(BackendError::InvalidDocument(_))));
    }

    #[test]
    fn validates_ids() {
        assert!(validate_id("abc").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("a/b").is_err());
        assert_eq!(generate_id().len(), 32);
    }
}
