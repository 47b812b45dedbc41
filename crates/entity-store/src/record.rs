use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EntityId, Result, StoreError, VersionStamp};

/// One stored entity row.
///
/// The store is agnostic of the resource it holds: the lifecycle fields are
/// columns, everything resource-specific travels in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Store-assigned identifier; `None` until the first insert.
    pub id: Option<EntityId>,

    /// The resource type (e.g., "brand", "placeholder").
    pub resource: String,

    /// Display name, unique per resource.
    pub name: String,

    /// Lifecycle status code.
    pub status: String,

    /// Structured metadata including the audit trail.
    pub detail_info: Value,

    /// Resource-specific scalar columns.
    pub attributes: Map<String, Value>,

    /// Revision of this row.
    pub version: VersionStamp,

    /// Soft-delete marker.
    pub deleted: bool,
}

impl EntityRecord {
    /// Creates a new record builder.
    pub fn builder() -> EntityRecordBuilder {
        EntityRecordBuilder::default()
    }

    /// Reads a lookup field from this record.
    pub fn field(&self, field: &LookupField) -> Option<Value> {
        match field {
            LookupField::Name => Some(Value::String(self.name.clone())),
            LookupField::Attribute(key) => self.attributes.get(*key).cloned(),
        }
    }
}

/// A column that can be searched for an exact value.
///
/// Resolved to a concrete column by each store; resources name the fields
/// they look up at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupField {
    /// The `name` column.
    Name,
    /// A key inside `attributes`.
    Attribute(&'static str),
}

impl LookupField {
    /// Returns the field name as used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupField::Name => "name",
            LookupField::Attribute(key) => key,
        }
    }
}

impl std::fmt::Display for LookupField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for constructing entity records.
#[derive(Debug, Default)]
pub struct EntityRecordBuilder {
    id: Option<EntityId>,
    resource: Option<String>,
    name: Option<String>,
    status: Option<String>,
    detail_info: Option<Value>,
    attributes: Map<String, Value>,
    version: Option<VersionStamp>,
    deleted: bool,
}

impl EntityRecordBuilder {
    /// Sets the identifier of an already persisted row.
    pub fn id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the resource type.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the status code.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the detail info from a serializable value.
    pub fn detail_info<T: Serialize>(mut self, detail_info: &T) -> Result<Self> {
        self.detail_info = Some(serde_json::to_value(detail_info)?);
        Ok(self)
    }

    /// Sets the resource-specific attributes from a serializable struct.
    ///
    /// The value must serialize to a JSON object.
    pub fn attributes<T: Serialize>(mut self, attributes: &T) -> Result<Self> {
        match serde_json::to_value(attributes)? {
            Value::Object(map) => {
                self.attributes = map;
                Ok(self)
            }
            other => Err(StoreError::InvalidRecord(format!(
                "attributes must be an object, got {other}"
            ))),
        }
    }

    /// Sets the version. Defaults to the initial version.
    pub fn version(mut self, version: VersionStamp) -> Self {
        self.version = Some(version);
        self
    }

    /// Marks the record as soft deleted.
    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Builds the record, failing if resource, name or status are missing.
    pub fn build(self) -> Result<EntityRecord> {
        let missing = |field: &str| StoreError::InvalidRecord(format!("{field} is required"));

        Ok(EntityRecord {
            id: self.id,
            resource: self.resource.ok_or_else(|| missing("resource"))?,
            name: self.name.ok_or_else(|| missing("name"))?,
            status: self.status.ok_or_else(|| missing("status"))?,
            detail_info: self
                .detail_info
                .unwrap_or_else(|| Value::Object(Map::new())),
            attributes: self.attributes,
            version: self.version.unwrap_or_default(),
            deleted: self.deleted,
        })
    }
}
