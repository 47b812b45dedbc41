//! Commands: validated, typed payloads for one requested mutation.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::DomainError;
use crate::resource::Resource;
use crate::status::Status;

/// Longest accepted entity name, in characters.
pub const MAX_NAME_LENGTH: usize = 255;

/// A command field that distinguishes "not sent" from "sent as null".
///
/// Deserialize with `#[serde(default)]` so a missing key becomes `Absent`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    /// No change requested.
    #[default]
    Absent,
    /// Clear the field.
    Null,
    /// Set the field to a value.
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    /// Returns true if the caller asked for any change, clearing included.
    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            Patch::Absent | Patch::Null => None,
        }
    }

    /// Applies the patch to a nullable field.
    pub fn apply_to(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Absent => current,
            Patch::Null => None,
            Patch::Value(v) => Some(v),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

/// Trims a requested name and checks it is usable.
pub fn normalize_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::BadRequest("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::BadRequest(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

/// Command to create an entity.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "")]
pub struct CreateCommand<R: Resource> {
    pub name: String,

    /// Initial status; `Draft` when omitted.
    #[serde(default)]
    pub status: Option<Status>,

    /// Resource-specific metadata stored next to the audit trail.
    #[serde(default)]
    pub detail_info: Map<String, Value>,

    #[serde(flatten)]
    pub fields: R::Fields,
}

impl<R: Resource> CreateCommand<R> {
    /// Creates a command with default status, no metadata and the given fields.
    pub fn new(name: impl Into<String>, fields: R::Fields) -> Self {
        Self {
            name: name.into(),
            status: None,
            detail_info: Map::new(),
            fields,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.detail_info.insert(key.into(), value);
        self
    }
}

/// Command to update an entity.
///
/// `lock_version` is the version the caller last read; the update is
/// rejected if the entity has moved on since.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "")]
pub struct UpdateCommand<R: Resource> {
    pub lock_version: i64,

    #[serde(default)]
    pub name: Patch<String>,

    #[serde(default)]
    pub status: Patch<Status>,

    /// `Null` clears all resource metadata; a map is merged key by key.
    #[serde(default)]
    pub detail_info: Patch<Map<String, Value>>,

    #[serde(flatten)]
    pub fields: R::Patch,
}

impl<R: Resource> UpdateCommand<R> {
    /// Creates a command that changes nothing yet.
    pub fn new(lock_version: i64) -> Self {
        Self {
            lock_version,
            name: Patch::Absent,
            status: Patch::Absent,
            detail_info: Patch::Absent,
            fields: R::Patch::default(),
        }
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = Patch::Value(name.into());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Patch::Value(status);
        self
    }

    pub fn with_detail_info(mut self, detail_info: Map<String, Value>) -> Self {
        self.detail_info = Patch::Value(detail_info);
        self
    }

    pub fn with_fields(mut self, fields: R::Patch) -> Self {
        self.fields = fields;
        self
    }

    /// Validates the command and normalizes its values.
    pub fn into_changes(self) -> Result<EntityChanges<R>, DomainError> {
        let name = match self.name {
            Patch::Absent => None,
            Patch::Null => {
                return Err(DomainError::BadRequest("name cannot be cleared".to_string()));
            }
            Patch::Value(ref raw) => Some(normalize_name(raw)?),
        };

        let status = match self.status {
            Patch::Absent => None,
            Patch::Null => {
                return Err(DomainError::BadRequest(
                    "status cannot be cleared".to_string(),
                ));
            }
            Patch::Value(Status::Deleted) => {
                return Err(DomainError::BadRequest(
                    "entities are deleted through delete, not update".to_string(),
                ));
            }
            Patch::Value(status) => Some(status),
        };

        Ok(EntityChanges {
            name,
            status,
            detail_info: self.detail_info,
            fields: self.fields,
        })
    }
}

/// The normalized content of an [`UpdateCommand`].
///
/// Says what was requested, not what differs; see `Entity::diff`.
#[derive(Debug, Clone)]
pub struct EntityChanges<R: Resource> {
    pub name: Option<String>,
    pub status: Option<Status>,
    pub detail_info: Patch<Map<String, Value>>,
    pub fields: R::Patch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Default)]
    struct WebsitePatch {
        #[serde(default)]
        website: Patch<String>,
    }

    #[test]
    fn patch_distinguishes_missing_null_and_value() {
        let missing: WebsitePatch = serde_json::from_value(json!({})).unwrap();
        let null: WebsitePatch = serde_json::from_value(json!({"website": null})).unwrap();
        let value: WebsitePatch = serde_json::from_value(json!({"website": "acme.test"})).unwrap();

        assert_eq!(missing.website, Patch::Absent);
        assert_eq!(null.website, Patch::Null);
        assert_eq!(value.website, Patch::Value("acme.test".to_string()));
    }

    #[test]
    fn patch_apply_to_nullable_field() {
        let current = Some("old".to_string());
        assert_eq!(Patch::Absent.apply_to(current.clone()), current);
        assert_eq!(Patch::<String>::Null.apply_to(current.clone()), None);
        assert_eq!(
            Patch::Value("new".to_string()).apply_to(current),
            Some("new".to_string())
        );
    }

    #[test]
    fn normalize_name_trims_and_rejects_blank() {
        assert_eq!(normalize_name("  Acme  ").unwrap(), "Acme");
        assert!(matches!(
            normalize_name("   "),
            Err(DomainError::BadRequest(_))
        ));
        assert!(normalize_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }
}
