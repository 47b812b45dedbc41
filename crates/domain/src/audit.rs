//! Audit trail and the metadata document that carries it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::{ActorSource, Clock};
use crate::command::Patch;

/// Reserved metadata key under which the audit trail is stored.
pub const AUDIT_KEY: &str = "audit";

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    Restored,
}

/// One recorded lifecycle operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub action: AuditAction,
    pub at: DateTime<Utc>,
    pub by: String,

    /// Values the operation replaced, keyed by field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub previous: BTreeMap<String, Value>,
}

/// Who created, changed, deleted and restored an entity, and when.
///
/// Values are immutable; every stamp returns a new trail. The creation
/// stamp never changes after [`AuditTrail::created`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    created_at: DateTime<Utc>,
    created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    restored_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    restored_by: Option<String>,
    #[serde(default)]
    change_log: Vec<ChangeLogEntry>,
}

impl AuditTrail {
    pub fn created(now: DateTime<Utc>, by: &str) -> Self {
        Self {
            created_at: now,
            created_by: by.to_string(),
            updated_at: None,
            updated_by: None,
            deleted_at: None,
            deleted_by: None,
            restored_at: None,
            restored_by: None,
            change_log: vec![ChangeLogEntry {
                action: AuditAction::Created,
                at: now,
                by: by.to_string(),
                previous: BTreeMap::new(),
            }],
        }
    }

    pub fn updated(&self, now: DateTime<Utc>, by: &str, previous: BTreeMap<String, Value>) -> Self {
        let mut next = self.clone();
        next.touch(now, by);
        next.record(AuditAction::Updated, now, by, previous);
        next
    }

    pub fn deleted(&self, now: DateTime<Utc>, by: &str, previous: BTreeMap<String, Value>) -> Self {
        let mut next = self.clone();
        next.touch(now, by);
        next.deleted_at = Some(now);
        next.deleted_by = Some(by.to_string());
        next.record(AuditAction::Deleted, now, by, previous);
        next
    }

    /// Clears the deletion stamps.
    pub fn restored(&self, now: DateTime<Utc>, by: &str, previous: BTreeMap<String, Value>) -> Self {
        let mut next = self.clone();
        next.touch(now, by);
        next.deleted_at = None;
        next.deleted_by = None;
        next.restored_at = Some(now);
        next.restored_by = Some(by.to_string());
        next.record(AuditAction::Restored, now, by, previous);
        next
    }

    fn touch(&mut self, now: DateTime<Utc>, by: &str) {
        self.updated_at = Some(now);
        self.updated_by = Some(by.to_string());
    }

    fn record(
        &mut self,
        action: AuditAction,
        at: DateTime<Utc>,
        by: &str,
        previous: BTreeMap<String, Value>,
    ) {
        self.change_log.push(ChangeLogEntry {
            action,
            at,
            by: by.to_string(),
            previous,
        });
    }

    /// Returns true while the entity is soft deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn deleted_by(&self) -> Option<&str> {
        self.deleted_by.as_deref()
    }

    pub fn restored_at(&self) -> Option<DateTime<Utc>> {
        self.restored_at
    }

    pub fn restored_by(&self) -> Option<&str> {
        self.restored_by.as_deref()
    }

    pub fn change_log(&self) -> &[ChangeLogEntry] {
        &self.change_log
    }

    pub fn last_entry(&self) -> Option<&ChangeLogEntry> {
        self.change_log.last()
    }
}

/// Structured metadata of an entity: the audit trail plus free-form keys.
///
/// Serialized as one object with the trail under [`AUDIT_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailInfo {
    pub audit: AuditTrail,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetailInfo {
    pub fn new(audit: AuditTrail, extra: Map<String, Value>) -> Self {
        let mut info = Self {
            audit,
            extra: Map::new(),
        };
        info.merge_extra(Patch::Value(extra));
        info
    }

    /// Applies caller metadata with merge-patch rules.
    ///
    /// A `null` value removes its key, `Patch::Null` clears everything and
    /// the reserved audit key is never written.
    pub fn merge_extra(&mut self, patch: Patch<Map<String, Value>>) {
        match patch {
            Patch::Absent => {}
            Patch::Null => self.extra.clear(),
            Patch::Value(map) => {
                for (key, value) in map {
                    if key == AUDIT_KEY {
                        continue;
                    }
                    if value.is_null() {
                        self.extra.remove(&key);
                    } else {
                        self.extra.insert(key, value);
                    }
                }
            }
        }
    }
}

/// Stamps audit trails with the injected clock and actor.
pub struct AuditTrailFactory<'a> {
    clock: &'a dyn Clock,
    actor: &'a dyn ActorSource,
}

impl<'a> AuditTrailFactory<'a> {
    pub fn new(clock: &'a dyn Clock, actor: &'a dyn ActorSource) -> Self {
        Self { clock, actor }
    }

    pub fn stamp_created(&self, extra: Map<String, Value>) -> DetailInfo {
        let by = self.actor.current_actor().id;
        DetailInfo::new(AuditTrail::created(self.clock.now(), &by), extra)
    }

    /// Stamps an update; `extra` is the already merged metadata.
    pub fn stamp_updated(
        &self,
        existing: &DetailInfo,
        mut extra: Map<String, Value>,
        previous: BTreeMap<String, Value>,
    ) -> DetailInfo {
        let by = self.actor.current_actor().id;
        extra.remove(AUDIT_KEY);
        DetailInfo {
            audit: existing.audit.updated(self.clock.now(), &by, previous),
            extra,
        }
    }

    pub fn stamp_deleted(
        &self,
        existing: &DetailInfo,
        previous: BTreeMap<String, Value>,
    ) -> DetailInfo {
        let by = self.actor.current_actor().id;
        DetailInfo {
            audit: existing.audit.deleted(self.clock.now(), &by, previous),
            extra: existing.extra.clone(),
        }
    }

    pub fn stamp_restored(
        &self,
        existing: &DetailInfo,
        previous: BTreeMap<String, Value>,
    ) -> DetailInfo {
        let by = self.actor.current_actor().id;
        DetailInfo {
            audit: existing.audit.restored(self.clock.now(), &by, previous),
            extra: existing.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::FixedClock;
    use chrono::Duration;
    use common::Actor;
    use serde_json::json;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn created_stamp_has_only_creation_fields() {
        let clock = FixedClock::new(start());
        let actor = Actor::new("u-1", "Alice");
        let info = AuditTrailFactory::new(&clock, &actor).stamp_created(Map::new());

        assert_eq!(info.audit.created_at(), start());
        assert_eq!(info.audit.created_by(), "u-1");
        assert!(info.audit.updated_at().is_none());
        assert!(!info.audit.is_deleted());
        assert_eq!(info.audit.change_log().len(), 1);
        assert_eq!(info.audit.change_log()[0].action, AuditAction::Created);
    }

    #[test]
    fn update_keeps_creation_and_records_previous() {
        let clock = FixedClock::new(start());
        let alice = Actor::new("u-1", "Alice");
        let bob = Actor::new("u-2", "Bob");
        let created = AuditTrailFactory::new(&clock, &alice).stamp_created(Map::new());

        clock.advance(Duration::minutes(1));
        let previous = BTreeMap::from([("name".to_string(), json!("Acme"))]);
        let updated = AuditTrailFactory::new(&clock, &bob).stamp_updated(
            &created,
            created.extra.clone(),
            previous,
        );

        assert_eq!(updated.audit.created_at(), start());
        assert_eq!(updated.audit.created_by(), "u-1");
        assert_eq!(
            updated.audit.updated_at(),
            Some(start() + Duration::minutes(1))
        );
        assert_eq!(updated.audit.updated_by(), Some("u-2"));

        let entry = updated.audit.last_entry().unwrap();
        assert_eq!(entry.action, AuditAction::Updated);
        assert_eq!(entry.previous["name"], json!("Acme"));
    }

    #[test]
    fn restore_clears_deletion_stamps() {
        let clock = FixedClock::new(start());
        let actor = Actor::new("u-1", "Alice");
        let factory = AuditTrailFactory::new(&clock, &actor);

        let created = factory.stamp_created(Map::new());
        let deleted = factory.stamp_deleted(&created, BTreeMap::new());
        assert!(deleted.audit.is_deleted());
        assert_eq!(deleted.audit.deleted_by(), Some("u-1"));

        clock.advance(Duration::seconds(30));
        let restored = factory.stamp_restored(&deleted, BTreeMap::new());
        assert!(!restored.audit.is_deleted());
        assert!(restored.audit.deleted_by().is_none());
        assert_eq!(
            restored.audit.restored_at(),
            Some(start() + Duration::seconds(30))
        );
        assert_eq!(restored.audit.updated_at(), restored.audit.restored_at());
        assert_eq!(restored.audit.change_log().len(), 3);
    }

    #[test]
    fn merge_extra_follows_merge_patch_rules() {
        let mut info = DetailInfo::new(
            AuditTrail::created(start(), "u-1"),
            map(json!({"region": "eu", "tier": 2})),
        );

        info.merge_extra(Patch::Value(map(json!({
            "region": null,
            "owner": "ops",
            "audit": {"created_by": "forged"}
        }))));

        assert_eq!(info.extra, map(json!({"tier": 2, "owner": "ops"})));
        assert_eq!(info.audit.created_by(), "u-1");

        info.merge_extra(Patch::Null);
        assert!(info.extra.is_empty());
    }

    #[test]
    fn detail_info_serializes_audit_under_reserved_key() {
        let info = DetailInfo::new(
            AuditTrail::created(start(), "u-1"),
            map(json!({"region": "eu"})),
        );

        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["region"], json!("eu"));
        assert_eq!(value[AUDIT_KEY]["created_by"], json!("u-1"));
        assert!(value[AUDIT_KEY].get("deleted_at").is_none());

        let back: DetailInfo = serde_json::from_value(value).unwrap();
        assert_eq!(back, info);
    }
}
