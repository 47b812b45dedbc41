//! The seam between the generic lifecycle core and concrete resources.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DomainError;
use crate::status::Status;

/// A kind of entity managed by the lifecycle core.
///
/// Implementors describe their resource-specific fields and how a patch
/// applies to them; versioning, auditing, status guarding and persistence
/// are shared.
pub trait Resource: Send + Sync + 'static {
    /// Resource name used for storage, permissions and error messages.
    const NAME: &'static str;

    /// Resource-specific fields of an entity.
    type Fields: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync;

    /// Requested changes to [`Resource::Fields`].
    type Patch: DeserializeOwned + Clone + Debug + Default + Send + Sync;

    /// Tidies freshly supplied fields before they are validated on create.
    fn normalize(fields: Self::Fields) -> Self::Fields {
        fields
    }

    /// Checks field values on create and after a patch is applied.
    fn validate(_fields: &Self::Fields) -> Result<(), DomainError> {
        Ok(())
    }

    /// Returns true if the patch asks for any change.
    fn patch_has_changes(patch: &Self::Patch) -> bool;

    /// Applies a patch, returning the new fields and the previous value of
    /// every field the patch changed.
    fn apply_patch(
        fields: &Self::Fields,
        patch: &Self::Patch,
    ) -> Result<(Self::Fields, BTreeMap<String, Value>), DomainError>;

    fn can_transition(from: Status, to: Status) -> bool {
        from.can_transition_to(to)
    }

    /// Returns true for the transition that lifts a lock.
    fn is_unlock(from: Status, to: Status) -> bool {
        from.is_unlock(to)
    }

    /// Permission required for an operation, e.g. `brand.update`.
    fn permission(operation: &str) -> String {
        format!("{}.{}", Self::NAME, operation)
    }
}
