use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Patch;
use crate::error::DomainError;
use crate::resource::Resource;

/// Minimal resource with a single free-text field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Placeholder;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaceholderFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PlaceholderPatch {
    #[serde(default)]
    pub description: Patch<String>,
}

impl Resource for Placeholder {
    const NAME: &'static str = "placeholder";

    type Fields = PlaceholderFields;
    type Patch = PlaceholderPatch;

    fn patch_has_changes(patch: &PlaceholderPatch) -> bool {
        patch.description.is_present()
    }

    fn apply_patch(
        fields: &PlaceholderFields,
        patch: &PlaceholderPatch,
    ) -> Result<(PlaceholderFields, BTreeMap<String, Value>), DomainError> {
        let description = patch.description.clone().apply_to(fields.description.clone());
        let mut previous = BTreeMap::new();
        if description != fields.description {
            previous.insert(
                "description".to_string(),
                fields.description.clone().map_or(Value::Null, Value::String),
            );
        }
        Ok((PlaceholderFields { description }, previous))
    }
}
