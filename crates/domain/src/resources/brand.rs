use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Patch;
use crate::error::DomainError;
use crate::resource::Resource;

/// A brand whose catalogue may be synced with an external system.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brand;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BrandFields {
    /// Whether the brand is synced with the external catalogue.
    #[serde(default)]
    pub is_synced: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl BrandFields {
    pub fn new(is_synced: bool, website: Option<String>) -> Self {
        Self { is_synced, website }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct BrandPatch {
    #[serde(default)]
    pub is_synced: Patch<bool>,

    #[serde(default)]
    pub website: Patch<String>,
}

/// Trims a website and treats a blank one as absent.
fn normalize_website(website: Option<String>) -> Option<String> {
    website
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
}

impl Resource for Brand {
    const NAME: &'static str = "brand";

    type Fields = BrandFields;
    type Patch = BrandPatch;

    fn normalize(fields: BrandFields) -> BrandFields {
        BrandFields {
            website: normalize_website(fields.website),
            ..fields
        }
    }

    fn validate(fields: &BrandFields) -> Result<(), DomainError> {
        if let Some(website) = &fields.website {
            if !(website.starts_with("http://") || website.starts_with("https://")) {
                return Err(DomainError::BadRequest(format!(
                    "website must be an http(s) URL, got '{website}'"
                )));
            }
        }
        Ok(())
    }

    fn patch_has_changes(patch: &BrandPatch) -> bool {
        patch.is_synced.is_present() || patch.website.is_present()
    }

    fn apply_patch(
        fields: &BrandFields,
        patch: &BrandPatch,
    ) -> Result<(BrandFields, BTreeMap<String, Value>), DomainError> {
        let mut next = fields.clone();
        let mut previous = BTreeMap::new();

        match patch.is_synced {
            Patch::Absent => {}
            Patch::Null => {
                return Err(DomainError::BadRequest(
                    "is_synced cannot be cleared".to_string(),
                ));
            }
            Patch::Value(is_synced) => {
                if is_synced != fields.is_synced {
                    previous.insert("is_synced".to_string(), Value::Bool(fields.is_synced));
                    next.is_synced = is_synced;
                }
            }
        }

        let website = normalize_website(patch.website.clone().apply_to(fields.website.clone()));
        if website != fields.website {
            previous.insert(
                "website".to_string(),
                fields.website.clone().map_or(Value::Null, Value::String),
            );
            next.website = website;
        }

        Ok((next, previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_clears_website_and_records_previous() {
        let fields = BrandFields::new(false, Some("https://acme.test".to_string()));
        let patch: BrandPatch = serde_json::from_value(json!({"website": null})).unwrap();

        let (next, previous) = Brand::apply_patch(&fields, &patch).unwrap();
        assert_eq!(next.website, None);
        assert_eq!(previous["website"], json!("https://acme.test"));
        assert!(!previous.contains_key("is_synced"));
    }

    #[test]
    fn clearing_sync_flag_is_rejected() {
        let patch: BrandPatch = serde_json::from_value(json!({"is_synced": null})).unwrap();
        assert!(Brand::patch_has_changes(&patch));
        assert!(matches!(
            Brand::apply_patch(&BrandFields::default(), &patch),
            Err(DomainError::BadRequest(_))
        ));
    }

    #[test]
    fn website_must_be_http() {
        assert!(Brand::validate(&BrandFields::new(true, Some("ftp://acme".into()))).is_err());
        assert!(Brand::validate(&BrandFields::new(true, Some("https://acme.test".into()))).is_ok());
        assert!(Brand::validate(&BrandFields::default()).is_ok());
    }

    #[test]
    fn create_and_patch_normalize_website_alike() {
        let padded = Brand::normalize(BrandFields::new(false, Some(" https://acme.test ".into())));
        assert_eq!(padded.website.as_deref(), Some("https://acme.test"));
        assert!(Brand::validate(&padded).is_ok());

        let blank = Brand::normalize(BrandFields::new(true, Some("  ".into())));
        assert_eq!(blank, BrandFields::new(true, None));

        let patch: BrandPatch =
            serde_json::from_value(json!({"website": " https://acme.test "})).unwrap();
        let (patched, _) = Brand::apply_patch(&BrandFields::default(), &patch).unwrap();
        assert_eq!(patched, padded);
    }

    #[test]
    fn permissions_are_namespaced() {
        assert_eq!(Brand::permission("delete"), "brand.delete");
    }
}
