use super::canonical::{canonicalize, CanonicalReference};
use crate::document::RawDocument;
use crate::error::{Result, ValidationError};
use serde_json::Value;
use std::collections::BTreeSet;

/// Key marking a JSON Reference node
pub const REFERENCE_KEY: &str = "$ref";

/// Walk a JSON tree depth-first and rewrite every `$ref` target in place
///
/// `rewrite` receives the current target and returns the replacement. A node
/// holding `$ref` must be a pure indirection: any sibling key, or a non-string
/// target, is a `MalformedReference`.
pub fn visit_references<F>(value: &mut Value, rewrite: &mut F) -> Result<()>
where
    F: FnMut(&str) -> Result<String>,
{
    match value {
        Value::Object(map) => {
            if let Some(target) = map.get(REFERENCE_KEY) {
                let raw = target.as_str().ok_or_else(|| {
                    ValidationError::malformed(
                        format!("{} must be a string, got {}", REFERENCE_KEY, target),
                        "visit_references",
                    )
                })?;
                if map.len() > 1 {
                    return Err(ValidationError::malformed(
                        format!(
                            "External Object Reference cannot have more keys than the {} key ({})",
                            REFERENCE_KEY, raw
                        ),
                        "visit_references",
                    ));
                }
                let replaced = rewrite(raw)?;
                map.insert(REFERENCE_KEY.to_string(), Value::String(replaced));
                return Ok(());
            }
            for child in map.values_mut() {
                visit_references(child, rewrite)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                visit_references(child, rewrite)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Collect every reference below `tree`, rewriting each to its absolute form
///
/// Relative references are resolved against `doc`. The result is de-duplicated
/// by canonical identity, so `#/definitions/Pet` and `swagger.json#/definitions/Pet`
/// inside `swagger.json` count once.
pub fn extract_references(doc: &RawDocument, tree: &mut Value) -> Result<BTreeSet<CanonicalReference>> {
    let mut found = BTreeSet::new();
    visit_references(tree, &mut |raw| {
        let reference = canonicalize(doc, raw)?;
        let full = reference.full_ref.clone();
        found.insert(reference);
        Ok(full)
    })?;
    Ok(found)
}
