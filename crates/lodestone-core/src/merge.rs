//! Deep-merge patching and reinitialization planning for config updates.

use serde_json::Value;

use crate::config::Config;
use crate::error::ConfigError;

/// Apply a JSON merge patch to a typed config.
///
/// The merge rule: when both the base and the patch hold an object for a key,
/// merge recursively; otherwise the patch value replaces the base value
/// wholesale. Arrays are replaced, never concatenated.
///
/// The patched value must deserialize back into a valid [`Config`]; the base
/// is never observed half-merged by callers.
///
/// # Errors
///
/// Returns an error if the patch produces an unparsable or invalid config.
pub fn merge_patch(base: &Config, patch: Value) -> Result<Config, ConfigError> {
    let mut value = serde_json::to_value(base)?;
    merge_value(&mut value, patch);
    let merged: Config = serde_json::from_value(value)?;
    merged.validate()?;
    Ok(merged)
}

fn merge_value(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                match base_map.get_mut(&key) {
                    Some(base_val) => merge_value(base_val, patch_val),
                    None => {
                        base_map.insert(key, patch_val);
                    }
                }
            }
        }
        (base_slot, patch_val) => *base_slot = patch_val,
    }
}

/// Which pipeline components a config change forces to be rebuilt.
///
/// A retriever rebuild invalidates previously processed data: the collection
/// parameters no longer match what was indexed, so callers must also reset
/// their processed-state tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReinitPlan {
    pub embedder: bool,
    pub retriever: bool,
}

impl ReinitPlan {
    #[must_use]
    pub fn between(old: &Config, new: &Config) -> Self {
        Self {
            embedder: old.embedder != new.embedder,
            retriever: old.retriever != new.retriever,
        }
    }

    #[must_use]
    pub fn any(self) -> bool {
        self.embedder || self.retriever
    }
}
