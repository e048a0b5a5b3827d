//! Artifact locator resolution
//!
//! Depth-first search of a response value for the generated file's path.

use crate::error::ItemError;
use crate::types::{NormalizedResult, ResolvedArtifact};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Responses are a few levels deep; anything deeper is treated as no match
const MAX_DEPTH: usize = 32;

/// Search `value` for a path ending in one of `allowed_extensions`
///
/// For a mapping, the keys in `priority_keys` are probed in order and the
/// first key whose subtree resolves wins, even if a later key would also
/// resolve. A string is returned when its extension is allowed. Every other
/// value (sequences included) yields `None`.
///
/// `allowed_extensions` holds lowercased extensions without the dot.
pub fn resolve(
    value: &Value,
    priority_keys: &[String],
    allowed_extensions: &BTreeSet<String>,
) -> Option<String> {
    resolve_at(value, priority_keys, allowed_extensions, 0)
}

fn resolve_at(
    value: &Value,
    priority_keys: &[String],
    allowed_extensions: &BTreeSet<String>,
    depth: usize,
) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }

    match value {
        Value::Object(map) => priority_keys.iter().find_map(|key| {
            map.get(key)
                .and_then(|inner| resolve_at(inner, priority_keys, allowed_extensions, depth + 1))
        }),
        Value::String(s) if has_allowed_extension(s, allowed_extensions) => Some(s.clone()),
        _ => None,
    }
}

fn has_allowed_extension(candidate: &str, allowed_extensions: &BTreeSet<String>) -> bool {
    Path::new(candidate)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| allowed_extensions.contains(&ext.to_lowercase()))
}

/// Resolve a normalized response to an artifact that exists on disk
///
/// Fails with [`ItemError::InvalidOutputLocator`] when nothing resolves or
/// the resolved path is not an existing file.
pub fn resolve_artifact(
    result: &NormalizedResult,
    priority_keys: &[String],
    allowed_extensions: &BTreeSet<String>,
) -> Result<ResolvedArtifact, ItemError> {
    let Some(locator) = result.artifact_locator.as_ref() else {
        return Err(ItemError::InvalidOutputLocator {
            reason: "response carries no artifact locator".to_string(),
            path: None,
        });
    };

    let Some(found) = resolve(locator, priority_keys, allowed_extensions) else {
        return Err(ItemError::InvalidOutputLocator {
            reason: format!(
                "no path with an allowed extension ({}) under keys {:?}",
                allowed_extensions
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                priority_keys
            ),
            path: None,
        });
    };

    let source_path = PathBuf::from(&found);
    if !source_path.is_file() {
        return Err(ItemError::InvalidOutputLocator {
            reason: format!("resolved path {found} does not exist"),
            path: Some(found),
        });
    }

    Ok(ResolvedArtifact { source_path })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::normalize::normalize;
    use serde_json::json;

    fn keys() -> Vec<String> {
        vec!["video".into(), "path".into(), "output".into()]
    }

    fn exts() -> BTreeSet<String> {
        ["mp4", "mov"].iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn plain_string_with_allowed_extension() {
        assert_eq!(
            resolve(&json!("C:/tmp/out.mp4"), &keys(), &exts()).as_deref(),
            Some("C:/tmp/out.mp4")
        );
    }

    #[test]
    fn extension_match_ignores_case() {
        assert_eq!(
            resolve(&json!("/tmp/OUT.MOV"), &keys(), &exts()).as_deref(),
            Some("/tmp/OUT.MOV")
        );
    }

    #[test]
    fn string_with_other_extension_is_none() {
        assert_eq!(resolve(&json!("/tmp/out.wav"), &keys(), &exts()), None);
        assert_eq!(resolve(&json!("/tmp/mp4"), &keys(), &exts()), None);
    }

    #[test]
    fn recurses_through_priority_keys() {
        let value = json!({"output": {"video": {"path": "/tmp/x.mp4"}}});
        assert_eq!(
            resolve(&value, &keys(), &exts()).as_deref(),
            Some("/tmp/x.mp4")
        );
    }

    #[test]
    fn higher_priority_key_wins() {
        let value = json!({
            "output": "/tmp/low.mp4",
            "path": "/tmp/mid.mp4",
            "video": "/tmp/high.mp4",
        });
        assert_eq!(
            resolve(&value, &keys(), &exts()).as_deref(),
            Some("/tmp/high.mp4")
        );
    }

    #[test]
    fn falls_through_to_next_key_when_first_does_not_resolve() {
        let value = json!({"video": {"url": "http://x/y.mp4"}, "path": "/tmp/y.mp4"});
        assert_eq!(
            resolve(&value, &keys(), &exts()).as_deref(),
            Some("/tmp/y.mp4")
        );
    }

    #[test]
    fn key_order_is_a_parameter() {
        let value = json!({"video": "/tmp/a.mp4", "output": "/tmp/b.mp4"});
        let reversed: Vec<String> = vec!["output".into(), "video".into()];
        assert_eq!(
            resolve(&value, &reversed, &exts()).as_deref(),
            Some("/tmp/b.mp4")
        );
    }

    #[test]
    fn unknown_keys_and_sequences_are_not_searched() {
        assert_eq!(resolve(&json!({"result": "/tmp/x.mp4"}), &keys(), &exts()), None);
        assert_eq!(resolve(&json!(["/tmp/x.mp4"]), &keys(), &exts()), None);
        assert_eq!(resolve(&json!({"video": ["/tmp/x.mp4"]}), &keys(), &exts()), None);
    }

    #[test]
    fn default_keys_reach_video_nested_under_result() {
        let defaults = crate::config::BatchConfig::default().locator_keys;
        let normalized = normalize(json!({"result": {"video": "/tmp/x.mp4"}}).into()).unwrap();
        let locator = normalized.artifact_locator.unwrap();
        assert_eq!(
            resolve(&locator, &defaults, &exts()).as_deref(),
            Some("/tmp/x.mp4")
        );
    }

    #[test]
    fn structure_without_matching_path_is_none() {
        let value = json!({"video": {"path": "/tmp/x.txt", "output": 3}, "path": null});
        assert_eq!(resolve(&value, &keys(), &exts()), None);
    }

    #[test]
    fn very_deep_structures_are_cut_off() {
        let mut value = json!("/tmp/deep.mp4");
        for _ in 0..(MAX_DEPTH + 5) {
            value = json!({ "video": value });
        }
        assert_eq!(resolve(&value, &keys(), &exts()), None);
    }

    #[test]
    fn resolve_artifact_requires_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("out.mp4");
        std::fs::write(&file, b"data").unwrap();
        let path = file.to_string_lossy().into_owned();

        let ok = normalize(json!([path, "1s"]).into()).unwrap();
        let artifact = resolve_artifact(&ok, &keys(), &exts()).unwrap();
        assert_eq!(artifact.source_path, file);

        let missing = normalize(json!(["/nowhere/out.mp4"]).into()).unwrap();
        match resolve_artifact(&missing, &keys(), &exts()).unwrap_err() {
            ItemError::InvalidOutputLocator { path, .. } => {
                assert_eq!(path.as_deref(), Some("/nowhere/out.mp4"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolve_artifact_without_match_is_invalid_locator() {
        let result = normalize(json!({"status": "done"}).into()).unwrap();
        let err = resolve_artifact(&result, &keys(), &exts()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOutputLocator);
    }
}
