//! updater::transform
//!
//! Content transforms applied between reading and writing a file.
//!
//! # Design
//!
//! A transform is a single-method capability: raw bytes in, new bytes out,
//! or a [`TransformError`]. Any `Fn(&[u8]) -> Result<Vec<u8>, TransformError>`
//! is a [`ContentUpdater`], so callers can pass closures directly.
//!
//! Transforms must not touch the remote. A failing transform aborts the
//! update before anything is written.
//!
//! # Example
//!
//! ```
//! use repobump::updater::transform::{update_yaml, ContentUpdater};
//!
//! let bump = update_yaml("image.tag", "v2");
//! let out = bump.update(b"image:\n  tag: v1\n").unwrap();
//! assert_eq!(out, b"image:\n  tag: v2\n");
//! ```

use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors from content transforms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Input is not valid YAML.
    #[error("failed to parse YAML: {0}")]
    Parse(String),

    /// An intermediate node on the key path is not a mapping.
    #[error("cannot set '{key}': '{segment}' is not a mapping")]
    KeyPath { key: String, segment: String },

    /// The key path is empty or has an empty segment.
    #[error("invalid key path '{0}'")]
    InvalidKey(String),

    /// The updated document could not be serialized.
    #[error("failed to serialize YAML: {0}")]
    Serialize(String),

    /// A caller-supplied transform rejected its input.
    #[error("{0}")]
    Rejected(String),
}

/// Transforms the current content of a file into its replacement.
pub trait ContentUpdater: Send + Sync {
    /// Produce the new content from the current content.
    fn update(&self, current: &[u8]) -> Result<Vec<u8>, TransformError>;
}

impl<F> ContentUpdater for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, TransformError> + Send + Sync,
{
    fn update(&self, current: &[u8]) -> Result<Vec<u8>, TransformError> {
        self(current)
    }
}

/// Replace the whole file with `body`, ignoring the current content.
pub fn replace_contents(body: impl Into<Vec<u8>>) -> impl ContentUpdater + 'static {
    replacer(body.into())
}

fn replacer(body: Vec<u8>) -> impl ContentUpdater + 'static {
    move |_: &[u8]| -> Result<Vec<u8>, TransformError> { Ok(body.clone()) }
}

/// Set the value at a dotted key path (`"spec.image.tag"`) in a YAML document.
///
/// Missing intermediate mappings are created. Formatting and comments of the
/// input are not preserved.
///
/// The returned updater owns its arguments, so it can be boxed even when
/// `key` and `value` were borrowed.
pub fn update_yaml(
    key: impl Into<String>,
    value: impl Into<Value>,
) -> impl ContentUpdater + 'static {
    yaml_setter(key.into(), value.into())
}

fn yaml_setter(key: String, value: Value) -> impl ContentUpdater + 'static {
    move |current: &[u8]| -> Result<Vec<u8>, TransformError> {
        let mut doc: Value = if current.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_yaml::from_slice(current).map_err(|e| TransformError::Parse(e.to_string()))?
        };
        set_path(&mut doc, &key, value.clone())?;
        serde_yaml::to_string(&doc)
            .map(String::into_bytes)
            .map_err(|e| TransformError::Serialize(e.to_string()))
    }
}

fn set_path(root: &mut Value, key: &str, value: Value) -> Result<(), TransformError> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(TransformError::InvalidKey(key.to_string()));
    }
    let Some((last, parents)) = segments.split_last() else {
        return Err(TransformError::InvalidKey(key.to_string()));
    };

    let mut node = root;
    for (depth, segment) in parents.iter().enumerate() {
        let map = mapping_at(node, key, &segments[..depth])?;
        if !map.contains_key(*segment) {
            map.insert(Value::String(segment.to_string()), Value::Mapping(Mapping::new()));
        }
        node = map
            .get_mut(*segment)
            .ok_or_else(|| TransformError::InvalidKey(key.to_string()))?;
    }

    mapping_at(node, key, parents)?.insert(Value::String(last.to_string()), value);
    Ok(())
}

/// View `node` as a mapping, turning null into an empty one.
fn mapping_at<'a>(
    node: &'a mut Value,
    key: &str,
    path: &[&str],
) -> Result<&'a mut Mapping, TransformError> {
    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    node.as_mapping_mut().ok_or_else(|| TransformError::KeyPath {
        key: key.to_string(),
        segment: if path.is_empty() {
            "<root>".to_string()
        } else {
            path.join(".")
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_ignores_input() {
        let t = replace_contents("new content");
        assert_eq!(t.update(b"old").unwrap(), b"new content");
        assert_eq!(t.update(b"").unwrap(), b"new content");
    }

    #[test]
    fn yaml_updates_nested_key() {
        let t = update_yaml("input.value", "new");
        let out = t.update(b"input:\n  value: test\n").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "input:\n  value: new\n");
    }

    #[test]
    fn yaml_keeps_sibling_keys() {
        let t = update_yaml("image.tag", "v2");
        let out = t
            .update(b"image:\n  repository: app\n  tag: v1\nreplicas: 3\n")
            .unwrap();
        let doc: Value = serde_yaml::from_slice(&out).unwrap();
        assert_eq!(doc["image"]["repository"], Value::from("app"));
        assert_eq!(doc["image"]["tag"], Value::from("v2"));
        assert_eq!(doc["replicas"].as_u64(), Some(3));
    }

    #[test]
    fn yaml_creates_missing_intermediates() {
        let t = update_yaml("a.b.c", 1);
        let out = t.update(b"other: true\n").unwrap();
        let doc: Value = serde_yaml::from_slice(&out).unwrap();
        assert_eq!(doc["a"]["b"]["c"].as_u64(), Some(1));
        assert_eq!(doc["other"], Value::from(true));
    }

    #[test]
    fn yaml_empty_document() {
        let t = update_yaml("key", "value");
        let out = t.update(b"").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "key: value\n");
    }

    #[test]
    fn yaml_scalar_intermediate_fails() {
        let t = update_yaml("image.tag.name", "v2");
        let err = t.update(b"image:\n  tag: v1\n").unwrap_err();
        assert_eq!(
            err,
            TransformError::KeyPath {
                key: "image.tag.name".into(),
                segment: "image.tag".into(),
            }
        );
    }

    #[test]
    fn yaml_scalar_root_fails() {
        let err = update_yaml("a", 1).update(b"just a string\n").unwrap_err();
        assert!(matches!(err, TransformError::KeyPath { ref segment, .. } if segment == "<root>"));
    }

    #[test]
    fn yaml_rejects_bad_keys() {
        for key in ["", "a..b", ".a", "a."] {
            let err = update_yaml(key, 1).update(b"a: 1\n").unwrap_err();
            assert_eq!(err, TransformError::InvalidKey(key.to_string()), "key {key:?}");
        }
    }

    #[test]
    fn yaml_parse_error() {
        let err = update_yaml("a", 1).update(b"a: [unclosed\n").unwrap_err();
        assert!(matches!(err, TransformError::Parse(_)));
    }

    #[test]
    fn borrowed_arguments_can_be_boxed() {
        fn boxed(key: &str, value: &str) -> Box<dyn ContentUpdater> {
            Box::new(update_yaml(key, value))
        }

        let updater = {
            let key = String::from("image.tag");
            boxed(&key, "v3")
        };
        let out = updater.update(b"image:\n  tag: v2\n").unwrap();
        let doc: Value = serde_yaml::from_slice(&out).unwrap();
        assert_eq!(doc["image"]["tag"].as_str(), Some("v3"));
    }

    #[test]
    fn closures_are_updaters() {
        let upper = |b: &[u8]| -> Result<Vec<u8>, TransformError> { Ok(b.to_ascii_uppercase()) };
        assert_eq!(upper.update(b"abc").unwrap(), b"ABC");

        let reject = |_: &[u8]| -> Result<Vec<u8>, TransformError> {
            Err(TransformError::Rejected("nope".into()))
        };
        assert_eq!(reject.update(b"abc").unwrap_err().to_string(), "nope");
    }
}
