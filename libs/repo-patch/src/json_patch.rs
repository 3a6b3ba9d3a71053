//! JSON Patch (RFC 6902) over `serde_json::Value`.
//!
//! Operations apply in document order to a copy of the input; the first failing operation
//! aborts the patch and the input stays untouched.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonPatchError {
    #[error("invalid JSON pointer '{0}'")]
    InvalidPointer(String),

    #[error("path '{0}' does not exist")]
    PathNotFound(String),

    #[error("invalid array index in '{0}'")]
    InvalidIndex(String),

    #[error("test failed at '{0}'")]
    TestFailed(String),

    #[error("cannot move '{from}' into its own child '{path}'")]
    MoveIntoChild { from: String, path: String },

    #[error("cannot remove the document root")]
    RemoveRoot,
}

/// One patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", deny_unknown_fields)]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

/// A JSON Patch document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOperation>);

impl Patch {
    #[must_use]
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self(operations)
    }

    #[must_use]
    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies the patch to a copy of `document`.
    ///
    /// # Errors
    ///
    /// Returns the [`JsonPatchError`] of the first operation that fails.
    pub fn apply(&self, document: &Value) -> Result<Value, JsonPatchError> {
        let mut doc = document.clone();
        for op in &self.0 {
            apply_operation(&mut doc, op)?;
        }
        Ok(doc)
    }
}

impl From<Vec<PatchOperation>> for Patch {
    fn from(operations: Vec<PatchOperation>) -> Self {
        Self(operations)
    }
}

fn apply_operation(doc: &mut Value, op: &PatchOperation) -> Result<(), JsonPatchError> {
    match op {
        PatchOperation::Add { path, value } => add(doc, path, value.clone()),
        PatchOperation::Remove { path } => remove(doc, path).map(drop),
        PatchOperation::Replace { path, value } => replace(doc, path, value.clone()),
        PatchOperation::Move { from, path } => {
            if from == path {
                return get(doc, from).map(drop);
            }
            if path.starts_with(from.as_str()) && path[from.len()..].starts_with('/') {
                return Err(JsonPatchError::MoveIntoChild {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOperation::Copy { from, path } => {
            let value = get(doc, from)?.clone();
            add(doc, path, value)
        }
        PatchOperation::Test { path, value } => {
            if json_equal(get(doc, path)?, value) {
                Ok(())
            } else {
                Err(JsonPatchError::TestFailed(path.clone()))
            }
        }
    }
}

/// Structural equality where numbers compare by value, so `1` equals `1.0`.
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b) == Some(Ordering::Equal),
        _ => false,
    }
}

/// Splits a pointer into unescaped reference tokens. `""` is the root.
fn parse_pointer(pointer: &str) -> Result<Vec<String>, JsonPatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(JsonPatchError::InvalidPointer(pointer.to_owned()));
    };
    rest.split('/')
        .map(|token| {
            unescape(token).ok_or_else(|| JsonPatchError::InvalidPointer(pointer.to_owned()))
        })
        .collect()
}

fn unescape(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Array index per RFC 6901: decimal, no leading zeros.
fn parse_index(token: &str, pointer: &str) -> Result<usize, JsonPatchError> {
    let well_formed = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !well_formed {
        return Err(JsonPatchError::InvalidIndex(pointer.to_owned()));
    }
    token
        .parse()
        .map_err(|_| JsonPatchError::InvalidIndex(pointer.to_owned()))
}

fn get<'a>(doc: &'a Value, pointer: &str) -> Result<&'a Value, JsonPatchError> {
    parse_pointer(pointer)?;
    doc.pointer(pointer)
        .ok_or_else(|| JsonPatchError::PathNotFound(pointer.to_owned()))
}

/// The container holding the target of a non-root `pointer`, plus the unescaped last token.
fn parent_mut<'a>(
    doc: &'a mut Value,
    pointer: &str,
) -> Result<(&'a mut Value, String), JsonPatchError> {
    let last = parse_pointer(pointer)?
        .pop()
        .ok_or_else(|| JsonPatchError::InvalidPointer(pointer.to_owned()))?;
    let parent_pointer = pointer.rfind('/').map_or("", |i| &pointer[..i]);
    let parent = doc
        .pointer_mut(parent_pointer)
        .ok_or_else(|| JsonPatchError::PathNotFound(pointer.to_owned()))?;
    Ok((parent, last))
}

fn add(doc: &mut Value, pointer: &str, value: Value) -> Result<(), JsonPatchError> {
    if pointer.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, last) = parent_mut(doc, pointer)?;
    match parent {
        Value::Object(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = if last == "-" {
                items.len()
            } else {
                parse_index(&last, pointer)?
            };
            if index > items.len() {
                return Err(JsonPatchError::InvalidIndex(pointer.to_owned()));
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(JsonPatchError::PathNotFound(pointer.to_owned())),
    }
}

fn remove(doc: &mut Value, pointer: &str) -> Result<Value, JsonPatchError> {
    if pointer.is_empty() {
        return Err(JsonPatchError::RemoveRoot);
    }
    let (parent, last) = parent_mut(doc, pointer)?;
    match parent {
        Value::Object(map) => map
            .remove(&last)
            .ok_or_else(|| JsonPatchError::PathNotFound(pointer.to_owned())),
        Value::Array(items) => {
            let index = parse_index(&last, pointer)?;
            if index >= items.len() {
                return Err(JsonPatchError::PathNotFound(pointer.to_owned()));
            }
            Ok(items.remove(index))
        }
        _ => Err(JsonPatchError::PathNotFound(pointer.to_owned())),
    }
}

fn replace(doc: &mut Value, pointer: &str, value: Value) -> Result<(), JsonPatchError> {
    if pointer.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, last) = parent_mut(doc, pointer)?;
    let target = match parent {
        Value::Object(map) => map.get_mut(&last),
        Value::Array(items) => items.get_mut(parse_index(&last, pointer)?),
        _ => None,
    }
    .ok_or_else(|| JsonPatchError::PathNotFound(pointer.to_owned()))?;
    *target = value;
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;

    fn patch(ops: Value) -> Patch {
        serde_json::from_value(ops).unwrap()
    }

    #[test]
    fn empty_patch_is_identity() {
        let doc = json!({"a": [1, 2], "b": {"c": null}});
        assert_eq!(Patch::default().apply(&doc).unwrap(), doc);
    }

    #[test]
    fn add_to_object_and_array() {
        let doc = json!({"list": [1, 3]});
        let out = patch(json!([
            {"op": "add", "path": "/list/1", "value": 2},
            {"op": "add", "path": "/list/-", "value": 4},
            {"op": "add", "path": "/name", "value": "x"}
        ]))
        .apply(&doc)
        .unwrap();
        assert_eq!(out, json!({"list": [1, 2, 3, 4], "name": "x"}));
    }

    #[test]
    fn remove_and_replace() {
        let doc = json!({"a": 1, "b": [1, 2, 3]});
        let out = patch(json!([
            {"op": "remove", "path": "/a"},
            {"op": "replace", "path": "/b/0", "value": 9},
            {"op": "remove", "path": "/b/2"}
        ]))
        .apply(&doc)
        .unwrap();
        assert_eq!(out, json!({"b": [9, 2]}));
    }

    #[test]
    fn replace_requires_existing_target() {
        let err = patch(json!([{"op": "replace", "path": "/missing", "value": 1}]))
            .apply(&json!({}))
            .unwrap_err();
        assert_eq!(err, JsonPatchError::PathNotFound("/missing".to_owned()));
    }

    #[test]
    fn move_and_copy() {
        let doc = json!({"a": {"b": 1}, "c": []});
        let out = patch(json!([
            {"op": "copy", "from": "/a/b", "path": "/c/0"},
            {"op": "move", "from": "/a", "path": "/d"}
        ]))
        .apply(&doc)
        .unwrap();
        assert_eq!(out, json!({"c": [1], "d": {"b": 1}}));
    }

    #[test]
    fn move_into_own_child_fails() {
        let err = patch(json!([{"op": "move", "from": "/a", "path": "/a/b"}]))
            .apply(&json!({"a": {}}))
            .unwrap_err();
        assert!(matches!(err, JsonPatchError::MoveIntoChild { .. }));
    }

    #[test]
    fn failed_test_aborts_whole_patch() {
        let doc = json!({"a": 1});
        let err = patch(json!([
            {"op": "replace", "path": "/a", "value": 2},
            {"op": "test", "path": "/a", "value": 1}
        ]))
        .apply(&doc)
        .unwrap_err();
        assert_eq!(err, JsonPatchError::TestFailed("/a".to_owned()));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_compares_numbers_by_value() {
        let doc = json!({"n": 1, "nested": [2, {"k": 3.0}]});
        let out = patch(json!([
            {"op": "test", "path": "/n", "value": 1.0},
            {"op": "test", "path": "/nested", "value": [2.0, {"k": 3}]}
        ]))
        .apply(&doc);
        assert_eq!(out.unwrap(), doc);

        let err = patch(json!([{"op": "test", "path": "/n", "value": 1.5}]))
            .apply(&doc)
            .unwrap_err();
        assert_eq!(err, JsonPatchError::TestFailed("/n".to_owned()));
    }

    #[test]
    fn pointer_escapes() {
        let doc = json!({"a/b": 1, "m~n": 2});
        let out = patch(json!([
            {"op": "test", "path": "/a~1b", "value": 1},
            {"op": "replace", "path": "/m~0n", "value": 3}
        ]))
        .apply(&doc)
        .unwrap();
        assert_eq!(out, json!({"a/b": 1, "m~n": 3}));

        let err = patch(json!([{"op": "remove", "path": "/a~2"}]))
            .apply(&doc)
            .unwrap_err();
        assert!(matches!(err, JsonPatchError::InvalidPointer(_)));
    }

    #[test]
    fn array_indices_are_strict() {
        let doc = json!({"l": [1, 2]});
        for path in ["/l/01", "/l/-1", "/l/x", "/l/3"] {
            assert!(
                patch(json!([{"op": "add", "path": path, "value": 0}]))
                    .apply(&doc)
                    .is_err(),
                "{path}"
            );
        }
    }

    #[test]
    fn root_operations() {
        let out = patch(json!([{"op": "replace", "path": "", "value": [1]}]))
            .apply(&json!({}))
            .unwrap();
        assert_eq!(out, json!([1]));
        assert_eq!(
            patch(json!([{"op": "remove", "path": ""}]))
                .apply(&json!({}))
                .unwrap_err(),
            JsonPatchError::RemoveRoot
        );
    }

    #[test]
    fn unknown_operation_does_not_deserialize() {
        assert!(
            serde_json::from_value::<Patch>(json!([{"op": "merge", "path": "/a"}])).is_err()
        );
    }
}
