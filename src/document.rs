//! Lookups into the loosely structured JSON document a watch page embeds.
//!
//! Nothing about that document's shape is guaranteed, so every navigation in
//! this crate goes through [`nested`] instead of asserting the full path
//! exists.

use serde_json::Value;

/// Walks `keys` down `doc`, object step by object step, and returns the value
/// at the end of the path.
///
/// Returns `None` as soon as a key is missing or the current node is not an
/// object; never panics. Walking a prefix and then the rest yields the same
/// result as walking the whole path at once.
pub fn nested<'a>(doc: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let mut node = doc;
    for key in keys {
        node = node.get(*key)?;
    }
    Some(node)
}
