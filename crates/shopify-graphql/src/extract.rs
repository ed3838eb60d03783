//! Pattern walk over a decoded response tree.

use serde_json::Value;

use crate::path::{PathPattern, Segment};

/// One matched node. `None` marks a branch whose data was missing.
pub type Match<'a> = Option<&'a Value>;

/// Walk `tree` along `pattern` and collect every match in document order.
///
/// The walk never fails. A key that is absent, or a key applied to a
/// non-object, yields a missing match for that branch. A wildcard expands
/// every array element or object value; a wildcard over missing data or
/// `null` contributes nothing, while a wildcard over any other scalar yields
/// a single missing match.
#[must_use]
pub fn extract<'a>(tree: &'a Value, pattern: &PathPattern) -> Vec<Match<'a>> {
    let mut out = Vec::new();
    walk(Some(tree), pattern.segments(), &mut out);
    out
}

fn walk<'a>(node: Match<'a>, segments: &[Segment], out: &mut Vec<Match<'a>>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(node);
        return;
    };

    match segment {
        Segment::Key(key) => {
            let next = match node {
                Some(Value::Object(map)) => map.get(key),
                _ => None,
            };
            walk(next, rest, out);
        }
        Segment::Wildcard => match node {
            Some(Value::Array(items)) => {
                for item in items {
                    walk(Some(item), rest, out);
                }
            }
            Some(Value::Object(map)) => {
                for value in map.values() {
                    walk(Some(value), rest, out);
                }
            }
            None | Some(Value::Null) => {}
            Some(_) => out.push(None),
        },
    }
}
