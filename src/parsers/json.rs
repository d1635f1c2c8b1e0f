//! Bounded search for transcript-like strings in nested documents.
//!
//! The walk runs over [`Node`], a neutral tree of maps, lists and scalars, so
//! it does not depend on the decoder that produced the document.

use serde_json::Value;

/// Maximum nesting depth the search descends into.
pub const MAX_SEARCH_DEPTH: usize = 10;

/// Minimum length, in characters, of a string the search will return.
pub const MIN_TRANSCRIPT_CHARS: usize = 100;

/// Keys checked on each map, in priority order.
pub const TRANSCRIPT_KEYS: &[&str] = &["transcript", "captions", "subtitles", "text", "content"];

/// Neutral structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Map(Vec<(String, Node)>),
    List(Vec<Node>),
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Node {
    fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Node::Map(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect()),
            Value::Array(items) => Node::List(items.into_iter().map(Node::from).collect()),
            Value::String(s) => Node::Text(s),
            Value::Number(n) => Node::Number(n.as_f64().unwrap_or_default()),
            Value::Bool(b) => Node::Bool(b),
            Value::Null => Node::Null,
        }
    }
}

/// Depth-first search for the first long string stored under a
/// transcript-like key. Map entries are visited in document order.
pub fn find_transcript_text(node: &Node) -> Option<&str> {
    search(node, 0)
}

fn search(node: &Node, depth: usize) -> Option<&str> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }

    match node {
        Node::Map(entries) => {
            for key in TRANSCRIPT_KEYS {
                if let Some(Node::Text(text)) = node.get(key) {
                    if text.chars().count() >= MIN_TRANSCRIPT_CHARS {
                        return Some(text.as_str());
                    }
                }
            }
            entries.iter().find_map(|(_, child)| search(child, depth + 1))
        }
        Node::List(items) => items.iter().find_map(|item| search(item, depth + 1)),
        _ => None,
    }
}
