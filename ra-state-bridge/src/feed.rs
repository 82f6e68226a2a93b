//! XML feed normalizer.
//!
//! The upstream status page publishes a flat XML document: every direct child
//! of the root is either a plain value (`<telescope>Mt Pleasant 26m</telescope>`)
//! or one entry of a keyed group (`<coord id="az">90.0</coord>`). Elements that
//! also carry a `class` attribute are flagged by the site as abnormal and end up
//! in the warning set.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::error::{BridgeError, Result};

/// Tag stored as a plain value even though it looks like a key.
pub const ID_TAG: &str = "id";

/// Reserved key holding the warning set in the serialized tree.
pub const WARNINGS_KEY: &str = "warnings";

/// One top-level entry of the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeedEntry {
    Text(String),
    Group(IndexMap<String, String>),
}

/// The feed after normalization, in document order.
///
/// Serializes as one JSON object: every tag, plus `warnings` when at least one
/// element was flagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawFeedTree {
    #[serde(flatten)]
    entries: IndexMap<String, FeedEntry>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    warnings: IndexMap<String, String>,
}

impl RawFeedTree {
    /// Parse raw feed bytes.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let xml = std::str::from_utf8(raw)?;
        let doc = roxmltree::Document::parse(xml)?;

        let mut tree = Self::default();
        for child in doc.root_element().children().filter(|n| n.is_element()) {
            tree.absorb(&child);
        }

        debug!(
            entries = tree.entries.len(),
            warnings = tree.warnings.len(),
            "Feed normalized"
        );
        Ok(tree)
    }

    fn absorb(&mut self, node: &roxmltree::Node) {
        let tag = node.tag_name().name();
        let text = element_text(node);

        if tag == ID_TAG {
            self.entries.insert(tag.to_string(), FeedEntry::Text(text));
        } else if let Some(id) = node.attribute("id") {
            if tag == WARNINGS_KEY {
                self.warnings.insert(id.to_string(), text);
                return;
            }
            if node.attribute("class").is_some() {
                self.warnings.insert(id.to_string(), text.clone());
            }
            self.insert_field(tag, id.to_string(), text);
        } else if tag == WARNINGS_KEY {
            debug!("Ignoring unkeyed <warnings> element");
        } else if text.is_empty() && node.attributes().next().is_some() {
            for attr in node.attributes() {
                self.insert_field(tag, attr.name().to_string(), attr.value().trim().to_string());
            }
        } else {
            self.entries.insert(tag.to_string(), FeedEntry::Text(text));
        }
    }

    /// Store `tag.key`, creating the group on first use. A scalar already
    /// stored under the same tag is replaced.
    fn insert_field(&mut self, tag: &str, key: String, value: String) {
        let entry = self
            .entries
            .entry(tag.to_string())
            .or_insert_with(|| FeedEntry::Group(IndexMap::new()));
        match *entry {
            FeedEntry::Group(ref mut group) => {
                group.insert(key, value);
            }
            FeedEntry::Text(_) => {
                *entry = FeedEntry::Group(IndexMap::from([(key, value)]));
            }
        }
    }

    pub fn get(&self, tag: &str) -> Option<&FeedEntry> {
        self.entries.get(tag)
    }

    pub fn group(&self, tag: &str) -> Option<&IndexMap<String, String>> {
        match self.entries.get(tag) {
            Some(FeedEntry::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Plain value stored under `tag`.
    pub fn text(&self, tag: &str) -> Result<&str> {
        match self.entries.get(tag) {
            Some(FeedEntry::Text(text)) => Ok(text),
            _ => Err(BridgeError::missing(tag)),
        }
    }

    /// Value stored under `tag.key`.
    pub fn field(&self, tag: &str, key: &str) -> Result<&str> {
        self.group(tag)
            .and_then(|group| group.get(key))
            .map(String::as_str)
            .ok_or_else(|| BridgeError::missing(format!("{tag}.{key}")))
    }

    /// Flagged elements, keyed by element id.
    pub fn warnings(&self) -> &IndexMap<String, String> {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeedEntry)> {
        self.entries.iter().map(|(tag, entry)| (tag.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All direct text of an element, trimmed. Comments and processing
/// instructions between text runs are dropped.
fn element_text(node: &roxmltree::Node) -> String {
    let text: String = node
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    text.trim().to_string()
}
