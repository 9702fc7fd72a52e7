//! Field extraction from a document block graph.
//!
//! 1. Index every block by id.
//! 2. Partition key/value-set blocks into key and value buckets.
//! 3. For each key, follow its `Value` edge to the paired value block.
//! 4. Text for both halves is the concatenation of their `Child` word
//!    blocks, in edge order.
//!
//! Malformed or partial graphs degrade to fewer fields and never fail:
//! keys without a resolvable value, dangling ids and empty keys are
//! dropped.

use crate::blocks::{Block, BlockKind, RelationshipKind};
use std::collections::{BTreeMap, HashMap};

/// Flat field-name → field-text map.
pub type FieldMap = BTreeMap<String, String>;

/// Extract normalised key/value fields from a block graph.
pub fn extract_fields(blocks: &[Block]) -> FieldMap {
    let by_id: HashMap<&str, &Block> = blocks.iter().map(|b| (b.id.as_str(), b)).collect();

    let mut keys = Vec::new();
    let mut values: HashMap<&str, &Block> = HashMap::new();
    for block in blocks {
        match block.kind {
            BlockKind::Key => keys.push(block),
            BlockKind::Value => {
                values.insert(block.id.as_str(), block);
            }
            BlockKind::Word { .. } | BlockKind::Other => {}
        }
    }

    let mut fields = FieldMap::new();
    for key in keys {
        let Some(value) = key
            .related(RelationshipKind::Value)
            .find_map(|id| values.get(id).copied())
        else {
            tracing::trace!(key = %key.id, "key block without resolvable value dropped");
            continue;
        };

        let name = normalize_key(&block_text(key, &by_id));
        if name.is_empty() {
            continue;
        }
        let text = normalize_text(&block_text(value, &by_id));
        // Later duplicates overwrite earlier ones.
        fields.insert(name, text);
    }
    fields
}

/// Concatenate the text of a block's child words in edge order.
fn block_text(block: &Block, by_id: &HashMap<&str, &Block>) -> String {
    let words: Vec<&str> = block
        .related(RelationshipKind::Child)
        .filter_map(|id| by_id.get(id))
        .filter_map(|child| match &child.kind {
            BlockKind::Word { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    words.join(" ")
}

/// Collapse whitespace runs and trim.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`normalize_text`] plus dropping a trailing colon ("Name:" → "Name").
pub fn normalize_key(raw: &str) -> String {
    let text = normalize_text(raw);
    text.trim_end_matches(':').trim_end().to_string()
}
