//! Typed block graph returned by structured-document analysis.
//!
//! Providers return a flat list of blocks linked by relationship edges.
//! Adapters convert the raw payload into these closed variants; anything
//! they do not recognise becomes [`BlockKind::Other`] or
//! [`RelationshipKind::Other`] and is ignored by extraction.

use serde::{Deserialize, Serialize};

/// Role of a block in the graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Key half of a key/value set.
    Key,
    /// Value half of a key/value set.
    Value,
    /// A single recognised word.
    Word { text: String },
    /// Lines, pages, tables, selection marks, ...
    Other,
}

/// Type of a relationship edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// Key → its paired value block.
    Value,
    /// Block → the word blocks it is made of, in reading order.
    Child,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
    pub relationships: Vec<Relationship>,
}

impl Block {
    pub fn key(id: impl Into<String>) -> Self {
        Self::bare(id, BlockKind::Key)
    }

    pub fn value(id: impl Into<String>) -> Self {
        Self::bare(id, BlockKind::Value)
    }

    pub fn word(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::bare(id, BlockKind::Word { text: text.into() })
    }

    fn bare(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            relationships: Vec::new(),
        }
    }

    /// Builder: add an edge.
    pub fn with(mut self, kind: RelationshipKind, ids: &[&str]) -> Self {
        self.relationships.push(Relationship {
            kind,
            ids: ids.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Ids linked by edges of `kind`, in edge order.
    pub fn related(&self, kind: RelationshipKind) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(move |r| r.kind == kind)
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }
}
