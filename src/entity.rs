//! Searchable entity records extracted from the primary store.
//!
//! An [`Entity`] is the unit handed to the index for one subject/graph
//! pair: an identifier, its owning graph, an optional language tag or
//! datatype for the literal being indexed, and the field values to index.
//! Entities live for one update batch and are not retained afterwards.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// A record of searchable fields for one subject in one graph.
///
/// Identifier and graph are fixed at construction; only the field map may
/// be filled in afterwards, by whatever extracts entities from store
/// updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    id: String,
    graph: Option<String>,
    lang: Option<String>,
    datatype: Option<String>,
    fields: BTreeMap<String, String>,
}

impl Entity {
    /// New entity for `id` in `graph` (`None` means the default graph).
    pub fn new(id: impl Into<String>, graph: Option<&str>) -> Self {
        Self {
            id: id.into(),
            graph: graph.map(str::to_owned),
            lang: None,
            datatype: None,
            fields: BTreeMap::new(),
        }
    }

    /// Tag the indexed literal with a language.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Record the literal's datatype URI (for non-string literals).
    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    /// Add one field value to index.
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn graph(&self) -> Option<&str> {
        self.graph.as_deref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Dedup key for one field/value pair of this entity: hex SHA-256 over
    /// graph, id, field and value. Stored in the uid field so deletions can
    /// target exactly one indexed document.
    pub fn checksum(&self, field: &str, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.graph.as_deref().unwrap_or(""));
        hasher.update(b"-");
        hasher.update(&self.id);
        hasher.update(b"-");
        hasher.update(field);
        hasher.update(b"-");
        hasher.update(value);
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {:?}", self.id, self.fields)
    }
}
