//! Index configuration: runtime settings and the entity-to-document
//! mapping.
//!
//! Both structs derive serde so an outer configuration layer can load them
//! from whatever format it likes; this crate itself performs no file or
//! environment handling.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Runtime settings for one text index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Store field values so hits can carry the original literal back out.
    #[serde(default = "default_true")]
    pub store_values: bool,

    /// Maintain per-language-tag variants of every text field and honor
    /// language-scoped queries against them.
    #[serde(default)]
    pub multilingual: bool,

    /// Language tags that get per-tag fields in multilingual mode. The
    /// schema is fixed at index creation, so every tag that entities may
    /// carry must be listed here.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Language tag -> auxiliary tags indexed alongside it.
    #[serde(default)]
    pub aux_indexes: BTreeMap<String, Vec<String>>,

    /// Language tag -> tags a query for that tag fans out over.
    #[serde(default)]
    pub search_for: BTreeMap<String, Vec<String>>,

    /// Result cap applied when a request gives no limit.
    #[serde(default = "default_max_hits")]
    pub max_hits: usize,

    /// Heap budget for the index writer, in bytes.
    #[serde(default = "default_writer_memory")]
    pub writer_memory: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_values: true,
            multilingual: false,
            languages: Vec::new(),
            aux_indexes: BTreeMap::new(),
            search_for: BTreeMap::new(),
            max_hits: default_max_hits(),
            writer_memory: default_writer_memory(),
        }
    }
}

impl Settings {
    /// Tags a query with this language fans out over, empty when search-for
    /// expansion does not apply.
    pub fn search_for_tags(&self, lang: Option<&str>) -> &[String] {
        if !self.multilingual {
            return &[];
        }
        lang.and_then(|l| self.search_for.get(l))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every language tag the schema needs a per-tag field variant for.
    pub fn language_tags(&self) -> BTreeSet<&str> {
        let mut tags: BTreeSet<&str> = self.languages.iter().map(String::as_str).collect();
        for aux in self.aux_indexes.values() {
            tags.extend(aux.iter().map(String::as_str));
        }
        for fanout in self.search_for.values() {
            tags.extend(fanout.iter().map(String::as_str));
        }
        tags
    }
}

fn default_true() -> bool {
    true
}

fn default_max_hits() -> usize {
    10_000
}

fn default_writer_memory() -> usize {
    50_000_000
}

/// Maps entities onto index documents: which fields exist and which
/// predicate feeds which field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Field holding the entity identifier (raw, stored).
    #[serde(default = "default_entity_field")]
    pub entity_field: String,

    /// Field holding the owning graph, if graph scoping is wanted.
    #[serde(default = "default_graph_field")]
    pub graph_field: Option<String>,

    /// Field holding the language tag or datatype marker. Required for
    /// multilingual indexes and for literal round-tripping.
    #[serde(default = "default_lang_field")]
    pub lang_field: Option<String>,

    /// Field holding the per-document dedup checksum; deletion is disabled
    /// without it.
    #[serde(default = "default_uid_field")]
    pub uid_field: Option<String>,

    /// Field searched when a query names no predicate.
    #[serde(default = "default_primary_field")]
    pub primary_field: String,

    /// Predicate URI -> index field.
    #[serde(default)]
    pub field_map: BTreeMap<String, String>,
}

impl Default for EntityDefinition {
    fn default() -> Self {
        Self {
            entity_field: default_entity_field(),
            graph_field: default_graph_field(),
            lang_field: default_lang_field(),
            uid_field: default_uid_field(),
            primary_field: default_primary_field(),
            field_map: BTreeMap::new(),
        }
    }
}

impl EntityDefinition {
    /// Map a predicate onto an index field.
    pub fn map_predicate(&mut self, predicate: impl Into<String>, field: impl Into<String>) {
        self.field_map.insert(predicate.into(), field.into());
    }

    /// Index field for a predicate, if one is mapped.
    pub fn field_for(&self, predicate: &str) -> Option<&str> {
        self.field_map.get(predicate).map(String::as_str)
    }

    /// All base text field names (mapped fields plus the primary field).
    pub fn text_field_names(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.field_map.values().map(String::as_str).collect();
        names.insert(self.primary_field.as_str());
        names
    }
}

fn default_entity_field() -> String {
    "uri".to_string()
}

fn default_graph_field() -> Option<String> {
    Some("graph".to_string())
}

fn default_lang_field() -> Option<String> {
    Some("lang".to_string())
}

fn default_uid_field() -> Option<String> {
    Some("uid".to_string())
}

fn default_primary_field() -> String {
    "text".to_string()
}
