//! Static tantivy schema derived from an [`EntityDefinition`].
//!
//! The engine's schema is fixed at index creation, so the field universe is
//! enumerated up front: every mapped text field (plus the primary field),
//! and in multilingual mode a per-tag variant of each for every configured
//! language tag. Entity, graph and uid fields are raw single-token fields;
//! the language field is additionally a fast field so "untagged only"
//! queries can be expressed as a must-not-exist clause.

use crate::config::{EntityDefinition, Settings};
use crate::error::{TextError, TextResult};
use std::collections::BTreeMap;
use tantivy::schema::{FAST, Field, STORED, STRING, Schema, TEXT};

/// Resolved field handles for one index.
#[derive(Debug, Clone)]
pub struct FieldSet {
    pub entity: Field,
    pub graph: Option<Field>,
    pub lang: Option<Field>,
    pub uid: Option<Field>,
    text: BTreeMap<String, Field>,
}

impl FieldSet {
    /// Text field by name, including per-tag variants.
    pub fn text_field(&self, name: &str) -> Option<Field> {
        self.text.get(name).copied()
    }

    pub fn require_text_field(&self, name: &str) -> TextResult<Field> {
        self.text_field(name)
            .ok_or_else(|| TextError::UnknownField(name.to_string()))
    }
}

/// All text field names the schema carries, per-tag variants included.
fn text_field_universe(def: &EntityDefinition, settings: &Settings) -> Vec<String> {
    let mut names = Vec::new();
    for base in def.text_field_names() {
        names.push(base.to_string());
        if settings.multilingual {
            for tag in settings.language_tags() {
                names.push(format!("{base}_{tag}"));
            }
        }
    }
    names
}

/// Build a fresh schema plus its resolved field handles.
pub fn build_schema(def: &EntityDefinition, settings: &Settings) -> (Schema, FieldSet) {
    let mut builder = Schema::builder();

    let entity = builder.add_text_field(&def.entity_field, STRING | STORED);
    let graph = def
        .graph_field
        .as_deref()
        .map(|name| builder.add_text_field(name, STRING | STORED));
    let lang = def
        .lang_field
        .as_deref()
        .map(|name| builder.add_text_field(name, STRING | STORED | FAST));
    let uid = def
        .uid_field
        .as_deref()
        .map(|name| builder.add_text_field(name, STRING | STORED));

    let mut text = BTreeMap::new();
    for name in text_field_universe(def, settings) {
        let options = if settings.store_values {
            TEXT | STORED
        } else {
            TEXT
        };
        let field = builder.add_text_field(&name, options);
        text.insert(name, field);
    }

    let schema = builder.build();
    let fields = FieldSet {
        entity,
        graph,
        lang,
        uid,
        text,
    };
    (schema, fields)
}

/// Resolve field handles against an existing schema (reopened index).
pub fn resolve_fields(
    schema: &Schema,
    def: &EntityDefinition,
    settings: &Settings,
) -> TextResult<FieldSet> {
    let lookup = |name: &str| {
        schema
            .get_field(name)
            .map_err(|_| TextError::UnknownField(name.to_string()))
    };

    let entity = lookup(&def.entity_field)?;
    let graph = def.graph_field.as_deref().map(lookup).transpose()?;
    let lang = def.lang_field.as_deref().map(lookup).transpose()?;
    let uid = def.uid_field.as_deref().map(lookup).transpose()?;

    let mut text = BTreeMap::new();
    for name in text_field_universe(def, settings) {
        text.insert(name.clone(), lookup(&name)?);
    }

    Ok(FieldSet {
        entity,
        graph,
        lang,
        uid,
        text,
    })
}
