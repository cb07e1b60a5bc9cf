//! The engine side of the index: document maintenance and the two-phase
//! durability protocol over a tantivy `IndexWriter`.
//!
//! The writer is a single-writer resource. It lives in a slot so that
//! `rollback`, which consumes a tantivy writer, can install the
//! replacement atomically; nothing outside this module may hold a writer
//! reference across calls.

use crate::config::{EntityDefinition, Settings};
use crate::entity::Entity;
use crate::error::{TextError, TextResult};
use crate::index::schema::{FieldSet, build_schema, resolve_fields};
use parking_lot::Mutex;
use std::path::Path;
use tantivy::{Index, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::{debug, trace, warn};

/// Prefix distinguishing datatype URIs from language tags in the stored
/// language field.
pub(crate) const DATATYPE_PREFIX: &str = "^^";

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// A text index over entities extracted from a graph store.
///
/// Owns the single `IndexWriter`; point-in-time readers are opened per
/// query and never cached.
pub struct TextIndex {
    index: Index,
    fields: FieldSet,
    def: EntityDefinition,
    settings: Settings,
    writer: Mutex<Option<IndexWriter>>,
}

impl TextIndex {
    /// Open (or create) an index under `dir`.
    pub fn open(dir: &Path, def: EntityDefinition, settings: Settings) -> TextResult<Self> {
        std::fs::create_dir_all(dir)?;
        let index = if dir.join("meta.json").exists() {
            Index::open_in_dir(dir)?
        } else {
            let (schema, _) = build_schema(&def, &settings);
            Index::create_in_dir(dir, schema)?
        };
        Self::from_index(index, def, settings)
    }

    /// A RAM-backed index, mainly for tests and ephemeral datasets.
    pub fn in_memory(def: EntityDefinition, settings: Settings) -> TextResult<Self> {
        let (schema, _) = build_schema(&def, &settings);
        let index = Index::create_in_ram(schema);
        Self::from_index(index, def, settings)
    }

    fn from_index(index: Index, mut def: EntityDefinition, settings: Settings) -> TextResult<Self> {
        // A multilingual index cannot work without a language field.
        if settings.multilingual && def.lang_field.is_none() {
            def.lang_field = Some("lang".to_string());
        }
        let fields = resolve_fields(&index.schema(), &def, &settings)?;
        let writer = index
            .writer(settings.writer_memory)
            .map_err(|e| TextError::index_op("open_writer", e))?;
        let text_index = Self {
            index,
            fields,
            def,
            settings,
            writer: Mutex::new(Some(writer)),
        };
        // Commit once so querying an empty index works before the first
        // write transaction.
        text_index.commit()?;
        Ok(text_index)
    }

    pub fn definition(&self) -> &EntityDefinition {
        &self.def
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub(crate) fn raw_index(&self) -> &Index {
        &self.index
    }

    fn with_writer<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut IndexWriter) -> tantivy::Result<R>,
    ) -> TextResult<R> {
        let mut slot = self.writer.lock();
        let writer = slot
            .as_mut()
            .ok_or_else(|| TextError::Protocol("index writer is closed".to_string()))?;
        f(writer).map_err(|e| TextError::index_op(operation, e))
    }

    /// Index a new entity.
    pub fn add_entity(&self, entity: &Entity) -> TextResult<()> {
        debug!(entity = %entity, "add entity");
        let doc = self.doc(entity);
        self.with_writer("add_entity", |w| w.add_document(doc).map(|_| ()))
    }

    /// Replace every document for the entity's identifier with a fresh one.
    pub fn update_entity(&self, entity: &Entity) -> TextResult<()> {
        debug!(entity = %entity, "update entity");
        let doc = self.doc(entity);
        let term = Term::from_field_text(self.fields.entity, entity.id());
        self.with_writer("update_entity", |w| {
            w.delete_term(term);
            w.add_document(doc).map(|_| ())
        })
    }

    /// Delete the document previously indexed for this entity's
    /// `field`/`value` pair. Deletion is keyed by the explicit pair, never
    /// reconstructed from the entity's field map. No-op when the index has
    /// no uid field.
    pub fn delete_entity(&self, entity: &Entity, field: &str, value: &str) -> TextResult<()> {
        let Some(uid) = self.fields.uid else {
            return Ok(());
        };
        debug!(entity = %entity, field, "delete entity");
        let term = Term::from_field_text(uid, &entity.checksum(field, value));
        self.with_writer("delete_entity", |w| {
            w.delete_term(term);
            Ok(())
        })
    }

    /// Phase one: flush pending writes to durable-but-not-yet-visible
    /// state. A failure here leaves the transaction fit only for rollback.
    pub fn prepare(&self) -> TextResult<()> {
        self.with_writer("prepare", |w| w.prepare_commit().map(|_prepared| ()))
    }

    /// Phase two: make the prepared state visible to new readers.
    pub fn commit(&self) -> TextResult<()> {
        self.with_writer("commit", |w| w.commit().map(|_| ()))
    }

    /// Discard pending writes. Rolling back consumes the engine's writer,
    /// so a fresh one is installed before returning; the next transaction
    /// always finds a valid writer, even when the rollback itself failed.
    pub fn rollback(&self) -> TextResult<()> {
        let mut slot = self.writer.lock();
        let mut writer = slot
            .take()
            .ok_or_else(|| TextError::Protocol("index writer is closed".to_string()))?;
        match writer.rollback() {
            Ok(_) => {
                trace!("rolled back index writer");
                *slot = Some(writer);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "index rollback failed; reopening writer");
                let fresh = self
                    .index
                    .writer(self.settings.writer_memory)
                    .map_err(|open_err| TextError::index_op("reopen_writer", open_err))?;
                *slot = Some(fresh);
                Err(TextError::index_op("rollback", e))
            }
        }
    }

    /// Drop the writer. Safe after commit or rollback; never reopens.
    pub fn close(&self) {
        let _ = self.writer.lock().take();
    }

    /// Point-in-time view of the durably committed state. Private to one
    /// query call; dropped before the call returns.
    pub(crate) fn searcher(&self) -> TextResult<Searcher> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(reader.searcher())
    }

    fn doc(&self, entity: &Entity) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(self.fields.entity, entity.id());
        if let (Some(field), Some(graph)) = (self.fields.graph, entity.graph()) {
            doc.add_text(field, graph);
        }

        for (name, value) in entity.fields() {
            let Some(field) = self.fields.text_field(name) else {
                warn!(field = %name, "entity field not in index schema, skipping");
                continue;
            };
            doc.add_text(field, value);

            if let Some(lang_field) = self.fields.lang {
                match entity.lang() {
                    Some(lang) if !lang.is_empty() => {
                        doc.add_text(lang_field, lang);
                        if self.settings.multilingual {
                            self.add_tagged(&mut doc, name, lang, value);
                            if let Some(aux) = self.settings.aux_indexes.get(lang) {
                                for tag in aux {
                                    self.add_tagged(&mut doc, name, tag, value);
                                }
                            }
                        }
                    }
                    _ => {
                        // Non-string datatypes are recorded in the language
                        // field behind a marker prefix.
                        if let Some(datatype) = entity.datatype() {
                            if datatype != XSD_STRING {
                                doc.add_text(lang_field, format!("{DATATYPE_PREFIX}{datatype}"));
                            }
                        }
                    }
                }
            }

            if let Some(uid) = self.fields.uid {
                doc.add_text(uid, entity.checksum(name, value));
            }
        }
        doc
    }

    fn add_tagged(&self, doc: &mut TantivyDocument, base: &str, tag: &str, value: &str) {
        let name = format!("{base}_{tag}");
        match self.fields.text_field(&name) {
            Some(field) => doc.add_text(field, value),
            None => warn!(field = %name, "language tag has no configured field, skipping"),
        }
    }
}
