//! Query construction and execution.
//!
//! A [`QueryRequest`] is turned into an executable engine query in three
//! steps: resolve the target field from the predicate, build the text
//! clause (with search-for fan-out or a per-tag field in multilingual
//! mode), then conjoin language and graph constraints. Execution opens a
//! point-in-time reader over the committed state, runs the query, and maps
//! every scored document to a [`SearchHit`]; the reader never outlives the
//! call.

use crate::error::{TextError, TextResult};
use crate::index::highlight::HighlightOpts;
use crate::index::writer::{DATATYPE_PREFIX, TextIndex};
use std::collections::BTreeMap;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, ExistsQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::snippet::SnippetGenerator;
use tantivy::{TantivyDocument, Term};
use tracing::{debug, warn};

/// Language tag sentinel selecting untagged or non-string values only.
pub const LANG_NONE: &str = "none";

/// A structured search request. Stateless; built per call.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    text: String,
    property: Option<String>,
    graph: Option<String>,
    lang: Option<String>,
    limit: usize,
    highlight: Option<String>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Search the field mapped for this predicate instead of the primary
    /// field.
    pub fn property(mut self, predicate: impl Into<String>) -> Self {
        self.property = Some(predicate.into());
        self
    }

    /// Restrict matches to one named graph.
    pub fn graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    /// Restrict matches by language tag; [`LANG_NONE`] selects untagged or
    /// non-string values only.
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Result cap; `0` applies the configured default.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Highlight matched terms, per the given option spec (see
    /// [`HighlightOpts::parse`]).
    pub fn highlight(mut self, spec: impl Into<String>) -> Self {
        self.highlight = Some(spec.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A literal value reconstructed from the stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub lexical: String,
    /// Language tag; mutually exclusive with `datatype`.
    pub lang: Option<String>,
    /// Datatype URI for non-string literals.
    pub datatype: Option<String>,
}

/// One scored match. Produced only by successful query execution;
/// immutable, never persisted.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub subject: String,
    pub score: f32,
    pub literal: Option<Literal>,
    pub graph: Option<String>,
}

/// Escape query-syntax metacharacters so a value can be embedded in query
/// text verbatim.
pub fn escape_query(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(
            c,
            '+' | '-'
                | '&'
                | '|'
                | '!'
                | '('
                | ')'
                | '{'
                | '}'
                | '['
                | ']'
                | '^'
                | '"'
                | '~'
                | '*'
                | '?'
                | ':'
                | '\\'
                | '/'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl TextIndex {
    /// Execute a search request against the committed index state.
    ///
    /// The result is finite and eagerly materialized; the read handle is
    /// closed before this returns. Malformed query text surfaces as
    /// [`TextError::QueryParse`] with no state change.
    pub fn query(&self, request: &QueryRequest) -> TextResult<Vec<SearchHit>> {
        let def = self.definition();
        let settings = self.settings();

        // Field resolution: mapped predicate field, else the primary field.
        let base_field = request
            .property
            .as_deref()
            .and_then(|p| def.field_for(p))
            .unwrap_or(&def.primary_field);

        let lang = request.lang.as_deref();
        let search_for = settings.search_for_tags(lang);

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        let mut text_field_name = base_field.to_string();

        if search_for.is_empty() {
            if settings.multilingual {
                if let Some(tag) = lang.filter(|l| !l.is_empty() && *l != LANG_NONE) {
                    let tagged = format!("{base_field}_{tag}");
                    if self.fields().text_field(&tagged).is_some() {
                        text_field_name = tagged;
                    }
                }
            }
            let field = self.fields().require_text_field(&text_field_name)?;
            clauses.push((Occur::Must, self.parse_text(&request.text, field)?));

            // Language constraint: equality on the tag, or must-not-exist
            // for the "none" sentinel.
            if let (Some(lang_field), Some(tag)) = (self.fields().lang, lang) {
                if tag == LANG_NONE {
                    let name = def.lang_field.clone().unwrap_or_default();
                    clauses.push((Occur::MustNot, Box::new(ExistsQuery::new(name, false))));
                } else if !tag.is_empty() {
                    let term = Term::from_field_text(lang_field, tag);
                    clauses.push((
                        Occur::Must,
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
                    ));
                }
            }
        } else {
            // Search-for expansion: fan the text clause out across the
            // per-tag fields configured for this language.
            let mut fanout: Vec<(Occur, Box<dyn Query>)> = Vec::new();
            for tag in search_for {
                let name = format!("{base_field}_{tag}");
                match self.fields().text_field(&name) {
                    Some(field) => {
                        fanout.push((Occur::Should, self.parse_text(&request.text, field)?));
                    }
                    None => warn!(field = %name, "search-for tag has no configured field"),
                }
            }
            if fanout.is_empty() {
                let field = self.fields().require_text_field(base_field)?;
                clauses.push((Occur::Must, self.parse_text(&request.text, field)?));
            } else {
                clauses.push((Occur::Must, Box::new(BooleanQuery::new(fanout))));
            }
        }

        // Graph scope.
        if let (Some(graph_field), Some(graph)) = (self.fields().graph, request.graph.as_deref()) {
            let term = Term::from_field_text(graph_field, graph);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        let query: Box<dyn Query> = if clauses.len() == 1 {
            clauses.pop().expect("one clause").1
        } else {
            Box::new(BooleanQuery::new(clauses))
        };

        let limit = if request.limit == 0 {
            settings.max_hits
        } else {
            request.limit
        };
        debug!(query = ?query, limit, "text query");

        let searcher = self.searcher()?;
        let top = searcher.search(query.as_ref(), &TopDocs::with_limit(limit))?;

        let highlight = request.highlight.as_deref().map(HighlightOpts::parse);
        let snippets = match &highlight {
            Some(opts) => {
                let field = self.fields().require_text_field(&text_field_name)?;
                let mut generator = SnippetGenerator::create(&searcher, query.as_ref(), field)?;
                generator.set_max_num_chars(opts.max_chars());
                Some(generator)
            }
            None => None,
        };

        let mut hits = Vec::with_capacity(top.len());
        for (score, address) in top {
            let doc: TantivyDocument = searcher.doc(address)?;
            let mut hit = self.hit_from_doc(&doc, score, &text_field_name);
            if let (Some(generator), Some(opts)) = (&snippets, &highlight) {
                let snippet = generator.snippet_from_doc(&doc);
                if !snippet.fragment().is_empty() {
                    if let Some(literal) = hit.literal.as_mut() {
                        literal.lexical = opts.render(&snippet);
                    }
                }
            }
            hits.push(hit);
        }
        Ok(hits)
    }

    /// Stored field values for one entity identifier, if indexed.
    pub fn lookup(&self, uri: &str) -> TextResult<Option<BTreeMap<String, String>>> {
        let searcher = self.searcher()?;
        let term = Term::from_field_text(self.fields().entity, uri);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_score, address)) = top.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(address)?;

        let mut record = BTreeMap::new();
        for name in self.definition().text_field_names() {
            if let Some(field) = self.fields().text_field(name) {
                if let Some(value) = first_str(&doc, field) {
                    record.insert(name.to_string(), value);
                }
            }
        }
        Ok(Some(record))
    }

    fn parse_text(&self, text: &str, field: Field) -> TextResult<Box<dyn Query>> {
        let parser = QueryParser::for_index(self.raw_index(), vec![field]);
        parser.parse_query(text).map_err(|e| TextError::QueryParse {
            query: text.to_string(),
            message: e.to_string(),
        })
    }

    fn hit_from_doc(&self, doc: &TantivyDocument, score: f32, text_field: &str) -> SearchHit {
        let subject = first_str(doc, self.fields().entity).unwrap_or_default();
        let graph = self.fields().graph.and_then(|f| first_str(doc, f));

        let literal = self
            .fields()
            .text_field(text_field)
            .and_then(|f| first_str(doc, f))
            .map(|lexical| {
                let marker = self.fields().lang.and_then(|f| first_str(doc, f));
                match marker {
                    Some(m) => match m.strip_prefix(DATATYPE_PREFIX) {
                        Some(datatype) => Literal {
                            lexical,
                            lang: None,
                            datatype: Some(datatype.to_string()),
                        },
                        None => Literal {
                            lexical,
                            lang: Some(m),
                            datatype: None,
                        },
                    },
                    None => Literal {
                        lexical,
                        lang: None,
                        datatype: None,
                    },
                }
            });

        SearchHit {
            subject,
            score,
            literal,
            graph,
        }
    }
}

fn first_str(doc: &TantivyDocument, field: Field) -> Option<String> {
    doc.get_first(field).and_then(|v| v.as_str().map(str::to_string))
}
