//! Query behavior: literal round-trips, language and graph scoping,
//! multilingual expansion, parse errors, limits, and highlighting.

use graphtext::{
    Entity, EntityDefinition, MemStore, QueryRequest, Settings, TextDataset, TextError, TextIndex,
    TxnType,
};

const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

fn dataset_with(def: EntityDefinition, settings: Settings) -> TextDataset<MemStore> {
    let index = TextIndex::in_memory(def, settings).unwrap();
    TextDataset::new(MemStore::new(), index)
}

fn dataset() -> TextDataset<MemStore> {
    dataset_with(EntityDefinition::default(), Settings::default())
}

fn multilingual_dataset() -> TextDataset<MemStore> {
    let settings = Settings {
        multilingual: true,
        languages: vec!["en".to_string(), "de".to_string()],
        ..Settings::default()
    };
    dataset_with(EntityDefinition::default(), settings)
}

fn index_entities(dataset: &TextDataset<MemStore>, entities: &[Entity]) {
    let txn = dataset.begin(TxnType::Write).unwrap();
    for entity in entities {
        txn.add_entity(entity).unwrap();
    }
    txn.commit().unwrap();
}

fn tagged(id: &str, text: &str, lang: &str) -> Entity {
    let mut entity = Entity::new(id, None).with_lang(lang);
    entity.put("text", text);
    entity
}

#[test]
fn test_literal_round_trip_with_language_tag() {
    let dataset = dataset();
    index_entities(&dataset, &[tagged("http://ex/1", "hello world", "en")]);

    let hits = dataset.search_text("hello").unwrap();
    assert_eq!(hits.len(), 1);
    let literal = hits[0].literal.as_ref().unwrap();
    assert_eq!(literal.lexical, "hello world");
    assert_eq!(literal.lang.as_deref(), Some("en"));
    assert_eq!(literal.datatype, None);
}

#[test]
fn test_literal_round_trip_with_datatype() {
    let dataset = dataset();
    let mut entity = Entity::new("http://ex/1", None).with_datatype(XSD_INTEGER);
    entity.put("text", "42");
    index_entities(&dataset, &[entity]);

    let hits = dataset.search_text("42").unwrap();
    assert_eq!(hits.len(), 1);
    let literal = hits[0].literal.as_ref().unwrap();
    assert_eq!(literal.lexical, "42");
    assert_eq!(literal.lang, None);
    assert_eq!(literal.datatype.as_deref(), Some(XSD_INTEGER));
}

#[test]
fn test_plain_literal_round_trip() {
    let dataset = dataset();
    let mut entity = Entity::new("http://ex/1", None);
    entity.put("text", "plain value");
    index_entities(&dataset, &[entity]);

    let hits = dataset.search_text("plain").unwrap();
    let literal = hits[0].literal.as_ref().unwrap();
    assert_eq!(literal.lexical, "plain value");
    assert_eq!(literal.lang, None);
    assert_eq!(literal.datatype, None);
}

#[test]
fn test_language_scoped_query() {
    let dataset = multilingual_dataset();
    index_entities(
        &dataset,
        &[
            tagged("http://ex/en", "a gift for you", "en"),
            tagged("http://ex/de", "das Gift", "de"),
        ],
    );

    let hits = dataset
        .search(&QueryRequest::new("gift").lang("en"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject, "http://ex/en");

    let hits = dataset
        .search(&QueryRequest::new("gift").lang("de"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject, "http://ex/de");

    // Unscoped search sees both.
    assert_eq!(dataset.search_text("gift").unwrap().len(), 2);
}

#[test]
fn test_lang_none_selects_untagged_only() {
    let dataset = dataset();
    let mut untagged = Entity::new("http://ex/plain", None);
    untagged.put("text", "shared term");
    index_entities(
        &dataset,
        &[tagged("http://ex/en", "shared term", "en"), untagged],
    );

    let hits = dataset
        .search(&QueryRequest::new("shared").lang("none"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject, "http://ex/plain");
}

#[test]
fn test_graph_scoped_query() {
    let dataset = dataset();
    let mut in_g1 = Entity::new("http://ex/1", Some("http://ex/g1"));
    in_g1.put("text", "scoped term");
    let mut in_g2 = Entity::new("http://ex/2", Some("http://ex/g2"));
    in_g2.put("text", "scoped term");
    index_entities(&dataset, &[in_g1, in_g2]);

    let hits = dataset
        .search(&QueryRequest::new("scoped").graph("http://ex/g1"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject, "http://ex/1");
    assert_eq!(hits[0].graph.as_deref(), Some("http://ex/g1"));
}

#[test]
fn test_predicate_resolves_to_mapped_field() {
    let mut def = EntityDefinition::default();
    def.map_predicate(RDFS_LABEL, "label");
    let dataset = dataset_with(def, Settings::default());

    let mut entity = Entity::new("http://ex/1", None);
    entity.put("label", "mapped value");
    let mut other = Entity::new("http://ex/2", None);
    other.put("text", "mapped value");
    index_entities(&dataset, &[entity, other]);

    let hits = dataset
        .search(&QueryRequest::new("mapped").property(RDFS_LABEL))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject, "http://ex/1");

    // Unmapped predicates fall back to the primary field.
    let hits = dataset
        .search(&QueryRequest::new("mapped").property("http://ex/unmapped"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject, "http://ex/2");
}

#[test]
fn test_search_for_expansion() {
    let mut settings = Settings {
        multilingual: true,
        languages: vec!["en".to_string()],
        ..Settings::default()
    };
    settings.search_for.insert(
        "zh".to_string(),
        vec!["zh-hans".to_string(), "zh-hant".to_string()],
    );
    let dataset = dataset_with(EntityDefinition::default(), settings);

    index_entities(
        &dataset,
        &[
            tagged("http://ex/hans", "lantern festival", "zh-hans"),
            tagged("http://ex/hant", "lantern festival", "zh-hant"),
            tagged("http://ex/en", "lantern festival", "en"),
        ],
    );

    let hits = dataset
        .search(&QueryRequest::new("lantern").lang("zh"))
        .unwrap();
    let mut subjects: Vec<&str> = hits.iter().map(|h| h.subject.as_str()).collect();
    subjects.sort_unstable();
    assert_eq!(subjects, vec!["http://ex/hans", "http://ex/hant"]);
}

#[test]
fn test_malformed_query_raises_parse_error() {
    let dataset = dataset();
    index_entities(&dataset, &[tagged("http://ex/1", "hello world", "en")]);

    match dataset.search_text("[[malformed") {
        Err(TextError::QueryParse { query, .. }) => assert_eq!(query, "[[malformed"),
        other => panic!("expected parse error, got {:?}", other.map(|h| h.len())),
    }

    // No transaction state was affected; valid searches still work.
    assert_eq!(dataset.search_text("hello").unwrap().len(), 1);
    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&tagged("http://ex/2", "hello again", "en"))
        .unwrap();
    txn.commit().unwrap();
    assert_eq!(dataset.search_text("hello").unwrap().len(), 2);
}

#[test]
fn test_limit_caps_results() {
    let dataset = dataset();
    let entities: Vec<Entity> = (0..5)
        .map(|n| tagged(&format!("http://ex/{n}"), "popular term", "en"))
        .collect();
    index_entities(&dataset, &entities);

    let hits = dataset
        .search(&QueryRequest::new("popular").limit(2))
        .unwrap();
    assert_eq!(hits.len(), 2);

    // Zero means the configured default cap.
    let hits = dataset
        .search(&QueryRequest::new("popular").limit(0))
        .unwrap();
    assert_eq!(hits.len(), 5);
}

#[test]
fn test_highlighting_marks_matches_without_changing_hits() {
    let dataset = dataset();
    index_entities(
        &dataset,
        &[tagged("http://ex/1", "the quick brown fox", "en")],
    );

    let plain = dataset.search_text("quick").unwrap();
    let highlighted = dataset
        .search(&QueryRequest::new("quick").highlight("s:**|e:**"))
        .unwrap();

    assert_eq!(plain.len(), highlighted.len());
    assert_eq!(plain[0].subject, highlighted[0].subject);

    let literal = highlighted[0].literal.as_ref().unwrap();
    assert!(
        literal.lexical.contains("**quick**"),
        "unexpected fragment: {}",
        literal.lexical
    );
    assert_eq!(literal.lang.as_deref(), Some("en"));
}

#[test]
fn test_update_entity_changes_search_results() {
    let dataset = dataset();
    index_entities(&dataset, &[tagged("http://ex/1", "original text", "en")]);

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.update_entity(&tagged("http://ex/1", "replacement text", "en"))
        .unwrap();
    txn.commit().unwrap();

    assert!(dataset.search_text("original").unwrap().is_empty());
    assert_eq!(dataset.search_text("replacement").unwrap().len(), 1);
}

#[test]
fn test_delete_entity_removes_from_results() {
    let dataset = dataset();
    let entity = tagged("http://ex/1", "ephemeral", "en");
    index_entities(&dataset, std::slice::from_ref(&entity));

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.delete_entity(&entity, "text", "ephemeral").unwrap();
    txn.commit().unwrap();

    assert!(dataset.search_text("ephemeral").unwrap().is_empty());
}
