//! Transaction semantics across the facade: commit visibility, abort
//! isolation, abandoned writes, writer exclusivity, and delegated mode.

use graphtext::{
    Coordination, Entity, EntityDefinition, MemStore, Quad, Settings, TextDataset, TextError,
    TextIndex, TransactionMode, TransactionalStore, TxnType,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

fn dataset() -> TextDataset<MemStore> {
    let index = TextIndex::in_memory(EntityDefinition::default(), Settings::default()).unwrap();
    TextDataset::new(MemStore::new(), index)
}

fn delegated_dataset() -> TextDataset<MemStore> {
    let index = TextIndex::in_memory(EntityDefinition::default(), Settings::default()).unwrap();
    TextDataset::new(MemStore::with_coordinator(), index)
}

fn label_entity(id: &str, text: &str) -> Entity {
    let mut entity = Entity::new(id, None);
    entity.put("text", text);
    entity
}

#[test]
fn test_coordination_selection() {
    assert_eq!(dataset().coordination(), Coordination::NonDelegated);
    assert_eq!(delegated_dataset().coordination(), Coordination::Delegated);
}

#[test]
fn test_commit_makes_writes_visible() {
    let dataset = dataset();

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "hello world"))
        .unwrap();
    assert!(dataset.search_text("hello").unwrap().is_empty());
    txn.commit().unwrap();

    let hits = dataset.search_text("hello").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].subject, "http://ex/1");
}

#[test]
fn test_abort_discards_writes() {
    let dataset = dataset();

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "hello world"))
        .unwrap();
    txn.abort();

    assert!(dataset.search_text("hello").unwrap().is_empty());

    // The dataset is still usable for the next transaction.
    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/2", "hello again"))
        .unwrap();
    txn.commit().unwrap();
    assert_eq!(dataset.search_text("hello").unwrap().len(), 1);
}

#[test]
fn test_end_without_commit_aborts_write() {
    let dataset = dataset();

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "abandoned"))
        .unwrap();
    txn.end();

    assert!(dataset.search_text("abandoned").unwrap().is_empty());
}

#[test]
fn test_dropped_write_txn_aborts() {
    let dataset = dataset();
    {
        let txn = dataset.begin(TxnType::Write).unwrap();
        txn.add_entity(&label_entity("http://ex/1", "dropped"))
            .unwrap();
    }
    assert!(dataset.search_text("dropped").unwrap().is_empty());
}

#[test]
fn test_consecutive_aborts_do_not_leak() {
    let dataset = dataset();

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "first")).unwrap();
    txn.abort();

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/2", "second"))
        .unwrap();
    txn.abort();

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/3", "third")).unwrap();
    txn.commit().unwrap();

    assert!(dataset.search_text("first").unwrap().is_empty());
    assert!(dataset.search_text("second").unwrap().is_empty());
    assert_eq!(dataset.search_text("third").unwrap().len(), 1);
}

#[test]
fn test_promotion_is_rejected() {
    let dataset = dataset();
    for txn_type in [TxnType::ReadPromote, TxnType::ReadCommittedPromote] {
        match dataset.begin(txn_type) {
            Err(TextError::UnsupportedTxnType(t)) => assert_eq!(t, txn_type),
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
    }
    assert!(!dataset.is_in_transaction());
}

#[test]
fn test_read_txn_cannot_mutate_index() {
    let dataset = dataset();
    let txn = dataset.begin(TxnType::Read).unwrap();
    assert!(matches!(
        txn.add_entity(&label_entity("http://ex/1", "nope")),
        Err(TextError::Protocol(_))
    ));
    txn.commit().unwrap();
}

#[test]
fn test_store_and_index_commit_together() {
    let dataset = dataset();
    let quad = Quad::new(None, "http://ex/1", "http://ex/label", "hello world");

    let txn = dataset.begin(TxnType::Write).unwrap();
    dataset.store().insert(quad.clone()).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "hello world"))
        .unwrap();
    txn.commit().unwrap();

    assert!(dataset.store().contains(&quad));
    assert_eq!(dataset.search_text("hello").unwrap().len(), 1);
}

#[test]
fn test_store_and_index_abort_together() {
    let dataset = dataset();
    let quad = Quad::new(None, "http://ex/1", "http://ex/label", "hello world");

    let txn = dataset.begin(TxnType::Write).unwrap();
    dataset.store().insert(quad.clone()).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "hello world"))
        .unwrap();
    txn.abort();

    assert!(!dataset.store().contains(&quad));
    assert!(dataset.search_text("hello").unwrap().is_empty());
}

#[test]
fn test_delegated_commit_and_abort() {
    let dataset = delegated_dataset();

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "delegated commit"))
        .unwrap();
    txn.commit().unwrap();
    assert_eq!(dataset.search_text("delegated").unwrap().len(), 1);

    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/2", "delegated abort"))
        .unwrap();
    txn.abort();
    assert_eq!(dataset.search_text("delegated").unwrap().len(), 1);
}

#[test]
fn test_delegated_read_txn_is_inert() {
    let dataset = delegated_dataset();
    let txn = dataset.begin(TxnType::Read).unwrap();
    assert!(dataset.search_text("anything").unwrap().is_empty());
    txn.commit().unwrap();
}

#[test]
fn test_concurrent_read_txns() {
    let dataset = Arc::new(dataset());
    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "shared")).unwrap();
    txn.commit().unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let txn = dataset.begin(TxnType::Read).unwrap();
                assert_eq!(dataset.search_text("shared").unwrap().len(), 1);
                txn.commit().unwrap();
            });
        }
    });
}

#[test]
fn test_serialized_writers_all_commit() {
    let dataset = Arc::new(dataset());
    thread::scope(|scope| {
        for n in 0..4 {
            let dataset = Arc::clone(&dataset);
            scope.spawn(move || {
                let txn = dataset.begin(TxnType::Write).unwrap();
                txn.add_entity(&label_entity(
                    &format!("http://ex/{n}"),
                    "concurrent write",
                ))
                .unwrap();
                txn.commit().unwrap();
            });
        }
    });
    assert_eq!(dataset.search_text("concurrent").unwrap().len(), 4);
}

/// Host store with no write exclusivity of its own: it only records
/// whether two transaction exits ever overlap. With such a host, the
/// facade's exit lock is the only thing keeping the paired store/index
/// exit sequential.
#[derive(Default)]
struct InstrumentedStore {
    in_exit: AtomicBool,
    overlaps: AtomicUsize,
    commits: AtomicUsize,
}

impl TransactionalStore for InstrumentedStore {
    fn begin(&self, _mode: TransactionMode) -> Result<(), TextError> {
        Ok(())
    }

    fn commit(&self) -> Result<(), TextError> {
        if self.in_exit.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        // Widen the window so interleaving would actually be observed.
        thread::sleep(Duration::from_millis(5));
        self.in_exit.store(false, Ordering::SeqCst);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&self) -> Result<(), TextError> {
        if self.in_exit.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_millis(5));
        self.in_exit.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn end(&self) {}

    fn is_in_transaction(&self) -> bool {
        false
    }
}

#[test]
fn test_exit_lock_serializes_concurrent_write_commits() {
    let index = TextIndex::in_memory(EntityDefinition::default(), Settings::default()).unwrap();
    let dataset = Arc::new(TextDataset::new(InstrumentedStore::default(), index));

    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers));
    thread::scope(|scope| {
        for n in 0..writers {
            let dataset = Arc::clone(&dataset);
            let barrier = Arc::clone(&barrier);
            scope.spawn(move || {
                let txn = dataset.begin(TxnType::Write).unwrap();
                txn.add_entity(&label_entity(&format!("http://ex/{n}"), "stress"))
                    .unwrap();
                // All writers are in a transaction before any commits.
                barrier.wait();
                txn.commit().unwrap();
            });
        }
    });

    assert_eq!(dataset.store().overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(dataset.store().commits.load(Ordering::SeqCst), writers);
    assert_eq!(dataset.search_text("stress").unwrap().len(), writers);
}

#[test]
fn test_close_keeps_queries_available() {
    let dataset = dataset();
    let txn = dataset.begin(TxnType::Write).unwrap();
    txn.add_entity(&label_entity("http://ex/1", "durable")).unwrap();
    txn.commit().unwrap();

    dataset.close();
    dataset.close();

    // The committed state stays searchable; further writes are refused.
    assert_eq!(dataset.search_text("durable").unwrap().len(), 1);
    let txn = dataset.begin(TxnType::Write).unwrap();
    assert!(matches!(
        txn.add_entity(&label_entity("http://ex/2", "late")),
        Err(TextError::Protocol(_))
    ));
    txn.abort();
}
