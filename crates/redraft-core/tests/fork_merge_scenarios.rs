//! End-to-end fork/merge scenarios, run against both store backends.

use redraft_core::error::{ErrorCode, ForkError};
use redraft_core::events::{ForkEvent, RecordingObserver};
use redraft_core::fork::{ForkEngine, ForkOptions, RetireMode};
use redraft_core::model::{DocumentId, MetaEntry, TermSet};
use redraft_core::status::StatusRegistry;
use redraft_core::store::memory::MemoryStore;
use redraft_core::store::sqlite::SqliteStore;
use redraft_core::store::{DocumentStore, StoreOptions};

use generators::{OLD_STAMP, fields, insert_original};

fn id(raw: i64) -> DocumentId {
    DocumentId::new(raw).expect("positive id")
}

fn sqlite() -> SqliteStore {
    SqliteStore::open_in_memory(StoreOptions::default()).expect("open sqlite store")
}

/// Fill ids 1..=41 so the next document gets id 42.
fn seed_document_42<S: DocumentStore + ?Sized>(store: &S) -> DocumentId {
    for n in 1..42 {
        let title = format!("filler {n}");
        store
            .insert_document(&fields(&[("status", "draft"), ("title", &title)]))
            .expect("insert filler");
    }
    let doc = store
        .insert_document(&fields(&[
            ("status", "publish"),
            ("title", "Election night"),
            ("body", "Polls close at eight."),
        ]))
        .expect("insert document");
    assert_eq!(doc, id(42));
    store.add_metadata(doc, "views", "10").expect("metadata");
    store
        .set_terms(doc, "category", &["news".to_string()])
        .expect("terms");
    doc
}

fn fork_of_42_is_a_linked_draft<S: DocumentStore + ?Sized>(store: &S) {
    let statuses = StatusRegistry::default();
    let recorder = RecordingObserver::new();
    let engine = ForkEngine::new(store, &statuses, &recorder);
    let original = seed_document_42(store);

    assert!(engine.can_fork(original));
    assert!(!engine.has_open_fork(original));

    let fork = engine.fork(original).expect("fork");
    assert_eq!(fork, id(43));

    let doc = store.get_document(fork).expect("read").expect("fork exists");
    assert_eq!(doc.status, "wpse-draft");
    assert_eq!(doc.parent, Some(original));
    assert_eq!(doc.title(), "Election night");
    assert_eq!(doc.guid(), Some("http://localhost/?p=43"));
    assert_eq!(
        store.metadata(fork).expect("metadata"),
        vec![MetaEntry::new("views", "10")]
    );
    let expected: TermSet = [("category".to_string(), vec!["news".to_string()])]
        .into_iter()
        .collect();
    assert_eq!(store.terms(fork).expect("terms"), expected);
    assert!(engine.has_open_fork(original));

    assert!(recorder.events().contains(&ForkEvent::AfterFork {
        fork,
        original
    }));
}

fn second_fork_is_rejected_without_writes<S: DocumentStore + ?Sized>(store: &S) {
    let statuses = StatusRegistry::default();
    let recorder = RecordingObserver::new();
    let engine = ForkEngine::new(store, &statuses, &recorder);
    let original = seed_document_42(store);
    engine.fork(original).expect("first fork");
    let before = store.list_documents().expect("list").len();
    let events_before = recorder.events().len();

    let err = engine.fork(original).expect_err("second fork");
    assert!(matches!(err, ForkError::NotForkable { id, .. } if id == original));
    assert_eq!(err.code(), ErrorCode::NotForkable);
    assert!(err.is_actionable());

    assert_eq!(store.list_documents().expect("list").len(), before);
    assert!(store.get_document(id(44)).expect("read").is_none());
    assert_eq!(recorder.events().len(), events_before, "rejected fork must not notify");
}

fn edit_review_publish_merges_back<S: DocumentStore + ?Sized>(store: &S) {
    let statuses = StatusRegistry::default();
    let recorder = RecordingObserver::new();
    let engine = ForkEngine::new(store, &statuses, &recorder);
    let original = seed_document_42(store);
    let before = store.get_document(original).expect("read").expect("exists");
    let fork = engine.fork(original).expect("fork");

    store
        .update_document_fields(fork, &fields(&[("body", "Polls closed; counting begins.")]))
        .expect("edit fork");
    engine.submit_for_review(fork).expect("submit");
    assert_eq!(
        store.get_document(fork).expect("read").expect("exists").status,
        "wpse-pending"
    );

    let outcome = engine.transition(fork, "publish").expect("publish fork");
    assert!(matches!(
        outcome,
        redraft_core::fork::TransitionOutcome::Merged { original: o, .. } if o == original
    ));

    let after = store.get_document(original).expect("read").expect("exists");
    assert_eq!(after.id, original);
    assert_eq!(after.field("body"), Some("Polls closed; counting begins."));
    assert_eq!(after.guid(), before.guid());
    assert_eq!(after.field("created_at"), before.field("created_at"));
    assert_eq!(after.status, "publish");

    let retired = store.get_document(fork).expect("read").expect("fork kept");
    assert_eq!(retired.status, "wpse-merged");
    assert!(!engine.has_open_fork(original));

    let again = engine.merge(fork).expect_err("merge is single-shot");
    assert!(matches!(again, ForkError::NotAFork { .. }));

    let names = recorder.names();
    let before_merge = names.iter().position(|n| *n == "before_merge").expect("before_merge");
    let after_merge = names.iter().position(|n| *n == "after_merge").expect("after_merge");
    assert!(before_merge < after_merge);
}

fn fork_then_merge_is_a_round_trip<S: DocumentStore + ?Sized>(store: &S) {
    let statuses = StatusRegistry::default();
    let engine = ForkEngine::new(store, &statuses, &redraft_core::events::NoopObserver)
        .with_options(ForkOptions {
            retire: RetireMode::Delete,
            ..ForkOptions::default()
        });
    let original = insert_original(
        store,
        &fields(&[("title", "Weather"), ("body", "Sunny"), ("x_kicker", "Today")]),
    );
    store.add_metadata(original, "a", "1").expect("meta");
    store.add_metadata(original, "a", "2").expect("meta");
    store
        .set_terms(original, "post_tag", &["sun".to_string(), "heat".to_string()])
        .expect("terms");

    let before = store.get_document(original).expect("read").expect("exists");
    let meta_before = store.metadata(original).expect("meta");
    let terms_before = store.terms(original).expect("terms");

    let fork = engine.fork(original).expect("fork");
    assert_eq!(engine.merge(fork).expect("merge"), original);

    let after = store.get_document(original).expect("read").expect("exists");
    let mut expected = before.fields.clone();
    let mut actual = after.fields.clone();
    for stamp in ["modified_at", "modified_at_gmt"] {
        expected.remove(stamp);
        actual.remove(stamp);
    }
    assert_eq!(actual, expected);
    assert_eq!(after.field("created_at"), Some(OLD_STAMP));
    assert_eq!(store.metadata(original).expect("meta"), meta_before);
    assert_eq!(store.terms(original).expect("terms"), terms_before);
    assert!(store.get_document(fork).expect("read").is_none());
}

fn merge_rejects_non_forks<S: DocumentStore + ?Sized>(store: &S) {
    let statuses = StatusRegistry::default();
    let engine = ForkEngine::new(store, &statuses, &redraft_core::events::NoopObserver);
    let original = seed_document_42(store);

    let err = engine.merge(original).expect_err("published document");
    assert_eq!(err.code(), ErrorCode::NotAFork);
    let err = engine.merge(id(999)).expect_err("missing document");
    assert_eq!(err.code(), ErrorCode::NotAFork);
    assert_eq!(
        store.get_document(original).expect("read").expect("exists").status,
        "publish"
    );
}

macro_rules! both_stores {
    ($($name:ident),* $(,)?) => {
        mod memory_store {
            $(
                #[test]
                fn $name() {
                    super::$name(&super::MemoryStore::default());
                }
            )*
        }

        mod sqlite_store {
            $(
                #[test]
                fn $name() {
                    super::$name(&super::sqlite());
                }
            )*
        }
    };
}

both_stores!(
    fork_of_42_is_a_linked_draft,
    second_fork_is_rejected_without_writes,
    edit_review_publish_merges_back,
    fork_then_merge_is_a_round_trip,
    merge_rejects_non_forks,
);

#[test]
fn sqlite_store_persists_forks_across_reopen() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("redraft.sqlite3");
    let statuses = StatusRegistry::default();

    let (original, fork) = {
        let store = SqliteStore::open(&path, StoreOptions::default()).expect("open");
        let engine = ForkEngine::new(&store, &statuses, &redraft_core::events::NoopObserver);
        let original = store
            .insert_document(&fields(&[("status", "publish"), ("title", "Persist")]))
            .expect("insert");
        (original, engine.fork(original).expect("fork"))
    };

    let store = SqliteStore::open(&path, StoreOptions::default()).expect("reopen");
    let engine = ForkEngine::new(&store, &statuses, &redraft_core::events::NoopObserver);
    assert!(engine.has_open_fork(original));
    assert_eq!(engine.open_fork(original).expect("lookup").map(|d| d.id), Some(fork));
    assert!(matches!(
        engine.fork(original),
        Err(ForkError::NotForkable { .. })
    ));
}
