mod common;

use std::time::Duration;

use common::{draft, world, TestWallet, ENDPOINT};
use futures::StreamExt;
use gated_notes::{derive_key, KIND_ANNOUNCEMENT, KIND_KEY_NOTE, TAG_WRAP, WRAP_SELF, WRAP_SHARED};
use gated_notes_client::{
    publish_gated_note, CapabilityError, EventLog, Filter, KeyWrap, MemoryEventLog,
    UnlockWorkflow, WorkflowConfig, WorkflowError,
};

fn fast(key_wrap: KeyWrap) -> WorkflowConfig {
    WorkflowConfig::new(key_wrap).with_polling(3, Duration::from_millis(1))
}

#[tokio::test]
async fn buy_then_restore_with_self_storage() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);

    let published = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "Tomatoes", 5000, "Hello world."),
    )
    .await
    .unwrap();
    assert_eq!(published.registration.price, 5000);
    assert_eq!(log.len(), 2);

    let buyer = TestWallet::new("b2", &world.provider);
    let workflow = UnlockWorkflow::new(
        buyer,
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::SelfStorage(derive_key("buyer credential"))),
    );

    let unlocked = workflow.unlock(&published.announcement).await.unwrap();
    assert_eq!(unlocked.inner.content, "Hello world.");
    assert_eq!(unlocked.gated.id, published.gated.id);
    assert_eq!(unlocked.key_note.kind, KIND_KEY_NOTE);
    assert_eq!(unlocked.key_note.tag_value(TAG_WRAP), Some(WRAP_SELF));
    assert!(!unlocked.key_note.content.contains("Tomatoes"));

    let stored = world
        .store
        .payment_request(&unlocked.payment_hash)
        .unwrap()
        .unwrap();
    assert!(stored.is_paid());

    let key_notes = log
        .fetch(&Filter::new().kind(KIND_KEY_NOTE).gate(published.gated.id.clone()))
        .await
        .unwrap();
    assert_eq!(key_notes, vec![unlocked.key_note.clone()]);
    assert_eq!(
        workflow.events().key_notes_for(&published.gated.id),
        vec![unlocked.key_note.clone()]
    );

    let restored = workflow.restore(&unlocked.key_note).await.unwrap();
    assert_eq!(restored, unlocked.inner);

    let mints = world.provider.mint_calls();
    workflow.restore(&unlocked.key_note).await.unwrap();
    assert_eq!(world.provider.mint_calls(), mints, "restore must not pay again");
}

#[tokio::test]
async fn buy_then_restore_with_shared_wrap() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);
    let published = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "Potatoes", 2100, "Shared secret content"),
    )
    .await
    .unwrap();

    let workflow = UnlockWorkflow::new(
        TestWallet::new("b2", &world.provider),
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::Shared),
    );
    let unlocked = workflow.unlock(&published.announcement).await.unwrap();
    assert_eq!(unlocked.key_note.tag_value(TAG_WRAP), Some(WRAP_SHARED));
    assert!(!unlocked.key_note.content.contains("Potatoes"));

    assert_eq!(
        workflow.restore(&unlocked.key_note).await.unwrap().content,
        "Shared secret content"
    );

    let outsider = UnlockWorkflow::new(
        TestWallet::new("c3", &world.provider),
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::Shared),
    );
    assert!(outsider.restore(&unlocked.key_note).await.is_err());
}

#[tokio::test]
async fn refused_payment_aborts_without_key_note() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);
    let published = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "Tomatoes", 5000, "Hello world."),
    )
    .await
    .unwrap();

    let buyer = TestWallet::new("b2", &world.provider);
    buyer.refuse_payments();
    let workflow = UnlockWorkflow::new(
        buyer,
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::SelfStorage(derive_key("cred"))),
    );

    let err = workflow.unlock(&published.announcement).await.unwrap_err();
    assert!(
        matches!(err, WorkflowError::Capability(CapabilityError::PaymentRejected(_))),
        "{err}"
    );
    assert!(log
        .fetch(&Filter::new().kind(KIND_KEY_NOTE))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(world.provider.check_calls(), 0);
}

#[tokio::test]
async fn unsettled_payment_gives_up_after_polling_budget() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);
    let published = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "Tomatoes", 5000, "Hello world."),
    )
    .await
    .unwrap();

    let buyer = TestWallet::new("b2", &world.provider);
    buyer.hold_payments();
    let workflow = UnlockWorkflow::new(
        buyer,
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::SelfStorage(derive_key("cred"))),
    );

    let err = workflow.unlock(&published.announcement).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Pending { attempts: 3, .. }), "{err}");
    assert_eq!(world.provider.check_calls(), 3);
    assert!(log
        .fetch(&Filter::new().kind(KIND_KEY_NOTE))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn provider_outage_surfaces_gate_error() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);
    let published = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "Tomatoes", 5000, "Hello world."),
    )
    .await
    .unwrap();

    world.provider.set_unreachable(true);
    let workflow = UnlockWorkflow::new(
        TestWallet::new("b2", &world.provider),
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::SelfStorage(derive_key("cred"))),
    );

    let err = workflow.unlock(&published.announcement).await.unwrap_err();
    assert_eq!(err.gate_status(), Some(502));
}

#[tokio::test]
async fn announcement_for_unknown_note_is_missing_event() {
    let world = world();
    let log = MemoryEventLog::new();
    let stranger = TestWallet::new("a1", &world.provider);
    let announcement =
        gated_notes::note::create_announcement_note(&stranger, "teaser", "no-such-note").unwrap();

    let workflow = UnlockWorkflow::new(
        TestWallet::new("b2", &world.provider),
        world.gate.clone(),
        log,
        fast(KeyWrap::SelfStorage(derive_key("cred"))),
    );
    let err = workflow.unlock(&announcement).await.unwrap_err();
    assert!(matches!(err, WorkflowError::MissingEvent(ref id) if id == "no-such-note"));
    assert_eq!(world.provider.mint_calls(), 0);
}

#[tokio::test]
async fn rejected_publication_reaches_no_event_log() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);

    let mut bad_payee = draft(&publisher, "Tomatoes", 5000, "Hello world.");
    bad_payee.lud16 = "not-an-address".to_string();
    let err = publish_gated_note(&publisher, &world.gate, &log, &bad_payee)
        .await
        .unwrap_err();
    assert_eq!(err.gate_status(), Some(400));

    let mut empty_secret = draft(&publisher, "Tomatoes", 5000, "Hello world.");
    empty_secret.secret.clear();
    let err = publish_gated_note(&publisher, &world.gate, &log, &empty_secret)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Protocol(_)), "{err}");

    assert!(log.is_empty());
    assert!(world.store.notes().unwrap().is_empty());
}

#[tokio::test]
async fn self_wrapped_key_note_needs_self_storage_key() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);
    let published = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "Tomatoes", 5000, "Hello world."),
    )
    .await
    .unwrap();

    let buyer = UnlockWorkflow::new(
        TestWallet::new("b2", &world.provider),
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::SelfStorage(derive_key("cred"))),
    );
    let unlocked = buyer.unlock(&published.announcement).await.unwrap();

    let misconfigured = UnlockWorkflow::new(
        TestWallet::new("b2", &world.provider),
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::Shared),
    );
    let err = misconfigured.restore(&unlocked.key_note).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Protocol(_)), "{err}");
}

#[tokio::test]
async fn announcements_stream_into_event_set() {
    let world = world();
    let log = MemoryEventLog::new();
    let publisher = TestWallet::new("a1", &world.provider);
    let workflow = UnlockWorkflow::new(
        TestWallet::new("b2", &world.provider),
        world.gate.clone(),
        log.clone(),
        fast(KeyWrap::SelfStorage(derive_key("cred"))),
    );

    let mut feed = log.subscribe(Filter::new().kind(KIND_ANNOUNCEMENT));

    let first = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "one", 1000, "First note"),
    )
    .await
    .unwrap();
    let second = publish_gated_note(
        &publisher,
        &world.gate,
        &log,
        &draft(&publisher, "two", 2000, "Second note"),
    )
    .await
    .unwrap();

    for _ in 0..2 {
        let event = feed.next().await.unwrap();
        workflow.events().upsert(event.clone());
        workflow.events().upsert(event);
    }
    feed.cancel();

    assert_eq!(workflow.events().len(), 2);
    assert_eq!(
        workflow.events().announcements_for(&first.gated.id),
        vec![first.announcement.clone()]
    );

    let unlocked = workflow.unlock(&second.announcement).await.unwrap();
    assert_eq!(unlocked.inner.content, "Second note");
    assert_eq!(ENDPOINT, gated_notes::GatedNote::parse(&unlocked.gated).unwrap().endpoint);
}
