mod support;

use std::time::Duration;

use flashdeck_core::model::{CardDraft, CardId, CardPatch};
use services::{SyncAction, SyncConfig, SyncError};
use support::{card_collection, questions, scripted_cards, seed};
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn edits_within_window_make_one_write_with_last_values() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());
    seed(&cards, &["A"]).await;
    let id = CardId::new("srv-1");

    cards.update(&id, CardPatch::new("Q at 0", "A at 0")).unwrap();
    sleep(Duration::from_millis(200)).await;
    cards.update(&id, CardPatch::new("Q at 200", "A at 200")).unwrap();

    // Nothing is written, and S is untouched, while the window is open.
    sleep(Duration::from_millis(400)).await;
    assert!(repo.updates().is_empty());
    assert_eq!(questions(&cards), ["A"]);
    assert!(cards.has_queued_edit(&id));

    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        repo.updates(),
        vec![(id.clone(), CardPatch::new("Q at 200", "A at 200"))]
    );
    assert_eq!(questions(&cards), ["Q at 200"]);
    assert!(!cards.has_queued_edit(&id));
}

#[tokio::test(start_paused = true)]
async fn edits_to_different_cards_do_not_delay_each_other() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());
    seed(&cards, &["A", "B"]).await;
    let a = CardId::new("srv-1");
    let b = CardId::new("srv-2");

    cards.update(&a, CardPatch::new("A2", "a")).unwrap();
    sleep(Duration::from_millis(300)).await;
    cards.update(&b, CardPatch::new("B2", "b")).unwrap();

    sleep(Duration::from_millis(250)).await;
    assert_eq!(repo.updates().len(), 1);
    assert_eq!(questions(&cards), ["A2", "B"]);

    sleep(Duration::from_millis(300)).await;
    assert_eq!(repo.updates().len(), 2);
    assert_eq!(questions(&cards), ["A2", "B2"]);
}

#[tokio::test(start_paused = true)]
async fn stored_representation_replaces_local_record() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());
    seed(&cards, &["A"]).await;
    let id = CardId::new("srv-1");

    cards.update(&id, CardPatch::new("  padded  ", " answer ")).unwrap();
    sleep(Duration::from_millis(600)).await;

    let card = cards.get(&id).unwrap();
    assert_eq!(card.question, "padded");
    assert_eq!(card.answer, "answer");
}

#[tokio::test(start_paused = true)]
async fn write_for_deleted_card_is_skipped_silently() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());
    seed(&cards, &["A", "B"]).await;
    let a = CardId::new("srv-1");

    cards.update(&a, CardPatch::new("edited", "a")).unwrap();
    cards.delete(&a).await.unwrap();

    sleep(Duration::from_millis(600)).await;
    assert!(repo.updates().is_empty());
    assert!(cards.last_error().is_none());
    assert_eq!(cards.report_count(), 0);
    assert_eq!(questions(&cards), ["B"]);
}

#[tokio::test(start_paused = true)]
async fn invalid_edit_drops_queued_write() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());
    seed(&cards, &["A"]).await;
    let id = CardId::new("srv-1");

    cards.update(&id, CardPatch::new("fine", "fine")).unwrap();
    let err = cards
        .update(&id, CardPatch::new("fine", "x".repeat(931)))
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    sleep(Duration::from_millis(600)).await;
    assert!(repo.updates().is_empty());
    assert_eq!(questions(&cards), ["A"]);
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_reported_and_keeps_record() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());
    seed(&cards, &["A"]).await;
    let id = CardId::new("srv-1");

    repo.fail_updates(true);
    cards.update(&id, CardPatch::new("edited", "a")).unwrap();
    sleep(Duration::from_millis(600)).await;

    assert!(matches!(
        cards.last_error(),
        Some(SyncError::Remote {
            action: SyncAction::Update,
            ..
        })
    ));
    assert_eq!(questions(&cards), ["A"]);
}

#[tokio::test]
async fn flush_writes_queued_edits_now() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());
    seed(&cards, &["A"]).await;
    let id = CardId::new("srv-1");

    cards.update(&id, CardPatch::new("now", "a")).unwrap();
    cards.flush_edits().await;

    assert_eq!(repo.updates().len(), 1);
    assert_eq!(questions(&cards), ["now"]);
}

#[tokio::test(start_paused = true)]
async fn debounce_window_follows_config() {
    let repo = scripted_cards();
    let config = SyncConfig::default().with_debounce(Duration::from_millis(50));
    let cards = card_collection(&repo, config);
    seed(&cards, &["A"]).await;

    cards
        .update(&CardId::new("srv-1"), CardPatch::new("quick", "a"))
        .unwrap();
    sleep(Duration::from_millis(60)).await;
    assert_eq!(repo.updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn edit_typed_before_confirmation_follows_the_new_id() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());

    let add = cards.add(CardDraft::placeholder());
    let temp = cards.snapshot()[0].id.clone();
    cards.update(&temp, CardPatch::new("typed", "answer")).unwrap();
    let saved = add.await.unwrap();
    assert!(cards.has_queued_edit(&saved.id));
    assert!(!cards.has_queued_edit(&temp));

    sleep(Duration::from_millis(600)).await;
    assert_eq!(
        repo.updates(),
        vec![(saved.id.clone(), CardPatch::new("typed", "answer"))]
    );
    assert_eq!(questions(&cards), ["typed"]);
    assert_eq!(cards.report_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn edit_due_before_confirmation_is_sent_once_confirmed() {
    let repo = scripted_cards();
    let cards = card_collection(&repo, SyncConfig::default());

    let add = cards.add(CardDraft::placeholder());
    let temp = cards.snapshot()[0].id.clone();
    cards.update(&temp, CardPatch::new("typed", "answer")).unwrap();

    // The create has not been sent yet when the quiet period ends.
    sleep(Duration::from_millis(600)).await;
    assert!(repo.updates().is_empty());
    assert_eq!(questions(&cards), ["Term"]);

    let saved = add.await.unwrap();
    assert_eq!(saved.question, "typed");
    assert_eq!(repo.updates(), vec![(saved.id.clone(), CardPatch::new("typed", "answer"))]);
    assert_eq!(questions(&cards), ["typed"]);
    assert_eq!(cards.report_count(), 0);
}
