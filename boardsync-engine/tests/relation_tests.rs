//! Relation link symmetry against a SQLite database

mod helpers;

use boardsync_common::models::{
    Board, Card, PropertyMap, PropertyTemplate, PropertyType, PropertyValue, RelationLimit,
};
use boardsync_common::Error;
use boardsync_engine::store::{CardStore, StoreBatch};
use helpers::{card_with, plain_board, relation_property, test_env, TestEnv};
use uuid::Uuid;

struct Linked {
    x: Board,
    y: Board,
    a1: Card,
    b1: Card,
    b2: Card,
}

/// Board X with relation "rel" to board Y, cards A1 on X and B1, B2 on Y
async fn two_boards(env: &TestEnv, limit: RelationLimit) -> Linked {
    let y = plain_board(env, "Milestones", Vec::new()).await;
    let x = plain_board(env, "Projects", vec![relation_property("rel", y.id, limit)]).await;
    let a1 = card_with(env, &x, "A1", PropertyMap::new()).await;
    let b1 = card_with(env, &y, "B1", PropertyMap::new()).await;
    let b2 = card_with(env, &y, "B2", PropertyMap::new()).await;
    Linked { x, y, a1, b1, b2 }
}

fn inverse_of(board: &Board) -> PropertyTemplate {
    board
        .fields
        .card_properties
        .iter()
        .find(|p| p.property_type == PropertyType::Relation)
        .cloned()
        .expect("inverse relation property")
}

async fn related(env: &TestEnv, card_id: Uuid, property_id: &str) -> Vec<String> {
    env.cards.get_card(card_id).await.unwrap().unwrap().related_ids(property_id)
}

#[tokio::test]
async fn test_link_creates_inverse_and_backfills() {
    let env = test_env().await;
    let Linked { x, y, b1, .. } = two_boards(&env, RelationLimit::MultiplePage).await;
    let mut values = PropertyMap::new();
    values.insert("rel".to_string(), PropertyValue::List(vec![b1.id.to_string()]));
    let a0 = card_with(&env, &x, "A0", values).await;

    let x = env
        .service
        .sync_relation_property(x.id, "rel", Some("Projects".to_string()))
        .await
        .unwrap();
    let y = env.cards.get_board(y.id).await.unwrap().unwrap();

    let inverse = inverse_of(&y);
    assert_eq!(inverse.name, "Projects");
    let inverse_link = inverse.relation_data.clone().unwrap();
    assert_eq!(inverse_link.board_id, x.id);
    assert_eq!(inverse_link.related_property_id.as_deref(), Some("rel"));
    assert_eq!(inverse_link.limit, RelationLimit::MultiplePage);

    let source_link = x.property("rel").unwrap().relation_data.clone().unwrap();
    assert_eq!(source_link.related_property_id.as_deref(), Some(inverse.id.as_str()));
    assert!(source_link.show_on_related_board);

    assert_eq!(related(&env, b1.id, &inverse.id).await, vec![a0.id.to_string()]);
}

#[tokio::test]
async fn test_linking_twice_reuses_inverse() {
    let env = test_env().await;
    let Linked { x, y, .. } = two_boards(&env, RelationLimit::MultiplePage).await;

    env.service.sync_relation_property(x.id, "rel", None).await.unwrap();
    env.service.sync_relation_property(x.id, "rel", None).await.unwrap();

    let y = env.cards.get_board(y.id).await.unwrap().unwrap();
    let relations = y
        .fields
        .card_properties
        .iter()
        .filter(|p| p.property_type == PropertyType::Relation)
        .count();
    assert_eq!(relations, 1);
    assert_eq!(inverse_of(&y).name, "Related to Projects");
}

#[tokio::test]
async fn test_relation_edits_stay_symmetric() {
    let env = test_env().await;
    let Linked { x, y, a1, b1, b2 } = two_boards(&env, RelationLimit::MultiplePage).await;
    env.service.sync_relation_property(x.id, "rel", None).await.unwrap();
    let inverse = inverse_of(&env.cards.get_board(y.id).await.unwrap().unwrap());

    let card = env
        .service
        .sync_related_cards_values(x.id, "rel", a1.id, vec![b1.id, b2.id])
        .await
        .unwrap();
    assert_eq!(card.related_ids("rel"), vec![b1.id.to_string(), b2.id.to_string()]);
    assert_eq!(related(&env, b1.id, &inverse.id).await, vec![a1.id.to_string()]);
    assert_eq!(related(&env, b2.id, &inverse.id).await, vec![a1.id.to_string()]);

    // Unlink B2 only
    env.service
        .sync_related_cards_values(x.id, "rel", a1.id, vec![b1.id])
        .await
        .unwrap();
    assert_eq!(related(&env, b1.id, &inverse.id).await, vec![a1.id.to_string()]);
    assert!(related(&env, b2.id, &inverse.id).await.is_empty());
    assert_eq!(related(&env, a1.id, "rel").await, vec![b1.id.to_string()]);

    // Clearing removes the value entirely
    let card = env
        .service
        .sync_related_cards_values(x.id, "rel", a1.id, Vec::new())
        .await
        .unwrap();
    assert!(!card.properties.contains_key("rel"));
    assert!(related(&env, b1.id, &inverse.id).await.is_empty());
}

#[tokio::test]
async fn test_unknown_target_rejected_before_any_write() {
    let env = test_env().await;
    let Linked { x, y, a1, b1, .. } = two_boards(&env, RelationLimit::MultiplePage).await;
    env.service.sync_relation_property(x.id, "rel", None).await.unwrap();
    let inverse = inverse_of(&env.cards.get_board(y.id).await.unwrap().unwrap());

    let result = env
        .service
        .sync_related_cards_values(x.id, "rel", a1.id, vec![b1.id, Uuid::new_v4()])
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    assert!(related(&env, a1.id, "rel").await.is_empty());
    assert!(related(&env, b1.id, &inverse.id).await.is_empty());
}

#[tokio::test]
async fn test_single_page_relation_rejects_many_targets() {
    let env = test_env().await;
    let Linked { x, a1, b1, b2, .. } = two_boards(&env, RelationLimit::SinglePage).await;
    env.service.sync_relation_property(x.id, "rel", None).await.unwrap();

    let result = env
        .service
        .sync_related_cards_values(x.id, "rel", a1.id, vec![b1.id, b2.id])
        .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    // Duplicates collapse to one target
    let card = env
        .service
        .sync_related_cards_values(x.id, "rel", a1.id, vec![b1.id, b1.id])
        .await
        .unwrap();
    assert_eq!(card.related_ids("rel"), vec![b1.id.to_string()]);
}

#[tokio::test]
async fn test_remove_keeps_inverse_values() {
    let env = test_env().await;
    let Linked { x, y, a1, b1, .. } = two_boards(&env, RelationLimit::MultiplePage).await;
    env.service.sync_relation_property(x.id, "rel", None).await.unwrap();
    env.service
        .sync_related_cards_values(x.id, "rel", a1.id, vec![b1.id])
        .await
        .unwrap();
    let inverse = inverse_of(&env.cards.get_board(y.id).await.unwrap().unwrap());

    let x = env.service.remove_relation_property(x.id, "rel", false).await.unwrap();
    assert!(x.property("rel").is_none());
    assert!(!env.cards.get_card(a1.id).await.unwrap().unwrap().properties.contains_key("rel"));

    let y = env.cards.get_board(y.id).await.unwrap().unwrap();
    let kept = y.property(&inverse.id).expect("inverse property kept");
    let link = kept.relation_data.clone().unwrap();
    assert_eq!(link.related_property_id, None);
    assert!(!link.show_on_related_board);
    assert_eq!(related(&env, b1.id, &inverse.id).await, vec![a1.id.to_string()]);
}

#[tokio::test]
async fn test_remove_both_drops_inverse_and_values() {
    let env = test_env().await;
    let Linked { x, y, a1, b1, .. } = two_boards(&env, RelationLimit::MultiplePage).await;
    env.service.sync_relation_property(x.id, "rel", None).await.unwrap();
    env.service
        .sync_related_cards_values(x.id, "rel", a1.id, vec![b1.id])
        .await
        .unwrap();
    let inverse = inverse_of(&env.cards.get_board(y.id).await.unwrap().unwrap());

    env.service.remove_relation_property(x.id, "rel", true).await.unwrap();

    let y = env.cards.get_board(y.id).await.unwrap().unwrap();
    assert!(y.property(&inverse.id).is_none());
    assert!(!env.cards.get_card(b1.id).await.unwrap().unwrap().properties.contains_key(&inverse.id));
}

#[tokio::test]
async fn test_relation_within_one_board() {
    let env = test_env().await;
    let board = plain_board(&env, "Tasks", Vec::new()).await;
    // Point the relation at its own board
    env.cards
        .apply_batch(StoreBatch {
            board_properties: vec![(
                board.id,
                vec![relation_property("blocks", board.id, RelationLimit::MultiplePage)],
            )],
            ..StoreBatch::default()
        })
        .await
        .unwrap();
    let a1 = card_with(&env, &board, "A1", PropertyMap::new()).await;
    let a2 = card_with(&env, &board, "A2", PropertyMap::new()).await;

    let board = env
        .service
        .sync_relation_property(board.id, "blocks", Some("Blocked by".to_string()))
        .await
        .unwrap();
    let inverse = board
        .fields
        .card_properties
        .iter()
        .find(|p| p.name == "Blocked by")
        .cloned()
        .unwrap();
    assert_eq!(board.fields.card_properties.len(), 2);

    env.service
        .sync_related_cards_values(board.id, "blocks", a1.id, vec![a2.id])
        .await
        .unwrap();
    assert_eq!(related(&env, a2.id, &inverse.id).await, vec![a1.id.to_string()]);
    assert_eq!(related(&env, a1.id, "blocks").await, vec![a2.id.to_string()]);
}

#[tokio::test]
async fn test_property_without_link_metadata_is_invalid_state() {
    let env = test_env().await;
    let mut text = PropertyTemplate::new("Notes", PropertyType::Text);
    text.id = "notes".to_string();
    let board = plain_board(&env, "Tasks", vec![text]).await;

    let result = env.service.sync_relation_property(board.id, "notes", None).await;
    assert!(matches!(result, Err(Error::InvalidState(_))));

    let result = env.service.remove_relation_property(board.id, "missing", false).await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    let stored = env.cards.get_board(board.id).await.unwrap().unwrap();
    assert_eq!(stored.fields.card_properties.len(), 1);
}
