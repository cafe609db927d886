//! Catalog service integration tests.
//!
//! Tests verify:
//! - Records and image blobs stay in step across submit, edit and delete
//! - Renames move the blob, fresh uploads replace it without a copy
//! - Storage failures abort the database write
//! - Ownership rules for delete

use std::sync::Arc;

use bytes::Bytes;
use stuff::catalog::{CatalogService, DistinctField, ItemFields, ItemFilter};
use stuff::error::CatalogError;
use stuff::storage::ImageUpload;
use stuff::Principal;

use super::test_utils::{
    board_games, field_value, filter_matches, item, ImageOp, MockImageStore, MockStore,
};

fn fields(name: &str, owner: &str) -> ItemFields {
    ItemFields {
        name: name.to_string(),
        owner: owner.to_string(),
        players: None,
        info: String::new(),
    }
}

fn jpeg() -> ImageUpload {
    ImageUpload::new(Bytes::from_static(b"\xff\xd8new"), "image/jpeg")
}

async fn catalog() -> (
    CatalogService<MockStore, MockImageStore>,
    Arc<MockStore>,
    MockImageStore,
) {
    let store = Arc::new(MockStore::new().with_items(board_games()).await);
    let images = MockImageStore::new()
        .with_object("Catan.jpg", b"\xff\xd8old")
        .await;
    let service = CatalogService::new(Arc::clone(&store), images.clone());
    (service, store, images)
}

// =============================================================================
// Submit
// =============================================================================

#[tokio::test]
async fn test_submit_writes_blob_then_record() {
    let (catalog, store, images) = catalog().await;
    let carol = Principal::new("carol", false);

    let mut new = fields("  Wingspan ", " carol ");
    new.info = "  keep *this*  \n".to_string();
    let item = catalog.submit(new, Some(jpeg()), &carol).await.unwrap();

    assert_eq!(item.name, "Wingspan");
    assert_eq!(item.owner, "carol");
    assert_eq!(item.submitter, "carol");
    assert_eq!(item.info, "  keep *this*  \n");
    assert_eq!(images.ops().await, vec![ImageOp::Put("Wingspan.jpg".to_string())]);
    assert!(store.get("Wingspan").await.is_some());
}

#[tokio::test]
async fn test_submit_duplicate_name_leaves_blob_untouched() {
    let (catalog, store, images) = catalog().await;
    let carol = Principal::new("carol", false);

    let err = catalog
        .submit(fields("Catan", "carol"), Some(jpeg()), &carol)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::NameTaken { .. }));
    assert!(err.is_user_error());
    assert!(images.ops().await.is_empty());
    assert_eq!(store.get("Catan").await.unwrap().submitter, "alice");
}

#[tokio::test]
async fn test_submit_without_image_rejected() {
    let (catalog, store, _) = catalog().await;
    let carol = Principal::new("carol", false);

    let err = catalog
        .submit(fields("Wingspan", "carol"), None, &carol)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::MissingImage));
    assert!(store.get("Wingspan").await.is_none());
}

#[tokio::test]
async fn test_storage_failure_aborts_submit() {
    let (catalog, store, images) = catalog().await;
    images.fail_all();

    let err = catalog
        .submit(fields("Wingspan", "carol"), Some(jpeg()), &Principal::new("carol", false))
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Storage(_)));
    assert!(!err.is_user_error());
    assert!(store.get("Wingspan").await.is_none());
}

// =============================================================================
// Edit
// =============================================================================

#[tokio::test]
async fn test_rename_without_image_copies_then_deletes() {
    let (catalog, store, images) = catalog().await;
    let bob = Principal::new("bob", false);

    let updated = catalog
        .edit("Catan", fields("Settlers of Catan", "bob"), None, &bob)
        .await
        .unwrap();

    assert_eq!(
        images.ops().await,
        vec![
            ImageOp::Copy("Catan.jpg".to_string(), "Settlers of Catan.jpg".to_string()),
            ImageOp::Delete("Catan.jpg".to_string()),
        ]
    );
    assert_eq!(
        images.object("Settlers of Catan.jpg").await,
        Some(Bytes::from_static(b"\xff\xd8old"))
    );
    assert!(images.object("Catan.jpg").await.is_none());

    // Submitter and creation time survive an edit by someone else
    assert_eq!(updated.submitter, "alice");
    assert_eq!(updated.owner, "bob");
    assert!(store.get("Catan").await.is_none());
    let stored = store.get("Settlers of Catan").await.unwrap();
    assert_eq!(stored.submitter, "alice");
    assert_eq!(stored.created_at, updated.created_at);
}

#[tokio::test]
async fn test_rename_with_image_puts_then_deletes() {
    let (catalog, _, images) = catalog().await;

    catalog
        .edit(
            "Catan",
            fields("Settlers of Catan", "alice"),
            Some(jpeg()),
            &Principal::new("alice", false),
        )
        .await
        .unwrap();

    let ops = images.ops().await;
    assert_eq!(
        ops,
        vec![
            ImageOp::Put("Settlers of Catan.jpg".to_string()),
            ImageOp::Delete("Catan.jpg".to_string()),
        ]
    );
    assert!(!ops.iter().any(|op| matches!(op, ImageOp::Copy(..))));
}

#[tokio::test]
async fn test_edit_in_place_without_image_skips_storage() {
    let (catalog, store, images) = catalog().await;

    let mut changed = fields("Catan", "bob");
    changed.players = Some("2-6".to_string());
    catalog
        .edit("Catan", changed, None, &Principal::new("bob", false))
        .await
        .unwrap();

    assert!(images.ops().await.is_empty());
    let stored = store.get("Catan").await.unwrap();
    assert_eq!(stored.owner, "bob");
    assert_eq!(stored.players.as_deref(), Some("2-6"));
}

#[tokio::test]
async fn test_rename_onto_existing_name_rejected() {
    let (catalog, store, images) = catalog().await;

    let err = catalog
        .edit("Catan", fields("Azul", "alice"), None, &Principal::new("alice", false))
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::NameTaken { .. }));
    assert!(images.ops().await.is_empty());
    assert!(store.get("Catan").await.is_some());
}

#[tokio::test]
async fn test_edit_missing_item_not_found() {
    let (catalog, _, _) = catalog().await;

    let err = catalog
        .edit("Nope", fields("Nope", "alice"), None, &Principal::new("alice", false))
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::NotFound { .. }));
}

#[tokio::test]
async fn test_storage_failure_aborts_edit() {
    let (catalog, store, images) = catalog().await;
    images.fail_all();

    let result = catalog
        .edit(
            "Catan",
            fields("Settlers of Catan", "alice"),
            None,
            &Principal::new("alice", false),
        )
        .await;

    assert!(matches!(result, Err(CatalogError::Storage(_))));
    assert!(store.get("Catan").await.is_some());
    assert!(store.get("Settlers of Catan").await.is_none());
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_requires_submitter() {
    let (catalog, store, images) = catalog().await;

    let refused = catalog
        .delete_item("Catan", &Principal::new("bob", false))
        .await
        .unwrap();
    assert!(!refused);
    assert!(store.get("Catan").await.is_some());
    assert!(images.ops().await.is_empty());

    let deleted = catalog
        .delete_item("Catan", &Principal::new("alice", false))
        .await
        .unwrap();
    assert!(deleted);
    assert!(store.get("Catan").await.is_none());
    assert_eq!(images.ops().await, vec![ImageOp::Delete("Catan.jpg".to_string())]);
}

#[tokio::test]
async fn test_delete_missing_item_returns_false() {
    let (catalog, _, _) = catalog().await;
    let deleted = catalog
        .delete_item("Nope", &Principal::new("alice", false))
        .await
        .unwrap();
    assert!(!deleted);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_random_sample_sizes() {
    let (catalog, _, _) = catalog().await;
    let all = ItemFilter::default();

    assert_eq!(catalog.get_random_items(&all, 1).await.unwrap().len(), 1);
    assert_eq!(catalog.get_random_items(&all, 2).await.unwrap().len(), 2);
    assert_eq!(catalog.get_random_items(&all, 10).await.unwrap().len(), 3);
    assert!(catalog.get_random_items(&all, 0).await.unwrap().is_empty());

    let mut names: Vec<String> = catalog
        .get_random_items(&all, 3)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 3);
}

#[tokio::test]
async fn test_expansions_share_name_prefix() {
    let (catalog, _, _) = catalog().await;
    assert_eq!(
        catalog.get_expansions("Catan").await.unwrap(),
        vec!["Catan Seafarers".to_string()]
    );
    assert!(catalog.get_expansions("Azul").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_distinct_listings_and_submissions() {
    let (catalog, _, _) = catalog().await;
    let all = ItemFilter::default();

    assert_eq!(catalog.get_owners(&all).await.unwrap(), vec!["alice", "bob"]);
    assert_eq!(catalog.get_players(&all).await.unwrap(), vec!["2-4", "3-4"]);
    assert_eq!(catalog.get_count(&all).await.unwrap(), 3);

    let mine = catalog.get_submissions(&all, "alice").await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|i| i.submitter == "alice"));
}

#[test]
fn test_mock_filter_follows_query_semantics() {
    let catan = item("Catan (5.6)", "alice", "alice", 1);

    let by_name = |name: &str| ItemFilter {
        name: Some(name.to_string()),
        ..Default::default()
    };
    assert!(filter_matches(&ItemFilter::default(), &catan));
    assert!(filter_matches(&by_name("TAN"), &catan));
    assert!(filter_matches(&by_name("(5.6)"), &catan));
    // Regex metacharacters are literal, as in the escaped Mongo regex
    assert!(!filter_matches(&by_name("5.6)|Azul"), &catan));
    assert!(!filter_matches(&by_name("Catan.*"), &catan));

    let by_owner = ItemFilter {
        owner: Some("Alice".to_string()),
        ..Default::default()
    };
    assert!(!filter_matches(&by_owner, &catan));
    assert!(filter_matches(&ItemFilter::default().with_submitter("alice"), &catan));
    assert!(!filter_matches(&ItemFilter::default().with_submitter("bob"), &catan));
}

#[test]
fn test_mock_distinct_skips_unset_players() {
    let mut game = item("Azul", "bob", "alice", 1);
    game.players = None;

    assert_eq!(field_value(DistinctField::Owner, &game), Some("bob"));
    assert_eq!(field_value(DistinctField::Submitter, &game), Some("alice"));
    assert_eq!(field_value(DistinctField::Players, &game), None);
}
