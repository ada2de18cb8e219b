//! Search contract tests against the service layer
//!
//! Rows are seeded directly so upload times can be controlled.

use aigallery::database::entities::*;
use aigallery::database::setup_database;
use aigallery::services::{Pagination, SearchService};
use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use tempfile::NamedTempFile;

async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

async fn create_user(db: &DatabaseConnection, id: &str) -> Result<()> {
    users::ActiveModel {
        id: Set(id.to_string()),
        email: Set(None),
        created_at: Set(Utc::now()),
        last_seen_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

async fn seed(
    db: &DatabaseConnection,
    user_id: &str,
    filename: &str,
    description: Option<&str>,
    tags: &[&str],
    uploaded_minutes: i64,
) -> Result<i32> {
    let image = images::ActiveModel {
        user_id: Set(user_id.to_string()),
        filename: Set(filename.to_string()),
        original_path: Set(format!("/uploads/{}", filename)),
        thumbnail_path: Set(format!("/uploads/thumbnails/thumb_{}", filename)),
        uploaded_at: Set(at(uploaded_minutes)),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut metadata = image_metadata::ActiveModel::pending(image.id, user_id);
    metadata.description = Set(description.map(str::to_string));
    metadata.tags = Set(StringList(tags.iter().map(|t| t.to_string()).collect()));
    metadata.ai_processing_status = Set(AiProcessingStatus::Completed);
    metadata.insert(db).await?;

    Ok(image.id)
}

fn filenames(response: &aigallery::services::SearchResponse) -> Vec<&str> {
    response
        .images
        .iter()
        .map(|hit| hit.filename.as_str())
        .collect()
}

#[tokio::test]
async fn test_sunset_example() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_user(&db, "alice").await?;
    seed(
        &db,
        "alice",
        "sunset.jpg",
        Some("red sunset over mountains"),
        &["sunset", "nature"],
        0,
    )
    .await?;

    let service = SearchService::new(db);

    let response = service
        .search("alice", "sunset", Pagination::default())
        .await?;
    assert_eq!(filenames(&response), vec!["sunset.jpg"]);
    assert!(response.images[0].rank > 0.0);

    let response = service
        .search("alice", "ocean", Pagination::default())
        .await?;
    assert_eq!(response.total, 0);
    assert!(response.images.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_results_never_cross_users() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_user(&db, "alice").await?;
    create_user(&db, "bob").await?;
    seed(&db, "alice", "alice.jpg", Some("dog in the park"), &["dog"], 0).await?;
    seed(&db, "bob", "bob.jpg", Some("dog on the beach"), &["dog"], 1).await?;

    let service = SearchService::new(db);

    let response = service.search("alice", "dog", Pagination::default()).await?;
    assert_eq!(filenames(&response), vec!["alice.jpg"]);

    let response = service.search("bob", "dog", Pagination::default()).await?;
    assert_eq!(filenames(&response), vec!["bob.jpg"]);

    let response = service.search("carol", "dog", Pagination::default()).await?;
    assert_eq!(response.total, 0);

    Ok(())
}

#[tokio::test]
async fn test_absent_description_matches_exact_tag() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_user(&db, "alice").await?;
    seed(&db, "alice", "untitled.jpg", None, &["Beach"], 0).await?;

    let service = SearchService::new(db);
    let response = service.search("alice", "Beach", Pagination::default()).await?;
    assert_eq!(filenames(&response), vec!["untitled.jpg"]);

    Ok(())
}

#[tokio::test]
async fn test_rank_orders_then_upload_time() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_user(&db, "alice").await?;

    // Same text, different upload times
    seed(&db, "alice", "old.jpg", Some("forest trail"), &[], 0).await?;
    seed(&db, "alice", "new.jpg", Some("forest trail"), &[], 30).await?;
    // More occurrences rank higher regardless of age
    seed(
        &db,
        "alice",
        "dense.jpg",
        Some("forest path through a forest"),
        &["forest"],
        -60,
    )
    .await?;

    let service = SearchService::new(db);
    let response = service.search("alice", "forest", Pagination::default()).await?;

    assert_eq!(filenames(&response), vec!["dense.jpg", "new.jpg", "old.jpg"]);
    assert!(response.images[0].rank > response.images[1].rank);
    assert_eq!(response.images[1].rank, response.images[2].rank);

    Ok(())
}

#[tokio::test]
async fn test_multi_word_query_prefers_adjacent_words() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_user(&db, "alice").await?;
    // Newer, but the words are far apart
    let distant = Some("red barn far away hills sunset");
    seed(&db, "alice", "distant.jpg", distant, &[], 10).await?;
    seed(&db, "alice", "adjacent.jpg", Some("red sunset"), &[], 0).await?;

    let service = SearchService::new(db);
    let response = service
        .search("alice", "red sunset", Pagination::default())
        .await?;

    assert_eq!(filenames(&response), vec!["adjacent.jpg", "distant.jpg"]);
    assert!(response.images[0].rank > response.images[1].rank);

    Ok(())
}

#[tokio::test]
async fn test_pagination_of_ranked_results() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    create_user(&db, "alice").await?;
    for minute in 0..5 {
        seed(
            &db,
            "alice",
            &format!("cat-{}.jpg", minute),
            Some("a sleeping cat"),
            &["cat"],
            minute,
        )
        .await?;
    }

    let service = SearchService::new(db);
    let page = Pagination::new(Some(2), Some(2))?;
    let response = service.search("alice", "cats", page).await?;

    assert_eq!(response.total, 5);
    assert_eq!(response.page, 2);
    assert_eq!(response.limit, 2);
    assert!(response.has_more);
    assert_eq!(filenames(&response), vec!["cat-2.jpg", "cat-1.jpg"]);

    Ok(())
}

/// Runs against a real Postgres when `TEST_POSTGRES_URL` is set, so the
/// stored `search_images` function is exercised alongside the in-process path.
#[tokio::test]
async fn test_postgres_search_function() -> Result<()> {
    let Ok(url) = std::env::var("TEST_POSTGRES_URL") else {
        return Ok(());
    };
    let db = Database::connect(&url).await?;
    setup_database(&db).await?;

    let owner = format!("pg-{}", uuid::Uuid::new_v4());
    let other = format!("pg-{}", uuid::Uuid::new_v4());
    create_user(&db, &owner).await?;
    create_user(&db, &other).await?;
    let distant = Some("red barn far away hills sunset");
    seed(&db, &owner, "distant.jpg", distant, &[], 10).await?;
    seed(&db, &owner, "adjacent.jpg", Some("red sunset"), &[], 0).await?;
    seed(&db, &owner, "tagged.jpg", None, &["Beach"], 0).await?;
    seed(&db, &other, "foreign.jpg", Some("red sunset"), &[], 0).await?;

    let service = SearchService::new(db.clone());

    let response = service
        .search(&owner, "red sunset", Pagination::default())
        .await?;
    assert_eq!(filenames(&response), vec!["adjacent.jpg", "distant.jpg"]);

    let response = service.search(&owner, "Beach", Pagination::default()).await?;
    assert_eq!(filenames(&response), vec!["tagged.jpg"]);

    for user in [&owner, &other] {
        users::Entity::delete_by_id(user.to_string()).exec(&db).await?;
    }
    Ok(())
}
