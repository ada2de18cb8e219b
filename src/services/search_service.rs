use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, QueryOrder, Statement,
};
use tracing::debug;

use super::types::{ImageResponse, SearchHit, SearchResponse, SimilarImage};
use super::validation::{self, Pagination};
use crate::database::entities::{image_metadata, images, StringList};
use crate::errors::{GalleryError, GalleryResult};
use crate::search::{rank_matches, Searchable, TextQuery};

pub const DEFAULT_SIMILAR_LIMIT: u64 = 10;
pub const MAX_SIMILAR_LIMIT: u64 = 50;
pub const DEFAULT_COLOR_LIMIT: u64 = 20;
pub const MAX_COLOR_LIMIT: u64 = 100;

/// A row of `search_images(term, user_id)`
#[derive(Debug, FromQueryResult)]
struct SearchRow {
    id: i32,
    filename: String,
    original_path: String,
    thumbnail_path: String,
    description: Option<String>,
    tags: StringList,
    colors: StringList,
    uploaded_at: DateTime<Utc>,
    rank: f32,
}

impl From<SearchRow> for SearchHit {
    fn from(row: SearchRow) -> Self {
        Self {
            id: row.id,
            filename: row.filename,
            original_path: row.original_path,
            thumbnail_path: row.thumbnail_path,
            description: row.description,
            tags: row.tags.into_inner(),
            colors: row.colors.into_inner(),
            uploaded_at: row.uploaded_at,
            rank: row.rank,
        }
    }
}

/// An image with its metadata, as loaded for in-process evaluation
struct Candidate {
    image: images::Model,
    metadata: image_metadata::Model,
}

impl Searchable for Candidate {
    fn description(&self) -> Option<&str> {
        self.metadata.description.as_deref()
    }

    fn tags(&self) -> &[String] {
        &self.metadata.tags.0
    }

    fn uploaded_at(&self) -> DateTime<Utc> {
        self.image.uploaded_at
    }
}

#[derive(Clone)]
pub struct SearchService {
    db: DatabaseConnection,
}

impl SearchService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Ranked text search over the caller's images
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        page: Pagination,
    ) -> GalleryResult<SearchResponse> {
        let term = validation::search_query(query)?;

        let hits = match self.db.get_database_backend() {
            DatabaseBackend::Postgres => self.search_postgres(user_id, &term).await?,
            _ => self.search_in_process(user_id, &term).await?,
        };
        debug!("Search {:?} for user {} matched {} images", term, user_id, hits.len());

        let total = hits.len() as u64;
        Ok(SearchResponse {
            has_more: page.has_more(total),
            images: page.slice(hits),
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    async fn search_postgres(&self, user_id: &str, term: &str) -> GalleryResult<Vec<SearchHit>> {
        let rows = SearchRow::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT * FROM search_images($1, $2)",
            [term.into(), user_id.into()],
        ))
        .all(&self.db)
        .await?;

        Ok(rows.into_iter().map(SearchHit::from).collect())
    }

    async fn search_in_process(&self, user_id: &str, term: &str) -> GalleryResult<Vec<SearchHit>> {
        let query = TextQuery::parse(term);
        let candidates = self.candidates(user_id).await?;

        Ok(rank_matches(&query, candidates)
            .into_iter()
            .map(|ranked| {
                let Candidate { image, metadata } = ranked.item;
                SearchHit {
                    id: image.id,
                    filename: image.filename,
                    original_path: image.original_path,
                    thumbnail_path: image.thumbnail_path,
                    description: metadata.description,
                    tags: metadata.tags.into_inner(),
                    colors: metadata.colors.into_inner(),
                    uploaded_at: image.uploaded_at,
                    rank: ranked.rank,
                }
            })
            .collect())
    }

    /// Images sharing tags or colors with a reference image.
    ///
    /// Score is `2 * shared tags + shared colors`; unrelated images are left out.
    pub async fn similar(
        &self,
        user_id: &str,
        image_id: i32,
        limit: Option<u64>,
    ) -> GalleryResult<Vec<SimilarImage>> {
        let limit = validation::bounded_limit(limit, DEFAULT_SIMILAR_LIMIT, MAX_SIMILAR_LIMIT)?;

        let reference = image_metadata::Entity::find()
            .filter(image_metadata::Column::ImageId.eq(image_id))
            .filter(image_metadata::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| GalleryError::not_found("image", image_id))?;

        let reference_tags: HashSet<&String> = reference.tags.iter().collect();
        let reference_colors: HashSet<&String> = reference.colors.iter().collect();

        let mut scored: Vec<SimilarImage> = self
            .candidates(user_id)
            .await?
            .into_iter()
            .filter(|candidate| candidate.image.id != image_id)
            .filter_map(|Candidate { image, metadata }| {
                let shared_tags = distinct_overlap(&reference_tags, &metadata.tags);
                let shared_colors = distinct_overlap(&reference_colors, &metadata.colors);
                let score = shared_tags * 2 + shared_colors;

                (score > 0).then(|| SimilarImage {
                    image: ImageResponse::new(image, Some(metadata)),
                    similarity_score: score,
                })
            })
            .collect();

        scored.sort_by(|a, b| match b.similarity_score.cmp(&a.similarity_score) {
            Ordering::Equal => b.image.uploaded_at.cmp(&a.image.uploaded_at),
            other => other,
        });
        scored.truncate(limit as usize);

        Ok(scored)
    }

    /// The caller's images whose palette contains any of `colors`, newest first
    pub async fn filter_by_color(
        &self,
        user_id: &str,
        colors: &[String],
        limit: Option<u64>,
    ) -> GalleryResult<Vec<ImageResponse>> {
        let limit = validation::bounded_limit(limit, DEFAULT_COLOR_LIMIT, MAX_COLOR_LIMIT)?;
        let wanted: HashSet<&str> = colors.iter().map(String::as_str).collect();

        Ok(self
            .candidates(user_id)
            .await?
            .into_iter()
            .filter(|candidate| {
                candidate
                    .metadata
                    .colors
                    .iter()
                    .any(|color| wanted.contains(color.to_ascii_lowercase().as_str()))
            })
            .take(limit as usize)
            .map(|Candidate { image, metadata }| ImageResponse::new(image, Some(metadata)))
            .collect())
    }

    /// The caller's images that have a metadata row, newest first
    async fn candidates(&self, user_id: &str) -> GalleryResult<Vec<Candidate>> {
        let rows = images::Entity::find()
            .filter(images::Column::UserId.eq(user_id))
            .order_by_desc(images::Column::UploadedAt)
            .order_by_desc(images::Column::Id)
            .find_also_related(image_metadata::Entity)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(image, metadata)| metadata.map(|metadata| Candidate { image, metadata }))
            .collect())
    }
}

/// Distinct values of `list` that are also in `reference`
fn distinct_overlap(reference: &HashSet<&String>, list: &StringList) -> u32 {
    let distinct: HashSet<&String> = list.iter().collect();
    distinct.intersection(reference).count() as u32
}
