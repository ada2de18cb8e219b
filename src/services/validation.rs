//! Request validation, applied before any collaborator is called

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{GalleryError, GalleryResult};

pub const MAX_QUERY_LENGTH: usize = 500;

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#?([0-9a-fA-F]{6})$").expect("hex color pattern is valid")
});

/// Trimmed search term
pub fn search_query(query: &str) -> GalleryResult<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(GalleryError::validation("Search query cannot be empty"));
    }
    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(GalleryError::validation(format!(
            "Search query cannot be longer than {} characters",
            MAX_QUERY_LENGTH
        )));
    }
    Ok(query.to_string())
}

/// 1-based page window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u64 = 20;
    pub const MAX_LIMIT: u64 = 100;

    pub fn new(page: Option<u64>, limit: Option<u64>) -> GalleryResult<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(GalleryError::validation("page must be at least 1"));
        }
        let limit = bounded_limit(limit, Self::DEFAULT_LIMIT, Self::MAX_LIMIT)?;

        // SQL OFFSET is a signed 64-bit value
        let fits = (page - 1)
            .checked_mul(limit)
            .is_some_and(|offset| offset <= i64::MAX as u64);
        if !fits {
            return Err(GalleryError::validation(format!("page {} is out of range", page)));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// This page's slice of an already ordered list
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect()
    }

    pub fn has_more(&self, total: u64) -> bool {
        self.offset().saturating_add(self.limit) < total
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// `limit` defaulted and checked against `1..=max`
pub fn bounded_limit(limit: Option<u64>, default: u64, max: u64) -> GalleryResult<u64> {
    match limit.unwrap_or(default) {
        0 => Err(GalleryError::validation("limit must be at least 1")),
        limit if limit > max => Err(GalleryError::validation(format!(
            "limit cannot exceed {}",
            max
        ))),
        limit => Ok(limit),
    }
}

/// `#RRGGBB` or `RRGGBB` to lowercase `#rrggbb`
pub fn hex_color(color: &str) -> GalleryResult<String> {
    let color = color.trim();
    HEX_COLOR
        .captures(color)
        .map(|captures| format!("#{}", captures[1].to_ascii_lowercase()))
        .ok_or_else(|| GalleryError::validation(format!("Invalid hex color: {}", color)))
}

/// Colors of a filter request, from the single `color` field and the `colors` list
pub fn color_filter(color: Option<&str>, colors: &[String]) -> GalleryResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::new();
    for raw in color.into_iter().chain(colors.iter().map(String::as_str)) {
        let hex = hex_color(raw)?;
        if !normalized.contains(&hex) {
            normalized.push(hex);
        }
    }

    if normalized.is_empty() {
        return Err(GalleryError::validation("At least one color is required"));
    }
    Ok(normalized)
}
