//! In-process evaluation of the `search_images` contract.
//!
//! Postgres runs the stored function directly. Other backends load the
//! caller's rows and evaluate the same rules here:
//!
//! - a row matches when `plainto_tsquery('english', term)` matches the
//!   document built from `coalesce(description, '') || ' ' || tags`, **or**
//!   when its tags share an exact (case-sensitive) element with the
//!   whitespace-split raw term;
//! - matches are ordered by `ts_rank` descending, then by upload time,
//!   newest first. Rank never decides whether a row matches.

pub mod lexer;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Approximation of pi^2/6, the normaliser `ts_rank` divides by
const RANK_NORMALISER: f32 = 1.644_934_1;

/// Default weight of an unlabelled lexeme position (weight class D)
const DEFAULT_WEIGHT: f32 = 0.1;

/// Rank of a multi-lexeme query when no pair of its lexemes co-occurs
const NO_PAIR_RANK: f32 = 1e-20;

/// Pairs further apart than this contribute nothing
const MAX_PAIR_DISTANCE: u32 = 100;

/// A parsed search term
#[derive(Clone, Debug, PartialEq)]
pub struct TextQuery {
    /// Distinct lexemes that must all be present (`plainto_tsquery`)
    lexemes: Vec<String>,
    /// Raw whitespace-delimited tokens used for exact tag overlap
    tokens: Vec<String>,
}

impl TextQuery {
    pub fn parse(term: &str) -> Self {
        let mut lexemes: Vec<String> = Vec::new();
        for lexeme in lexer::lexemes(term) {
            if !lexemes.contains(&lexeme) {
                lexemes.push(lexeme);
            }
        }

        let tokens = term.split_whitespace().map(str::to_string).collect();

        Self { lexemes, tokens }
    }

    pub fn lexemes(&self) -> &[String] {
        &self.lexemes
    }

    /// Full-text half of the rule. A query of only stop words matches nothing.
    pub fn matches_document(&self, document: &SearchDocument) -> bool {
        !self.lexemes.is_empty()
            && self
                .lexemes
                .iter()
                .all(|lexeme| !document.positions(lexeme).is_empty())
    }

    /// Exact tag overlap half of the rule
    pub fn matches_tags<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> bool {
        tags.into_iter().any(|tag| self.tokens.contains(tag))
    }

    /// `ts_rank(document, query)` with default weights and no normalisation.
    ///
    /// One lexeme ranks by its occurrences. Several lexemes form an AND query,
    /// ranked by how close each pair of them sits in the document.
    pub fn rank(&self, document: &SearchDocument) -> f32 {
        match self.lexemes.len() {
            0 => 0.0,
            1 => self.rank_occurrences(document),
            _ => self.rank_proximity(document),
        }
    }

    fn rank_occurrences(&self, document: &SearchDocument) -> f32 {
        let total: f32 = self
            .lexemes
            .iter()
            .map(|lexeme| {
                let occurrences = document.positions(lexeme).len();
                let weighted: f32 = (0..occurrences)
                    .map(|k| DEFAULT_WEIGHT / ((k + 1) as f32).powi(2))
                    .sum();
                weighted / RANK_NORMALISER
            })
            .sum();

        total / self.lexemes.len() as f32
    }

    fn rank_proximity(&self, document: &SearchDocument) -> f32 {
        let mut rank: Option<f32> = None;

        for (i, lexeme) in self.lexemes.iter().enumerate() {
            let current = document.positions(lexeme);
            for earlier in &self.lexemes[..i] {
                for a in current {
                    for b in document.positions(earlier) {
                        let distance = a.abs_diff(*b);
                        if distance == 0 {
                            continue;
                        }
                        let weight = DEFAULT_WEIGHT * DEFAULT_WEIGHT * word_distance(distance);
                        let pair = weight.sqrt();
                        rank = Some(match rank {
                            None => pair,
                            Some(rank) => 1.0 - (1.0 - rank) * (1.0 - pair),
                        });
                    }
                }
            }
        }

        rank.unwrap_or(NO_PAIR_RANK)
    }
}

/// Closeness factor of two positions `distance` words apart
fn word_distance(distance: u32) -> f32 {
    if distance > MAX_PAIR_DISTANCE {
        return 1e-30;
    }
    (1.0 / (1.005 + 0.05 * (distance as f64 / 1.5 - 2.0).exp())) as f32
}

/// Lexeme positions of one image's description followed by its tags
#[derive(Clone, Debug, Default)]
pub struct SearchDocument {
    positions: HashMap<String, Vec<u32>>,
}

impl SearchDocument {
    pub fn build<'a>(
        description: Option<&str>,
        tags: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let tags: Vec<&str> = tags.into_iter().map(String::as_str).collect();
        let text = format!("{} {}", description.unwrap_or(""), tags.join(" "));

        let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
        for (position, lexeme) in lexer::positioned_lexemes(&text) {
            positions.entry(lexeme).or_default().push(position);
        }

        Self { positions }
    }

    pub fn positions(&self, lexeme: &str) -> &[u32] {
        self.positions.get(lexeme).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// What the ranker needs to know about a row
pub trait Searchable {
    fn description(&self) -> Option<&str>;
    fn tags(&self) -> &[String];
    fn uploaded_at(&self) -> DateTime<Utc>;
}

#[derive(Clone, Debug)]
pub struct Ranked<T> {
    pub item: T,
    pub rank: f32,
}

/// Filter `candidates` by the match rule and order them by rank, then recency
pub fn rank_matches<T: Searchable>(query: &TextQuery, candidates: Vec<T>) -> Vec<Ranked<T>> {
    let mut matches: Vec<Ranked<T>> = candidates
        .into_iter()
        .filter_map(|item| {
            let document = SearchDocument::build(item.description(), item.tags());
            let matched = query.matches_document(&document) || query.matches_tags(item.tags());
            matched.then(|| Ranked {
                rank: query.rank(&document),
                item,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.rank
            .total_cmp(&a.rank)
            .then_with(|| b.item.uploaded_at().cmp(&a.item.uploaded_at()))
    });

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    struct Row {
        name: &'static str,
        description: Option<String>,
        tags: Vec<String>,
        uploaded_at: DateTime<Utc>,
    }

    impl Searchable for Row {
        fn description(&self) -> Option<&str> {
            self.description.as_deref()
        }

        fn tags(&self) -> &[String] {
            &self.tags
        }

        fn uploaded_at(&self) -> DateTime<Utc> {
            self.uploaded_at
        }
    }

    fn row(name: &'static str, description: Option<&str>, tags: &[&str], minutes: i64) -> Row {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Row {
            name,
            description: description.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            uploaded_at: base + Duration::minutes(minutes),
        }
    }

    fn names(results: &[Ranked<Row>]) -> Vec<&'static str> {
        results.iter().map(|r| r.item.name).collect()
    }

    #[test]
    fn test_sunset_matches_and_ocean_does_not() {
        let rows = || {
            vec![row(
                "sunset",
                Some("red sunset over mountains"),
                &["sunset", "nature"],
                0,
            )]
        };

        let hits = rank_matches(&TextQuery::parse("sunset"), rows());
        assert_eq!(names(&hits), vec!["sunset"]);
        assert!(hits[0].rank > 0.0);

        let hits = rank_matches(&TextQuery::parse("ocean"), rows());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_stemmed_query_matches_description() {
        let rows = vec![row("peaks", Some("Snowy mountains at dawn"), &[], 0)];
        let hits = rank_matches(&TextQuery::parse("mountain"), rows);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_all_query_lexemes_are_required() {
        let rows = vec![row("sunset", Some("red sunset"), &[], 0)];
        assert!(rank_matches(&TextQuery::parse("red ocean"), rows).is_empty());
    }

    #[test]
    fn test_absent_description_still_matches_on_exact_tag() {
        let rows = vec![row("tagged", None, &["Beach"], 0)];

        let hits = rank_matches(&TextQuery::parse("Beach"), rows);
        assert_eq!(names(&hits), vec!["tagged"]);
    }

    #[test]
    fn test_tag_overlap_is_case_sensitive_but_text_search_is_not() {
        let query = TextQuery::parse("Sunset");
        assert!(!query.matches_tags(&["sunset".to_string()]));

        // The full-text half still lowercases, so the row matches anyway
        let rows = vec![row("lower", None, &["sunset"], 0)];
        assert_eq!(rank_matches(&query, rows).len(), 1);
    }

    #[test]
    fn test_stop_word_query_only_matches_tags() {
        let query = TextQuery::parse("the");
        assert!(query.lexemes().is_empty());

        let rows = vec![
            row("described", Some("the quiet lake"), &[], 0),
            row("tagged", None, &["the"], 1),
        ];
        let hits = rank_matches(&query, rows);
        assert_eq!(names(&hits), vec!["tagged"]);
        assert_eq!(hits[0].rank, 0.0);
    }

    #[test]
    fn test_higher_rank_comes_first() {
        let rows = vec![
            row("once", Some("a dog in a park"), &[], 10),
            row("thrice", Some("dog chasing a dog"), &["dog"], 0),
        ];

        let hits = rank_matches(&TextQuery::parse("dog"), rows);
        assert_eq!(names(&hits), vec!["thrice", "once"]);
        assert!(hits[0].rank > hits[1].rank);
    }

    #[test]
    fn test_equal_rank_orders_by_most_recent_upload() {
        let rows = vec![
            row("older", Some("forest trail"), &[], 0),
            row("newer", Some("forest trail"), &[], 5),
            row("middle", Some("forest trail"), &[], 2),
        ];

        let hits = rank_matches(&TextQuery::parse("forest"), rows);
        assert_eq!(names(&hits), vec!["newer", "middle", "older"]);
    }

    #[test]
    fn test_single_occurrence_rank_matches_ts_rank() {
        let no_tags = Vec::<String>::new();
        let document = SearchDocument::build(Some("red sunset over mountains"), &no_tags);
        let rank = TextQuery::parse("sunset").rank(&document);
        // ts_rank(to_tsvector('english', 'red sunset over mountains'), 'sunset') = 0.0607927
        assert!((rank - 0.060_792_7).abs() < 1e-6);
    }

    #[test]
    fn test_closer_words_rank_higher() {
        let query = TextQuery::parse("red sunset");
        let no_tags = Vec::<String>::new();
        let adjacent = SearchDocument::build(Some("red sunset"), &no_tags);
        let distant = SearchDocument::build(Some("red barn far away hills sunset"), &no_tags);

        // ts_rank(to_tsvector('english', 'red sunset'), 'red & sunset') = 0.0991032
        assert!((query.rank(&adjacent) - 0.099_103_2).abs() < 1e-5);
        assert!(query.rank(&adjacent) > query.rank(&distant));

        let rows = vec![
            row("distant", Some("red barn far away hills sunset"), &[], 10),
            row("adjacent", Some("red sunset"), &[], 0),
        ];
        let hits = rank_matches(&query, rows);
        assert_eq!(names(&hits), vec!["adjacent", "distant"]);
    }

    #[test]
    fn test_tag_only_match_of_multi_word_query_ranks_near_zero() {
        let rows = vec![row("tagged", None, &["sunset", "glow"], 0)];
        let hits = rank_matches(&TextQuery::parse("sunset ocean"), rows);
        assert_eq!(names(&hits), vec!["tagged"]);
        assert!(hits[0].rank < 1e-10);
    }

    #[test]
    fn test_hyphenated_query_needs_the_compound() {
        let query = TextQuery::parse("red-sunset");
        let rows = vec![
            row("split", Some("red sunset"), &[], 0),
            row("joined", Some("a red-sunset sky"), &[], 1),
        ];
        assert_eq!(names(&rank_matches(&query, rows)), vec!["joined"]);
    }
}
