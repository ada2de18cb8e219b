//! Turning a model reply into a description and tags.
//!
//! Models are asked for a JSON object but often wrap it in prose or code
//! fences, and sometimes answer with `Description: ...` / `Tags: ...` lines
//! instead. Both shapes are accepted.

use serde::Deserialize;
use serde_json::Value;

pub const MAX_TAGS: usize = 10;

const JSON_DEFAULT_DESCRIPTION: &str = "An image";
const FALLBACK_DESCRIPTION: &str = "An interesting image";
const FALLBACK_TAGS: [&str; 2] = ["image", "photo"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedReply {
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
struct JsonReply {
    description: Option<String>,
    #[serde(default)]
    tags: Option<Value>,
}

pub fn parse_reply(content: &str) -> ParsedReply {
    parse_json(content).unwrap_or_else(|| parse_lines(content))
}

/// The object between the first `{` and the last `}`
fn parse_json(content: &str) -> Option<ParsedReply> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }

    let reply: JsonReply = serde_json::from_str(&content[start..=end]).ok()?;

    let tags = match reply.tags {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag),
                _ => None,
            })
            .collect(),
        Some(Value::String(list)) => list.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    let description = reply
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| JSON_DEFAULT_DESCRIPTION.to_string());

    Some(ParsedReply {
        description,
        tags: normalize_tags(tags),
    })
}

fn parse_lines(content: &str) -> ParsedReply {
    let mut description = FALLBACK_DESCRIPTION.to_string();
    let mut tags: Vec<String> = FALLBACK_TAGS.iter().map(|t| t.to_string()).collect();

    for line in content.trim().lines() {
        let lower = line.to_lowercase();
        let value = line.split_once(':').map_or(line, |(_, rest)| rest).trim();

        if lower.contains("description") {
            let value = value.trim_matches('"').trim();
            if !value.is_empty() {
                description = value.to_string();
            }
        } else if lower.contains("tags") || lower.contains("keywords") {
            tags = value
                .trim_matches(|c| c == '[' || c == ']')
                .split(',')
                .map(str::to_string)
                .collect();
        }
    }

    let mut tags = normalize_tags(tags);
    if tags.is_empty() {
        tags = FALLBACK_TAGS.iter().map(|t| t.to_string()).collect();
    }

    ParsedReply { description, tags }
}

/// Trimmed, unquoted, non-empty, first occurrence only, at most [`MAX_TAGS`]
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if tag.is_empty() || normalized.iter().any(|seen| seen == tag) {
            continue;
        }
        normalized.push(tag.to_string());
        if normalized.len() == MAX_TAGS {
            break;
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json_reply() {
        let reply = parse_reply(
            r#"{"description": "A red sunset over mountains.", "tags": ["sunset", "nature", "mountains"]}"#,
        );
        assert_eq!(reply.description, "A red sunset over mountains.");
        assert_eq!(reply.tags, vec!["sunset", "nature", "mountains"]);
    }

    #[test]
    fn test_json_inside_code_fence() {
        let content = "Here you go:\n```json\n{\n  \"description\": \"A dog on a beach\",\n  \"tags\": [\"dog\", \"beach\"]\n}\n```";
        let reply = parse_reply(content);
        assert_eq!(reply.description, "A dog on a beach");
        assert_eq!(reply.tags, vec!["dog", "beach"]);
    }

    #[test]
    fn test_json_without_description_uses_default() {
        let reply = parse_reply(r#"{"tags": ["cat"]}"#);
        assert_eq!(reply.description, "An image");
        assert_eq!(reply.tags, vec!["cat"]);
    }

    #[test]
    fn test_line_fallback() {
        let content = "Description: \"A busy street at night\"\nTags: city, night, lights, city";
        let reply = parse_reply(content);
        assert_eq!(reply.description, "A busy street at night");
        assert_eq!(reply.tags, vec!["city", "night", "lights"]);
    }

    #[test]
    fn test_keywords_line_is_accepted() {
        let reply = parse_reply("Keywords: forest, trail");
        assert_eq!(reply.description, "An interesting image");
        assert_eq!(reply.tags, vec!["forest", "trail"]);
    }

    #[test]
    fn test_unparseable_reply_gets_defaults() {
        let reply = parse_reply("I cannot help with that.");
        assert_eq!(reply.description, "An interesting image");
        assert_eq!(reply.tags, vec!["image", "photo"]);
    }

    #[test]
    fn test_tags_are_capped_and_cleaned() {
        let tags = (0..15).map(|i| format!(" tag{} ", i));
        let normalized = normalize_tags(tags.chain(["".to_string(), "\"tag0\"".to_string()]));
        assert_eq!(normalized.len(), MAX_TAGS);
        assert_eq!(normalized[0], "tag0");
        assert_eq!(normalized[9], "tag9");
    }
}
