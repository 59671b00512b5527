//! String encodings for every record kept in the key-value store.
//!
//! Decoders never fail. A missing value decodes to the type's default and a
//! malformed one does too, after a warning is logged. Lists decode element by
//! element, so one bad entry never hides the rest.

use crate::models::{Comment, LeaderboardUser, LikedMemeSummary, UploadedMeme};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing;

pub const LIKED_MEMES_KEY: &str = "likedMemes";
pub const TOP_USERS_KEY: &str = "topUsers";
pub const UPLOADED_MEMES_KEY: &str = "uploadedMemes";
pub const USERNAME_KEY: &str = "username";
pub const BIO_KEY: &str = "bio";
pub const PROFILE_PICTURE_KEY: &str = "profilePicture";

pub fn likes_key(meme_id: &str) -> String {
    format!("likes_{}", meme_id)
}

pub fn is_liked_key(meme_id: &str) -> String {
    format!("isLiked_{}", meme_id)
}

pub fn comments_key(meme_id: &str) -> String {
    format!("comments_{}", meme_id)
}

pub fn encode_count(count: u64) -> String {
    count.to_string()
}

/// Like counters written by older clients may be negative or fractional JSON numbers.
pub fn decode_count(key: &str, raw: Option<&str>) -> u64 {
    let Some(raw) = raw else { return 0 };
    let trimmed = raw.trim();
    if let Ok(count) = trimmed.parse::<u64>() {
        return count;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value.max(0.0) as u64,
        _ => {
            tracing::warn!(%key, value = %raw, "Malformed like count, treating as 0");
            0
        }
    }
}

pub fn encode_flag(flag: bool) -> String {
    flag.to_string()
}

pub fn decode_flag(key: &str, raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        None => false,
        Some("true") => true,
        Some("false") => false,
        Some(other) => {
            tracing::warn!(%key, value = %other, "Malformed like flag, treating as false");
            false
        }
    }
}

fn encode_list<T: Serialize>(key: &str, items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|e| {
        // Plain structs of strings and integers cannot fail to serialize
        tracing::error!(%key, error = %e, "Failed to encode record list");
        "[]".to_string()
    })
}

/// Key an unreadable list is copied to before it is replaced.
pub fn unreadable_key(key: &str) -> String {
    format!("{}_unreadable_{}", key, chrono::Utc::now().timestamp_millis())
}

/// A stored list kept as raw JSON elements. Rewriting it preserves entries
/// that do not decode into this crate's records.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawList {
    pub items: Vec<Value>,
    /// Original text of a stored value that is not a JSON list at all.
    pub unreadable: Option<String>,
}

impl RawList {
    pub fn read(key: &str, raw: Option<&str>) -> Self {
        let Some(raw) = raw else { return Self::default() };
        // `null` is what JSON.stringify leaves behind for a cleared list
        match serde_json::from_str::<Option<Vec<Value>>>(raw) {
            Ok(items) => Self {
                items: items.unwrap_or_default(),
                unreadable: None,
            },
            Err(e) => {
                tracing::warn!(%key, error = %e, "Malformed record list, treating as empty");
                Self {
                    items: Vec::new(),
                    unreadable: Some(raw.to_string()),
                }
            }
        }
    }

    /// True only for an absent, `null` or `[]` value.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.unreadable.is_none()
    }

    /// Decodes each element on its own, skipping the ones that do not fit.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match T::deserialize(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(%key, index, error = %e, "Skipping malformed record");
                    None
                }
            })
            .collect()
    }

    pub fn push<T: Serialize>(&mut self, key: &str, record: &T) {
        match serde_json::to_value(record) {
            Ok(value) => self.items.push(value),
            Err(e) => tracing::error!(%key, error = %e, "Failed to encode record"),
        }
    }

    /// Drops every element whose `id` (string or number) equals `id`.
    pub fn remove_id(&mut self, id: &str) {
        self.items.retain(|item| !id_matches(item, id));
    }

    /// Largest integer `id` among the elements.
    pub fn max_int_id(&self) -> Option<i64> {
        self.items.iter().filter_map(|item| item.get("id")?.as_i64()).max()
    }

    /// Entries committing the list, plus a copy of an unreadable original.
    pub fn into_entries(self, key: &str) -> Vec<(String, String)> {
        let mut entries = vec![(key.to_string(), encode_list(key, &self.items))];
        if let Some(original) = self.unreadable {
            let backup = unreadable_key(key);
            tracing::warn!(%key, %backup, "Keeping unreadable list under a backup key");
            entries.push((backup, original));
        }
        entries
    }
}

fn id_matches(item: &Value, id: &str) -> bool {
    match item.get("id") {
        Some(Value::String(s)) => s == id,
        Some(Value::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

fn decode_list<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Vec<T> {
    RawList::read(key, raw).decode(key)
}

pub fn decode_comments(key: &str, raw: Option<&str>) -> Vec<Comment> {
    decode_list(key, raw)
}

pub fn decode_liked_memes(raw: Option<&str>) -> Vec<LikedMemeSummary> {
    decode_list(LIKED_MEMES_KEY, raw)
}

pub fn encode_users(users: &[LeaderboardUser]) -> String {
    encode_list(TOP_USERS_KEY, users)
}

pub fn decode_users(raw: Option<&str>) -> Vec<LeaderboardUser> {
    decode_list(TOP_USERS_KEY, raw)
}

pub fn decode_uploads(raw: Option<&str>) -> Vec<UploadedMeme> {
    decode_list(UPLOADED_MEMES_KEY, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    #[test]
    fn counts_default_and_clamp() {
        assert_eq!(decode_count("likes_1", None), 0);
        assert_eq!(decode_count("likes_1", Some("7")), 7);
        assert_eq!(decode_count("likes_1", Some("-1")), 0);
        assert_eq!(decode_count("likes_1", Some("2.0")), 2);
        assert_eq!(decode_count("likes_1", Some("lots")), 0);
        assert_eq!(decode_count("likes_1", Some(&encode_count(42))), 42);
    }

    #[test]
    fn flags_accept_only_booleans() {
        assert!(decode_flag("isLiked_1", Some(&encode_flag(true))));
        assert!(!decode_flag("isLiked_1", Some(&encode_flag(false))));
        assert!(!decode_flag("isLiked_1", None));
        assert!(!decode_flag("isLiked_1", Some("yes")));
    }

    #[test]
    fn comments_round_trip() {
        let comments = vec![
            Comment { id: 1_700_000_000_000, text: "lol".into(), username: "Anonymous".into() },
            Comment { id: 1_700_000_000_001, text: "same".into(), username: "Dana".into() },
        ];
        let mut list = RawList::default();
        for comment in &comments {
            list.push("comments_1", comment);
        }
        let entries = list.into_entries("comments_1");
        assert_eq!(entries.len(), 1);
        assert_eq!(decode_comments("comments_1", Some(&entries[0].1)), comments);
    }

    #[test]
    fn lists_decode_element_by_element() {
        let raw = r#"[{"id":1,"text":"old","username":"A"},{"id":2,"text":"no user"},{"id":3}]"#;
        let comments = decode_comments("comments_m1", Some(raw));
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].username, "A");
        assert_eq!(comments[1].username, "Anonymous");

        let list = RawList::read("comments_m1", Some(raw));
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.max_int_id(), Some(3));
    }

    #[test]
    fn remove_id_matches_string_and_number_ids() {
        let mut list = RawList::read(LIKED_MEMES_KEY, Some(r#"[{"id":"7"},{"id":7},{"id":"8"}]"#));
        list.remove_id("7");
        assert_eq!(list.items, vec![serde_json::json!({ "id": "8" })]);
    }

    #[test]
    fn unreadable_list_is_backed_up_on_rewrite() {
        let list = RawList::read("comments_m1", Some("{oops"));
        assert!(!list.is_empty());
        let entries = list.into_entries("comments_m1");
        assert_eq!(entries[0], ("comments_m1".to_string(), "[]".to_string()));
        assert!(entries[1].0.starts_with("comments_m1_unreadable_"));
        assert_eq!(entries[1].1, "{oops");
    }

    #[test]
    fn reads_records_written_by_the_browser_app() {
        let raw = r#"[{"id":"61579","name":"One Does Not Simply","url":"https://i.imgflip.com/1bij.jpg","likes":3}]"#;
        let memes = decode_liked_memes(Some(raw));
        assert_eq!(memes.len(), 1);
        assert_eq!(memes[0].likes, 3);

        let raw = r#"[{"id":1,"name":"User1","score":120},{"id":"alice","name":"Alice","score":500}]"#;
        let users = decode_users(Some(raw));
        assert_eq!(users[0].score, 120);
        assert_eq!(users[1].id, UserId::Text("alice".to_string()));
    }

    #[test]
    fn malformed_lists_decode_empty() {
        assert!(RawList::read(TOP_USERS_KEY, Some("null")).is_empty());
        assert!(decode_comments("comments_1", Some("{oops")).is_empty());
        assert!(decode_liked_memes(Some("null")).is_empty());
        assert!(decode_users(Some(r#"[{"name":"no id"}]"#)).is_empty());
        assert!(decode_uploads(None).is_empty());
    }
}
