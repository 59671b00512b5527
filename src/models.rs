use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local like counter and flag for a single meme.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LikeState {
    pub meme_id: String,
    pub like_count: u64,
    pub is_liked: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    #[serde(default)]
    pub id: i64,
    pub text: String,
    #[serde(default = "anonymous")]
    pub username: String,
}

pub fn anonymous() -> String {
    "Anonymous".to_string()
}

/// Leaderboard-facing copy of a meme that is currently liked.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LikedMemeSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub likes: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub bio: String,
    pub profile_picture: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "John Doe".to_string(),
            bio: "Meme enthusiast".to_string(),
            profile_picture: "/placeholder.svg".to_string(),
        }
    }
}

/// Browser-written user lists carry either numeric or string ids.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardUser {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadedMeme {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub url: String,
}

/// A meme as listed by the external catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Meme {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub box_count: u32,
}

/// Caller-supplied metadata recorded alongside a like.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemeMeta {
    pub name: String,
    pub url: String,
}

impl From<&Meme> for MemeMeta {
    fn from(meme: &Meme) -> Self {
        Self {
            name: meme.name.clone(),
            url: meme.url.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemeTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "blank")]
    pub blank_url: String,
}
