//! Page views assembled from the catalog and the local state store.

use crate::{
    errors::AppError,
    models::{Comment, LikeState, LikedMemeSummary, Meme, UploadedMeme, UserProfile},
    repositories::MemeStateStore,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

const TRENDING_LIMIT: usize = 20;

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Category {
    #[default]
    #[serde(alias = "trending")]
    Trending,
    #[serde(alias = "classic")]
    Classic,
    #[serde(alias = "all")]
    All,
}

#[derive(Deserialize, Debug, Default)]
pub struct ExplorerQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Category,
}

/// A catalog meme decorated with local like and comment state.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExplorerCard {
    pub id: String,
    pub name: String,
    pub url: String,
    pub likes: u64,
    pub comments: usize,
    pub is_liked: bool,
}

/// A non-blank search matches names case-insensitively across the whole
/// catalog; otherwise the category picks the cards.
pub fn explorer(memes: Vec<Meme>, store: &MemeStateStore, query: &ExplorerQuery) -> Vec<ExplorerCard> {
    let cards: Vec<ExplorerCard> = memes
        .into_iter()
        .map(|meme| {
            let state = store.get_like_state(&meme.id);
            ExplorerCard {
                comments: store.get_comments(&meme.id).len(),
                likes: state.like_count,
                is_liked: state.is_liked,
                id: meme.id,
                name: meme.name,
                url: meme.url,
            }
        })
        .collect();

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        return cards
            .into_iter()
            .filter(|card| card.name.to_lowercase().contains(&needle))
            .collect();
    }

    match query.category {
        Category::Trending => {
            let mut cards = cards;
            cards.sort_by(|a, b| b.likes.cmp(&a.likes));
            cards.truncate(TRENDING_LIMIT);
            cards
        }
        Category::Classic => cards.into_iter().step_by(2).collect(),
        Category::All => cards,
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct MemeDetails {
    pub meme: Meme,
    pub like_state: LikeState,
    pub comments: Vec<Comment>,
}

pub fn details(meme: Meme, store: &MemeStateStore) -> MemeDetails {
    MemeDetails {
        like_state: store.get_like_state(&meme.id),
        comments: store.get_comments(&meme.id),
        meme,
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ProfileView {
    pub profile: UserProfile,
    pub liked_memes: Vec<LikedMemeSummary>,
    pub uploaded_memes: Vec<UploadedMeme>,
}

pub fn profile(store: &MemeStateStore) -> ProfileView {
    ProfileView {
        profile: store.get_user_profile(),
        liked_memes: store.liked_memes(),
        uploaded_memes: store.uploaded_memes(),
    }
}

/// Builds a `data:` URI for an uploaded picture, guessing the type from the
/// file name when the client sent none. Non-image payloads are rejected.
pub fn picture_data_uri(bytes: &[u8], file_name: Option<&str>, content_type: Option<&str>) -> Result<String, AppError> {
    if bytes.is_empty() {
        return Err(AppError::InvalidInput("image data cannot be empty".to_string()));
    }

    let mime = content_type
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .or_else(|| file_name.and_then(|name| mime_guess::from_path(name).first_raw().map(str::to_string)))
        .ok_or_else(|| AppError::InvalidInput("could not determine image type".to_string()))?;

    if !mime.starts_with("image/") {
        return Err(AppError::InvalidInput(format!("expected an image, got {}", mime)));
    }

    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", mime, encoded))
}
