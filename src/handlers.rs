use crate::{
    errors::AppError,
    leaderboard::LeaderboardSnapshot,
    models::{Comment, LikeState, MemeMeta, MemeTemplate, UploadedMeme, UserProfile},
    views::{self, ExplorerCard, ExplorerQuery, MemeDetails, ProfileView},
    AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing;

/// Explorer page. A catalog outage shows up as an empty list.
pub async fn list_memes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExplorerQuery>,
) -> Json<Vec<ExplorerCard>> {
    let memes = match state.catalog.list_memes().await {
        Ok(memes) => memes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch memes, showing none");
            Vec::new()
        }
    };
    Json(views::explorer(memes, &state.store, &query))
}

/// Details page for one catalog meme.
pub async fn get_meme(
    State(state): State<Arc<AppState>>,
    Path(meme_id): Path<String>,
) -> Result<Json<MemeDetails>, AppError> {
    tracing::debug!(%meme_id, "Fetching meme details via handler");
    let meme = state
        .catalog
        .list_memes()
        .await?
        .into_iter()
        .find(|m| m.id == meme_id)
        .ok_or_else(|| AppError::MemeNotFound(meme_id.clone()))?;
    Ok(Json(views::details(meme, &state.store)))
}

pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    Path(meme_id): Path<String>,
    Json(meta): Json<MemeMeta>,
) -> Json<LikeState> {
    Json(state.store.toggle_like(&meme_id, &meta))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(meme_id): Path<String>,
) -> Json<Vec<Comment>> {
    Json(state.store.get_comments(&meme_id))
}

#[derive(Deserialize, Debug)]
pub struct NewComment {
    pub text: String,
}

/// Responds with the whole thread; `201` when the comment was added, `200`
/// when blank text was ignored.
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(meme_id): Path<String>,
    Json(body): Json<NewComment>,
) -> impl IntoResponse {
    let status = match state.store.add_comment(&meme_id, &body.text) {
        Some(_) => StatusCode::CREATED,
        None => StatusCode::OK,
    };
    (status, Json(state.store.get_comments(&meme_id)))
}

pub async fn get_profile(State(state): State<Arc<AppState>>) -> Json<ProfileView> {
    Json(views::profile(&state.store))
}

#[derive(Deserialize, Debug)]
pub struct ProfileUpdate {
    pub name: String,
    pub bio: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Saves name and bio; the picture is kept unless the body carries one.
pub async fn save_profile(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> Json<ProfileView> {
    let profile_picture = update
        .profile_picture
        .unwrap_or_else(|| state.store.get_user_profile().profile_picture);
    state.store.save_user_profile(&UserProfile {
        name: update.name,
        bio: update.bio,
        profile_picture,
    });
    Json(views::profile(&state.store))
}

pub async fn upload_profile_picture(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UserProfile>, AppError> {
    let mut picture = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            tracing::debug!("Ignoring unknown multipart field: {:?}", field.name());
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        picture = Some(views::picture_data_uri(&bytes, file_name.as_deref(), content_type.as_deref())?);
    }

    let picture = picture.ok_or_else(|| AppError::MissingFormField("image".to_string()))?;
    state.store.set_profile_picture(&picture);
    Ok(Json(state.store.get_user_profile()))
}

pub async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Json<LeaderboardSnapshot> {
    Json(state.leaderboard.snapshot())
}

pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<Vec<MemeTemplate>> {
    match state.templates.list_templates().await {
        Ok(templates) => Json(templates),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch templates, showing none");
            Json(Vec::new())
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct CaptionQuery {
    #[serde(default)]
    pub top: String,
    #[serde(default)]
    pub bottom: String,
}

pub async fn caption_preview(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    Query(caption): Query<CaptionQuery>,
) -> Json<serde_json::Value> {
    let url = state.templates.caption_url(&template_id, &caption.top, &caption.bottom);
    Json(serde_json::json!({ "url": url }))
}

/// Uploads either a device image (`image` field) or a captioned template
/// (`template`, `top`, `bottom`) to the image host and records the result.
pub async fn upload_meme(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut name = None;
    let mut template = None;
    let mut top = String::new();
    let mut bottom = String::new();
    let mut image_data: Option<Vec<u8>> = None;
    let mut image_filename: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "name" => name = Some(field.text().await?),
            "template" => template = Some(field.text().await?).filter(|t| !t.trim().is_empty()),
            "top" => top = field.text().await?,
            "bottom" => bottom = field.text().await?,
            "image" => {
                image_filename = field.file_name().map(|s| s.to_string());
                image_data = Some(field.bytes().await?.to_vec()).filter(|data| !data.is_empty());
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    // A device image wins over a template, as in the upload form
    let (image, default_name) = match (image_data, template) {
        (Some(data), _) => (data, image_filename.unwrap_or_else(|| "Uploaded meme".to_string())),
        (None, Some(template_id)) => {
            tracing::debug!(%template_id, "Rendering caption before upload");
            (state.templates.render(&template_id, &top, &bottom).await?, template_id)
        }
        (None, None) => {
            return Err(AppError::InvalidInput(
                "Please select an image or create a meme first.".to_string(),
            ))
        }
    };

    let url = state.image_host.upload(&image).await?;
    let name = name.filter(|n| !n.trim().is_empty()).unwrap_or(default_name);
    let upload: UploadedMeme = state.store.record_upload(&name, &url);

    tracing::info!(upload_id = %upload.id, "Meme uploaded successfully via handler");
    Ok((StatusCode::CREATED, Json(upload)))
}
