use chrono::offset::Utc;
use rocket::serde::json::Json;
use rocket::tokio::fs;
use rocket::{get, State};
use serde::Serialize;
use tracing::{info, warn};

use std::path::Path;

use crate::config::TrackerConfig;
use crate::internal_error::{InternalError, InternalResult};

#[derive(Serialize, Debug, Clone)]
pub struct MediaListResponse {
    pub media: Vec<String>,
}

/// Reduces a client supplied file name to its last path component.
pub fn sanitize_file_name(original: &str) -> InternalResult<String> {
    let name = Path::new(original)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    if name.is_empty() || name.starts_with('.') {
        return Err(InternalError::BadRequest(format!(
            "invalid media file name \"{}\"",
            original
        )));
    }

    Ok(name)
}

/// Copies an uploaded temporary file into the media folder as
/// `<unix millis>-<original name>` and returns the stored name.
pub async fn store_upload(
    temp_path: &Path,
    original_name: Option<&str>,
    media_dir: &Path,
) -> InternalResult<String> {
    let original_name = sanitize_file_name(original_name.unwrap_or("upload"))?;
    let stored_name = format!("{}-{}", Utc::now().timestamp_millis(), original_name);

    let media_path = media_dir.join(&stored_name);

    fs::create_dir_all(media_dir).await?;
    fs::copy(temp_path, &media_path).await?;

    info!(file = %stored_name, "stored uploaded media");
    Ok(stored_name)
}

/// Removes a stored upload whose request was refused.
pub async fn discard_upload(stored_name: &str, media_dir: &Path) {
    match fs::remove_file(media_dir.join(stored_name)).await {
        Ok(()) => info!(file = %stored_name, "discarded refused upload"),
        Err(e) => warn!(file = %stored_name, "failed to discard upload: {}", e),
    }
}

pub fn get_media_filenames(media_dir: &Path) -> InternalResult<Vec<String>> {
    let mut media_files: Vec<String> = std::fs::read_dir(media_dir)?
        .filter_map(|dir_entry| match dir_entry {
            Ok(v) => Some(v.path().file_name()?.to_string_lossy().to_string()),
            Err(_) => None,
        })
        .collect();
    media_files.sort();

    Ok(media_files)
}

#[get("/media")]
pub fn get_media_list(config: &State<TrackerConfig>) -> InternalResult<Json<MediaListResponse>> {
    let media = MediaListResponse {
        media: get_media_filenames(&config.media_dir)?,
    };

    Ok(Json(media))
}
