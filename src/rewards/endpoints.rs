use rocket::data::Data;
use rocket::http::ContentType;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use rocket_multipart_form_data::{
    MultipartFormData, MultipartFormDataField, MultipartFormDataOptions,
};

use crate::config::TrackerConfig;
use crate::data::DBConnection;
use crate::goals::data::GoalID;
use crate::internal_error::{InternalError, InternalResult};
use crate::media::{discard_upload, store_upload};

use super::commands::*;
use super::data::*;
use super::helpers::construct_reward_view;

const FORM_TEXT_ALLOWANCE: u64 = 64 * 1024;

fn take_text(form: &mut MultipartFormData, name: &str) -> Option<String> {
    form.texts
        .remove(name)
        .and_then(|fields| fields.into_iter().next())
        .map(|field| field.text)
}

/// Parses a reward form, checks it with `validate` and only then stores its
/// media file, if any. This finishes before any handler takes the database lock.
async fn read_reward_form(
    content_type: &ContentType,
    data: Data<'_>,
    config: &TrackerConfig,
    validate: fn(&RewardForm) -> InternalResult<()>,
) -> InternalResult<(RewardForm, Option<String>)> {
    let max_media_bytes = config.max_media_kib * 1024;
    let mut options = MultipartFormDataOptions::with_multipart_form_data_fields(vec![
        MultipartFormDataField::text("title"),
        MultipartFormDataField::text("description"),
        MultipartFormDataField::text("goalRef"),
        MultipartFormDataField::text("status"),
        MultipartFormDataField::file("mediaFile").size_limit(max_media_bytes),
    ]);
    options.max_data_bytes = max_media_bytes + FORM_TEXT_ALLOWANCE;

    let mut multipart = MultipartFormData::parse(content_type, data, options).await?;

    let form = RewardForm {
        title: take_text(&mut multipart, "title"),
        description: take_text(&mut multipart, "description"),
        goal_ref: take_text(&mut multipart, "goalRef"),
        status: take_text(&mut multipart, "status"),
    };
    validate(&form)?;

    let upload = multipart
        .files
        .get("mediaFile")
        .and_then(|files| files.first());
    let media_file = match upload {
        Some(file) => Some(
            store_upload(&file.path, file.file_name.as_deref(), &config.media_dir).await?,
        ),
        None => None,
    };

    Ok((form, media_file))
}

#[get("/rewards?<status>")]
pub fn get_rewards(
    status: Option<&str>,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<RewardView>>> {
    let status = match status {
        Some(status) => Some(
            status
                .parse::<RewardStatus>()
                .map_err(|e| InternalError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let db_connection = db_connection.lock()?;

    Ok(Json(get_reward_views(status, &db_connection)?))
}

#[get("/rewards/<reward_id>")]
pub fn get_reward(
    reward_id: RewardID,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<RewardView>> {
    let db_connection = db_connection.lock()?;

    Ok(Json(get_reward_view(reward_id, &db_connection)?))
}

#[post("/rewards", data = "<data>")]
pub async fn add_reward(
    content_type: &ContentType,
    data: Data<'_>,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<RewardView>> {
    let (form, media_file) =
        read_reward_form(content_type, data, config, validate_new_reward).await?;

    let created = {
        let mut db_connection = db_connection.lock()?;
        create_reward(form, media_file.clone(), &mut db_connection, config.update_retries)
            .and_then(|reward| construct_reward_view(reward, &db_connection))
    };

    if let (Err(_), Some(stored_name)) = (&created, &media_file) {
        discard_upload(stored_name, &config.media_dir).await;
    }

    Ok(Json(created?))
}

#[put("/rewards/<reward_id>", data = "<data>")]
pub async fn set_reward(
    reward_id: RewardID,
    content_type: &ContentType,
    data: Data<'_>,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<RewardView>> {
    let (form, media_file) =
        read_reward_form(content_type, data, config, validate_reward_update).await?;

    let updated = {
        let db_connection = db_connection.lock()?;
        update_reward(reward_id, form, media_file.clone(), &db_connection)
            .and_then(|reward| construct_reward_view(reward, &db_connection))
    };

    if let (Err(_), Some(stored_name)) = (&updated, &media_file) {
        discard_upload(stored_name, &config.media_dir).await;
    }

    Ok(Json(updated?))
}

#[delete("/rewards/<reward_id>")]
pub fn remove_reward(
    reward_id: RewardID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<()> {
    let mut db_connection = db_connection.lock()?;

    delete_reward(reward_id, &mut db_connection, config.update_retries)
}

#[put("/rewards/<reward_id>/goal", format = "json", data = "<request>")]
pub fn set_goal_of_reward(
    reward_id: RewardID,
    request: Json<SetGoalRequest>,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<RewardView>> {
    let mut db_connection = db_connection.lock()?;

    let reward = set_reward_goal(
        reward_id,
        request.goal_ref,
        &mut db_connection,
        config.update_retries,
    )?;

    Ok(Json(construct_reward_view(reward, &db_connection)?))
}

#[post("/rewards/<reward_id>/enjoy")]
pub fn enjoy(
    reward_id: RewardID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<RewardView>> {
    let mut db_connection = db_connection.lock()?;

    let reward = enjoy_reward(reward_id, &mut db_connection, config.update_retries)?;

    Ok(Json(construct_reward_view(reward, &db_connection)?))
}

#[put("/goals/<goal_id>/reward/<reward_id>")]
pub fn bind_goal_reward(
    goal_id: GoalID,
    reward_id: RewardID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<RewardView>> {
    let mut db_connection = db_connection.lock()?;

    bind_reward_to_goal(goal_id, reward_id, &mut db_connection, config.update_retries)?;

    Ok(Json(get_reward_view(reward_id, &db_connection)?))
}

#[delete("/goals/<goal_id>/reward")]
pub fn release_goal_reward(
    goal_id: GoalID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<()> {
    let mut db_connection = db_connection.lock()?;

    unbind_goal_reward(goal_id, &mut db_connection, config.update_retries)
}
