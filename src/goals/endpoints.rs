use chrono::offset::Utc;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};

use crate::config::TrackerConfig;
use crate::data::DBConnection;
use crate::internal_error::{InternalError, InternalResult};

use super::commands::*;
use super::data::*;
use super::helpers::construct_goal_view;

#[get("/goals?<complete>")]
pub fn get_goals(
    complete: Option<&str>,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<GoalView>>> {
    let complete = match complete {
        Some(complete) => Some(complete.parse::<bool>().map_err(|_| {
            InternalError::BadRequest(format!("invalid complete filter \"{}\"", complete))
        })?),
        None => None,
    };

    let db_connection = db_connection.lock()?;

    let goals = get_goal_views(complete, &db_connection)?;

    Ok(Json(goals))
}

#[get("/goals/<goal_id>")]
pub fn get_goal(goal_id: GoalID, db_connection: &State<DBConnection>) -> InternalResult<Json<GoalView>> {
    let db_connection = db_connection.lock()?;

    Ok(Json(get_goal_view(goal_id, &db_connection)?))
}

#[post("/goals", format = "json", data = "<new_goal>")]
pub fn add_goal(
    new_goal: Json<NewGoal>,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<GoalView>> {
    let db_connection = db_connection.lock()?;

    let goal = create_goal(new_goal.into_inner(), &db_connection)?;

    Ok(Json(construct_goal_view(goal, &db_connection)?))
}

#[put("/goals/<goal_id>", format = "json", data = "<patch>")]
pub fn set_goal(
    goal_id: GoalID,
    patch: Json<GoalPatch>,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<GoalView>> {
    let mut db_connection = db_connection.lock()?;

    let goal = update_goal(goal_id, &patch, &mut db_connection, config.update_retries)?;

    Ok(Json(construct_goal_view(goal, &db_connection)?))
}

#[delete("/goals/<goal_id>")]
pub fn remove_goal(
    goal_id: GoalID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<()> {
    let mut db_connection = db_connection.lock()?;

    delete_goal(goal_id, &mut db_connection, config.update_retries)
}

#[post("/goals/<goal_id>/completion", format = "json", data = "<request>")]
pub fn set_completion(
    goal_id: GoalID,
    request: Json<CompletionRequest>,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<GoalView>> {
    let mut db_connection = db_connection.lock()?;

    let goal = set_goal_completion(
        goal_id,
        request.is_complete,
        &mut db_connection,
        config.update_retries,
    )?;

    Ok(Json(construct_goal_view(goal, &db_connection)?))
}

#[post("/goals/<goal_id>/tasks", format = "json", data = "<new_task>")]
pub fn add_goal_task(
    goal_id: GoalID,
    new_task: Json<NewTask>,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<AddTaskResult>> {
    let mut db_connection = db_connection.lock()?;

    let (goal, task_id) = add_task(goal_id, &new_task, &mut db_connection, config.update_retries)?;

    Ok(Json(AddTaskResult {
        task_id,
        goal: construct_goal_view(goal, &db_connection)?,
    }))
}

#[put("/goals/<goal_id>/tasks/<task_id>", format = "json", data = "<patch>")]
pub fn set_goal_task(
    goal_id: GoalID,
    task_id: TaskID,
    patch: Json<TaskPatch>,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<GoalView>> {
    let mut db_connection = db_connection.lock()?;

    let goal = update_task(goal_id, task_id, &patch, &mut db_connection, config.update_retries)?;

    Ok(Json(construct_goal_view(goal, &db_connection)?))
}

#[delete("/goals/<goal_id>/tasks/<task_id>")]
pub fn remove_goal_task(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<GoalView>> {
    let mut db_connection = db_connection.lock()?;

    let goal = delete_task(goal_id, task_id, &mut db_connection, config.update_retries)?;

    Ok(Json(construct_goal_view(goal, &db_connection)?))
}

#[post("/goals/<goal_id>/tasks/<task_id>/start")]
pub fn start_task(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<GoalView>> {
    let mut db_connection = db_connection.lock()?;

    let goal = start_task_timing(
        goal_id,
        task_id,
        Utc::now(),
        &mut db_connection,
        config.update_retries,
    )?;

    Ok(Json(construct_goal_view(goal, &db_connection)?))
}

#[post("/goals/<goal_id>/tasks/<task_id>/stop")]
pub fn stop_task(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<StopTimingResult>> {
    let mut db_connection = db_connection.lock()?;

    let (goal, session) = stop_task_timing(
        goal_id,
        task_id,
        Utc::now(),
        &mut db_connection,
        config.update_retries,
    )?;

    Ok(Json(StopTimingResult {
        session,
        goal: construct_goal_view(goal, &db_connection)?,
    }))
}

#[post("/goals/<goal_id>/tasks/<task_id>/reset")]
pub fn reset_task(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &State<DBConnection>,
    config: &State<TrackerConfig>,
) -> InternalResult<Json<GoalView>> {
    let mut db_connection = db_connection.lock()?;

    let goal = reset_task_time(goal_id, task_id, &mut db_connection, config.update_retries)?;

    Ok(Json(construct_goal_view(goal, &db_connection)?))
}
