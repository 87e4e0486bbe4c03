use rocket::serde::json::Json;
use rocket::{get, State};

use crate::data::DBConnection;
use crate::goals::data::{GoalID, TaskID};
use crate::goals::helpers::get_goal_from_db;
use crate::internal_error::InternalResult;

use super::data::*;
use super::helpers::*;

#[get("/sessions")]
pub fn get_sessions(db_connection: &State<DBConnection>) -> InternalResult<Json<Vec<SessionDay>>> {
    let db_connection = db_connection.lock()?;

    let sessions = get_all_sessions_from_db(&db_connection)?;

    Ok(Json(group_sessions_by_day(sessions)))
}

#[get("/goals/<goal_id>/tasks/<task_id>/sessions")]
pub fn get_task_sessions(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<TaskSession>>> {
    let db_connection = db_connection.lock()?;

    get_goal_from_db(goal_id, &db_connection)?.task(task_id)?;
    let sessions = get_task_sessions_from_db(goal_id, task_id, &db_connection)?;

    Ok(Json(sessions))
}
