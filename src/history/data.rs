use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::goals::data::{GoalID, TaskID};

pub type SessionID = i64;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSession {
    pub id: SessionID,
    pub goal_id: GoalID,
    pub task_id: TaskID,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub minutes: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionDay {
    pub date: NaiveDate,
    pub total_minutes: u64,
    pub sessions: Vec<TaskSession>,
}
