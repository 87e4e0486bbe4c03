use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use std::str::FromStr;

use crate::history::data::TaskSession;
use crate::internal_error::{InternalError, InternalResult};
use crate::rewards::data::{RewardID, RewardStatus};

use super::timing;

pub type GoalID = i64;
pub type TaskID = i64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskID,
    pub title: String,
    pub category: String,
    pub expected_time: u32,
    pub invested_time: u32,
    pub start_marker: Option<DateTime<Utc>>,
    pub stop_marker: Option<DateTime<Utc>>,
    pub is_complete: bool,
}

impl Task {
    pub fn new(id: TaskID, title: String, category: String, expected_time: u32) -> Task {
        Task {
            id,
            title,
            category,
            expected_time,
            invested_time: 0,
            start_marker: None,
            stop_marker: None,
            is_complete: false,
        }
    }

    pub fn is_timing(&self) -> bool {
        self.start_marker.is_some()
    }
}

/// Who decided the current value of `Goal::is_complete`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionSource {
    Derived,
    Explicit,
}

#[derive(Debug, Error)]
#[error("unknown completion source \"{0}\"")]
pub struct UnknownCompletionSource(pub String);

impl CompletionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionSource::Derived => "derived",
            CompletionSource::Explicit => "explicit",
        }
    }
}

impl FromStr for CompletionSource {
    type Err = UnknownCompletionSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "derived" => Ok(CompletionSource::Derived),
            "explicit" => Ok(CompletionSource::Explicit),
            other => Err(UnknownCompletionSource(other.to_string())),
        }
    }
}

impl ToSql for CompletionSource {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CompletionSource {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Marks a field as sent whenever its key is present, `null` included.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalID,
    pub title: String,
    pub description: String,
    pub expected_time: u32,
    pub tasks: Vec<Task>,
    pub is_complete: bool,
    pub completion_source: CompletionSource,
    pub reward_ref: Option<RewardID>,
    #[serde(skip)]
    pub next_task_id: TaskID,
}

impl Goal {
    pub fn task(&self, task_id: TaskID) -> InternalResult<&Task> {
        self.tasks
            .iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| InternalError::not_found("task", task_id))
    }

    pub fn task_mut(&mut self, task_id: TaskID) -> InternalResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| InternalError::not_found("task", task_id))
    }

    pub fn invested_time(&self) -> u64 {
        self.tasks.iter().map(|task| u64::from(task.invested_time)).sum()
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewGoal {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expected_time: u32,
}

/// Editable goal fields. `rewardRef` and `isComplete` are accepted by the
/// parser only so they can be refused with a precise error.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GoalPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub expected_time: Option<u32>,
    #[serde(default, deserialize_with = "present")]
    pub reward_ref: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub is_complete: Option<Value>,
}

impl GoalPatch {
    pub fn validate(&self) -> InternalResult<()> {
        if self.reward_ref.is_some() {
            return Err(InternalError::invariant(
                "rewardRef can only be changed by binding or unbinding a reward",
            ));
        }
        if self.is_complete.is_some() {
            return Err(InternalError::invariant(
                "isComplete can only be changed through the completion toggle",
            ));
        }
        Ok(())
    }

    pub fn apply(&self, goal: &mut Goal) {
        if let Some(title) = &self.title {
            goal.title = title.clone();
        }
        if let Some(description) = &self.description {
            goal.description = description.clone();
        }
        if let Some(expected_time) = self.expected_time {
            goal.expected_time = expected_time;
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub expected_time: u32,
    #[serde(default)]
    pub is_complete: bool,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub expected_time: Option<u32>,
    pub is_complete: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub invested_time: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub start_marker: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub stop_marker: Option<Value>,
}

impl TaskPatch {
    pub fn validate(&self) -> InternalResult<()> {
        if self.invested_time.is_some()
            || self.start_marker.is_some()
            || self.stop_marker.is_some()
        {
            return Err(InternalError::invariant(
                "time tracking fields can only be changed by starting, stopping or resetting a timer",
            ));
        }
        Ok(())
    }

    /// Applies the patch and reports whether the task's completion flag flipped.
    pub fn apply(&self, task: &mut Task) -> bool {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(category) = &self.category {
            task.category = category.clone();
        }
        if let Some(expected_time) = self.expected_time {
            task.expected_time = expected_time;
        }
        match self.is_complete {
            Some(is_complete) if is_complete != task.is_complete => {
                task.is_complete = is_complete;
                true
            }
            _ => false,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CompletionRequest {
    pub is_complete: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardSummary {
    pub id: RewardID,
    pub title: String,
    pub status: RewardStatus,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub progress: f64,
}

/// A goal as returned to callers: tasks carry their progress and the bound
/// reward is resolved to a summary.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GoalView {
    pub id: GoalID,
    pub title: String,
    pub description: String,
    pub expected_time: u32,
    pub invested_time: u64,
    pub is_complete: bool,
    pub completion_source: CompletionSource,
    pub reward_ref: Option<RewardID>,
    pub reward: Option<RewardSummary>,
    pub tasks: Vec<TaskView>,
}

impl GoalView {
    pub fn new(goal: Goal, reward: Option<RewardSummary>) -> GoalView {
        let invested_time = goal.invested_time();

        GoalView {
            id: goal.id,
            title: goal.title,
            description: goal.description,
            expected_time: goal.expected_time,
            invested_time,
            is_complete: goal.is_complete,
            completion_source: goal.completion_source,
            reward_ref: goal.reward_ref,
            reward,
            tasks: goal
                .tasks
                .into_iter()
                .map(|task| TaskView {
                    progress: timing::progress(&task),
                    task,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddTaskResult {
    pub task_id: TaskID,
    pub goal: GoalView,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StopTimingResult {
    pub session: TaskSession,
    pub goal: GoalView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_reject_managed_fields() {
        let patch: GoalPatch = serde_json::from_str(r#"{"rewardRef": 4}"#).unwrap();
        assert!(matches!(
            patch.validate(),
            Err(InternalError::InvariantViolation(_))
        ));

        let patch: TaskPatch = serde_json::from_str(r#"{"investedTime": 90}"#).unwrap();
        assert!(matches!(
            patch.validate(),
            Err(InternalError::InvariantViolation(_))
        ));
    }

    #[test]
    fn managed_fields_sent_as_null_are_rejected() {
        let patch: GoalPatch = serde_json::from_str(r#"{"rewardRef": null}"#).unwrap();
        assert!(matches!(
            patch.validate(),
            Err(InternalError::InvariantViolation(_))
        ));

        let patch: TaskPatch = serde_json::from_str(r#"{"startMarker": null}"#).unwrap();
        assert!(matches!(
            patch.validate(),
            Err(InternalError::InvariantViolation(_))
        ));

        let patch: GoalPatch = serde_json::from_str(r#"{"title": "t"}"#).unwrap();
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn completion_source_names_are_strict() {
        assert_eq!(
            "explicit".parse::<CompletionSource>().unwrap(),
            CompletionSource::Explicit
        );
        assert!("sticky".parse::<CompletionSource>().is_err());
    }

    #[test]
    fn patches_reject_unknown_fields() {
        assert!(serde_json::from_str::<GoalPatch>(r#"{"owner": "me"}"#).is_err());
        assert!(serde_json::from_str::<TaskPatch>(r#"{"duration": 5}"#).is_err());
    }

    #[test]
    fn task_patch_reports_completion_flips() {
        let mut task = Task::new(1, "read".to_string(), String::new(), 30);

        let patch: TaskPatch = serde_json::from_str(r#"{"title": "read more"}"#).unwrap();
        assert!(!patch.apply(&mut task));

        let patch: TaskPatch = serde_json::from_str(r#"{"isComplete": true}"#).unwrap();
        assert!(patch.apply(&mut task));

        let patch: TaskPatch = serde_json::from_str(r#"{"isComplete": true}"#).unwrap();
        assert!(!patch.apply(&mut task));
        assert_eq!(task.title, "read more");
    }
}
