use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::str::FromStr;

use crate::goals::data::GoalID;

pub type RewardID = i64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    Unbound,
    Bound,
    Available,
    Enjoyed,
}

#[derive(Debug, Error)]
#[error("unknown reward status \"{0}\"")]
pub struct UnknownStatus(pub String);

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStatus::Unbound => "unbound",
            RewardStatus::Bound => "bound",
            RewardStatus::Available => "available",
            RewardStatus::Enjoyed => "enjoyed",
        }
    }

    /// Status of a reward freshly bound to a goal in the given state.
    pub fn for_goal(goal_is_complete: bool) -> RewardStatus {
        if goal_is_complete {
            RewardStatus::Available
        } else {
            RewardStatus::Bound
        }
    }
}

impl FromStr for RewardStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unbound" => Ok(RewardStatus::Unbound),
            "bound" => Ok(RewardStatus::Bound),
            "available" => Ok(RewardStatus::Available),
            "enjoyed" => Ok(RewardStatus::Enjoyed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl ToSql for RewardStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RewardStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: RewardID,
    pub title: String,
    pub description: String,
    pub media_file: Option<String>,
    pub status: RewardStatus,
    pub goal_ref: Option<GoalID>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalSummary {
    pub id: GoalID,
    pub title: String,
    pub is_complete: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RewardView {
    #[serde(flatten)]
    pub reward: Reward,
    pub goal: Option<GoalSummary>,
}

/// Text parts of a reward form. The uploaded file is handled separately.
#[derive(Debug, Default)]
pub struct RewardForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub goal_ref: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SetGoalRequest {
    pub goal_ref: Option<GoalID>,
}
