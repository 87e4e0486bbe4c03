//! Timing sessions on a single task.
//!
//! A task is in flight while `start_marker` is set. Stopping closes the
//! session, adds its whole minutes to `invested_time` and hands back a
//! [`TimingRecord`] for the history log.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::internal_error::{InternalError, InternalResult};

use super::data::{Task, TaskID};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimingRecord {
    pub task_id: TaskID,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub minutes: u32,
}

pub fn start_timing(task: &mut Task, now: DateTime<Utc>) -> InternalResult<()> {
    if task.is_timing() {
        return Err(InternalError::AlreadyTiming { task_id: task.id });
    }

    task.start_marker = Some(now);
    task.stop_marker = None;

    Ok(())
}

pub fn stop_timing(task: &mut Task, now: DateTime<Utc>) -> InternalResult<TimingRecord> {
    let started_at = task
        .start_marker
        .ok_or(InternalError::NotTiming { task_id: task.id })?;

    // A clock that went backwards yields an empty session, never a negative one.
    let minutes = (now - started_at).num_minutes().max(0);
    let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);

    task.invested_time = task.invested_time.saturating_add(minutes);
    task.start_marker = None;
    task.stop_marker = Some(now);

    Ok(TimingRecord {
        task_id: task.id,
        started_at,
        stopped_at: now,
        minutes,
    })
}

pub fn reset_invested_time(task: &mut Task) -> InternalResult<()> {
    if task.is_timing() {
        return Err(InternalError::AlreadyTiming { task_id: task.id });
    }

    task.invested_time = 0;
    task.stop_marker = None;

    Ok(())
}

/// Percentage of the expected time already invested, within `0..=100`.
pub fn progress(task: &Task) -> f64 {
    if task.expected_time == 0 {
        return 0.0;
    }

    let ratio = f64::from(task.invested_time) / f64::from(task.expected_time) * 100.0;
    ratio.min(100.0)
}
