//! The one-to-one link between a goal and a reward.
//!
//! Both sides only store the other's id. These functions are the only code
//! that writes `goals.reward_id`, `rewards.goal_id` and the binding-driven
//! reward statuses, and they expect to run inside one `atomically` unit.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::data::UpdateJournal;
use crate::goals::data::GoalID;
use crate::goals::helpers::{get_goal_from_db, write_goal_reward_ref};
use crate::internal_error::{InternalError, InternalResult};

use super::data::{RewardID, RewardStatus};
use super::helpers::{get_reward_from_db, write_reward_binding};

pub fn bind(
    goal_id: GoalID,
    reward_id: RewardID,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    let goal = get_goal_from_db(goal_id, db_connection)?;
    let reward = get_reward_from_db(reward_id, db_connection)?;

    if goal.reward_ref == Some(reward_id) && reward.goal_ref == Some(goal_id) {
        debug!(goal_id, reward_id, "already bound");
        return Ok(());
    }

    if let Some(previous_reward) = goal.reward_ref.filter(|id| *id != reward_id) {
        write_reward_binding(
            previous_reward,
            None,
            RewardStatus::Unbound,
            db_connection,
            journal,
        )?;
        info!(goal_id, reward_id = previous_reward, "released previous reward");
    }

    if let Some(previous_goal) = reward.goal_ref.filter(|id| *id != goal_id) {
        write_goal_reward_ref(previous_goal, None, db_connection, journal)?;
        info!(goal_id = previous_goal, reward_id, "released previous goal");
    }

    let status = RewardStatus::for_goal(goal.is_complete);
    write_goal_reward_ref(goal_id, Some(reward_id), db_connection, journal)?;
    write_reward_binding(reward_id, Some(goal_id), status, db_connection, journal)?;

    info!(goal_id, reward_id, status = status.as_str(), "bound reward to goal");
    Ok(())
}

pub fn unbind_goal(
    goal_id: GoalID,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    let goal = get_goal_from_db(goal_id, db_connection)?;

    let reward_id = match goal.reward_ref {
        Some(reward_id) => reward_id,
        None => return Ok(()),
    };

    write_goal_reward_ref(goal_id, None, db_connection, journal)?;
    release_reward(reward_id, goal_id, db_connection, journal)?;

    info!(goal_id, reward_id, "unbound reward from goal");
    Ok(())
}

pub fn unbind_reward(
    reward_id: RewardID,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    let reward = get_reward_from_db(reward_id, db_connection)?;

    let goal_id = match reward.goal_ref {
        Some(goal_id) => goal_id,
        None => return Ok(()),
    };

    write_reward_binding(reward_id, None, RewardStatus::Unbound, db_connection, journal)?;

    match get_goal_from_db(goal_id, db_connection) {
        Ok(goal) if goal.reward_ref == Some(reward_id) => {
            write_goal_reward_ref(goal_id, None, db_connection, journal)?;
        }
        Ok(_) | Err(InternalError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    info!(goal_id, reward_id, "unbound goal from reward");
    Ok(())
}

fn release_reward(
    reward_id: RewardID,
    goal_id: GoalID,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    match get_reward_from_db(reward_id, db_connection) {
        Ok(reward) if reward.goal_ref == Some(goal_id) => {
            write_reward_binding(reward_id, None, RewardStatus::Unbound, db_connection, journal)?;
        }
        Ok(_) | Err(InternalError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    Ok(())
}
