use rusqlite::Connection;
use tracing::info;

use crate::data::atomically;
use crate::goals::data::GoalID;
use crate::internal_error::{InternalError, InternalResult};

use super::binding::{bind, unbind_goal, unbind_reward};
use super::data::*;
use super::helpers::*;

fn parse_goal_ref(goal_ref: &str) -> InternalResult<Option<GoalID>> {
    let goal_ref = goal_ref.trim();
    if goal_ref.is_empty() {
        return Ok(None);
    }

    goal_ref
        .parse()
        .map(Some)
        .map_err(|_| InternalError::BadRequest(format!("invalid goalRef \"{}\"", goal_ref)))
}

fn reject_status(form: &RewardForm) -> InternalResult<()> {
    if form.status.is_some() {
        return Err(InternalError::invariant(
            "reward status is derived from its goal and cannot be set",
        ));
    }
    Ok(())
}

fn validate_title(title: &str) -> InternalResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(InternalError::BadRequest("a reward needs a title".to_string()));
    }
    Ok(title.to_string())
}

/// Checks everything about a creation form that does not need the store.
pub fn validate_new_reward(form: &RewardForm) -> InternalResult<()> {
    reject_status(form)?;
    validate_title(form.title.as_deref().unwrap_or_default())?;
    if let Some(goal_ref) = form.goal_ref.as_deref() {
        parse_goal_ref(goal_ref)?;
    }
    Ok(())
}

pub fn validate_reward_update(form: &RewardForm) -> InternalResult<()> {
    reject_status(form)?;
    if form.goal_ref.is_some() {
        return Err(InternalError::invariant(
            "goalRef can only be changed by binding or unbinding a goal",
        ));
    }
    if let Some(title) = form.title.as_deref() {
        validate_title(title)?;
    }
    Ok(())
}

/// Creates an unbound reward, binding it straight away when the form names a goal.
pub fn create_reward(
    form: RewardForm,
    media_file: Option<String>,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Reward> {
    validate_new_reward(&form)?;

    let title = validate_title(form.title.as_deref().unwrap_or_default())?;
    let description = form.description.unwrap_or_default();
    let goal_ref = match form.goal_ref.as_deref() {
        Some(goal_ref) => parse_goal_ref(goal_ref)?,
        None => None,
    };

    let reward_id = atomically(db_connection, attempts, |tx, journal| {
        let reward_id = insert_reward(&title, &description, media_file.as_deref(), tx)?;
        if let Some(goal_id) = goal_ref {
            bind(goal_id, reward_id, tx, journal)?;
        }
        Ok(reward_id)
    })?;

    info!(reward_id, ?goal_ref, "reward created");
    get_reward_from_db(reward_id, db_connection)
}

/// Edits title, description and media. A missing media file keeps the old one.
pub fn update_reward(
    reward_id: RewardID,
    form: RewardForm,
    media_file: Option<String>,
    db_connection: &Connection,
) -> InternalResult<Reward> {
    validate_reward_update(&form)?;

    let mut reward = get_reward_from_db(reward_id, db_connection)?;
    if let Some(title) = form.title.as_deref() {
        reward.title = validate_title(title)?;
    }
    if let Some(description) = form.description {
        reward.description = description;
    }
    if media_file.is_some() {
        reward.media_file = media_file;
    }

    write_reward_details(&reward, db_connection)?;

    info!(reward_id, "reward updated");
    Ok(reward)
}

pub fn enjoy_reward(
    reward_id: RewardID,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Reward> {
    atomically(db_connection, attempts, |tx, journal| {
        let mut reward = get_reward_from_db(reward_id, tx)?;
        if reward.status != RewardStatus::Available {
            return Err(InternalError::invariant(format!(
                "only an available reward can be enjoyed, reward {} is {}",
                reward_id,
                reward.status.as_str()
            )));
        }

        write_reward_status(reward_id, RewardStatus::Enjoyed, tx, journal)?;
        reward.status = RewardStatus::Enjoyed;

        info!(reward_id, "reward enjoyed");
        Ok(reward)
    })
}

pub fn bind_reward_to_goal(
    goal_id: GoalID,
    reward_id: RewardID,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<()> {
    atomically(db_connection, attempts, |tx, journal| bind(goal_id, reward_id, tx, journal))
}

pub fn unbind_goal_reward(
    goal_id: GoalID,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<()> {
    atomically(db_connection, attempts, |tx, journal| unbind_goal(goal_id, tx, journal))
}

/// Binds the reward to `goal_ref`, or unbinds it when no goal is given.
pub fn set_reward_goal(
    reward_id: RewardID,
    goal_ref: Option<GoalID>,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Reward> {
    atomically(db_connection, attempts, |tx, journal| {
        match goal_ref {
            Some(goal_id) => bind(goal_id, reward_id, tx, journal)?,
            None => unbind_reward(reward_id, tx, journal)?,
        }
        get_reward_from_db(reward_id, tx)
    })
}

/// Deletes the reward after releasing its goal. The media file stays on disk.
pub fn delete_reward(
    reward_id: RewardID,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<()> {
    atomically(db_connection, attempts, |tx, journal| {
        unbind_reward(reward_id, tx, journal)?;
        delete_reward_from_db(reward_id, tx)
    })?;

    info!(reward_id, "reward deleted");
    Ok(())
}

pub fn get_reward_view(reward_id: RewardID, db_connection: &Connection) -> InternalResult<RewardView> {
    let reward = get_reward_from_db(reward_id, db_connection)?;
    construct_reward_view(reward, db_connection)
}

pub fn get_reward_views(
    status: Option<RewardStatus>,
    db_connection: &Connection,
) -> InternalResult<Vec<RewardView>> {
    get_all_rewards_from_db(status, db_connection)?
        .into_iter()
        .map(|reward| construct_reward_view(reward, db_connection))
        .collect()
}
