use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::data::UpdateJournal;
use crate::goals::data::{GoalID, RewardSummary};
use crate::goals::helpers::get_goal_summary;
use crate::internal_error::{InternalError, InternalResult};

use super::data::*;

fn reward_from_row(row: &Row) -> rusqlite::Result<Reward> {
    Ok(Reward {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        media_file: row.get(3)?,
        status: row.get(4)?,
        goal_ref: row.get(5)?,
    })
}

pub fn insert_reward(
    title: &str,
    description: &str,
    media_file: Option<&str>,
    db_connection: &Connection,
) -> InternalResult<RewardID> {
    db_connection.execute(
        "INSERT INTO rewards (title, description, media_file, status) VALUES (?1, ?2, ?3, ?4)",
        params![title, description, media_file, RewardStatus::Unbound],
    )?;

    Ok(db_connection.last_insert_rowid())
}

pub fn get_reward_from_db(reward_id: RewardID, db_connection: &Connection) -> InternalResult<Reward> {
    db_connection
        .query_row(
            "SELECT id, title, description, media_file, status, goal_id FROM rewards WHERE id = (?1)",
            params![reward_id],
            reward_from_row,
        )
        .optional()?
        .ok_or_else(|| InternalError::not_found("reward", reward_id))
}

pub fn get_all_rewards_from_db(
    status: Option<RewardStatus>,
    db_connection: &Connection,
) -> InternalResult<Vec<Reward>> {
    let mut rewards = vec![];

    match status {
        Some(status) => {
            let mut reward_statement = db_connection.prepare(
                "SELECT id, title, description, media_file, status, goal_id FROM rewards
                 WHERE status = (?1) ORDER BY id",
            )?;
            for row_result in reward_statement.query_map(params![status], reward_from_row)? {
                rewards.push(row_result?);
            }
        }
        None => {
            let mut reward_statement = db_connection.prepare(
                "SELECT id, title, description, media_file, status, goal_id FROM rewards ORDER BY id",
            )?;
            for row_result in reward_statement.query_map(params![], reward_from_row)? {
                rewards.push(row_result?);
            }
        }
    }

    Ok(rewards)
}

pub fn get_reward_summary(
    reward_id: RewardID,
    db_connection: &Connection,
) -> InternalResult<Option<RewardSummary>> {
    let summary = db_connection
        .query_row(
            "SELECT id, title, status FROM rewards WHERE id = (?1)",
            params![reward_id],
            |row| {
                Ok(RewardSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    status: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(summary)
}

pub fn write_reward_details(reward: &Reward, db_connection: &Connection) -> InternalResult<()> {
    db_connection.execute(
        "UPDATE rewards SET title = (?1), description = (?2), media_file = (?3) WHERE id = (?4)",
        params![reward.title, reward.description, reward.media_file, reward.id],
    )?;

    Ok(())
}

pub fn write_reward_status(
    reward_id: RewardID,
    status: RewardStatus,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    db_connection.execute(
        "UPDATE rewards SET status = (?1) WHERE id = (?2)",
        params![status, reward_id],
    )?;

    journal.record(format!("reward {} status", reward_id));
    Ok(())
}

pub fn write_reward_binding(
    reward_id: RewardID,
    goal_ref: Option<GoalID>,
    status: RewardStatus,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    db_connection.execute(
        "UPDATE rewards SET goal_id = (?1), status = (?2) WHERE id = (?3)",
        params![goal_ref, status, reward_id],
    )?;

    journal.record(format!("reward {} goalRef", reward_id));
    journal.record(format!("reward {} status", reward_id));
    Ok(())
}

pub fn delete_reward_from_db(reward_id: RewardID, db_connection: &Connection) -> InternalResult<()> {
    db_connection.execute("DELETE FROM rewards WHERE id = (?1)", params![reward_id])?;

    Ok(())
}

/// Resolves the reward's goal reference for presentation.
pub fn construct_reward_view(reward: Reward, db_connection: &Connection) -> InternalResult<RewardView> {
    let goal = match reward.goal_ref {
        Some(goal_id) => get_goal_summary(goal_id, db_connection)?,
        None => None,
    };

    Ok(RewardView { reward, goal })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_connection;

    #[test]
    fn new_rewards_start_unbound() {
        let connection = test_connection();

        let id = insert_reward("movie night", "popcorn", Some("1-film.png"), &connection).unwrap();
        let reward = get_reward_from_db(id, &connection).unwrap();

        assert_eq!(reward.status, RewardStatus::Unbound);
        assert_eq!(reward.goal_ref, None);
        assert_eq!(reward.media_file.as_deref(), Some("1-film.png"));
    }

    #[test]
    fn list_filters_on_status() {
        let connection = test_connection();
        let mut journal = UpdateJournal::default();

        let free = insert_reward("free", "", None, &connection).unwrap();
        let taken = insert_reward("taken", "", None, &connection).unwrap();
        write_reward_binding(taken, Some(9), RewardStatus::Bound, &connection, &mut journal).unwrap();

        let unbound = get_all_rewards_from_db(Some(RewardStatus::Unbound), &connection).unwrap();
        let all = get_all_rewards_from_db(None, &connection).unwrap();

        assert_eq!(unbound.iter().map(|r| r.id).collect::<Vec<_>>(), vec![free]);
        assert_eq!(all.len(), 2);
        assert_eq!(
            journal.fields(),
            &[format!("reward {} goalRef", taken), format!("reward {} status", taken)]
        );
    }
}
