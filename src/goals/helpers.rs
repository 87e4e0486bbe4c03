use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::data::UpdateJournal;
use crate::internal_error::{InternalError, InternalResult};
use crate::rewards::data::{GoalSummary, RewardID};
use crate::rewards::helpers::get_reward_summary;

use super::data::*;

const GOAL_COLUMNS: &str = "id, title, description, expected_time, tasks, next_task_id, \
                            is_complete, completion_source, reward_id";

struct GoalRow {
    goal: Goal,
    tasks: String,
}

fn goal_from_row(row: &Row) -> rusqlite::Result<GoalRow> {
    Ok(GoalRow {
        goal: Goal {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            expected_time: row.get(3)?,
            tasks: vec![],
            next_task_id: row.get(5)?,
            is_complete: row.get(6)?,
            completion_source: row.get(7)?,
            reward_ref: row.get(8)?,
        },
        tasks: row.get(4)?,
    })
}

fn construct_goal(row: GoalRow) -> InternalResult<Goal> {
    let mut goal = row.goal;
    goal.tasks = serde_json::from_str(&row.tasks)?;
    Ok(goal)
}

pub fn get_goal_from_db(goal_id: GoalID, db_connection: &Connection) -> InternalResult<Goal> {
    let row = db_connection
        .query_row(
            &format!("SELECT {} FROM goals WHERE id = (?1)", GOAL_COLUMNS),
            params![goal_id],
            goal_from_row,
        )
        .optional()?
        .ok_or_else(|| InternalError::not_found("goal", goal_id))?;

    construct_goal(row)
}

pub fn get_all_goals_from_db(
    complete: Option<bool>,
    db_connection: &Connection,
) -> InternalResult<Vec<Goal>> {
    let mut goal_statement =
        db_connection.prepare(&format!("SELECT {} FROM goals ORDER BY id", GOAL_COLUMNS))?;

    let mut goals = vec![];
    for row_result in goal_statement.query_map(params![], goal_from_row)? {
        let goal = construct_goal(row_result?)?;
        if complete.map_or(true, |complete| goal.is_complete == complete) {
            goals.push(goal);
        }
    }

    Ok(goals)
}

pub fn get_goal_summary(
    goal_id: GoalID,
    db_connection: &Connection,
) -> InternalResult<Option<GoalSummary>> {
    let summary = db_connection
        .query_row(
            "SELECT id, title, is_complete FROM goals WHERE id = (?1)",
            params![goal_id],
            |row| {
                Ok(GoalSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    is_complete: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(summary)
}

pub fn insert_goal(goal: &Goal, db_connection: &Connection) -> InternalResult<GoalID> {
    db_connection.execute(
        "INSERT INTO goals (title, description, expected_time, tasks, next_task_id, is_complete, completion_source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            goal.title,
            goal.description,
            goal.expected_time,
            serde_json::to_string(&goal.tasks)?,
            goal.next_task_id,
            goal.is_complete,
            goal.completion_source,
        ],
    )?;

    Ok(db_connection.last_insert_rowid())
}

/// Writes everything a goal owns. The reward reference is left to the
/// binding code, see [`write_goal_reward_ref`].
pub fn write_goal(
    goal: &Goal,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    let changed = db_connection.execute(
        "UPDATE goals SET title = (?1), description = (?2), expected_time = (?3), tasks = (?4),
         next_task_id = (?5), is_complete = (?6), completion_source = (?7) WHERE id = (?8)",
        params![
            goal.title,
            goal.description,
            goal.expected_time,
            serde_json::to_string(&goal.tasks)?,
            goal.next_task_id,
            goal.is_complete,
            goal.completion_source,
            goal.id,
        ],
    )?;
    if changed == 0 {
        return Err(InternalError::not_found("goal", goal.id));
    }

    journal.record(format!("goal {} record", goal.id));
    Ok(())
}

pub fn write_goal_reward_ref(
    goal_id: GoalID,
    reward_ref: Option<RewardID>,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    db_connection.execute(
        "UPDATE goals SET reward_id = (?1) WHERE id = (?2)",
        params![reward_ref, goal_id],
    )?;

    journal.record(format!("goal {} rewardRef", goal_id));
    Ok(())
}

pub fn delete_goal_from_db(goal_id: GoalID, db_connection: &Connection) -> InternalResult<()> {
    db_connection.execute("DELETE FROM goals WHERE id = (?1)", params![goal_id])?;

    Ok(())
}

/// Resolves the goal's reward reference for presentation.
pub fn construct_goal_view(goal: Goal, db_connection: &Connection) -> InternalResult<GoalView> {
    let reward = match goal.reward_ref {
        Some(reward_id) => get_reward_summary(reward_id, db_connection)?,
        None => None,
    };

    Ok(GoalView::new(goal, reward))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_connection;

    fn blank_goal(title: &str) -> Goal {
        Goal {
            id: 0,
            title: title.to_string(),
            description: "desc".to_string(),
            expected_time: 120,
            tasks: vec![],
            is_complete: false,
            completion_source: CompletionSource::Derived,
            reward_ref: None,
            next_task_id: 1,
        }
    }

    #[test]
    fn unknown_completion_source_is_an_error() {
        let connection = test_connection();
        let id = insert_goal(&blank_goal("g"), &connection).unwrap();
        connection
            .execute(
                "UPDATE goals SET completion_source = 'sticky' WHERE id = (?1)",
                params![id],
            )
            .unwrap();

        assert!(matches!(
            get_goal_from_db(id, &connection),
            Err(InternalError::Database(_))
        ));
    }

    #[test]
    fn tasks_are_embedded_in_the_goal_record() {
        let connection = test_connection();
        let mut goal = blank_goal("learn rust");
        goal.tasks.push(Task::new(1, "book".to_string(), "study".to_string(), 600));
        goal.next_task_id = 2;

        let id = insert_goal(&goal, &connection).unwrap();
        let stored = get_goal_from_db(id, &connection).unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.tasks, goal.tasks);
        assert_eq!(stored.next_task_id, 2);
    }

    #[test]
    fn missing_goal_is_not_found() {
        let connection = test_connection();

        assert!(matches!(
            get_goal_from_db(42, &connection),
            Err(InternalError::NotFound { kind: "goal", id: 42 })
        ));
        assert_eq!(get_goal_summary(42, &connection).unwrap(), None);
    }

    #[test]
    fn list_filters_on_completion() {
        let connection = test_connection();
        let mut journal = UpdateJournal::default();

        let open = insert_goal(&blank_goal("open"), &connection).unwrap();
        let done_id = insert_goal(&blank_goal("done"), &connection).unwrap();
        let mut done = get_goal_from_db(done_id, &connection).unwrap();
        done.is_complete = true;
        write_goal(&done, &connection, &mut journal).unwrap();

        let all = get_all_goals_from_db(None, &connection).unwrap();
        let complete = get_all_goals_from_db(Some(true), &connection).unwrap();
        let incomplete = get_all_goals_from_db(Some(false), &connection).unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(complete.iter().map(|g| g.id).collect::<Vec<_>>(), vec![done_id]);
        assert_eq!(incomplete.iter().map(|g| g.id).collect::<Vec<_>>(), vec![open]);
    }
}
