use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::data::atomically;
use crate::history::data::TaskSession;
use crate::history::helpers::add_session_to_db;
use crate::internal_error::InternalResult;
use crate::rewards::binding::unbind_goal;

use super::completion::{self, TaskChange, Transition};
use super::data::*;
use super::helpers::*;
use super::timing;

/// Loads a goal, lets `change` mutate it, then writes it back and carries any
/// completion transition over to the bound reward, all in one unit.
fn mutate_goal<T, F>(
    goal_id: GoalID,
    db_connection: &mut Connection,
    attempts: u32,
    mut change: F,
) -> InternalResult<(Goal, T)>
where
    F: FnMut(&mut Goal) -> InternalResult<(Option<Transition>, T)>,
{
    atomically(db_connection, attempts, |tx, journal| {
        let mut goal = get_goal_from_db(goal_id, tx)?;
        let (transition, extra) = change(&mut goal)?;

        write_goal(&goal, tx, journal)?;
        completion::propagate(&goal, transition, tx, journal)?;

        if let Some(transition) = transition {
            info!(goal_id, ?transition, "goal completion changed");
        }
        Ok((goal, extra))
    })
}

pub fn create_goal(new_goal: NewGoal, db_connection: &Connection) -> InternalResult<Goal> {
    let mut goal = Goal {
        id: 0,
        title: new_goal.title,
        description: new_goal.description,
        expected_time: new_goal.expected_time,
        tasks: vec![],
        is_complete: false,
        completion_source: CompletionSource::Derived,
        reward_ref: None,
        next_task_id: 1,
    };
    goal.id = insert_goal(&goal, db_connection)?;

    info!(goal_id = goal.id, "goal created");
    Ok(goal)
}

pub fn update_goal(
    goal_id: GoalID,
    patch: &GoalPatch,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Goal> {
    patch.validate()?;

    let (goal, _) = mutate_goal(goal_id, db_connection, attempts, |goal| {
        patch.apply(goal);
        Ok((None, ()))
    })?;

    info!(goal_id, "goal updated");
    Ok(goal)
}

/// Deletes a goal after releasing its reward, which survives as `unbound`.
pub fn delete_goal(
    goal_id: GoalID,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<()> {
    atomically(db_connection, attempts, |tx, journal| {
        unbind_goal(goal_id, tx, journal)?;
        delete_goal_from_db(goal_id, tx)?;
        journal.record(format!("goal {} deleted", goal_id));
        Ok(())
    })?;

    info!(goal_id, "goal deleted");
    Ok(())
}

pub fn set_goal_completion(
    goal_id: GoalID,
    is_complete: bool,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Goal> {
    let (goal, _) = mutate_goal(goal_id, db_connection, attempts, |goal| {
        Ok((completion::set_explicit(goal, is_complete), ()))
    })?;

    info!(goal_id, is_complete, "goal completion set by user");
    Ok(goal)
}

pub fn add_task(
    goal_id: GoalID,
    new_task: &NewTask,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<(Goal, TaskID)> {
    let (goal, task_id) = mutate_goal(goal_id, db_connection, attempts, |goal| {
        let task_id = goal.next_task_id;
        goal.next_task_id += 1;

        let mut task = Task::new(
            task_id,
            new_task.title.clone(),
            new_task.category.clone(),
            new_task.expected_time,
        );
        task.is_complete = new_task.is_complete;
        goal.tasks.push(task);

        Ok((completion::reevaluate(goal, TaskChange::Structure), task_id))
    })?;

    info!(goal_id, task_id, "task added");
    Ok((goal, task_id))
}

pub fn update_task(
    goal_id: GoalID,
    task_id: TaskID,
    patch: &TaskPatch,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Goal> {
    patch.validate()?;

    let (goal, _) = mutate_goal(goal_id, db_connection, attempts, |goal| {
        let flipped = patch.apply(goal.task_mut(task_id)?);
        let change = if flipped {
            TaskChange::Completion
        } else {
            TaskChange::Structure
        };

        Ok((completion::reevaluate(goal, change), ()))
    })?;

    info!(goal_id, task_id, "task updated");
    Ok(goal)
}

pub fn delete_task(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Goal> {
    let (goal, _) = mutate_goal(goal_id, db_connection, attempts, |goal| {
        goal.task(task_id)?;
        goal.tasks.retain(|task| task.id != task_id);

        Ok((completion::reevaluate(goal, TaskChange::Structure), ()))
    })?;

    info!(goal_id, task_id, "task deleted");
    Ok(goal)
}

pub fn start_task_timing(
    goal_id: GoalID,
    task_id: TaskID,
    now: DateTime<Utc>,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Goal> {
    let (goal, _) = mutate_goal(goal_id, db_connection, attempts, |goal| {
        timing::start_timing(goal.task_mut(task_id)?, now)?;
        Ok((None, ()))
    })?;

    info!(goal_id, task_id, "timing started");
    Ok(goal)
}

/// Closes the running session and records it in the history log in the same
/// unit as the task update.
pub fn stop_task_timing(
    goal_id: GoalID,
    task_id: TaskID,
    now: DateTime<Utc>,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<(Goal, TaskSession)> {
    let (goal, session) = atomically(db_connection, attempts, |tx, journal| {
        let mut goal = get_goal_from_db(goal_id, tx)?;
        let record = timing::stop_timing(goal.task_mut(task_id)?, now)?;

        write_goal(&goal, tx, journal)?;
        let session = add_session_to_db(goal_id, &record, tx, journal)?;
        Ok((goal, session))
    })?;

    info!(goal_id, task_id, minutes = session.minutes, "timing stopped");
    Ok((goal, session))
}

pub fn reset_task_time(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &mut Connection,
    attempts: u32,
) -> InternalResult<Goal> {
    let (goal, _) = mutate_goal(goal_id, db_connection, attempts, |goal| {
        timing::reset_invested_time(goal.task_mut(task_id)?)?;
        Ok((None, ()))
    })?;

    info!(goal_id, task_id, "invested time reset");
    Ok(goal)
}

pub fn get_goal_view(goal_id: GoalID, db_connection: &Connection) -> InternalResult<GoalView> {
    let goal = get_goal_from_db(goal_id, db_connection)?;
    construct_goal_view(goal, db_connection)
}

pub fn get_goal_views(
    complete: Option<bool>,
    db_connection: &Connection,
) -> InternalResult<Vec<GoalView>> {
    get_all_goals_from_db(complete, db_connection)?
        .into_iter()
        .map(|goal| construct_goal_view(goal, db_connection))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{test_connection, UpdateJournal};
    use crate::history::helpers::get_task_sessions_from_db;
    use crate::internal_error::InternalError;
    use crate::rewards::binding::bind;
    use crate::rewards::data::RewardStatus;
    use crate::rewards::helpers::{get_reward_from_db, insert_reward};
    use chrono::{Duration, TimeZone};

    const ATTEMPTS: u32 = 3;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap()
    }

    fn goal(connection: &Connection) -> GoalID {
        let new_goal = NewGoal {
            title: "run a marathon".to_string(),
            description: "by autumn".to_string(),
            expected_time: 600,
        };
        create_goal(new_goal, connection).unwrap().id
    }

    fn task(title: &str, expected_time: u32) -> NewTask {
        NewTask {
            title: title.to_string(),
            category: "sport".to_string(),
            expected_time,
            is_complete: false,
        }
    }

    fn complete() -> TaskPatch {
        TaskPatch {
            is_complete: Some(true),
            ..TaskPatch::default()
        }
    }

    fn bound_reward(goal_id: GoalID, connection: &Connection) -> i64 {
        let reward_id = insert_reward("new shoes", "", None, connection).unwrap();
        bind(goal_id, reward_id, connection, &mut UpdateJournal::default()).unwrap();
        reward_id
    }

    #[test]
    fn completing_every_task_makes_the_reward_available() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let (_, first) = add_task(goal_id, &task("5k", 30), &mut connection, ATTEMPTS).unwrap();
        let (_, second) = add_task(goal_id, &task("10k", 60), &mut connection, ATTEMPTS).unwrap();
        let reward_id = bound_reward(goal_id, &connection);

        let goal = update_task(goal_id, first, &complete(), &mut connection, ATTEMPTS).unwrap();
        assert!(!goal.is_complete);
        assert_eq!(
            get_reward_from_db(reward_id, &connection).unwrap().status,
            RewardStatus::Bound
        );

        let goal = update_task(goal_id, second, &complete(), &mut connection, ATTEMPTS).unwrap();
        assert!(goal.is_complete);
        assert_eq!(
            get_reward_from_db(reward_id, &connection).unwrap().status,
            RewardStatus::Available
        );

        let reopen = TaskPatch {
            is_complete: Some(false),
            ..TaskPatch::default()
        };
        let goal = update_task(goal_id, first, &reopen, &mut connection, ATTEMPTS).unwrap();
        assert!(!goal.is_complete);
        assert_eq!(
            get_reward_from_db(reward_id, &connection).unwrap().status,
            RewardStatus::Bound
        );
    }

    #[test]
    fn explicit_completion_is_persisted_and_sticky() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let reward_id = bound_reward(goal_id, &connection);

        let goal = set_goal_completion(goal_id, true, &mut connection, ATTEMPTS).unwrap();
        assert!(goal.is_complete);
        assert_eq!(
            get_reward_from_db(reward_id, &connection).unwrap().status,
            RewardStatus::Available
        );

        let (goal, _) = add_task(goal_id, &task("stretch", 5), &mut connection, ATTEMPTS).unwrap();
        assert!(goal.is_complete);
        assert_eq!(goal.completion_source, CompletionSource::Explicit);

        let stored = get_goal_from_db(goal_id, &connection).unwrap();
        assert_eq!(stored.completion_source, CompletionSource::Explicit);
    }

    #[test]
    fn deleting_the_last_task_reopens_an_auto_completed_goal() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let (_, only) = add_task(goal_id, &task("5k", 30), &mut connection, ATTEMPTS).unwrap();
        update_task(goal_id, only, &complete(), &mut connection, ATTEMPTS).unwrap();

        let goal = delete_task(goal_id, only, &mut connection, ATTEMPTS).unwrap();

        assert!(goal.tasks.is_empty());
        assert!(!goal.is_complete);
    }

    #[test]
    fn task_ids_are_not_reused() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let (_, first) = add_task(goal_id, &task("a", 1), &mut connection, ATTEMPTS).unwrap();
        delete_task(goal_id, first, &mut connection, ATTEMPTS).unwrap();
        let (_, second) = add_task(goal_id, &task("b", 1), &mut connection, ATTEMPTS).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn timing_a_task_records_invested_time_and_history() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let (_, task_id) = add_task(goal_id, &task("5k", 60), &mut connection, ATTEMPTS).unwrap();

        start_task_timing(goal_id, task_id, t0(), &mut connection, ATTEMPTS).unwrap();
        let (goal, session) = stop_task_timing(
            goal_id,
            task_id,
            t0() + Duration::minutes(25),
            &mut connection,
            ATTEMPTS,
        )
        .unwrap();

        let task = goal.task(task_id).unwrap();
        assert_eq!(task.invested_time, 25);
        assert!(task.start_marker.is_none());
        assert_eq!(session.minutes, 25);
        assert_eq!(
            get_task_sessions_from_db(goal_id, task_id, &connection).unwrap(),
            vec![session]
        );

        let again = stop_task_timing(
            goal_id,
            task_id,
            t0() + Duration::minutes(30),
            &mut connection,
            ATTEMPTS,
        );
        assert!(matches!(again, Err(InternalError::NotTiming { .. })));
        assert_eq!(
            get_goal_from_db(goal_id, &connection).unwrap().tasks[0].invested_time,
            25
        );
    }

    #[test]
    fn a_running_task_cannot_be_started_twice() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let (_, task_id) = add_task(goal_id, &task("5k", 60), &mut connection, ATTEMPTS).unwrap();

        start_task_timing(goal_id, task_id, t0(), &mut connection, ATTEMPTS).unwrap();
        let again = start_task_timing(goal_id, task_id, t0(), &mut connection, ATTEMPTS);

        assert!(matches!(again, Err(InternalError::AlreadyTiming { .. })));
    }

    #[test]
    fn deleting_a_goal_unbinds_its_reward() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let reward_id = bound_reward(goal_id, &connection);

        delete_goal(goal_id, &mut connection, ATTEMPTS).unwrap();

        let reward = get_reward_from_db(reward_id, &connection).unwrap();
        assert_eq!(reward.status, RewardStatus::Unbound);
        assert_eq!(reward.goal_ref, None);
        assert!(matches!(
            get_goal_from_db(goal_id, &connection),
            Err(InternalError::NotFound { .. })
        ));
    }

    #[test]
    fn managed_fields_cannot_be_patched() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);

        let patch: GoalPatch = serde_json::from_str(r#"{"title": "x", "rewardRef": 1}"#).unwrap();
        let result = update_goal(goal_id, &patch, &mut connection, ATTEMPTS);

        assert!(matches!(result, Err(InternalError::InvariantViolation(_))));
        assert_eq!(
            get_goal_from_db(goal_id, &connection).unwrap().title,
            "run a marathon"
        );
    }

    #[test]
    fn unknown_task_is_not_found() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);

        let result = update_task(goal_id, 77, &complete(), &mut connection, ATTEMPTS);

        assert!(matches!(
            result,
            Err(InternalError::NotFound { kind: "task", id: 77 })
        ));
    }

    #[test]
    fn views_join_the_bound_reward() {
        let mut connection = test_connection();
        let goal_id = goal(&connection);
        let (_, task_id) = add_task(goal_id, &task("5k", 60), &mut connection, ATTEMPTS).unwrap();
        let reward_id = bound_reward(goal_id, &connection);
        start_task_timing(goal_id, task_id, t0(), &mut connection, ATTEMPTS).unwrap();
        stop_task_timing(goal_id, task_id, t0() + Duration::minutes(30), &mut connection, ATTEMPTS)
            .unwrap();

        let view = get_goal_view(goal_id, &connection).unwrap();

        assert_eq!(view.reward.as_ref().map(|r| r.id), Some(reward_id));
        assert_eq!(view.invested_time, 30);
        assert_eq!(view.tasks[0].progress, 50.0);
        assert_eq!(get_goal_views(Some(true), &connection).unwrap().len(), 0);
    }
}
