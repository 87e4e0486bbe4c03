//! Goal completion state machine.
//!
//! A goal is `Complete` when it has at least one task and all of them are
//! complete, or when the user said so. An explicit toggle is sticky across
//! structural task edits (add, delete, rename, re-estimate) and yields only
//! when a task's own completion flag changes, at which point the predicate is
//! re-derived and the goal goes back to `CompletionSource::Derived`.

use rusqlite::Connection;
use tracing::info;

use crate::data::UpdateJournal;
use crate::internal_error::InternalResult;
use crate::rewards::data::RewardStatus;
use crate::rewards::helpers::{get_reward_from_db, write_reward_status};

use super::data::{CompletionSource, Goal, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskChange {
    /// A task's `is_complete` flipped.
    Completion,
    /// Tasks were added, removed or edited without touching completion.
    Structure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Completed,
    Reopened,
}

/// All-of over the tasks, except that an empty goal is never complete.
pub fn all_tasks_complete(tasks: &[Task]) -> bool {
    !tasks.is_empty() && tasks.iter().all(|task| task.is_complete)
}

fn set_complete(goal: &mut Goal, is_complete: bool) -> Option<Transition> {
    if goal.is_complete == is_complete {
        return None;
    }

    goal.is_complete = is_complete;
    if is_complete {
        Some(Transition::Completed)
    } else {
        Some(Transition::Reopened)
    }
}

pub fn reevaluate(goal: &mut Goal, change: TaskChange) -> Option<Transition> {
    match change {
        TaskChange::Completion => {
            goal.completion_source = CompletionSource::Derived;
        }
        TaskChange::Structure if goal.completion_source == CompletionSource::Explicit => {
            return None;
        }
        TaskChange::Structure => {}
    }

    let derived = all_tasks_complete(&goal.tasks);
    set_complete(goal, derived)
}

pub fn set_explicit(goal: &mut Goal, is_complete: bool) -> Option<Transition> {
    goal.completion_source = CompletionSource::Explicit;
    set_complete(goal, is_complete)
}

/// Status a bound reward takes after its goal went through `transition`.
/// A reward that was already enjoyed keeps that status.
pub fn reward_status_after(transition: Transition, current: RewardStatus) -> RewardStatus {
    match (current, transition) {
        (RewardStatus::Enjoyed, _) | (RewardStatus::Unbound, _) => current,
        (_, Transition::Completed) => RewardStatus::Available,
        (_, Transition::Reopened) => RewardStatus::Bound,
    }
}

/// Carries a goal transition over to its bound reward, if any.
pub fn propagate(
    goal: &Goal,
    transition: Option<Transition>,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<()> {
    let (transition, reward_id) = match (transition, goal.reward_ref) {
        (Some(transition), Some(reward_id)) => (transition, reward_id),
        _ => return Ok(()),
    };

    let reward = get_reward_from_db(reward_id, db_connection)?;
    let status = reward_status_after(transition, reward.status);
    if status != reward.status {
        write_reward_status(reward_id, status, db_connection, journal)?;
        info!(
            goal_id = goal.id,
            reward_id,
            from = reward.status.as_str(),
            to = status.as_str(),
            "reward status follows goal"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_connection;
    use crate::goals::helpers::insert_goal;
    use crate::rewards::binding::bind;
    use crate::rewards::helpers::insert_reward;

    fn goal_with(flags: &[bool]) -> Goal {
        Goal {
            id: 1,
            title: "ship it".to_string(),
            description: String::new(),
            expected_time: 0,
            tasks: flags
                .iter()
                .enumerate()
                .map(|(i, done)| {
                    let mut task = Task::new(i as i64 + 1, format!("t{}", i), String::new(), 10);
                    task.is_complete = *done;
                    task
                })
                .collect(),
            is_complete: false,
            completion_source: CompletionSource::Derived,
            reward_ref: None,
            next_task_id: flags.len() as i64 + 1,
        }
    }

    #[test]
    fn empty_goal_is_never_auto_completed() {
        let mut goal = goal_with(&[]);

        for change in [TaskChange::Completion, TaskChange::Structure, TaskChange::Completion].iter() {
            assert_eq!(reevaluate(&mut goal, *change), None);
            assert!(!goal.is_complete);
        }
    }

    #[test]
    fn last_task_completing_completes_the_goal() {
        let mut goal = goal_with(&[true, false]);
        assert_eq!(reevaluate(&mut goal, TaskChange::Completion), None);

        goal.tasks[1].is_complete = true;
        assert_eq!(
            reevaluate(&mut goal, TaskChange::Completion),
            Some(Transition::Completed)
        );
        assert!(goal.is_complete);

        goal.tasks[0].is_complete = false;
        assert_eq!(
            reevaluate(&mut goal, TaskChange::Completion),
            Some(Transition::Reopened)
        );
        assert!(!goal.is_complete);
    }

    #[test]
    fn adding_a_task_reopens_an_auto_completed_goal() {
        let mut goal = goal_with(&[true]);
        reevaluate(&mut goal, TaskChange::Completion);
        assert!(goal.is_complete);

        goal.tasks.push(Task::new(2, "more".to_string(), String::new(), 5));
        assert_eq!(
            reevaluate(&mut goal, TaskChange::Structure),
            Some(Transition::Reopened)
        );
    }

    #[test]
    fn explicit_completion_survives_structural_edits() {
        let mut goal = goal_with(&[false]);
        assert_eq!(set_explicit(&mut goal, true), Some(Transition::Completed));

        goal.tasks.push(Task::new(2, "more".to_string(), String::new(), 5));
        assert_eq!(reevaluate(&mut goal, TaskChange::Structure), None);
        assert!(goal.is_complete);
        assert_eq!(goal.completion_source, CompletionSource::Explicit);
    }

    #[test]
    fn task_completion_event_ends_the_explicit_override() {
        let mut goal = goal_with(&[false, false]);
        set_explicit(&mut goal, true);

        goal.tasks[0].is_complete = true;
        assert_eq!(
            reevaluate(&mut goal, TaskChange::Completion),
            Some(Transition::Reopened)
        );
        assert_eq!(goal.completion_source, CompletionSource::Derived);
    }

    #[test]
    fn explicit_toggle_on_empty_goal_is_allowed() {
        let mut goal = goal_with(&[]);
        assert_eq!(set_explicit(&mut goal, true), Some(Transition::Completed));
        assert_eq!(set_explicit(&mut goal, true), None);
    }

    #[test]
    fn enjoyed_rewards_are_left_alone() {
        assert_eq!(
            reward_status_after(Transition::Completed, RewardStatus::Bound),
            RewardStatus::Available
        );
        assert_eq!(
            reward_status_after(Transition::Reopened, RewardStatus::Available),
            RewardStatus::Bound
        );
        assert_eq!(
            reward_status_after(Transition::Reopened, RewardStatus::Enjoyed),
            RewardStatus::Enjoyed
        );
    }

    #[test]
    fn propagation_makes_the_bound_reward_available() {
        let connection = test_connection();
        let mut journal = UpdateJournal::default();

        let mut goal = goal_with(&[true, false]);
        goal.id = insert_goal(&goal, &connection).unwrap();
        let reward_id = insert_reward("cake", "", None, &connection).unwrap();
        bind(goal.id, reward_id, &connection, &mut journal).unwrap();
        goal.reward_ref = Some(reward_id);

        goal.tasks[1].is_complete = true;
        let transition = reevaluate(&mut goal, TaskChange::Completion);
        propagate(&goal, transition, &connection, &mut journal).unwrap();

        let reward = get_reward_from_db(reward_id, &connection).unwrap();
        assert_eq!(reward.status, RewardStatus::Available);
    }
}
