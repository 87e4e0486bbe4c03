use rusqlite::{params, Connection, Row};

use std::collections::BTreeMap;

use crate::data::UpdateJournal;
use crate::goals::data::{GoalID, TaskID};
use crate::goals::timing::TimingRecord;
use crate::internal_error::InternalResult;

use super::data::*;

fn session_from_row(row: &Row) -> rusqlite::Result<TaskSession> {
    Ok(TaskSession {
        id: row.get(0)?,
        goal_id: row.get(1)?,
        task_id: row.get(2)?,
        started_at: row.get(3)?,
        stopped_at: row.get(4)?,
        minutes: row.get(5)?,
    })
}

pub fn add_session_to_db(
    goal_id: GoalID,
    record: &TimingRecord,
    db_connection: &Connection,
    journal: &mut UpdateJournal,
) -> InternalResult<TaskSession> {
    db_connection.execute(
        "INSERT INTO task_sessions (goal_id, task_id, started_at, stopped_at, minutes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            goal_id,
            record.task_id,
            record.started_at,
            record.stopped_at,
            record.minutes
        ],
    )?;
    let id = db_connection.last_insert_rowid();
    journal.record(format!("session {}", id));

    Ok(TaskSession {
        id,
        goal_id,
        task_id: record.task_id,
        started_at: record.started_at,
        stopped_at: record.stopped_at,
        minutes: record.minutes,
    })
}

pub fn get_task_sessions_from_db(
    goal_id: GoalID,
    task_id: TaskID,
    db_connection: &Connection,
) -> InternalResult<Vec<TaskSession>> {
    let mut session_statement = db_connection.prepare(
        "SELECT id, goal_id, task_id, started_at, stopped_at, minutes FROM task_sessions
         WHERE goal_id = (?1) AND task_id = (?2) ORDER BY started_at",
    )?;

    let mut sessions = vec![];
    for row_result in session_statement.query_map(params![goal_id, task_id], session_from_row)? {
        sessions.push(row_result?);
    }

    Ok(sessions)
}

pub fn get_all_sessions_from_db(db_connection: &Connection) -> InternalResult<Vec<TaskSession>> {
    let mut session_statement = db_connection.prepare(
        "SELECT id, goal_id, task_id, started_at, stopped_at, minutes FROM task_sessions
         ORDER BY started_at",
    )?;

    let mut sessions = vec![];
    for row_result in session_statement.query_map(params![], session_from_row)? {
        sessions.push(row_result?);
    }

    Ok(sessions)
}

/// Groups sessions by the UTC day they started on, newest day first.
pub fn group_sessions_by_day(sessions: Vec<TaskSession>) -> Vec<SessionDay> {
    let mut days: BTreeMap<_, Vec<TaskSession>> = BTreeMap::new();

    for session in sessions {
        days.entry(session.started_at.date_naive())
            .or_default()
            .push(session);
    }

    days.into_iter()
        .rev()
        .map(|(date, mut sessions)| {
            sessions.sort_by_key(|session| session.started_at);
            SessionDay {
                date,
                total_minutes: sessions.iter().map(|s| u64::from(s.minutes)).sum(),
                sessions,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_connection;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn record(task_id: TaskID, day: u32, hour: u32, minutes: u32) -> TimingRecord {
        let started_at = Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap();
        TimingRecord {
            task_id,
            started_at,
            stopped_at: started_at + Duration::minutes(i64::from(minutes)),
            minutes,
        }
    }

    #[test]
    fn sessions_round_trip_through_the_store() {
        let connection = test_connection();
        let mut journal = UpdateJournal::default();

        let stored = add_session_to_db(1, &record(2, 3, 9, 25), &connection, &mut journal).unwrap();
        add_session_to_db(1, &record(3, 3, 10, 5), &connection, &mut journal).unwrap();

        let sessions = get_task_sessions_from_db(1, 2, &connection).unwrap();
        assert_eq!(sessions, vec![stored]);
        assert_eq!(get_all_sessions_from_db(&connection).unwrap().len(), 2);
    }

    #[test]
    fn days_are_newest_first_with_totals() {
        let connection = test_connection();
        let mut journal = UpdateJournal::default();
        for r in [record(1, 3, 15, 10), record(1, 4, 8, 30), record(2, 3, 9, 20)].iter() {
            add_session_to_db(1, r, &connection, &mut journal).unwrap();
        }

        let days = group_sessions_by_day(get_all_sessions_from_db(&connection).unwrap());

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());
        assert_eq!(days[0].total_minutes, 30);
        assert_eq!(days[1].total_minutes, 30);
        assert_eq!(days[1].sessions[0].task_id, 2);
    }
}
