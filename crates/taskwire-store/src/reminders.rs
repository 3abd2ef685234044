use chrono::{DateTime, Utc};
use rusqlite::params;

use taskwire_shared::model::DueReminder;
use taskwire_shared::types::{ClientId, ReminderId, TaskId};

use crate::database::{encode_ts, Database};
use crate::error::Result;

impl Database {
    pub fn add_reminder(&self, task_id: TaskId, remind_at: DateTime<Utc>) -> Result<ReminderId> {
        self.conn().execute(
            "INSERT INTO reminders (task_id, remind_at, status)
             VALUES (?1, ?2, 'Pending')",
            params![task_id.0, encode_ts(remind_at)],
        )?;
        Ok(ReminderId(self.conn().last_insert_rowid()))
    }

    /// All Pending reminders whose trigger time has passed, joined with the
    /// owning task for the scheduler.
    pub fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<DueReminder>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.task_id, t.title, t.client_id
             FROM reminders r
             JOIN tasks t ON r.task_id = t.id
             WHERE r.remind_at <= ?1 AND r.status = 'Pending'
             ORDER BY r.remind_at ASC, r.id ASC",
        )?;
        let rows = stmt.query_map(params![encode_ts(now)], |row| {
            Ok(DueReminder {
                id: ReminderId(row.get(0)?),
                task_id: TaskId(row.get(1)?),
                task_title: row.get(2)?,
                client_id: ClientId::new(row.get::<_, String>(3)?),
            })
        })?;

        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?);
        }
        Ok(reminders)
    }

    /// Consume a reminder.  A Sent reminder is never returned by
    /// [`Database::due_reminders`] again.
    pub fn mark_reminder_sent(&self, id: ReminderId) -> Result<()> {
        self.conn().execute(
            "UPDATE reminders SET status = 'Sent' WHERE id = ?1",
            params![id.0],
        )?;
        Ok(())
    }
}
