use chrono::{DateTime, Utc};
use rusqlite::params;

use taskwire_shared::model::Task;
use taskwire_shared::types::{ClientId, TaskId, TaskStatus};

use crate::database::{bad_status, decode_ts, encode_ts, Database};
use crate::error::{Result, StoreError};

/// Partial update of a task row.  `None` fields are left untouched;
/// `updated_at` is always stamped.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
}

/// Shared ordering for task listings: Pending first, then In Progress, then
/// Completed, earliest due date within each group.
const STATUS_ORDER: &str = "CASE status
        WHEN 'Pending' THEN 1
        WHEN 'In Progress' THEN 2
        WHEN 'Completed' THEN 3
        ELSE 4
    END,
    due_date ASC";

impl Database {
    /// Insert a new Pending task and return its server-assigned id.
    pub fn add_task(
        &self,
        client_id: &ClientId,
        title: &str,
        description: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<TaskId> {
        let now = encode_ts(Utc::now());
        self.conn().execute(
            "INSERT INTO tasks (client_id, title, description, due_date, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'Pending', ?5, ?5)",
            params![
                client_id.as_str(),
                title,
                description,
                due_date.map(encode_ts),
                now,
            ],
        )?;
        Ok(TaskId(self.conn().last_insert_rowid()))
    }

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let result = self.conn().query_row(
            "SELECT id, client_id, title, description, due_date, status, created_at, updated_at
             FROM tasks WHERE id = ?1",
            params![id.0],
            row_to_task,
        );
        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// All tasks owned by one client, in presentation order.
    pub fn client_tasks(&self, client_id: &ClientId) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT id, client_id, title, description, due_date, status, created_at, updated_at
             FROM tasks WHERE client_id = ?1 ORDER BY {STATUS_ORDER}"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![client_id.as_str()], row_to_task)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Every task in the deployment, for administrative dashboards.
    pub fn all_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT id, client_id, title, description, due_date, status, created_at, updated_at
             FROM tasks ORDER BY {STATUS_ORDER}"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], row_to_task)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Apply a partial update.  Fails with [`StoreError::NotFound`] if the
    /// task does not exist.  Concurrent writers are resolved last-write-wins.
    pub fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<()> {
        let mut sets = vec!["updated_at = ?1".to_string()];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(encode_ts(Utc::now()))];

        if let Some(title) = &patch.title {
            sets.push(format!("title = ?{}", values.len() + 1));
            values.push(Box::new(title.clone()));
        }
        if let Some(description) = &patch.description {
            sets.push(format!("description = ?{}", values.len() + 1));
            values.push(Box::new(description.clone()));
        }
        if let Some(due_date) = patch.due_date {
            sets.push(format!("due_date = ?{}", values.len() + 1));
            values.push(Box::new(encode_ts(due_date)));
        }
        if let Some(status) = patch.status {
            sets.push(format!("status = ?{}", values.len() + 1));
            values.push(Box::new(status.as_str()));
        }

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len() + 1
        );
        values.push(Box::new(id.0));

        let affected = self
            .conn()
            .execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove a task and its reminders atomically.
    pub fn delete_task_cascading(&mut self, id: TaskId) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute("DELETE FROM reminders WHERE task_id = ?1", params![id.0])?;
        let affected = tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()?;
        Ok(())
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let id: i64 = row.get(0)?;
    let client_id: String = row.get(1)?;
    let title: String = row.get(2)?;
    let description: String = row.get(3)?;
    let due_raw: Option<String> = row.get(4)?;
    let status_raw: String = row.get(5)?;
    let created_raw: String = row.get(6)?;
    let updated_raw: String = row.get(7)?;

    let due_date = match due_raw {
        Some(raw) => Some(decode_ts(4, &raw)?),
        None => None,
    };
    let status = TaskStatus::parse(&status_raw).ok_or_else(|| bad_status(5, &status_raw))?;

    Ok(Task {
        id: TaskId(id),
        client_id: ClientId::new(client_id),
        title,
        description,
        due_date,
        status,
        created_at: decode_ts(6, &created_raw)?,
        updated_at: decode_ts(7, &updated_raw)?,
    })
}
