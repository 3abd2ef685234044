use chrono::Utc;
use rusqlite::params;

use taskwire_shared::model::ClientIdentity;
use taskwire_shared::types::{ClientId, ClientStatus};

use crate::database::{bad_status, decode_ts, encode_ts, Database};
use crate::error::{Result, StoreError};

/// Partial update of a client row.  `None` fields are left untouched;
/// `last_seen` is refreshed on every update.
#[derive(Debug, Clone, Default)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub status: Option<ClientStatus>,
}

impl Database {
    pub fn add_client(&self, client: &ClientIdentity) -> Result<()> {
        self.conn().execute(
            "INSERT INTO clients (id, name, address, last_seen, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                client.id.as_str(),
                client.name,
                client.address,
                encode_ts(client.last_seen),
                client.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_client(&self, id: &ClientId) -> Result<Option<ClientIdentity>> {
        let result = self.conn().query_row(
            "SELECT id, name, address, last_seen, status FROM clients WHERE id = ?1",
            params![id.as_str()],
            row_to_client,
        );
        match result {
            Ok(client) => Ok(Some(client)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    pub fn all_clients(&self, active_only: bool) -> Result<Vec<ClientIdentity>> {
        let sql = if active_only {
            "SELECT id, name, address, last_seen, status FROM clients
             WHERE status = 'Active' ORDER BY id"
        } else {
            "SELECT id, name, address, last_seen, status FROM clients ORDER BY id"
        };
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map([], row_to_client)?;

        let mut clients = Vec::new();
        for row in rows {
            clients.push(row?);
        }
        Ok(clients)
    }

    /// Apply a partial update, refreshing `last_seen`.  Fails with
    /// [`StoreError::NotFound`] if the client does not exist.
    pub fn update_client(&self, id: &ClientId, patch: &ClientPatch) -> Result<()> {
        let mut sets = vec!["last_seen = ?1".to_string()];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(encode_ts(Utc::now()))];

        if let Some(name) = &patch.name {
            sets.push(format!("name = ?{}", values.len() + 1));
            values.push(Box::new(name.clone()));
        }
        if let Some(address) = &patch.address {
            sets.push(format!("address = ?{}", values.len() + 1));
            values.push(Box::new(address.clone()));
        }
        if let Some(status) = patch.status {
            sets.push(format!("status = ?{}", values.len() + 1));
            values.push(Box::new(status.as_str()));
        }

        let sql = format!(
            "UPDATE clients SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len() + 1
        );
        values.push(Box::new(id.as_str().to_string()));

        let affected = self
            .conn()
            .execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove a client together with its tasks, those tasks' reminders, and
    /// its notifications, atomically.  Any failure rolls the whole removal
    /// back.
    pub fn delete_client_cascading(&mut self, id: &ClientId) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "DELETE FROM reminders WHERE task_id IN
                 (SELECT id FROM tasks WHERE client_id = ?1)",
            params![id.as_str()],
        )?;
        tx.execute("DELETE FROM tasks WHERE client_id = ?1", params![id.as_str()])?;
        tx.execute(
            "DELETE FROM notifications WHERE client_id = ?1",
            params![id.as_str()],
        )?;
        let affected = tx.execute("DELETE FROM clients WHERE id = ?1", params![id.as_str()])?;
        if affected == 0 {
            // Nothing was deleted; surface it without committing the no-op.
            return Err(StoreError::NotFound);
        }

        tx.commit()?;
        Ok(())
    }
}

fn row_to_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClientIdentity> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let address: Option<String> = row.get(2)?;
    let last_seen_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;

    let last_seen = decode_ts(3, &last_seen_raw)?;
    let status = ClientStatus::parse(&status_raw).ok_or_else(|| bad_status(4, &status_raw))?;

    Ok(ClientIdentity {
        id: ClientId::new(id),
        name,
        address,
        last_seen,
        status,
    })
}
