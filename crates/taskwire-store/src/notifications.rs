use chrono::Utc;
use rusqlite::params;

use taskwire_shared::model::Notification;
use taskwire_shared::types::{ClientId, NotificationId, NotificationStatus};

use crate::database::{bad_status, decode_ts, encode_ts, Database};
use crate::error::{Result, StoreError};

impl Database {
    /// Insert a Pending notification row for one client and return its id.
    ///
    /// Broadcast fan-out happens above this layer: the dispatcher creates one
    /// row per active client.
    pub fn add_notification(&self, client_id: &ClientId, message: &str) -> Result<NotificationId> {
        self.conn().execute(
            "INSERT INTO notifications (client_id, message, status, created_at)
             VALUES (?1, ?2, 'Pending', ?3)",
            params![client_id.as_str(), message, encode_ts(Utc::now())],
        )?;
        Ok(NotificationId(self.conn().last_insert_rowid()))
    }

    /// All Pending notifications for one client, oldest first.
    ///
    /// Keyed purely by status: a notification whose live push raced a
    /// disconnect stays Pending and is swept up here at the next connect.
    pub fn pending_notifications(&self, client_id: &ClientId) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, client_id, message, status, created_at, read_at
             FROM notifications
             WHERE client_id = ?1 AND status = 'Pending'
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![client_id.as_str()], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    pub fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>> {
        let result = self.conn().query_row(
            "SELECT id, client_id, message, status, created_at, read_at
             FROM notifications WHERE id = ?1",
            params![id.0],
            row_to_notification,
        );
        match result {
            Ok(n) => Ok(Some(n)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Record a delivery attempt.  Leaves Read rows untouched so a stale
    /// in-flight push cannot regress an acknowledged notification.
    pub fn mark_notification_sent(&self, id: NotificationId) -> Result<()> {
        self.conn().execute(
            "UPDATE notifications SET status = 'Sent' WHERE id = ?1 AND status != 'Read'",
            params![id.0],
        )?;
        Ok(())
    }

    /// Transition a notification to Read and stamp the read timestamp.
    ///
    /// Returns `false` — not an error — when the row does not exist, belongs
    /// to a different client, or is already Read.
    pub fn mark_notification_read(
        &self,
        client_id: &ClientId,
        id: NotificationId,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET status = 'Read', read_at = ?1
             WHERE id = ?2 AND client_id = ?3 AND status != 'Read'",
            params![encode_ts(Utc::now()), id.0, client_id.as_str()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id: i64 = row.get(0)?;
    let client_id: String = row.get(1)?;
    let message: String = row.get(2)?;
    let status_raw: String = row.get(3)?;
    let created_raw: String = row.get(4)?;
    let read_raw: Option<String> = row.get(5)?;

    let status =
        NotificationStatus::parse(&status_raw).ok_or_else(|| bad_status(3, &status_raw))?;
    let read_at = match read_raw {
        Some(raw) => Some(decode_ts(5, &raw)?),
        None => None,
    };

    Ok(Notification {
        id: NotificationId(id),
        client_id: ClientId::new(client_id),
        message,
        status,
        created_at: decode_ts(4, &created_raw)?,
        read_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskwire_shared::model::ClientIdentity;
    use taskwire_shared::types::ClientStatus;

    fn open_db_with_client(id: &str) -> (tempfile::TempDir, Database, ClientId) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        let client = ClientIdentity {
            id: ClientId::new(id),
            name: format!("Client-{id}"),
            address: None,
            last_seen: Utc::now(),
            status: ClientStatus::Active,
        };
        db.add_client(&client).unwrap();
        (dir, db, client.id)
    }

    #[test]
    fn pending_sweep_only_sees_pending_rows() {
        let (_dir, db, client) = open_db_with_client("c1");

        let first = db.add_notification(&client, "first").unwrap();
        let second = db.add_notification(&client, "second").unwrap();
        db.mark_notification_sent(first).unwrap();

        let pending = db.pending_notifications(&client).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
        assert_eq!(pending[0].status, NotificationStatus::Pending);
    }

    #[test]
    fn read_ack_stamps_timestamp_once() {
        let (_dir, db, client) = open_db_with_client("c1");
        let id = db.add_notification(&client, "hello").unwrap();
        db.mark_notification_sent(id).unwrap();

        assert!(db.mark_notification_read(&client, id).unwrap());
        let row = db.get_notification(id).unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Read);
        assert!(row.read_at.is_some());

        // Second acknowledgement is a no-op, not an error.
        assert!(!db.mark_notification_read(&client, id).unwrap());
    }

    #[test]
    fn read_ack_for_foreign_or_missing_row_is_a_noop() {
        let (_dir, db, client) = open_db_with_client("c1");
        let other = ClientIdentity {
            id: ClientId::new("c2"),
            name: "Client-c2".into(),
            address: None,
            last_seen: Utc::now(),
            status: ClientStatus::Active,
        };
        db.add_client(&other).unwrap();

        let id = db.add_notification(&client, "for c1").unwrap();
        assert!(!db.mark_notification_read(&other.id, id).unwrap());
        assert!(!db
            .mark_notification_read(&client, NotificationId(999))
            .unwrap());

        let row = db.get_notification(id).unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Pending);
    }

    #[test]
    fn sent_mark_does_not_regress_read_rows() {
        let (_dir, db, client) = open_db_with_client("c1");
        let id = db.add_notification(&client, "n").unwrap();
        db.mark_notification_read(&client, id).unwrap();

        db.mark_notification_sent(id).unwrap();
        let row = db.get_notification(id).unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Read);
    }
}
