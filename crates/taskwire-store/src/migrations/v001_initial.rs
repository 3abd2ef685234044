//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `clients`, `tasks`, `notifications`, and
//! `reminders`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Clients
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS clients (
    id        TEXT PRIMARY KEY NOT NULL,      -- externally supplied identifier
    name      TEXT NOT NULL,
    address   TEXT,                           -- last-known network address
    last_seen TEXT NOT NULL,                  -- ISO-8601 / RFC-3339, UTC
    status    TEXT NOT NULL DEFAULT 'Active'  -- Active | Inactive
);

-- ----------------------------------------------------------------
-- Tasks
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tasks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id   TEXT NOT NULL,                -- FK -> clients(id)
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    due_date    TEXT,                         -- nullable
    status      TEXT NOT NULL DEFAULT 'Pending',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (client_id) REFERENCES clients(id)
);

CREATE INDEX IF NOT EXISTS idx_tasks_client_id ON tasks(client_id);

-- ----------------------------------------------------------------
-- Notifications (always one row per target client; broadcasts are
-- expanded before insertion)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id  TEXT NOT NULL,                 -- FK -> clients(id)
    message    TEXT NOT NULL,
    status     TEXT NOT NULL DEFAULT 'Pending',  -- Pending | Sent | Read
    created_at TEXT NOT NULL,
    read_at    TEXT,                          -- stamped on acknowledgement

    FOREIGN KEY (client_id) REFERENCES clients(id)
);

CREATE INDEX IF NOT EXISTS idx_notifications_client_status
    ON notifications(client_id, status);

-- ----------------------------------------------------------------
-- Reminders
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS reminders (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id   INTEGER NOT NULL,               -- FK -> tasks(id)
    remind_at TEXT NOT NULL,
    status    TEXT NOT NULL DEFAULT 'Pending',   -- Pending | Sent

    FOREIGN KEY (task_id) REFERENCES tasks(id)
);

CREATE INDEX IF NOT EXISTS idx_reminders_status_time
    ON reminders(status, remind_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
