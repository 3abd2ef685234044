//! Domain model records shared by the store, the server, and the client cache.
//!
//! Every struct derives `Serialize` and `Deserialize` so the server can place
//! it directly inside a wire frame and the client can hand it to the
//! presentation layer unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ClientId, ClientStatus, NotificationId, NotificationStatus, ReminderId, ReminderStatus,
    TaskId, TaskStatus,
};

/// A registered client identity.
///
/// Created on first successful handshake (open identity policy) or by an
/// administrative add; removed only by explicit administrative removal, which
/// cascades to the client's tasks, notifications, and reminders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Externally supplied, stable identifier.
    pub id: ClientId,
    /// Human-readable display name.
    pub name: String,
    /// Last network address the client connected from.
    pub address: Option<String>,
    /// When the client last completed a handshake or was updated.
    pub last_seen: DateTime<Utc>,
    pub status: ClientStatus,
}

/// A task assigned to one client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    /// Owning client. Always references an existing [`ClientIdentity`].
    pub client_id: ClientId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted notification row targeting exactly one client.
///
/// Broadcasts are expanded into one row per active client before they reach
/// this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub client_id: ClientId,
    pub message: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    /// Stamped when the client acknowledges the notification.
    pub read_at: Option<DateTime<Utc>>,
}

/// A scheduled reminder attached to a task.
///
/// Consumed exactly once by the reminder scheduler, which synthesizes a
/// notification for the task's owner and marks the reminder `Sent`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub task_id: TaskId,
    pub remind_at: DateTime<Utc>,
    pub status: ReminderStatus,
}

/// A due reminder joined with its owning task, as returned by the scheduler
/// query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub id: ReminderId,
    pub task_id: TaskId,
    pub task_title: String,
    pub client_id: ClientId,
}
