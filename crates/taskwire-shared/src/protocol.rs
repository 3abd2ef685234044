use serde::{Deserialize, Serialize};

use crate::model::Task;
use crate::types::{ClientId, NotificationId, TaskId, TaskStatus};

/// All wire protocol messages exchanged between server and client.
///
/// Serialized as a JSON document with a `type` discriminant, wrapped in a
/// length-prefixed frame by [`crate::frame`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// First frame on every connection (client -> server).
    Login { client_id: ClientId },

    /// Handshake result (server -> client).
    LoginResponse {
        status: LoginStatus,
        /// Display name, on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Human-readable reason, on failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Strict identity policy: the supplied id is not registered.
    InvalidId,

    /// The client's identity was administratively removed mid-session. Always
    /// the last frame before the server closes the socket.
    ClientRemoved { message: String },

    /// Full resync of the client's tasks, pushed at Established.
    TaskList { tasks: Vec<Task> },

    /// A task was assigned while the client is connected.
    NewTask { task: Task },

    /// A task changed; carries the task's full current state.
    TaskUpdated { task: Task },

    /// A task was deleted.
    TaskRemoved { task_id: TaskId },

    /// Client-reported status change (client -> server). The only task
    /// mutation a client may request.
    TaskUpdate { task_id: TaskId, status: TaskStatus },

    /// A notification push. Carries the persisted row id so the client can
    /// acknowledge it.
    Notification {
        notification_id: NotificationId,
        message: String,
    },

    /// Read acknowledgement (client -> server).
    NotificationRead { notification_id: NotificationId },

    /// Advisory sent to every registered connection before the server closes
    /// its sockets, so clients can avoid an immediate reconnect storm.
    ServerShutdown { message: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    Success,
    Error,
}

impl Message {
    /// The wire discriminant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::LoginResponse { .. } => "login_response",
            Self::InvalidId => "invalid_id",
            Self::ClientRemoved { .. } => "client_removed",
            Self::TaskList { .. } => "task_list",
            Self::NewTask { .. } => "new_task",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskRemoved { .. } => "task_removed",
            Self::TaskUpdate { .. } => "task_update",
            Self::Notification { .. } => "notification",
            Self::NotificationRead { .. } => "notification_read",
            Self::ServerShutdown { .. } => "server_shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_uses_snake_case_discriminant() {
        let msg = Message::Login {
            client_id: ClientId::new("c1"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "login");
        assert_eq!(json["client_id"], "c1");
    }

    #[test]
    fn login_response_round_trips() {
        let msg = Message::LoginResponse {
            status: LoginStatus::Success,
            name: Some("Client-c1".to_string()),
            message: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"login_response\""));
        assert!(json.contains("\"success\""));
        // Absent option fields are omitted entirely.
        assert!(!json.contains("\"message\""));

        let restored: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn invalid_id_is_a_bare_document() {
        let json = serde_json::to_string(&Message::InvalidId).unwrap();
        assert_eq!(json, "{\"type\":\"invalid_id\"}");
    }

    #[test]
    fn task_update_parses_spaced_status() {
        let json = r#"{"type":"task_update","task_id":7,"status":"In Progress"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            Message::TaskUpdate {
                task_id: TaskId(7),
                status: TaskStatus::InProgress,
            }
        );
    }

    #[test]
    fn kind_matches_wire_discriminant() {
        let msg = Message::NotificationRead {
            notification_id: NotificationId(3),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], msg.kind());
    }
}
