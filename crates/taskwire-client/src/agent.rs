//! Connection agent: supervised connect/resync/serve loop.
//!
//! The agent owns the socket and the task cache.  A frontend talks to it
//! through an [`AgentHandle`] (commands in) and an event channel (state
//! changes out), and reads full state from the shared cache.  When the
//! connection drops the agent waits out the reconnect delay and starts over;
//! the connect-time task list replaces the cache, so nothing stale survives a
//! reconnect.

use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskwire_shared::frame::{read_frame, write_frame};
use taskwire_shared::model::Task;
use taskwire_shared::protocol::LoginStatus;
use taskwire_shared::types::{ClientId, NotificationId, TaskId, TaskStatus};
use taskwire_shared::Message;

use crate::cache::TaskCache;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::identity::IdentityStore;

/// Requests a frontend can make of the running agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCommand {
    /// Report a status change on one of our tasks.  Applied to the local
    /// cache immediately; the server does not echo it back.
    ReportStatus { task_id: TaskId, status: TaskStatus },
    /// Acknowledge a notification as read.
    MarkRead { notification_id: NotificationId },
}

/// How a session ended, deciding what the supervisor does next.
enum SessionEnd {
    /// Connection-level failure: wait out the delay and reconnect.
    Retry,
    /// Terminal: rejected id, removed account, or local shutdown.
    Stop,
}

/// The client agent, ready to be spawned.
pub struct Agent {
    config: ClientConfig,
    identity: IdentityStore,
}

/// Frontend-side handle to a spawned agent.
pub struct AgentHandle {
    commands: mpsc::UnboundedSender<AgentCommand>,
    cache: Arc<Mutex<TaskCache>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Agent {
    pub fn new(config: ClientConfig, identity: IdentityStore) -> Self {
        Self { config, identity }
    }

    /// Build from environment configuration and the default identity file.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env();
        let identity = match &config.identity_path {
            Some(path) => IdentityStore::at(path),
            None => IdentityStore::open_default()?,
        };
        Ok(Self::new(config, identity))
    }

    /// Start the supervision loop.
    ///
    /// The id comes from the config when set, otherwise from the identity
    /// file; with neither there is nothing to log in as and this fails with
    /// [`ClientError::MissingIdentity`].
    pub fn spawn(self) -> Result<(AgentHandle, mpsc::UnboundedReceiver<ClientEvent>)> {
        let client_id = match &self.config.client_id {
            Some(id) => ClientId::new(id.clone()),
            None => self.identity.load()?.ok_or(ClientError::MissingIdentity)?,
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cache = Arc::new(Mutex::new(TaskCache::new()));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(supervise(Session {
            config: self.config,
            identity: self.identity,
            client_id,
            cache: cache.clone(),
            events: events_tx,
            commands: commands_rx,
            cancel: cancel.clone(),
        }));

        Ok((
            AgentHandle {
                commands: commands_tx,
                cache,
                cancel,
                task,
            },
            events_rx,
        ))
    }
}

impl AgentHandle {
    /// Queue a command.  Returns `false` once the agent has stopped.
    pub fn send(&self, command: AgentCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn report_status(&self, task_id: TaskId, status: TaskStatus) -> bool {
        self.send(AgentCommand::ReportStatus { task_id, status })
    }

    pub fn mark_read(&self, notification_id: NotificationId) -> bool {
        self.send(AgentCommand::MarkRead { notification_id })
    }

    /// Snapshot of the cached tasks, active work first.
    pub async fn tasks(&self) -> Vec<Task> {
        self.cache.lock().await.tasks()
    }

    /// Ask the agent to stop.  It exits its loop without reconnecting.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the agent to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

struct Session {
    config: ClientConfig,
    identity: IdentityStore,
    client_id: ClientId,
    cache: Arc<Mutex<TaskCache>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    commands: mpsc::UnboundedReceiver<AgentCommand>,
    cancel: CancellationToken,
}

impl Session {
    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

async fn supervise(mut session: Session) {
    loop {
        match run_session(&mut session).await {
            SessionEnd::Stop => break,
            SessionEnd::Retry => {
                session.emit(ClientEvent::Disconnected);
                debug!(delay = ?session.config.reconnect_delay, "reconnecting after delay");
                tokio::select! {
                    _ = session.cancel.cancelled() => break,
                    _ = tokio::time::sleep(session.config.reconnect_delay) => {}
                }
            }
        }
    }
    session.emit(ClientEvent::Stopped);
}

async fn run_session(session: &mut Session) -> SessionEnd {
    let connect = TcpStream::connect(session.config.server_addr);
    let stream = match timeout(session.config.connect_timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            debug!(addr = %session.config.server_addr, error = %e, "connect failed");
            return SessionEnd::Retry;
        }
        Err(_) => {
            debug!(addr = %session.config.server_addr, "connect timed out");
            return SessionEnd::Retry;
        }
    };
    let (mut reader, mut writer) = stream.into_split();

    let login = Message::Login {
        client_id: session.client_id.clone(),
    };
    if write_frame(&mut writer, &login).await.is_err() {
        return SessionEnd::Retry;
    }

    // The handshake reply is bounded: a server that accepts the connection
    // but never answers must not wedge the agent before Established.
    let reply = match timeout(session.config.connect_timeout, read_frame(&mut reader)).await {
        Ok(reply) => reply,
        Err(_) => {
            debug!(addr = %session.config.server_addr, "handshake timed out");
            return SessionEnd::Retry;
        }
    };
    match reply {
        Ok(Some(Message::LoginResponse {
            status: LoginStatus::Success,
            name,
            ..
        })) => {
            if let Err(e) = session.identity.save(&session.client_id) {
                warn!(error = %e, "could not persist identity");
            }
            info!(client = %session.client_id, "logged in");
            session.emit(ClientEvent::Connected { name });
        }
        Ok(Some(Message::LoginResponse {
            status: LoginStatus::Error,
            message,
            ..
        })) => {
            // The identity exists but may not log in right now (deactivated).
            // Keep the stored id; an operator can reactivate it.
            warn!(client = %session.client_id, ?message, "login refused");
            session.emit(ClientEvent::IdentityRejected { message });
            return SessionEnd::Stop;
        }
        Ok(Some(Message::InvalidId)) => {
            warn!(client = %session.client_id, "id is not registered, discarding identity");
            if let Err(e) = session.identity.clear() {
                warn!(error = %e, "could not clear identity");
            }
            session.emit(ClientEvent::IdentityRejected { message: None });
            return SessionEnd::Stop;
        }
        Ok(Some(other)) => {
            warn!(kind = other.kind(), "unexpected handshake reply");
            return SessionEnd::Retry;
        }
        Ok(None) => return SessionEnd::Retry,
        Err(e) => {
            warn!(error = %e, "protocol error during handshake");
            return SessionEnd::Retry;
        }
    }

    serve(session, reader, &mut writer).await
}

async fn serve(
    session: &mut Session,
    reader: OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
) -> SessionEnd {
    // Frames are read on their own task: a command landing mid-frame must not
    // cancel a partial read, or the stream would desync.
    let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(read_loop(reader, inbound_tx));

    let end = loop {
        tokio::select! {
            _ = session.cancel.cancelled() => break SessionEnd::Stop,

            command = session.commands.recv() => {
                let Some(command) = command else {
                    // Every handle is gone; nothing can drive us anymore.
                    break SessionEnd::Stop;
                };
                let outbound = match command {
                    AgentCommand::ReportStatus { task_id, status } => {
                        if !session.cache.lock().await.set_status(task_id, status) {
                            warn!(task = %task_id, "status report for task not in cache");
                        }
                        Message::TaskUpdate { task_id, status }
                    }
                    AgentCommand::MarkRead { notification_id } => {
                        Message::NotificationRead { notification_id }
                    }
                };
                if let Err(e) = write_frame(writer, &outbound).await {
                    warn!(error = %e, "write failed");
                    break SessionEnd::Retry;
                }
            }

            frame = inbound.recv() => match frame {
                Some(Ok(message)) => {
                    if let Some(end) = apply_server_frame(session, message).await {
                        break end;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "protocol error, dropping connection");
                    break SessionEnd::Retry;
                }
                None => {
                    debug!("server closed connection");
                    break SessionEnd::Retry;
                }
            },
        }
    };

    reader_task.abort();
    end
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    inbound: mpsc::UnboundedSender<std::result::Result<Message, taskwire_shared::ProtocolError>>,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(message)) => {
                if inbound.send(Ok(message)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = inbound.send(Err(e));
                break;
            }
        }
    }
}

/// Apply one server frame to the cache and surface it as an event.
/// `Some(end)` ends the session.
async fn apply_server_frame(session: &Session, message: Message) -> Option<SessionEnd> {
    match message {
        Message::TaskList { tasks } => {
            session.cache.lock().await.replace_all(tasks.clone());
            session.emit(ClientEvent::TaskListReplaced(tasks));
        }
        Message::NewTask { task } => {
            session.cache.lock().await.upsert(task.clone());
            session.emit(ClientEvent::TaskAssigned(task));
        }
        Message::TaskUpdated { task } => {
            session.cache.lock().await.upsert(task.clone());
            session.emit(ClientEvent::TaskUpdated(task));
        }
        Message::TaskRemoved { task_id } => {
            session.cache.lock().await.remove(task_id);
            session.emit(ClientEvent::TaskRemoved(task_id));
        }
        Message::Notification {
            notification_id,
            message,
        } => {
            session.emit(ClientEvent::NotificationReceived {
                id: notification_id,
                message,
            });
        }
        Message::ClientRemoved { message } => {
            warn!(client = %session.client_id, "account removed by server");
            if let Err(e) = session.identity.clear() {
                warn!(error = %e, "could not clear identity");
            }
            session.cache.lock().await.replace_all(Vec::new());
            session.emit(ClientEvent::AccountRemoved { message });
            return Some(SessionEnd::Stop);
        }
        Message::ServerShutdown { message } => {
            info!("server is shutting down");
            session.emit(ClientEvent::ServerShutdown { message });
            return Some(SessionEnd::Retry);
        }
        other => {
            warn!(kind = other.kind(), "unexpected server frame, ignoring");
        }
    }
    None
}
