//! Per-connection session handling.
//!
//! One session task per accepted connection, moving through AwaitLogin ->
//! Validate -> Established -> Serving -> Closed.  Outbound frames flow through
//! a dedicated writer task so that live pushes from other workers serialize
//! with the session's own replies, and so the final frame before a forced
//! close is flushed before the socket drops.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use taskwire_shared::frame::{read_frame, write_frame};
use taskwire_shared::model::ClientIdentity;
use taskwire_shared::protocol::LoginStatus;
use taskwire_shared::types::{ClientId, ClientStatus};
use taskwire_shared::Message;
use taskwire_store::ClientPatch;

use crate::config::IdentityPolicy;
use crate::dispatch::NotificationDispatcher;
use crate::error::ServerError;
use crate::events::ServerEvent;
use crate::server::Core;
use crate::sync::TaskSynchronizer;

/// Outcome of the Validate step.
enum Validated {
    Accepted { name: String },
    /// Reply with this frame, then close.
    Rejected(Message),
}

pub(crate) async fn handle_connection(core: Arc<Core>, stream: TcpStream, peer: SocketAddr) {
    let (mut reader, mut writer) = stream.into_split();

    // AwaitLogin: exactly one frame, bounded by the login timeout so a wedged
    // handshake cannot hold a connection slot forever.
    let client_id = match timeout(core.config.login_timeout, read_frame(&mut reader)).await {
        Err(_) => {
            debug!(%peer, "login timed out");
            return;
        }
        Ok(Ok(Some(Message::Login { client_id }))) => client_id,
        Ok(Ok(Some(other))) => {
            warn!(%peer, kind = other.kind(), "expected login frame");
            return;
        }
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            warn!(%peer, error = %e, "protocol error during handshake");
            return;
        }
    };

    // Validate against the identity store.
    let name = match validate_identity(&core, &client_id, &peer).await {
        Ok(Validated::Accepted { name }) => name,
        Ok(Validated::Rejected(reply)) => {
            info!(client = %client_id, %peer, "login rejected");
            let _ = write_frame(&mut writer, &reply).await;
            return;
        }
        Err(e) => {
            error!(client = %client_id, error = %e, "identity validation failed");
            return;
        }
    };

    // Established: queue the login response, the full task resync, and the
    // pending-notification sweep before registering for live pushes, so the
    // resync is ordered strictly ahead of any concurrent delivery.
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let writer_task = tokio::spawn(write_loop(writer, outbound_rx, cancel.clone()));

    let dispatcher = NotificationDispatcher::new(core.clone());
    let established = establish(&core, &dispatcher, &client_id, &name, &outbound).await;

    match established {
        Ok(()) => {
            let serial = core
                .registry
                .register(&client_id, outbound.clone(), cancel.clone())
                .await;
            core.emit(ServerEvent::ClientConnected(client_id.clone()));
            info!(client = %client_id, %peer, "session established");

            serve(&core, &client_id, &mut reader, &cancel).await;

            // A superseded session's registration is already gone: the client
            // is still connected on its replacement, so only a live
            // unregistration reports a disconnect.  The forced-close path
            // reports it from the administrative side instead.
            if core.registry.unregister(&client_id, serial).await {
                core.emit(ServerEvent::ClientDisconnected(client_id.clone()));
            }
        }
        Err(e) => {
            error!(client = %client_id, error = %e, "failed to establish session");
        }
    }

    // Closed: dropping our sender lets the writer drain anything still queued
    // (a client_removed notice, in the forced-close case) and release the
    // socket.
    drop(outbound);
    let _ = writer_task.await;
    info!(client = %client_id, "session closed");
}

async fn validate_identity(
    core: &Arc<Core>,
    client_id: &ClientId,
    peer: &SocketAddr,
) -> Result<Validated, ServerError> {
    let db = core.db.lock().await;
    match db.get_client(client_id)? {
        None => match core.config.identity_policy {
            IdentityPolicy::Strict => Ok(Validated::Rejected(Message::InvalidId)),
            IdentityPolicy::Open => {
                let identity = ClientIdentity {
                    id: client_id.clone(),
                    name: format!("Client-{client_id}"),
                    address: Some(peer.ip().to_string()),
                    last_seen: Utc::now(),
                    status: ClientStatus::Active,
                };
                db.add_client(&identity)?;
                debug!(client = %client_id, "auto-provisioned client identity");
                Ok(Validated::Accepted {
                    name: identity.name,
                })
            }
        },
        Some(client) if client.status == ClientStatus::Inactive => {
            Ok(Validated::Rejected(Message::LoginResponse {
                status: LoginStatus::Error,
                name: None,
                message: Some("Your account has been deactivated".to_string()),
            }))
        }
        Some(client) => {
            db.update_client(
                client_id,
                &ClientPatch {
                    address: Some(peer.ip().to_string()),
                    ..Default::default()
                },
            )?;
            Ok(Validated::Accepted { name: client.name })
        }
    }
}

async fn establish(
    core: &Arc<Core>,
    dispatcher: &NotificationDispatcher,
    client_id: &ClientId,
    name: &str,
    outbound: &mpsc::UnboundedSender<Message>,
) -> Result<(), ServerError> {
    let _ = outbound.send(Message::LoginResponse {
        status: LoginStatus::Success,
        name: Some(name.to_string()),
        message: None,
    });

    let tasks = core.db.lock().await.client_tasks(client_id)?;
    let _ = outbound.send(Message::TaskList { tasks });

    dispatcher.deliver_pending(client_id, outbound).await?;
    Ok(())
}

/// The Serving loop: dispatch inbound frames until the peer closes, a
/// protocol error occurs, or the session is cancelled.
async fn serve(
    core: &Arc<Core>,
    client_id: &ClientId,
    reader: &mut OwnedReadHalf,
    cancel: &CancellationToken,
) {
    let sync = TaskSynchronizer::new(core.clone());
    let dispatcher = NotificationDispatcher::new(core.clone());

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_frame(reader) => frame,
        };

        match frame {
            Ok(Some(Message::TaskUpdate { task_id, status })) => {
                match sync.client_reported_status(client_id, task_id, status).await {
                    Ok(()) => {}
                    Err(ServerError::TaskNotFound(_)) => {
                        // Domain error: the task vanished or was never theirs.
                        // The connection stays open.
                        warn!(client = %client_id, task = %task_id, "status report for unknown task");
                    }
                    Err(e) => {
                        error!(client = %client_id, task = %task_id, error = %e, "failed to apply status report");
                    }
                }
            }
            Ok(Some(Message::NotificationRead { notification_id })) => {
                if let Err(e) = dispatcher.acknowledge_read(client_id, notification_id).await {
                    error!(client = %client_id, error = %e, "failed to record read acknowledgement");
                }
            }
            Ok(Some(other)) => {
                warn!(client = %client_id, kind = other.kind(), "unexpected message in serving loop");
                break;
            }
            Ok(None) => {
                debug!(client = %client_id, "peer closed connection");
                break;
            }
            Err(e) => {
                warn!(client = %client_id, error = %e, "protocol error, closing session");
                break;
            }
        }
    }
}

/// Drain the outbound queue onto the socket.  Exits when every sender is gone
/// (normal close, after draining) or a write fails (peer gone; cancel the
/// session so the read loop stops too).
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    while let Some(message) = outbound_rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &message).await {
            debug!(error = %e, "write failed, cancelling session");
            cancel.cancel();
            break;
        }
    }
}
