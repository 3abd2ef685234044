//! Agent tests against a scripted server: a bare listener that speaks raw
//! protocol frames, so each test controls exactly what the agent sees.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use taskwire_client::{Agent, AgentHandle, ClientConfig, ClientEvent, IdentityStore};
use taskwire_shared::frame::{read_frame, write_frame};
use taskwire_shared::model::Task;
use taskwire_shared::protocol::LoginStatus;
use taskwire_shared::types::{ClientId, NotificationId, TaskId, TaskStatus};
use taskwire_shared::Message;

fn task(id: i64, client: &str, title: &str) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId(id),
        client_id: ClientId::new(client),
        title: title.to_string(),
        description: String::new(),
        due_date: None,
        status: TaskStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

async fn scripted_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn spawn_agent(
    addr: SocketAddr,
    id: &str,
    identity: IdentityStore,
) -> (AgentHandle, mpsc::UnboundedReceiver<ClientEvent>) {
    let config = ClientConfig {
        server_addr: addr,
        client_id: Some(id.to_string()),
        reconnect_delay: Duration::from_millis(100),
        ..Default::default()
    };
    Agent::new(config, identity).spawn().unwrap()
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn expect_login(stream: &mut TcpStream, want: &str) {
    match read_frame(stream).await.unwrap().unwrap() {
        Message::Login { client_id } => assert_eq!(client_id, ClientId::new(want)),
        other => panic!("expected login, got {other:?}"),
    }
}

/// Accept one connection and run the standard handshake, ending with `tasks`
/// as the resync payload.
async fn accept_and_greet(listener: &TcpListener, id: &str, tasks: Vec<Task>) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    expect_login(&mut stream, id).await;
    write_frame(
        &mut stream,
        &Message::LoginResponse {
            status: LoginStatus::Success,
            name: Some(format!("Client-{id}")),
            message: None,
        },
    )
    .await
    .unwrap();
    write_frame(&mut stream, &Message::TaskList { tasks })
        .await
        .unwrap();
    stream
}

#[tokio::test]
async fn login_resyncs_cache_and_persists_identity() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));

    let (handle, mut events) = spawn_agent(addr, "alpha", identity.clone());
    let _server = accept_and_greet(&listener, "alpha", vec![task(1, "alpha", "First")]).await;

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Connected {
            name: Some("Client-alpha".to_string())
        }
    );
    match next_event(&mut events).await {
        ClientEvent::TaskListReplaced(tasks) => assert_eq!(tasks.len(), 1),
        other => panic!("unexpected event: {other:?}"),
    }

    let cached = handle.tasks().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].title, "First");

    // Identity persisted after the successful handshake.
    assert_eq!(identity.load().unwrap(), Some(ClientId::new("alpha")));

    handle.shutdown().await;
}

#[tokio::test]
async fn live_pushes_patch_the_cache() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));

    let (handle, mut events) = spawn_agent(addr, "alpha", identity);
    let mut server = accept_and_greet(&listener, "alpha", vec![]).await;
    let _ = next_event(&mut events).await; // Connected
    let _ = next_event(&mut events).await; // TaskListReplaced

    write_frame(
        &mut server,
        &Message::NewTask {
            task: task(7, "alpha", "Pushed"),
        },
    )
    .await
    .unwrap();
    match next_event(&mut events).await {
        ClientEvent::TaskAssigned(t) => assert_eq!(t.id, TaskId(7)),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(handle.tasks().await.len(), 1);

    let mut updated = task(7, "alpha", "Pushed");
    updated.status = TaskStatus::InProgress;
    write_frame(&mut server, &Message::TaskUpdated { task: updated })
        .await
        .unwrap();
    match next_event(&mut events).await {
        ClientEvent::TaskUpdated(t) => assert_eq!(t.status, TaskStatus::InProgress),
        other => panic!("unexpected event: {other:?}"),
    }

    write_frame(&mut server, &Message::TaskRemoved { task_id: TaskId(7) })
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::TaskRemoved(TaskId(7))
    );
    assert!(handle.tasks().await.is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn reconnects_and_replaces_cache_after_drop() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));

    let (handle, mut events) = spawn_agent(addr, "alpha", identity);

    let first = accept_and_greet(&listener, "alpha", vec![task(1, "alpha", "Old")]).await;
    let _ = next_event(&mut events).await; // Connected
    let _ = next_event(&mut events).await; // TaskListReplaced
    drop(first);

    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);

    // The agent comes back on its own and the resync replaces the cache.
    let _second = accept_and_greet(&listener, "alpha", vec![task(2, "alpha", "New")]).await;
    let _ = next_event(&mut events).await; // Connected
    match next_event(&mut events).await {
        ClientEvent::TaskListReplaced(tasks) => assert_eq!(tasks[0].title, "New"),
        other => panic!("unexpected event: {other:?}"),
    }
    let cached = handle.tasks().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, TaskId(2));

    handle.shutdown().await;
}

#[tokio::test]
async fn invalid_id_discards_identity_and_stops() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));
    identity.save(&ClientId::new("stale")).unwrap();

    let (handle, mut events) = spawn_agent(addr, "stale", identity.clone());

    let (mut stream, _) = listener.accept().await.unwrap();
    expect_login(&mut stream, "stale").await;
    write_frame(&mut stream, &Message::InvalidId).await.unwrap();

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::IdentityRejected { message: None }
    );
    assert_eq!(next_event(&mut events).await, ClientEvent::Stopped);
    assert!(identity.load().unwrap().is_none());

    handle.shutdown().await;
}

#[tokio::test]
async fn deactivated_login_stops_but_keeps_identity() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));
    identity.save(&ClientId::new("alpha")).unwrap();

    let (handle, mut events) = spawn_agent(addr, "alpha", identity.clone());

    let (mut stream, _) = listener.accept().await.unwrap();
    expect_login(&mut stream, "alpha").await;
    write_frame(
        &mut stream,
        &Message::LoginResponse {
            status: LoginStatus::Error,
            name: None,
            message: Some("Your account has been deactivated".to_string()),
        },
    )
    .await
    .unwrap();

    match next_event(&mut events).await {
        ClientEvent::IdentityRejected { message } => {
            assert!(message.unwrap().contains("deactivated"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(next_event(&mut events).await, ClientEvent::Stopped);
    // Deactivation is reversible; the stored id survives.
    assert_eq!(identity.load().unwrap(), Some(ClientId::new("alpha")));

    handle.shutdown().await;
}

#[tokio::test]
async fn account_removal_clears_identity_and_cache() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));

    let (handle, mut events) = spawn_agent(addr, "alpha", identity.clone());
    let mut server = accept_and_greet(&listener, "alpha", vec![task(1, "alpha", "Doomed")]).await;
    let _ = next_event(&mut events).await; // Connected
    let _ = next_event(&mut events).await; // TaskListReplaced

    write_frame(
        &mut server,
        &Message::ClientRemoved {
            message: "Your account has been removed".to_string(),
        },
    )
    .await
    .unwrap();

    match next_event(&mut events).await {
        ClientEvent::AccountRemoved { message } => assert!(message.contains("removed")),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(next_event(&mut events).await, ClientEvent::Stopped);
    assert!(identity.load().unwrap().is_none());
    assert!(handle.tasks().await.is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn commands_become_outbound_frames() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));

    let (handle, mut events) = spawn_agent(addr, "alpha", identity);
    let mut server = accept_and_greet(&listener, "alpha", vec![task(3, "alpha", "Work")]).await;
    let _ = next_event(&mut events).await; // Connected
    let _ = next_event(&mut events).await; // TaskListReplaced

    assert!(handle.report_status(TaskId(3), TaskStatus::Completed));
    assert_eq!(
        read_frame(&mut server).await.unwrap().unwrap(),
        Message::TaskUpdate {
            task_id: TaskId(3),
            status: TaskStatus::Completed,
        }
    );
    // Applied optimistically to the local cache.
    assert_eq!(handle.tasks().await[0].status, TaskStatus::Completed);

    assert!(handle.mark_read(NotificationId(9)));
    assert_eq!(
        read_frame(&mut server).await.unwrap().unwrap(),
        Message::NotificationRead {
            notification_id: NotificationId(9),
        }
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn unanswered_handshake_times_out_and_retries() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));

    let config = ClientConfig {
        server_addr: addr,
        client_id: Some("alpha".to_string()),
        connect_timeout: Duration::from_millis(200),
        reconnect_delay: Duration::from_millis(100),
        ..Default::default()
    };
    let (handle, mut events) = Agent::new(config, identity).spawn().unwrap();

    // Accept the connection, read the login, and never answer.
    let (mut silent, _) = listener.accept().await.unwrap();
    expect_login(&mut silent, "alpha").await;

    // The agent gives up on the handshake instead of blocking forever.
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);

    // The next attempt gets a real handshake.
    let _server = accept_and_greet(&listener, "alpha", vec![]).await;
    match next_event(&mut events).await {
        ClientEvent::Connected { .. } => {}
        other => panic!("unexpected event: {other:?}"),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn server_shutdown_triggers_reconnect_cycle() {
    let (listener, addr) = scripted_listener().await;
    let dir = tempfile::tempdir().unwrap();
    let identity = IdentityStore::at(dir.path().join("identity.json"));

    let (handle, mut events) = spawn_agent(addr, "alpha", identity);
    let mut server = accept_and_greet(&listener, "alpha", vec![]).await;
    let _ = next_event(&mut events).await; // Connected
    let _ = next_event(&mut events).await; // TaskListReplaced

    write_frame(
        &mut server,
        &Message::ServerShutdown {
            message: "Server is shutting down".to_string(),
        },
    )
    .await
    .unwrap();
    drop(server);

    match next_event(&mut events).await {
        ClientEvent::ServerShutdown { .. } => {}
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);

    // It comes back after the delay.
    let _server = accept_and_greet(&listener, "alpha", vec![]).await;
    match next_event(&mut events).await {
        ClientEvent::Connected { .. } => {}
        other => panic!("unexpected event: {other:?}"),
    }

    handle.shutdown().await;
}
