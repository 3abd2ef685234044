//! Reminder scheduler: periodic sweep over due reminders.
//!
//! Each due reminder becomes a normal notification for the task's owner, so it
//! inherits the at-least-once delivery path (live push when connected, the
//! connect-time sweep otherwise).  A reminder fires exactly once: it is marked
//! Sent only after its notification row is persisted.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use taskwire_shared::model::DueReminder;
use taskwire_shared::types::NotificationTarget;

use crate::dispatch::NotificationDispatcher;
use crate::error::Result;
use crate::server::Core;

pub(crate) async fn run(core: Arc<Core>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(core.config.reminder_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; consume it so the first sweep
    // happens one interval after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match run_pass(&core).await {
            Ok(0) => {}
            Ok(sent) => debug!(sent, "reminder sweep dispatched"),
            Err(e) => error!(error = %e, "reminder sweep failed"),
        }
    }
}

/// Dispatch every reminder whose time has come.  A failure on one reminder is
/// logged and does not abort the rest of the sweep.
pub(crate) async fn run_pass(core: &Arc<Core>) -> Result<usize> {
    let due = core.db.lock().await.due_reminders(Utc::now())?;
    if due.is_empty() {
        return Ok(0);
    }

    let dispatcher = NotificationDispatcher::new(core.clone());
    let mut sent = 0;
    for reminder in due {
        match fire(core, &dispatcher, &reminder).await {
            Ok(()) => sent += 1,
            Err(e) => {
                error!(reminder = %reminder.id, task = %reminder.task_id, error = %e, "failed to dispatch reminder");
            }
        }
    }
    Ok(sent)
}

/// Persist and push the notification for one due reminder, then consume the
/// reminder.  A failure on the Sent transition leaves the reminder Pending;
/// the next sweep retries it.
async fn fire(
    core: &Arc<Core>,
    dispatcher: &NotificationDispatcher,
    reminder: &DueReminder,
) -> Result<()> {
    let text = format!("Reminder: task '{}' is due", reminder.task_title);
    dispatcher
        .send(&NotificationTarget::Client(reminder.client_id.clone()), &text)
        .await?;
    core.db.lock().await.mark_reminder_sent(reminder.id)?;
    Ok(())
}
