//! In-memory mirror of the client's assigned tasks.
//!
//! The cache holds whatever the server last told us: it is replaced wholesale
//! by the connect-time task list and patched by live pushes.  It never
//! persists anything; the server's store is the source of truth and every
//! reconnect rebuilds the cache from scratch.

use std::collections::BTreeMap;

use taskwire_shared::model::Task;
use taskwire_shared::types::{TaskId, TaskStatus};

#[derive(Debug, Default)]
pub struct TaskCache {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire cache with a fresh task list from the server.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks.into_iter().map(|t| (t.id, t)).collect();
    }

    /// Insert or overwrite a task from a live push.
    pub fn upsert(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// Drop a deleted task.  Returns `false` when the id was unknown, which
    /// is normal after a resync already removed it.
    pub fn remove(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Apply a locally-initiated status change so the UI reflects it without
    /// waiting for the server.  Returns `false` when the id is unknown.
    pub fn set_status(&mut self, id: TaskId, status: TaskStatus) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// All cached tasks, active work first: Pending, then In Progress, then
    /// Completed, earliest due date first within each group.
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| {
            status_rank(a.status)
                .cmp(&status_rank(b.status))
                .then_with(|| match (a.due_date, b.due_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Pending => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Completed => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use taskwire_shared::types::ClientId;

    fn task(id: i64, status: TaskStatus, due_in_hours: Option<i64>) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId(id),
            client_id: ClientId::new("c1"),
            title: format!("task {id}"),
            description: String::new(),
            due_date: due_in_hours.map(|h| now + Duration::hours(h)),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn replace_all_discards_previous_contents() {
        let mut cache = TaskCache::new();
        cache.upsert(task(1, TaskStatus::Pending, None));
        cache.replace_all(vec![task(2, TaskStatus::Pending, None)]);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(TaskId(1)).is_none());
        assert!(cache.get(TaskId(2)).is_some());
    }

    #[test]
    fn upsert_overwrites_by_id() {
        let mut cache = TaskCache::new();
        cache.upsert(task(1, TaskStatus::Pending, None));
        cache.upsert(task(1, TaskStatus::Completed, None));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(TaskId(1)).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn remove_unknown_is_false() {
        let mut cache = TaskCache::new();
        assert!(!cache.remove(TaskId(9)));
        cache.upsert(task(9, TaskStatus::Pending, None));
        assert!(cache.remove(TaskId(9)));
        assert!(cache.is_empty());
    }

    #[test]
    fn set_status_patches_in_place() {
        let mut cache = TaskCache::new();
        cache.upsert(task(1, TaskStatus::Pending, None));
        assert!(cache.set_status(TaskId(1), TaskStatus::InProgress));
        assert_eq!(cache.get(TaskId(1)).unwrap().status, TaskStatus::InProgress);
        assert!(!cache.set_status(TaskId(2), TaskStatus::Completed));
    }

    #[test]
    fn tasks_order_active_work_first() {
        let mut cache = TaskCache::new();
        cache.upsert(task(1, TaskStatus::Completed, None));
        cache.upsert(task(2, TaskStatus::Pending, Some(48)));
        cache.upsert(task(3, TaskStatus::Pending, Some(1)));
        cache.upsert(task(4, TaskStatus::InProgress, None));
        cache.upsert(task(5, TaskStatus::Pending, None));

        let order: Vec<i64> = cache.tasks().into_iter().map(|t| t.id.0).collect();
        // Pending by due date (undated last), then in-progress, then done.
        assert_eq!(order, vec![3, 2, 5, 4, 1]);
    }
}
