//! Job engine (C11, §4.12): a thread-safe registry of `TaskID -> Task`,
//! serialized by one coarse mutex (§5: "one mutex covering add/get/
//! finished... calls are short, so the coarse lock is adequate").

use crate::job::task::Task;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("action id {0} was already completed")]
    DuplicateAction(u32),
    #[error("action id {0} was never issued")]
    UnknownAction(u32),
}

pub type TaskId = u32;

struct Inner {
    tasks: BTreeMap<TaskId, Box<dyn Task>>,
}

/// Registry of in-flight tasks. `add_task`/`get_new_action`/`finished_action`
/// are all serialized by one mutex (§4.12).
pub struct JobEngine {
    next_id: AtomicU32,
    inner: Mutex<Inner>,
}

impl Default for JobEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JobEngine {
    pub fn new() -> Self {
        Self { next_id: AtomicU32::new(1), inner: Mutex::new(Inner { tasks: BTreeMap::new() }) }
    }

    /// Assigns a fresh monotonic `TaskID` and stores `task` (§4.12).
    pub fn add_task(&self, task: Box<dyn Task>) -> TaskId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        inner.tasks.insert(id, task);
        log::info!("job engine: registered task {id}");
        id
    }

    /// Iterates tasks in insertion order, asking each for its next action
    /// until one produces one. Returns `None` if every task is drained
    /// (§4.12).
    pub fn get_new_action(&self) -> Option<(TaskId, u32, Vec<u8>)> {
        let mut inner = self.inner.lock().unwrap();
        for (&task_id, task) in inner.tasks.iter_mut() {
            if let Some((action_id, payload)) = task.next_action() {
                return Some((task_id, action_id, payload));
            }
        }
        None
    }

    /// Delivers one action's result to its owning task; removes the task
    /// from the registry once it reports completion (§4.12).
    pub fn finished_action(&self, task_id: TaskId, action_id: u32, results: &[u8]) -> Result<bool, TaskError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(task) = inner.tasks.get_mut(&task_id) else {
            return Err(TaskError::UnknownAction(action_id));
        };
        let done = task.finished(action_id, results)?;
        if done {
            inner.tasks.remove(&task_id);
            log::info!("job engine: task {task_id} complete, removed from registry");
        }
        Ok(done)
    }

    pub fn task_count(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::task::{AnimationTask, TiledImageTask};
    use byteorder::{LittleEndian, WriteBytesExt};

    #[test]
    fn add_task_assigns_monotonic_ids() {
        let engine = JobEngine::new();
        let a = engine.add_task(Box::new(TiledImageTask::new("a".to_string(), 4, 4, "/tmp/a".to_string(), 1, 1)));
        let b = engine.add_task(Box::new(TiledImageTask::new("b".to_string(), 4, 4, "/tmp/b".to_string(), 1, 1)));
        assert!(b > a);
        assert_eq!(engine.task_count(), 2);
    }

    #[test]
    fn get_new_action_drains_and_then_returns_none() {
        let engine = JobEngine::new();
        engine.add_task(Box::new(TiledImageTask::new("a".to_string(), 4, 4, "/tmp/c".to_string(), 1, 1)));
        assert!(engine.get_new_action().is_some());
        assert!(engine.get_new_action().is_none());
    }

    #[test]
    fn finished_action_removes_task_on_completion() {
        let engine = JobEngine::new();
        let task_id = engine.add_task(Box::new(AnimationTask::new("a".to_string(), 2, 2, "/tmp/anim2".to_string(), 1)));
        let (tid, action_id, _) = engine.get_new_action().unwrap();
        assert_eq!(tid, task_id);

        let mut payload = Vec::new();
        for _ in 0..4 {
            payload.write_f32::<LittleEndian>(0.0).unwrap();
            payload.write_f32::<LittleEndian>(0.0).unwrap();
            payload.write_f32::<LittleEndian>(0.0).unwrap();
        }
        let done = engine.finished_action(tid, action_id, &payload).unwrap();
        assert!(done);
        assert_eq!(engine.task_count(), 0);
        let _ = std::fs::remove_file("/tmp/anim2_00000_prophoto16.ppm");
    }

    #[test]
    fn finished_action_on_unknown_task_id_errors() {
        let engine = JobEngine::new();
        assert!(engine.finished_action(42, 0, &[]).is_err());
    }
}
