//! Single-threaded round-robin scheduler.
//!
//! The scheduler owns submitted tasks in an index arena. Each call to
//! [`Scheduler::poll_once`] advances the next incomplete task by one step, so
//! one thread can keep many reads in flight over many connections.
//!
//! Task ids carry a generation. Once a slot is reused, ids of the task that
//! used to live there no longer resolve.
//!
//! # Example
//!
//! ```
//! use modbus_task::{
//!     MockConnection, ModbusDriver, ReadExecution, ReadRequest, Scheduler, SharedConnection,
//! };
//!
//! let mock = MockConnection::new();
//! let connection = SharedConnection::new(mock.clone());
//! let driver = ModbusDriver::default();
//! let mut scheduler = Scheduler::new();
//!
//! let execution = ReadExecution::new(
//!     ReadRequest::parse("holding-register:0[1]").unwrap(),
//!     connection,
//! );
//! let id = driver.submit_read(&mut scheduler, &execution).unwrap();
//!
//! scheduler.run_until_idle(10);
//! assert_eq!(scheduler.is_completed(id), Some(false)); // waiting for the device
//! ```

use std::fmt;

use tracing::trace;

use crate::task::{Schedulable, StepStatus};

/// Handle to a task owned by a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    index: u32,
    generation: u32,
}

impl TaskId {
    /// Arena slot of the task.
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Default)]
struct Slot {
    generation: u32,
    task: Option<Box<dyn Schedulable>>,
}

/// Owns tasks and polls them one step at a time.
#[derive(Default)]
pub struct Scheduler {
    slots: Vec<Slot>,
    free: Vec<u32>,
    cursor: usize,
    len: usize,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `task` and returns its id.
    pub fn submit(&mut self, task: impl Schedulable + 'static) -> TaskId {
        let task: Box<dyn Schedulable> = Box::new(task);
        let token = task.token();

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.task = Some(task);
        self.len += 1;

        let id = TaskId {
            index,
            generation: slot.generation,
        };
        trace!(task = %token, id = %id, "task submitted");
        id
    }

    /// Advances the next incomplete task by one step.
    ///
    /// Returns `None` when no task is left to poll.
    pub fn poll_once(&mut self) -> Option<(TaskId, StepStatus)> {
        let count = self.slots.len();
        for offset in 0..count {
            let index = (self.cursor + offset) % count;
            let slot = &mut self.slots[index];
            let Some(task) = slot.task.as_mut() else {
                continue;
            };
            if task.is_completed() {
                continue;
            }

            let status = task.poll();
            self.cursor = (index + 1) % count;
            let id = TaskId {
                index: index as u32,
                generation: slot.generation,
            };
            return Some((id, status));
        }
        None
    }

    /// Polls until every task has completed, all remaining tasks are pending
    /// in the same round, or `max_polls` steps have run. Returns the number of
    /// steps taken.
    pub fn run_until_idle(&mut self, max_polls: usize) -> usize {
        let mut polls = 0;
        let mut pending_streak = 0;
        while polls < max_polls {
            let Some((_, status)) = self.poll_once() else {
                break;
            };
            polls += 1;
            if status == StepStatus::Pending {
                pending_streak += 1;
                if pending_streak >= self.pending() {
                    break;
                }
            } else {
                pending_streak = 0;
            }
        }
        polls
    }

    /// Returns whether the task has completed, or `None` if `id` does not
    /// resolve.
    pub fn is_completed(&self, id: TaskId) -> Option<bool> {
        self.get(id).map(|task| task.is_completed())
    }

    /// Drops the task behind `id`, completed or not. Returns `false` if `id`
    /// does not resolve.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.task.is_none() {
            return false;
        }
        slot.task = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        true
    }

    /// Drops every completed task and returns their ids.
    pub fn reap(&mut self) -> Vec<TaskId> {
        let done: Vec<TaskId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.task.as_ref().is_some_and(|t| t.is_completed()))
            .map(|(index, slot)| TaskId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect();
        for id in &done {
            self.remove(*id);
        }
        done
    }

    /// Number of tasks owned, completed or not.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the scheduler owns no tasks.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of tasks not yet completed.
    pub fn pending(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.task.as_ref())
            .filter(|task| !task.is_completed())
            .count()
    }

    fn get(&self, id: TaskId) -> Option<&dyn Schedulable> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.task.as_deref()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("len", &self.len)
            .field("pending", &self.pending())
            .finish()
    }
}
