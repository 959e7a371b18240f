//! Resumable tasks advanced one step per poll.
//!
//! A [`Task`] pairs a driver's [`StateMachine`] with the state it is in, the
//! execution context it works for and the connection it talks to. Each call to
//! [`Task::poll`] runs exactly one step of the machine and returns at once with
//! a [`StepStatus`]:
//!
//! - [`StepStatus::Advanced`] - the task moved to a new state
//! - [`StepStatus::Pending`] - the task is waiting on its connection
//! - [`StepStatus::Done`] - the task reached a terminal state
//!
//! Once done, a task is never stepped again; further polls return the same
//! `Done` status.
//!
//! The machine is chosen when the task is created and cannot be replaced. The
//! connection is copied from the context at the same time and cannot be
//! changed either, so a task always talks to the connection its context names.

use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::transport::ConnectionRef;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a task.
///
/// Used to key connection leases and to tag log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskToken(u64);

impl TaskToken {
    /// Returns a token no other task has.
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw token value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    /// The operation succeeded and its result is in the context.
    Finished,
    /// The operation failed and the reason is in the context.
    Failed,
    /// The caller cancelled the operation.
    Cancelled,
}

/// Result of polling a task once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Moved to a new, non-terminal state. Poll again.
    Advanced,
    /// Not ready; waiting on the connection. Poll again later.
    Pending,
    /// Reached a terminal state.
    Done(Completion),
}

impl StepStatus {
    /// Returns whether the task has completed.
    pub fn is_done(self) -> bool {
        matches!(self, StepStatus::Done(_))
    }
}

/// What one step of a state machine produced.
#[derive(Debug)]
pub enum Step<S> {
    /// The machine moved to `S`.
    Next(S),
    /// The machine stays in `S` until its connection is ready again.
    Wait(S),
}

/// Everything a step function may touch besides its own state.
#[derive(Debug)]
pub struct TaskEnv<'a, C> {
    /// The task being stepped.
    pub token: TaskToken,
    /// Execution context the task works for.
    pub context: &'a C,
    /// Connection the task performs I/O against.
    pub connection: Option<&'a ConnectionRef>,
}

/// Per-driver step logic.
///
/// `step` must do a bounded amount of work and must never block. When the
/// connection cannot make progress it returns [`Step::Wait`] with the state
/// it was given.
pub trait StateMachine {
    /// Driver-specific state. `Default` must be the initial state.
    type State: Default + fmt::Debug;
    /// Execution context the machine reads its request from and records its
    /// outcome into.
    type Context;

    /// Performs one step from `state`.
    fn step(&self, state: Self::State, env: &TaskEnv<'_, Self::Context>) -> Step<Self::State>;

    /// Returns how the task ended if `state` is terminal.
    fn completion(&self, state: &Self::State) -> Option<Completion>;

    /// Number of response items `state` still holds.
    fn retained_items(&self, _state: &Self::State) -> usize {
        0
    }

    /// Called when an incomplete task is dropped, before its lease is
    /// released. Must not perform I/O.
    fn abandon(&self, _state: Self::State, _env: &TaskEnv<'_, Self::Context>) {}
}

/// A running instance of a state machine.
pub struct Task<M: StateMachine> {
    token: TaskToken,
    state: M::State,
    machine: M,
    completion: Option<Completion>,
    context: Rc<M::Context>,
    connection: Option<ConnectionRef>,
}

impl<M: StateMachine> Task<M> {
    /// Creates a task in `initial` state.
    ///
    /// Drivers call this from their factory functions after copying the
    /// connection out of `context`.
    pub fn new(
        machine: M,
        initial: M::State,
        context: Rc<M::Context>,
        connection: Option<ConnectionRef>,
    ) -> Self {
        Self {
            token: TaskToken::next(),
            state: initial,
            machine,
            completion: None,
            context,
            connection,
        }
    }

    /// Runs one step and reports where the task stands.
    pub fn poll(&mut self) -> StepStatus {
        if let Some(completion) = self.completion {
            return StepStatus::Done(completion);
        }

        let env = TaskEnv {
            token: self.token,
            context: &*self.context,
            connection: self.connection.as_ref(),
        };
        let current = mem::take(&mut self.state);
        let (next, waited) = match self.machine.step(current, &env) {
            Step::Next(state) => (state, false),
            Step::Wait(state) => (state, true),
        };
        self.state = next;

        if let Some(completion) = self.machine.completion(&self.state) {
            debug!(task = %self.token, ?completion, "task completed");
            self.completion = Some(completion);
            return StepStatus::Done(completion);
        }
        if waited {
            StepStatus::Pending
        } else {
            StepStatus::Advanced
        }
    }

    /// The task's identity.
    pub fn token(&self) -> TaskToken {
        self.token
    }

    /// The current state.
    pub fn state(&self) -> &M::State {
        &self.state
    }

    /// The state machine driving this task.
    pub fn machine(&self) -> &M {
        &self.machine
    }

    /// Returns whether the task reached a terminal state.
    pub fn is_completed(&self) -> bool {
        self.completion.is_some()
    }

    /// How the task ended, once completed.
    pub fn completion(&self) -> Option<Completion> {
        self.completion
    }

    /// The execution context this task works for.
    pub fn context(&self) -> &Rc<M::Context> {
        &self.context
    }

    /// The connection this task performs I/O against.
    pub fn connection(&self) -> Option<&ConnectionRef> {
        self.connection.as_ref()
    }

    /// Number of response items the task still holds.
    pub fn retained_items(&self) -> usize {
        self.machine.retained_items(&self.state)
    }
}

impl<M: StateMachine> Drop for Task<M> {
    fn drop(&mut self) {
        if self.completion.is_none() {
            let env = TaskEnv {
                token: self.token,
                context: &*self.context,
                connection: self.connection.as_ref(),
            };
            self.machine.abandon(mem::take(&mut self.state), &env);
        }
        if let Some(connection) = &self.connection {
            connection.release(self.token);
        }
    }
}

impl<M: StateMachine> fmt::Debug for Task<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("token", &self.token)
            .field("state", &self.state)
            .field("completion", &self.completion)
            .finish()
    }
}

/// Type-erased view of a task, as held by the [`Scheduler`](crate::Scheduler).
pub trait Schedulable {
    /// Runs one step.
    fn poll(&mut self) -> StepStatus;

    /// Returns whether the task reached a terminal state.
    fn is_completed(&self) -> bool;

    /// The task's identity.
    fn token(&self) -> TaskToken;
}

impl<M: StateMachine> Schedulable for Task<M> {
    fn poll(&mut self) -> StepStatus {
        Task::poll(self)
    }

    fn is_completed(&self) -> bool {
        Task::is_completed(self)
    }

    fn token(&self) -> TaskToken {
        Task::token(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts down to zero, waiting once on every odd value.
    struct Countdown;

    #[derive(Debug, Default, PartialEq)]
    enum CountState {
        #[default]
        Start,
        Left(u8),
        Done,
    }

    struct CountContext {
        start: u8,
        steps: Cell<u32>,
        waited: Cell<bool>,
        abandoned_at: Cell<Option<u8>>,
    }

    impl StateMachine for Countdown {
        type State = CountState;
        type Context = CountContext;

        fn step(&self, state: CountState, env: &TaskEnv<'_, CountContext>) -> Step<CountState> {
            env.context.steps.set(env.context.steps.get() + 1);
            match state {
                CountState::Start => Step::Next(CountState::Left(env.context.start)),
                CountState::Left(0) => Step::Next(CountState::Done),
                CountState::Left(n) if n % 2 == 1 && !env.context.waited.get() => {
                    env.context.waited.set(true);
                    Step::Wait(CountState::Left(n))
                }
                CountState::Left(n) => {
                    env.context.waited.set(false);
                    Step::Next(CountState::Left(n - 1))
                }
                CountState::Done => Step::Wait(CountState::Done),
            }
        }

        fn completion(&self, state: &CountState) -> Option<Completion> {
            matches!(state, CountState::Done).then_some(Completion::Finished)
        }

        fn abandon(&self, state: CountState, env: &TaskEnv<'_, CountContext>) {
            if let CountState::Left(n) = state {
                env.context.abandoned_at.set(Some(n));
            }
        }
    }

    fn countdown(start: u8) -> Task<Countdown> {
        let context = Rc::new(CountContext {
            start,
            steps: Cell::new(0),
            waited: Cell::new(false),
            abandoned_at: Cell::new(None),
        });
        Task::new(Countdown, CountState::Start, context, None)
    }

    #[test]
    fn test_poll_sequence() {
        let mut task = countdown(2);
        assert_eq!(task.poll(), StepStatus::Advanced); // Start -> Left(2)
        assert_eq!(task.poll(), StepStatus::Advanced); // Left(2) -> Left(1)
        assert_eq!(task.poll(), StepStatus::Pending); // wait on Left(1)
        assert_eq!(task.poll(), StepStatus::Advanced); // Left(1) -> Left(0)
        assert!(!task.is_completed());
        assert_eq!(task.poll(), StepStatus::Done(Completion::Finished));
        assert!(task.is_completed());
        assert_eq!(*task.state(), CountState::Done);
    }

    #[test]
    fn test_completed_task_is_not_stepped_again() {
        let mut task = countdown(0);
        task.poll();
        assert_eq!(task.poll(), StepStatus::Done(Completion::Finished));
        let steps = task.context().steps.get();

        for _ in 0..5 {
            assert_eq!(task.poll(), StepStatus::Done(Completion::Finished));
            assert!(task.is_completed());
        }
        assert_eq!(task.context().steps.get(), steps);
    }

    #[test]
    fn test_drop_abandons_incomplete_task_only() {
        let mut task = countdown(3);
        task.poll();
        let context = task.context().clone();
        drop(task);
        assert_eq!(context.abandoned_at.get(), Some(3));

        let mut task = countdown(0);
        task.poll();
        task.poll();
        assert!(task.is_completed());
        let context = task.context().clone();
        drop(task);
        assert_eq!(context.abandoned_at.get(), None);
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = countdown(0);
        let b = countdown(0);
        assert_ne!(a.token(), b.token());
    }

    #[test]
    fn test_schedulable_view() {
        let mut boxed: Box<dyn Schedulable> = Box::new(countdown(0));
        assert!(!boxed.is_completed());
        assert_eq!(boxed.poll(), StepStatus::Advanced);
        assert!(boxed.poll().is_done());
        assert!(boxed.is_completed());
    }

    #[test]
    fn test_task_debug() {
        let task = countdown(1);
        let debug_str = format!("{:?}", task);
        assert!(debug_str.contains("Task"));
        assert!(debug_str.contains("Start"));
    }
}
