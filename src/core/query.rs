//! Async query execution with status tracking and stale-result suppression.
//!
//! Every [`QueryRunner::run`] mints a new generation. When an invocation
//! settles, it may only touch shared state if its generation is still the
//! latest one started, so the last *started* call wins regardless of the
//! order in which calls complete. Superseded calls are never aborted; their
//! results are simply ignored.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Display};
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::utils::listeners::{ListenerId, Listeners};
use crate::utils::task;

// ============================================================================
// State
// ============================================================================

/// Lifecycle of the most recent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Observable snapshot of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: T,
    /// Message of the latest failure, cleared when a new run starts.
    pub error: Option<String>,
}

/// Strictly increasing marker of "most recently started" invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// How an invocation ended, from the runner's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Completion {
    /// The result (or failure) was written to the query state.
    Applied,
    /// A newer invocation had started; the outcome was dropped.
    Discarded,
}

// ============================================================================
// QueryRunner
// ============================================================================

type QueryFn<A, T, E> = dyn Fn(A) -> LocalBoxFuture<'static, Result<T, E>>;

struct Inner<A, T, E> {
    func: Box<QueryFn<A, T, E>>,
    default_value: T,
    keep_previous: bool,
    latest: Cell<u64>,
    state: RefCell<QueryState<T>>,
    listeners: Listeners<QueryState<T>>,
}

/// Wraps an async data-producing function with status and ordering guarantees.
///
/// `A` is the argument bundle passed to the function on each run; use a
/// tuple for several arguments. Cloning shares the same state.
pub struct QueryRunner<A, T, E> {
    inner: Rc<Inner<A, T, E>>,
}

impl<A, T, E> Clone for QueryRunner<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A, T, E> QueryRunner<A, T, E>
where
    A: 'static,
    T: Clone + 'static,
    E: Display + 'static,
{
    /// Create a runner in the `Idle` state holding `default_value`.
    ///
    /// With `keep_previous`, data from the last successful run stays
    /// visible while a new run is loading instead of resetting to the
    /// default.
    pub fn new<F, Fut>(func: F, default_value: T, keep_previous: bool) -> Self
    where
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let state = QueryState {
            status: QueryStatus::Idle,
            data: default_value.clone(),
            error: None,
        };

        Self {
            inner: Rc::new(Inner {
                func: Box::new(move |args| func(args).boxed_local()),
                default_value,
                keep_previous,
                latest: Cell::new(0),
                state: RefCell::new(state),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Start an invocation in the background. Failures end up in `status`.
    pub fn run(&self, args: A) {
        let invocation = self.invoke(args);
        task::spawn_local(async move {
            let _ = invocation.await;
        });
    }

    /// Start an invocation and return a future that settles it.
    ///
    /// The loading transition (and the data reset when `keep_previous` is
    /// off) happens before this returns, and the wrapped function has been
    /// called. Awaiting the future applies or discards the outcome.
    pub fn invoke(&self, args: A) -> LocalBoxFuture<'static, Completion> {
        let generation = self.begin();
        let pending = (self.inner.func)(args);
        let inner = self.inner.clone();

        async move {
            let outcome = pending.await;
            inner.finish(generation, outcome)
        }
        .boxed_local()
    }

    /// Generation of the most recently started invocation, if any.
    pub fn latest(&self) -> Option<Generation> {
        match self.inner.latest.get() {
            0 => None,
            n => Some(Generation(n)),
        }
    }

    pub fn status(&self) -> QueryStatus {
        self.inner.state.borrow().status
    }

    /// Clone of the current data.
    pub fn data(&self) -> T {
        self.inner.state.borrow().data.clone()
    }

    /// Borrow the current data without cloning it.
    pub fn with_data<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.borrow().data)
    }

    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    /// Call `listener` with a snapshot after every state change.
    pub fn subscribe(&self, listener: impl Fn(&QueryState<T>) + 'static) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Remove a listener added by [`QueryRunner::subscribe`].
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn begin(&self) -> Generation {
        let generation = self.inner.latest.get() + 1;
        self.inner.latest.set(generation);

        self.inner.update(|state| {
            state.status = QueryStatus::Loading;
            state.error = None;
            if !self.inner.keep_previous {
                state.data = self.inner.default_value.clone();
            }
        });

        Generation(generation)
    }
}

impl<A, T, E> Inner<A, T, E>
where
    T: Clone,
    E: Display,
{
    fn finish(&self, generation: Generation, outcome: Result<T, E>) -> Completion {
        let latest = self.latest.get();
        if generation.0 != latest {
            debug!(
                generation = generation.0,
                latest,
                failed = outcome.is_err(),
                "discarding stale query result"
            );
            return Completion::Discarded;
        }

        match outcome {
            Ok(data) => self.update(|state| {
                state.status = QueryStatus::Success;
                state.data = data;
            }),
            Err(err) => {
                warn!(generation = generation.0, error = %err, "query failed");
                self.update(|state| {
                    state.status = QueryStatus::Error;
                    state.error = Some(err.to_string());
                });
            }
        }
        Completion::Applied
    }

    /// Mutate the state, then notify listeners outside the borrow.
    fn update(&self, f: impl FnOnce(&mut QueryState<T>)) {
        let snapshot = {
            let mut state = self.state.borrow_mut();
            f(&mut state);
            state.clone()
        };
        self.listeners.notify(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use std::collections::HashMap;

    type Reply = Result<Vec<u32>, String>;

    /// Query function whose calls are resolved by the test, by key.
    #[derive(Default, Clone)]
    struct Script {
        gates: Rc<RefCell<HashMap<&'static str, oneshot::Sender<Reply>>>>,
        calls: Rc<Cell<usize>>,
    }

    impl Script {
        fn runner(&self, keep_previous: bool) -> QueryRunner<&'static str, Vec<u32>, String> {
            let script = self.clone();
            QueryRunner::new(
                move |key: &'static str| {
                    script.calls.set(script.calls.get() + 1);
                    let (tx, rx) = oneshot::channel();
                    script.gates.borrow_mut().insert(key, tx);
                    async move { rx.await.unwrap_or_else(|_| Err("cancelled".to_string())) }
                },
                vec![0],
                keep_previous,
            )
        }

        fn resolve(&self, key: &str, reply: Reply) {
            let gate = self.gates.borrow_mut().remove(key).expect("unknown call");
            gate.send(reply).expect("invocation dropped");
        }
    }

    #[tokio::test]
    async fn test_starts_idle_with_default() {
        let runner = Script::default().runner(false);
        assert_eq!(runner.status(), QueryStatus::Idle);
        assert_eq!(runner.data(), vec![0]);
        assert_eq!(runner.latest(), None);
    }

    #[tokio::test]
    async fn test_success() {
        let script = Script::default();
        let runner = script.runner(false);

        let a = runner.invoke("a");
        assert_eq!(runner.status(), QueryStatus::Loading);
        script.resolve("a", Ok(vec![1, 2]));

        assert_eq!(a.await, Completion::Applied);
        assert_eq!(
            runner.state(),
            QueryState { status: QueryStatus::Success, data: vec![1, 2], error: None }
        );
    }

    #[tokio::test]
    async fn test_reset_to_default_synchronously() {
        let script = Script::default();
        let runner = script.runner(false);

        let a = runner.invoke("a");
        script.resolve("a", Ok(vec![7]));
        let _ = a.await;
        assert_eq!(runner.data(), vec![7]);

        let _b = runner.invoke("b");
        assert_eq!(runner.status(), QueryStatus::Loading);
        assert_eq!(runner.data(), vec![0]);
        assert_eq!(script.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_keep_previous_retains_data_while_loading() {
        let script = Script::default();
        let runner = script.runner(true);

        let a = runner.invoke("a");
        script.resolve("a", Ok(vec![7]));
        let _ = a.await;

        let b = runner.invoke("b");
        assert_eq!(runner.status(), QueryStatus::Loading);
        assert_eq!(runner.data(), vec![7]);

        script.resolve("b", Err("boom".into()));
        assert_eq!(b.await, Completion::Applied);
        assert_eq!(runner.status(), QueryStatus::Error);
        assert_eq!(runner.data(), vec![7]);
        assert_eq!(runner.state().error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_later_start_wins_when_earlier_finishes_last() {
        let script = Script::default();
        let runner = script.runner(false);

        let a = runner.invoke("a");
        let b = runner.invoke("b");

        script.resolve("b", Ok(vec![2]));
        assert_eq!(b.await, Completion::Applied);
        assert_eq!(runner.data(), vec![2]);

        script.resolve("a", Ok(vec![1]));
        assert_eq!(a.await, Completion::Discarded);
        assert_eq!(runner.data(), vec![2]);
        assert_eq!(runner.status(), QueryStatus::Success);
    }

    #[tokio::test]
    async fn test_earlier_result_is_dropped_even_if_first() {
        let script = Script::default();
        let runner = script.runner(false);

        let a = runner.invoke("a");
        let b = runner.invoke("b");

        script.resolve("a", Ok(vec![1]));
        assert_eq!(a.await, Completion::Discarded);
        assert_eq!(runner.status(), QueryStatus::Loading);
        assert_eq!(runner.data(), vec![0]);

        script.resolve("b", Ok(vec![2]));
        assert_eq!(b.await, Completion::Applied);
        assert_eq!(runner.data(), vec![2]);
    }

    #[tokio::test]
    async fn test_sequential_runs_show_each_result() {
        let script = Script::default();
        let runner = script.runner(false);
        let shown = Rc::new(RefCell::new(Vec::new()));
        {
            let shown = shown.clone();
            runner.subscribe(move |state| {
                if state.status == QueryStatus::Success {
                    shown.borrow_mut().push(state.data.clone());
                }
            });
        }

        let a = runner.invoke("a");
        script.resolve("a", Ok(vec![1]));
        assert_eq!(a.await, Completion::Applied);
        assert_eq!(runner.data(), vec![1]);

        let b = runner.invoke("b");
        script.resolve("b", Ok(vec![2]));
        assert_eq!(b.await, Completion::Applied);
        assert_eq!(runner.data(), vec![2]);

        assert_eq!(*shown.borrow(), vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let script = Script::default();
        let runner = script.runner(false);
        let count = Rc::new(Cell::new(0));
        let id = {
            let count = count.clone();
            runner.subscribe(move |_| count.set(count.get() + 1))
        };
        assert_eq!(runner.listener_count(), 1);

        let a = runner.invoke("a");
        assert!(runner.unsubscribe(id));
        script.resolve("a", Ok(vec![1]));
        let _ = a.await;

        assert_eq!(count.get(), 1);
        assert_eq!(runner.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_flip_status() {
        let script = Script::default();
        let runner = script.runner(false);

        let a = runner.invoke("a");
        let b = runner.invoke("b");
        script.resolve("b", Ok(vec![2]));
        let _ = b.await;

        script.resolve("a", Err("late failure".into()));
        assert_eq!(a.await, Completion::Discarded);
        assert_eq!(runner.status(), QueryStatus::Success);
        assert_eq!(runner.state().error, None);
    }

    #[tokio::test]
    async fn test_listeners_see_every_transition() {
        let script = Script::default();
        let runner = script.runner(false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            runner.subscribe(move |state| seen.borrow_mut().push(state.status));
        }

        let a = runner.invoke("a");
        script.resolve("a", Ok(vec![3]));
        let _ = a.await;

        assert_eq!(*seen.borrow(), vec![QueryStatus::Loading, QueryStatus::Success]);
    }

    #[tokio::test]
    async fn test_run_in_background() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let script = Script::default();
                let runner = script.runner(false);

                runner.run("a");
                runner.run("b");
                assert_eq!(runner.latest(), Some(Generation(2)));

                script.resolve("b", Ok(vec![2]));
                script.resolve("a", Ok(vec![1]));
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }

                assert_eq!(runner.status(), QueryStatus::Success);
                assert_eq!(runner.data(), vec![2]);
            })
            .await;
    }
}
