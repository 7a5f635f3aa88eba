//! Resource Engine
//!
//! A [`Resource`] wraps one `(method, arguments)` pair and turns the bare
//! call into observable state:
//!
//! - [`fetch`](Resource::fetch) runs the call and records the outcome in a
//!   [`ResourceState`], notifying subscribers along the way
//! - [`update_args`](Resource::update_args) stores new arguments and, once
//!   the debounce window elapses without further changes, refetches if they
//!   differ structurally from the last fetched ones; the superseded in-flight
//!   call is aborted
//! - [`set_data`](Resource::set_data) mutates data locally without a call
//! - [`dispose`](Resource::dispose) releases timers, listeners and the
//!   in-flight call
//!
//! Aborted calls are never reported as errors: `fetch` resolves with the
//! previous data and no event is emitted.
//!
//! # Event Order
//!
//! On success the generic channel receives `data`, `loaded`, `loading-end`,
//! then the specific channels receive `on_data`, `on_loading(false)`,
//! `on_loaded(true)`. On failure the generic channel receives `error`,
//! `loading-end`, then `on_error`, `on_loading(false)`.

mod listeners;
mod state;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tandem_common::RpcError;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::client::{PendingCall, RpcClient};
use crate::pending::CallId;

use listeners::{Listeners, Notice};

pub use listeners::Subscription;
pub use state::{ResourceEvent, ResourceState};

/// Stateful handle for one remote call. Clones share the same state.
pub struct Resource<T> {
    inner: Arc<ResourceInner<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct ResourceInner<T> {
    client: RpcClient,
    method: String,
    lazy: bool,
    debounce: Duration,
    first_execute: AtomicBool,
    core: Mutex<Core<T>>,
    listeners: Listeners<T>,
}

struct Core<T> {
    state: ResourceState<T>,
    args: Vec<Value>,
    last_fetched: Vec<Value>,
    /// Calls started by this resource that have not settled yet.
    in_flight: Vec<CallId>,
    debounce: Option<JoinHandle<()>>,
    /// Bumped whenever a scheduled timer is replaced or cancelled.
    debounce_generation: u64,
    disposed: bool,
}

impl<T> Core<T> {
    /// Aborts the scheduled timer and invalidates any firing already in progress.
    fn cancel_timer(&mut self) {
        self.debounce_generation += 1;
        if let Some(timer) = self.debounce.take() {
            timer.abort();
        }
    }
}

/// A fetch that has updated state and started its call.
struct Attempt {
    generation: u64,
    call: PendingCall,
}

/// Settles an attempt whose `finish` future was dropped before the call
/// completed: the attempt is forgotten like an abort.
struct Unsettled<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    resource: Resource<T>,
    id: CallId,
    generation: u64,
    armed: bool,
}

impl<T> Drop for Unsettled<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut core = self.resource.core();
        core.in_flight.retain(|id| *id != self.id);
        if core.state.index == self.generation {
            core.state.loading = false;
        }
        tracing::debug!(
            method = %self.resource.inner.method,
            generation = self.generation,
            "Fetch dropped before settling"
        );
    }
}

impl<T> Resource<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(client: RpcClient, method: String, args: Vec<Value>, lazy: bool) -> Self {
        let debounce = client.config().debounce;
        let resource = Self {
            inner: Arc::new(ResourceInner {
                client,
                method,
                lazy,
                debounce,
                first_execute: AtomicBool::new(false),
                core: Mutex::new(Core {
                    state: ResourceState::default(),
                    last_fetched: args.clone(),
                    args,
                    in_flight: Vec::new(),
                    debounce: None,
                    debounce_generation: 0,
                    disposed: false,
                }),
                listeners: Listeners::new(),
            }),
        };

        if !resource.inner.lazy && !resource.inner.first_execute.swap(true, Ordering::SeqCst) {
            resource.spawn_fetch(None);
        }

        resource
    }

    fn core(&self) -> MutexGuard<'_, Core<T>> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    /// Returns a copy of the current state.
    pub fn get_state(&self) -> ResourceState<T> {
        self.core().state.clone()
    }

    /// Arguments the next default fetch will use.
    pub fn args(&self) -> Vec<Value> {
        self.core().args.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.core().disposed
    }

    /// Runs the call with the stored arguments.
    ///
    /// Resolves with the new data on success, or with the previous data if
    /// the call was aborted.
    ///
    /// # Errors
    ///
    /// The normalized error of a failed call, or an `Aborted` error if the
    /// resource was disposed.
    pub async fn fetch(&self) -> Result<Option<T>, RpcError> {
        let attempt = self.begin(None)?;
        self.finish(attempt).await
    }

    /// Like [`fetch`](Self::fetch), but with explicit arguments for this
    /// call only. The stored arguments are left alone.
    pub async fn fetch_with(&self, args: Vec<Value>) -> Result<Option<T>, RpcError> {
        let attempt = self.begin(Some(args))?;
        self.finish(attempt).await
    }

    /// Replaces the stored arguments and schedules a debounced refetch.
    ///
    /// Calls within one debounce window collapse into a single fetch using
    /// the last arguments. Must be called from within a Tokio runtime.
    pub fn update_args(&self, args: Vec<Value>) {
        let mut core = self.core();
        if core.disposed {
            return;
        }
        core.args = args;
        core.cancel_timer();

        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(method = %self.inner.method, "update_args called outside of a Tokio runtime, refetch not scheduled");
            return;
        };

        let weak: Weak<ResourceInner<T>> = Arc::downgrade(&self.inner);
        let delay = self.inner.debounce;
        let generation = core.debounce_generation;
        core.debounce = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                Resource { inner }.check_and_execute(generation);
            }
        }));
    }

    /// Cancels a scheduled debounced refetch. An in-flight call is left alone.
    pub fn cancel_pending(&self) {
        self.core().cancel_timer();
    }

    /// Replaces the data locally and notifies `data` subscribers.
    pub fn set_data(&self, data: T) -> T {
        self.update_data(|_| data)
    }

    /// Computes new data from the current data and notifies `data` subscribers.
    pub fn update_data<F>(&self, update: F) -> T
    where
        F: FnOnce(Option<&T>) -> T,
    {
        let (data, notices) = {
            let mut core = self.core();
            let data = update(core.state.data.as_ref());
            core.state.data = Some(data.clone());
            let notices = vec![
                Notice::On(ResourceEvent::Data, core.state.clone()),
                Notice::Data(data.clone()),
            ];
            (data, notices)
        };
        self.inner.listeners.deliver(notices);
        data
    }

    /// Releases the resource: cancels the debounce timer, drops every
    /// listener and aborts the in-flight call. Safe to call repeatedly.
    pub fn dispose(&self) {
        let in_flight = {
            let mut core = self.core();
            if core.disposed {
                return;
            }
            core.disposed = true;
            core.cancel_timer();
            std::mem::take(&mut core.in_flight)
        };

        self.inner.listeners.clear();
        for id in in_flight {
            self.inner.client.abort(id);
        }
        tracing::debug!(method = %self.inner.method, "Disposed resource");
    }

    /// Subscribes to every event; the callback also receives the state
    /// right after the event.
    pub fn on<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ResourceEvent, &ResourceState<T>) + Send + Sync + 'static,
    {
        self.inner.listeners.on(Arc::new(callback))
    }

    pub fn on_data<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.listeners.on_data(Arc::new(callback))
    }

    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RpcError) + Send + Sync + 'static,
    {
        self.inner.listeners.on_error(Arc::new(callback))
    }

    pub fn on_loading<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.listeners.on_loading(Arc::new(callback))
    }

    pub fn on_loaded<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.listeners.on_loaded(Arc::new(callback))
    }

    /// Number of registered callbacks across all channels.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Marks the start of an attempt and starts the call.
    fn begin(&self, override_args: Option<Vec<Value>>) -> Result<Attempt, RpcError> {
        let (attempt, notices) = {
            let mut core = self.core();
            if core.disposed {
                return Err(RpcError::aborted());
            }

            let was_loading = core.state.loading;
            let was_loaded = core.state.loaded;

            core.state.error = None;
            core.state.index += 1;
            core.state.loading = true;
            core.state.loaded = false;

            let mut notices = Vec::new();
            if !was_loading {
                notices.push(Notice::On(ResourceEvent::LoadingStart, core.state.clone()));
                notices.push(Notice::Loading(true));
            }
            if was_loaded {
                notices.push(Notice::On(ResourceEvent::Loaded, core.state.clone()));
                notices.push(Notice::Loaded(false));
            }

            let args = override_args.unwrap_or_else(|| core.args.clone());
            core.last_fetched = args.clone();

            let call = self.inner.client.start(&self.inner.method, args);
            core.in_flight.push(call.id());

            let attempt = Attempt {
                generation: core.state.index,
                call,
            };
            (attempt, notices)
        };

        self.inner.listeners.deliver(notices);
        Ok(attempt)
    }

    /// Awaits the call and records its outcome.
    async fn finish(&self, attempt: Attempt) -> Result<Option<T>, RpcError> {
        let id = attempt.call.id();
        let mut unsettled = Unsettled {
            resource: self.clone(),
            id,
            generation: attempt.generation,
            armed: true,
        };

        let outcome = attempt.call.await.and_then(|value| {
            serde_json::from_value::<T>(value)
                .map_err(|e| RpcError::protocol(format!("Unexpected result shape: {}", e)))
        });
        unsettled.armed = false;
        drop(unsettled);

        let mut core = self.core();
        core.in_flight.retain(|call| *call != id);

        if core.disposed {
            tracing::debug!(method = %self.inner.method, generation = attempt.generation, "Fetch settled after dispose");
            return Ok(core.state.data.clone());
        }

        match outcome {
            Ok(data) => {
                core.state.data = Some(data.clone());
                core.state.loading = false;
                core.state.loaded = true;

                let snapshot = core.state.clone();
                drop(core);

                self.inner.listeners.deliver(vec![
                    Notice::On(ResourceEvent::Data, snapshot.clone()),
                    Notice::On(ResourceEvent::Loaded, snapshot.clone()),
                    Notice::On(ResourceEvent::LoadingEnd, snapshot),
                    Notice::Data(data.clone()),
                    Notice::Loading(false),
                    Notice::Loaded(true),
                ]);
                Ok(Some(data))
            }
            Err(err) if err.is_abort() => {
                // A newer attempt owns the loading flag.
                if core.state.index == attempt.generation {
                    core.state.loading = false;
                }
                tracing::debug!(method = %self.inner.method, generation = attempt.generation, "Fetch aborted");
                Ok(core.state.data.clone())
            }
            Err(err) => {
                core.state.error = Some(err.clone());
                core.state.loading = false;
                core.state.loaded = false;

                let snapshot = core.state.clone();
                drop(core);

                self.inner.listeners.deliver(vec![
                    Notice::On(ResourceEvent::Error, snapshot.clone()),
                    Notice::On(ResourceEvent::LoadingEnd, snapshot),
                    Notice::Error(err.clone()),
                    Notice::Loading(false),
                ]);
                Err(err)
            }
        }
    }

    /// Fires after the debounce window: refetches if the stored arguments
    /// moved away from the last fetched ones.
    fn check_and_execute(&self, generation: u64) {
        let superseded = {
            let mut core = self.core();
            // A newer update_args or cancel_pending replaced this timer.
            if core.debounce_generation != generation {
                return;
            }
            core.debounce = None;
            if core.disposed || core.args == core.last_fetched {
                return;
            }
            core.last_fetched = core.args.clone();
            std::mem::take(&mut core.in_flight)
        };

        for id in superseded {
            self.inner.client.abort(id);
        }
        self.spawn_fetch(None);
    }

    /// Starts a fetch right away and finishes it on a background task.
    fn spawn_fetch(&self, override_args: Option<Vec<Value>>) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(method = %self.inner.method, "Cannot fetch resource outside of a Tokio runtime");
            return;
        };

        let attempt = match self.begin(override_args) {
            Ok(attempt) => attempt,
            Err(err) => {
                tracing::debug!(method = %self.inner.method, error = %err, "Fetch not started");
                return;
            }
        };

        let resource = self.clone();
        handle.spawn(async move {
            if let Err(err) = resource.finish(attempt).await {
                tracing::warn!(method = %resource.inner.method, error = %err, "Background fetch failed");
            }
        });
    }
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("method", &self.inner.method)
            .field("lazy", &self.inner.lazy)
            .finish()
    }
}
