use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tandem_common::RpcError;

use super::state::{ResourceEvent, ResourceState};

type EventFn<T> = Arc<dyn Fn(ResourceEvent, &ResourceState<T>) + Send + Sync>;
type DataFn<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&RpcError) + Send + Sync>;
type FlagFn = Arc<dyn Fn(bool) + Send + Sync>;

/// One notification waiting to be delivered.
///
/// Notifications are collected while the resource state is locked and
/// delivered after the lock is released, so callbacks may call back into
/// the resource.
pub(crate) enum Notice<T> {
    On(ResourceEvent, ResourceState<T>),
    Data(T),
    Error(RpcError),
    Loading(bool),
    Loaded(bool),
}

pub(crate) struct Listeners<T> {
    table: Arc<Mutex<Table<T>>>,
}

struct Table<T> {
    next_id: u64,
    on: Vec<(u64, EventFn<T>)>,
    data: Vec<(u64, DataFn<T>)>,
    error: Vec<(u64, ErrorFn)>,
    loading: Vec<(u64, FlagFn)>,
    loaded: Vec<(u64, FlagFn)>,
}

impl<T> Table<T> {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn clear(&mut self) {
        self.on.clear();
        self.data.clear();
        self.error.clear();
        self.loading.clear();
        self.loaded.clear();
    }
}

#[derive(Clone, Copy)]
enum Channel {
    On,
    Data,
    Error,
    Loading,
    Loaded,
}

fn lock<T>(table: &Mutex<Table<T>>) -> MutexGuard<'_, Table<T>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Send + Sync + 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_id: 0,
                on: Vec::new(),
                data: Vec::new(),
                error: Vec::new(),
                loading: Vec::new(),
                loaded: Vec::new(),
            })),
        }
    }

    pub(crate) fn on(&self, callback: EventFn<T>) -> Subscription {
        let mut table = lock(&self.table);
        let id = table.next_id();
        table.on.push((id, callback));
        self.subscription(Channel::On, id)
    }

    pub(crate) fn on_data(&self, callback: DataFn<T>) -> Subscription {
        let mut table = lock(&self.table);
        let id = table.next_id();
        table.data.push((id, callback));
        self.subscription(Channel::Data, id)
    }

    pub(crate) fn on_error(&self, callback: ErrorFn) -> Subscription {
        let mut table = lock(&self.table);
        let id = table.next_id();
        table.error.push((id, callback));
        self.subscription(Channel::Error, id)
    }

    pub(crate) fn on_loading(&self, callback: FlagFn) -> Subscription {
        let mut table = lock(&self.table);
        let id = table.next_id();
        table.loading.push((id, callback));
        self.subscription(Channel::Loading, id)
    }

    pub(crate) fn on_loaded(&self, callback: FlagFn) -> Subscription {
        let mut table = lock(&self.table);
        let id = table.next_id();
        table.loaded.push((id, callback));
        self.subscription(Channel::Loaded, id)
    }

    fn subscription(&self, channel: Channel, id: u64) -> Subscription {
        let table: Weak<Mutex<Table<T>>> = Arc::downgrade(&self.table);
        Subscription {
            remove: Some(Box::new(move || {
                let Some(table) = table.upgrade() else {
                    return;
                };
                let mut table = lock(&table);
                match channel {
                    Channel::On => table.on.retain(|(i, _)| *i != id),
                    Channel::Data => table.data.retain(|(i, _)| *i != id),
                    Channel::Error => table.error.retain(|(i, _)| *i != id),
                    Channel::Loading => table.loading.retain(|(i, _)| *i != id),
                    Channel::Loaded => table.loaded.retain(|(i, _)| *i != id),
                }
            })),
        }
    }

    pub(crate) fn clear(&self) {
        lock(&self.table).clear();
    }

    pub(crate) fn len(&self) -> usize {
        let table = lock(&self.table);
        table.on.len() + table.data.len() + table.error.len() + table.loading.len() + table.loaded.len()
    }

    /// Delivers `notices` in order to whoever is subscribed right now.
    pub(crate) fn deliver(&self, notices: Vec<Notice<T>>) {
        for notice in notices {
            match notice {
                Notice::On(event, state) => {
                    let callbacks: Vec<_> = lock(&self.table).on.iter().map(|(_, f)| f.clone()).collect();
                    for callback in callbacks {
                        callback(event, &state);
                    }
                }
                Notice::Data(data) => {
                    let callbacks: Vec<_> = lock(&self.table).data.iter().map(|(_, f)| f.clone()).collect();
                    for callback in callbacks {
                        callback(&data);
                    }
                }
                Notice::Error(error) => {
                    let callbacks: Vec<_> = lock(&self.table).error.iter().map(|(_, f)| f.clone()).collect();
                    for callback in callbacks {
                        callback(&error);
                    }
                }
                Notice::Loading(loading) => {
                    let callbacks: Vec<_> = lock(&self.table).loading.iter().map(|(_, f)| f.clone()).collect();
                    for callback in callbacks {
                        callback(loading);
                    }
                }
                Notice::Loaded(loaded) => {
                    let callbacks: Vec<_> = lock(&self.table).loaded.iter().map(|(_, f)| f.clone()).collect();
                    for callback in callbacks {
                        callback(loaded);
                    }
                }
            }
        }
    }
}

/// Handle returned by every subscribe call.
///
/// Dropping the handle keeps the callback registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Removes the callback. Calling this again does nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    pub fn is_active(&self) -> bool {
        self.remove.is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
