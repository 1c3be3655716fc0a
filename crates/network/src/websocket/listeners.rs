// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Listener registry for dispatching inbound envelopes by event type.
//!
//! Listeners are kept per event type in registration order, which is also the
//! dispatch order. Dispatch works on a snapshot of the list so that handlers may
//! subscribe or unsubscribe while being invoked.

use std::{
    fmt::Debug,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use serde_json::Value;

use super::types::EventHandler;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct ListenerId(u64);

/// Handle for a single listener registration.
///
/// Passing it to [`ListenerRegistry::unsubscribe`] removes exactly this registration,
/// even if the same handler was registered more than once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    event_type: String,
    id: ListenerId,
}

impl Subscription {
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

struct Listener {
    id: ListenerId,
    handler: EventHandler,
}

/// Mapping from event type to ordered listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<String, Vec<Listener>>,
    next_id: AtomicU64,
}

impl Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(ListenerRegistry))
            .field("event_types", &self.listeners.len())
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Creates a new empty [`ListenerRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event_type` after any existing listeners.
    pub fn subscribe(&self, event_type: &str, handler: EventHandler) -> Subscription {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .push(Listener { id, handler });

        Subscription {
            event_type: event_type.to_string(),
            id,
        }
    }

    /// Removes the registration behind `subscription`.
    ///
    /// Returns false if it was already removed (or the registry was cleared).
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.remove_first(&subscription.event_type, |listener| {
            listener.id == subscription.id
        })
    }

    /// Removes the first registration of `handler` for `event_type`.
    ///
    /// Handlers are compared by pointer identity of the shared `Arc`.
    pub fn remove_handler(&self, event_type: &str, handler: &EventHandler) -> bool {
        self.remove_first(event_type, |listener| {
            Arc::ptr_eq(&listener.handler, handler)
        })
    }

    fn remove_first(&self, event_type: &str, predicate: impl Fn(&Listener) -> bool) -> bool {
        let removed = match self.listeners.get_mut(event_type) {
            Some(mut listeners) => match listeners.iter().position(predicate) {
                Some(index) => {
                    listeners.remove(index);
                    true
                }
                None => false,
            },
            None => false,
        };

        if removed {
            self.listeners
                .remove_if(event_type, |_, listeners| listeners.is_empty());
        }
        removed
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.listeners.clear();
    }

    /// Returns the number of listeners registered for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners.get(event_type).map_or(0, |l| l.len())
    }

    /// Returns the total number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every listener for `event_type` in registration order.
    ///
    /// A panicking listener is logged and skipped. Returns the number of listeners
    /// that ran to completion.
    pub fn dispatch(&self, event_type: &str, payload: &Value) -> usize {
        let snapshot: Vec<EventHandler> = match self.listeners.get(event_type) {
            Some(listeners) => listeners.iter().map(|l| l.handler.clone()).collect(),
            None => return 0,
        };

        let mut completed = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "<non-string panic>".to_string());
                    tracing::error!("Listener for '{event_type}' panicked: {message}");
                }
            }
        }
        completed
    }
}
