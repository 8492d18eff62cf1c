use crate::messages::ObsEvent;
use async_broadcast::{InactiveReceiver, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::{trace, warn};

const BROADCAST_CAPACITY: usize = 64;

type Callback = Arc<dyn Fn(&ObsEvent) + Send + Sync>;

struct Registry {
	next_id: AtomicU64,
	subscribers: RwLock<Vec<(u64, Callback)>>,
}

impl Registry {
	fn remove(&self, id: u64) {
		let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
		subscribers.retain(|(existing, _)| *existing != id);
	}
}

/// Fan-out of notifications to callbacks and async receivers.
///
/// Owned by the client for its whole life so that reconnects never add or
/// lose subscribers.
pub struct EventDispatcher {
	registry: Arc<Registry>,
	sender: Sender<ObsEvent>,
	_keepalive: InactiveReceiver<ObsEvent>,
}

impl EventDispatcher {
	pub fn new() -> Self {
		let (mut sender, receiver) = async_broadcast::broadcast(BROADCAST_CAPACITY);
		sender.set_overflow(true);
		sender.set_await_active(false);

		Self {
			registry: Arc::new(Registry {
				next_id: AtomicU64::new(0),
				subscribers: RwLock::new(Vec::new()),
			}),
			sender,
			_keepalive: receiver.deactivate(),
		}
	}

	pub fn subscribe<F>(&self, callback: F) -> Subscription
	where
		F: Fn(&ObsEvent) + Send + Sync + 'static,
	{
		let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
		self.registry.subscribers.write().unwrap_or_else(|e| e.into_inner()).push((id, Arc::new(callback)));

		Subscription {
			registry: Arc::downgrade(&self.registry),
			id,
		}
	}

	/// A receiver that sees every notification dispatched after this call.
	/// Slow receivers lose the oldest items instead of blocking dispatch.
	pub fn receiver(&self) -> Receiver<ObsEvent> {
		self.sender.new_receiver()
	}

	#[cfg(test)]
	pub fn subscriber_count(&self) -> usize {
		self.registry.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
	}

	/// Deliver to every subscriber in registration order, on the calling task.
	pub fn dispatch(&self, event: &ObsEvent) {
		trace!("Dispatching {}", event.name());

		// Snapshot so callbacks may subscribe or unsubscribe without deadlocking.
		let snapshot: Vec<(u64, Callback)> = self.registry.subscribers.read().unwrap_or_else(|e| e.into_inner()).clone();

		for (id, callback) in snapshot {
			if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
				warn!("Subscriber {} panicked while handling {}", id, event.name());
			}
		}

		if let Err(e) = self.sender.try_broadcast(event.clone()) {
			trace!("No async listeners for {}: {}", event.name(), e);
		}
	}
}

impl Default for EventDispatcher {
	fn default() -> Self {
		Self::new()
	}
}

/// Keeps a callback registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
	registry: Weak<Registry>,
	id: u64,
}

impl Subscription {
	pub fn unsubscribe(self) {
		drop(self);
	}

	/// Keep the callback registered for the dispatcher's whole life.
	pub fn detach(mut self) {
		self.registry = Weak::new();
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.remove(self.id);
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription").field("id", &self.id).finish()
	}
}
