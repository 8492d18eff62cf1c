use crate::config::{ObsConfig, ReconnectConfig};
use crate::core::{ConnectError, Connection, ConnectionStatus, EventDispatcher, LinkState, ReconnectPolicy, RequestError, Subscription};
use crate::messages::ObsEvent;
use crate::requests::SceneView;
use crate::ObsClientError;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::{
	sync::{watch, Mutex},
	task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

struct Active {
	connection: Arc<Connection>,
	monitor: JoinHandle<()>,
}

struct State {
	active: Option<Active>,
	/// Parameters of the last successful connect; `None` disables reconnection.
	params: Option<ObsConfig>,
	policy: ReconnectPolicy,
	epoch: u64,
	attempt: Option<CancellationToken>,
	retry_timer: Option<CancellationToken>,
}

struct Inner {
	state: Mutex<State>,
	status: watch::Sender<ConnectionStatus>,
	dispatcher: Arc<EventDispatcher>,
	scenes: Arc<SceneView>,
}

impl Drop for Inner {
	fn drop(&mut self) {
		let state = self.state.get_mut();
		if let Some(timer) = state.retry_timer.take() {
			timer.cancel();
		}
		if let Some(attempt) = state.attempt.take() {
			attempt.cancel();
		}
		// The monitor holds the last strong reference to the connection.
		if let Some(active) = state.active.take() {
			active.monitor.abort();
		}
	}
}

/// Long-lived handle to one OBS instance.
///
/// Owns the subscriber list, the reconnect policy and at most one live
/// [`Connection`]. Cheap to clone.
#[derive(Clone)]
pub struct ObsClient {
	inner: Arc<Inner>,
}

impl ObsClient {
	pub fn new(reconnect: ReconnectConfig) -> Self {
		let dispatcher = Arc::new(EventDispatcher::new());
		let scenes = Arc::new(SceneView::default());
		SceneView::track(&scenes, &dispatcher);

		let (status, _) = watch::channel(ConnectionStatus::idle(reconnect.max_attempts));

		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(State {
					active: None,
					params: None,
					policy: ReconnectPolicy::new(reconnect),
					epoch: 0,
					attempt: None,
					retry_timer: None,
				}),
				status,
				dispatcher,
				scenes,
			}),
		}
	}

	/// Connect, replacing any existing or pending connection.
	#[instrument(skip_all, fields(url = %config.url()))]
	pub async fn connect(&self, config: ObsConfig) -> Result<(), ObsClientError> {
		config.validate()?;

		let (epoch, cancel, previous) = {
			let mut state = self.inner.state.lock().await;
			if let Some(timer) = state.retry_timer.take() {
				timer.cancel();
			}
			if let Some(attempt) = state.attempt.take() {
				attempt.cancel();
			}

			state.epoch += 1;
			state.params = Some(config.clone());
			state.policy.reset();

			let cancel = CancellationToken::new();
			state.attempt = Some(cancel.clone());
			self.update_status(|status| {
				status.state = LinkState::Connecting;
				status.reconnect_attempts = 0;
				status.negotiated_rpc_version = None;
				status.connected_at = None;
				status.last_error = None;
			});
			(state.epoch, cancel, state.active.take())
		};

		if let Some(previous) = previous {
			debug!("Tearing down connection {} before reconnecting", previous.connection.id());
			self.shut_down(previous).await;
		}

		match self.establish(epoch, &config, cancel).await {
			Ok(()) => Ok(()),
			Err(e) => {
				let mut state = self.inner.state.lock().await;
				if state.epoch == epoch {
					state.params = None;
					state.attempt = None;
					drop(state);
					self.update_status(|status| {
						status.state = LinkState::Disconnected;
						status.last_error = Some(e.to_string());
					});
				}
				Err(e.into())
			}
		}
	}

	/// Close the connection and stop any reconnection. Idempotent.
	#[instrument(skip_all)]
	pub async fn disconnect(&self) {
		let active = {
			let mut state = self.inner.state.lock().await;
			state.params = None;
			state.epoch += 1;
			state.policy.reset();
			if let Some(timer) = state.retry_timer.take() {
				timer.cancel();
			}
			if let Some(attempt) = state.attempt.take() {
				attempt.cancel();
			}
			state.active.take()
		};

		if let Some(active) = active {
			info!("Disconnecting from OBS");
			self.shut_down(active).await;
		}

		self.update_status(|status| {
			status.state = LinkState::Disconnected;
			status.reconnect_attempts = 0;
			status.negotiated_rpc_version = None;
			status.connected_at = None;
		});
	}

	pub fn is_connected(&self) -> bool {
		self.inner.status.borrow().connected()
	}

	pub fn status(&self) -> ConnectionStatus {
		self.inner.status.borrow().clone()
	}

	pub fn status_updates(&self) -> watch::Receiver<ConnectionStatus> {
		self.inner.status.subscribe()
	}

	/// Register a callback for every notification.
	pub fn subscribe<F>(&self, callback: F) -> Subscription
	where
		F: Fn(&ObsEvent) + Send + Sync + 'static,
	{
		self.inner.dispatcher.subscribe(callback)
	}

	/// Async stream of notifications; slow readers drop the oldest items.
	pub fn events(&self) -> async_broadcast::Receiver<ObsEvent> {
		self.inner.dispatcher.receiver()
	}

	pub fn scenes(&self) -> Arc<SceneView> {
		self.inner.scenes.clone()
	}

	/// Raw request pass-through on the active connection.
	pub async fn call(&self, request_type: &str, request_data: Option<Value>) -> Result<Value, ObsClientError> {
		let connection = self.active_connection().await.ok_or(RequestError::NotConnected)?;
		Ok(connection.call(request_type, request_data).await?)
	}

	pub(crate) async fn active_connection(&self) -> Option<Arc<Connection>> {
		let state = self.inner.state.lock().await;
		state.active.as_ref().map(|active| active.connection.clone())
	}

	pub(crate) fn dispatcher(&self) -> &EventDispatcher {
		&self.inner.dispatcher
	}

	async fn establish(&self, epoch: u64, config: &ObsConfig, cancel: CancellationToken) -> Result<(), ConnectError> {
		let connection = Connection::establish(config, self.inner.dispatcher.clone(), self.inner.scenes.clone(), cancel).await?;

		let mut state = self.inner.state.lock().await;
		if state.epoch != epoch {
			drop(state);
			debug!("Connection {} superseded before it was installed", connection.id());
			connection.close().await;
			return Err(ConnectError::Superseded);
		}

		state.policy.reset();
		state.attempt = None;
		let monitor = tokio::spawn(monitor(Arc::downgrade(&self.inner), epoch, connection.clone()));
		state.active = Some(Active {
			connection: connection.clone(),
			monitor,
		});

		// Still under the lock so a fast close cannot be reported first, and
		// before routing starts so no server event precedes it.
		self.update_status(|status| {
			status.state = LinkState::Connected;
			status.reconnect_attempts = 0;
			status.negotiated_rpc_version = Some(connection.negotiated_rpc_version());
			status.connected_at = Some(connection.connected_at());
			status.last_error = None;
		});
		self.inner.dispatcher.dispatch(&ObsEvent::ConnectionChanged { connected: true });
		connection.start();
		Ok(())
	}

	/// Close a connection this client has already detached from its state.
	async fn shut_down(&self, active: Active) {
		active.connection.close().await;
		if let Err(e) = active.monitor.await {
			warn!("Connection monitor failed: {}", e);
		}
		self.inner.dispatcher.dispatch(&ObsEvent::ConnectionChanged { connected: false });
	}

	fn update_status(&self, change: impl FnOnce(&mut ConnectionStatus)) {
		self.inner.status.send_modify(change);
	}

	fn from_inner(inner: Arc<Inner>) -> Self {
		Self { inner }
	}

	/// Called by the monitor once the active connection has gone away.
	async fn on_connection_lost(&self, epoch: u64, remote: bool, reason: String) {
		let mut state = self.inner.state.lock().await;
		if state.epoch != epoch {
			debug!("Ignoring close of superseded connection");
			return;
		}

		state.active = None;
		self.inner.dispatcher.dispatch(&ObsEvent::ConnectionChanged { connected: false });

		if !remote || state.params.is_none() || !state.policy.enabled() {
			if remote {
				warn!("Lost connection to OBS: {}", reason);
			}
			state.params = None;
			self.update_status(|status| {
				status.state = LinkState::Disconnected;
				status.negotiated_rpc_version = None;
				status.connected_at = None;
				if remote {
					status.last_error = Some(reason);
				}
			});
			return;
		}

		warn!("Lost connection to OBS: {}", reason);
		self.schedule_retry(&mut state, Some(reason));
	}

	/// Arm the retry timer, or give up once the budget is spent.
	fn schedule_retry(&self, state: &mut State, last_error: Option<String>) {
		let Some(delay) = state.policy.next_delay() else {
			let attempts = state.policy.attempts();
			state.params = None;
			error!("❌ Giving up on OBS after {} reconnect attempts", attempts);
			self.update_status(|status| {
				status.state = LinkState::ReconnectExhausted;
				status.negotiated_rpc_version = None;
				status.connected_at = None;
				if last_error.is_some() {
					status.last_error = last_error;
				}
			});
			self.inner.dispatcher.dispatch(&ObsEvent::ReconnectExhausted { attempts });
			return;
		};

		let attempt = state.policy.attempts();
		let max_attempts = state.policy.max_attempts();
		let timer = CancellationToken::new();
		state.retry_timer = Some(timer.clone());

		info!("🔄 Reconnecting in {:?} (attempt {}/{})", delay, attempt, max_attempts);
		self.update_status(|status| {
			status.state = LinkState::Reconnecting;
			status.reconnect_attempts = attempt;
			status.negotiated_rpc_version = None;
			status.connected_at = None;
			if last_error.is_some() {
				status.last_error = last_error;
			}
		});
		self.inner.dispatcher.dispatch(&ObsEvent::Reconnecting { attempt, max_attempts });

		tokio::spawn(retry_after(Arc::downgrade(&self.inner), state.epoch, delay, timer));
	}

	async fn retry(&self, epoch: u64) {
		let (config, cancel) = {
			let mut state = self.inner.state.lock().await;
			if state.epoch != epoch {
				return;
			}
			state.retry_timer = None;
			let Some(config) = state.params.clone() else {
				return;
			};

			let cancel = CancellationToken::new();
			state.attempt = Some(cancel.clone());
			(config, cancel)
		};

		match self.establish(epoch, &config, cancel).await {
			Ok(()) => info!("✅ Reconnected to OBS"),
			Err(ConnectError::Superseded) => debug!("Reconnect attempt superseded"),
			Err(e) => {
				warn!("Reconnect attempt failed: {}", e);
				let mut state = self.inner.state.lock().await;
				if state.epoch == epoch && state.params.is_some() {
					state.attempt = None;
					self.schedule_retry(&mut state, Some(e.to_string()));
				}
			}
		}
	}
}

async fn monitor(inner: Weak<Inner>, epoch: u64, connection: Arc<Connection>) {
	let info = connection.closed().await;
	drop(connection);

	let Some(inner) = inner.upgrade() else {
		return;
	};
	ObsClient::from_inner(inner).on_connection_lost(epoch, !info.is_local(), info.to_string()).await;
}

async fn retry_after(inner: Weak<Inner>, epoch: u64, delay: Duration, timer: CancellationToken) {
	tokio::select! {
		() = timer.cancelled() => {
			debug!("Reconnect timer cancelled");
		}
		() = tokio::time::sleep(delay) => {
			if let Some(inner) = inner.upgrade() {
				ObsClient::from_inner(inner).retry(epoch).await;
			}
		}
	}
}

impl Default for ObsClient {
	fn default() -> Self {
		Self::new(ReconnectConfig::default())
	}
}
