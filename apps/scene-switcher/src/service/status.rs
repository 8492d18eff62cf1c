use crate::SwitcherService;
use obs_link::{ConnectionStatus, LinkState};
use std::sync::Arc;

impl SwitcherService {
	/// Spawn task logging connection state changes
	pub fn spawn_status_reporter(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut updates = self.client().status_updates();
			let mut last = updates.borrow_and_update().state;
			if ends_watch(last) {
				self.cancel_token.cancel();
			}

			loop {
				tokio::select! {
					() = self.cancel_token.cancelled() => break,
					changed = updates.changed() => {
						if changed.is_err() {
							break;
						}
						let status = updates.borrow_and_update().clone();
						if status.state != last {
							log_status(&status);
							last = status.state;
						}
						if ends_watch(status.state) {
							tracing::error!("❌ Lost OBS for good, shutting down");
							self.cancel_token.cancel();
						}
					}
				}
			}

			tracing::debug!("Status reporter stopped");
		})
	}
}

/// No further reconnect will happen from these states. Watch mode only
/// disconnects after cancelling, so `Disconnected` here means the link
/// dropped with reconnection disabled.
const fn ends_watch(state: LinkState) -> bool {
	matches!(state, LinkState::ReconnectExhausted | LinkState::Disconnected)
}

fn log_status(status: &ConnectionStatus) {
	match status.state {
		LinkState::Connected => tracing::info!("✅ Connected (rpc v{})", status.negotiated_rpc_version.unwrap_or_default()),
		LinkState::Reconnecting => tracing::warn!(
			"🔄 Reconnecting, attempt {}/{}: {}",
			status.reconnect_attempts,
			status.max_reconnect_attempts,
			status.last_error.as_deref().unwrap_or("connection lost")
		),
		LinkState::Disconnected => tracing::info!("🔌 Disconnected"),
		LinkState::ReconnectExhausted => tracing::error!("💀 Reconnect attempts exhausted after {}", status.reconnect_attempts),
		LinkState::Idle | LinkState::Connecting => tracing::debug!("State: {:?}", status.state),
	}
}
