use crate::{Cli, Command, Error, Result};
use obs_link::ObsClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub mod command;
pub mod events;
pub mod status;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to OBS and runs one CLI command against it.
pub struct SwitcherService {
	cli: Cli,
	client: ObsClient,
	cancel_token: CancellationToken,
}

impl SwitcherService {
	pub fn new(cli: Cli) -> Self {
		let client = ObsClient::new(cli.reconnect_config());
		Self {
			cli,
			client,
			cancel_token: CancellationToken::new(),
		}
	}

	pub const fn client(&self) -> &ObsClient {
		&self.client
	}

	const fn json_output(&self) -> bool {
		self.cli.json
	}

	pub async fn run(self) -> Result<()> {
		let config = self.cli.obs_config();
		tracing::info!("🔌 Connecting to OBS at {}", config.url());
		self.client.connect(config).await?;

		let result = match self.cli.command.clone() {
			Command::Watch => Arc::new(self).watch().await,
			command => {
				let result = self.execute(command).await;
				self.client.disconnect().await;
				result
			}
		};

		tracing::debug!("Service finished");
		result
	}

	/// Print notifications until Ctrl-C.
	async fn watch(self: Arc<Self>) -> Result<()> {
		let shutdown_token = self.cancel_token.clone();
		let signal = tokio::spawn(async move {
			let outcome = tokio::signal::ctrl_c().await;
			if outcome.is_ok() {
				tracing::info!("🛑 Shutdown signal received");
			}
			shutdown_token.cancel();
			outcome
		});

		let event_printer = self.clone().spawn_event_printer();
		let status_reporter = self.clone().spawn_status_reporter();

		self.cancel_token.cancelled().await;
		tracing::info!("🔄 Shutting down...");

		let _ = timeout(SHUTDOWN_TIMEOUT, async {
			let _ = tokio::join!(event_printer, status_reporter);
		})
		.await;

		self.client.disconnect().await;

		match signal.await {
			Ok(Err(e)) => Err(Error::Signal(e)),
			_ => Ok(()),
		}
	}
}
