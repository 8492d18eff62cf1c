use clap::Parser;
use scene_switcher::{Cli, SwitcherService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	dotenv::dotenv().ok();
	let cli = Cli::parse();

	// Logs go to stderr so command output stays pipeable
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "scene_switcher=info,obs_link=info".into()))
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	tracing::debug!("🚀 Starting scene switcher");

	SwitcherService::new(cli).run().await?;

	tracing::debug!("👋 Scene switcher finished");
	Ok(())
}
