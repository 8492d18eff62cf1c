use clap::{Parser, Subcommand, ValueEnum};
use obs_link::{AudioRole, ObsConfig, ReconnectConfig};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "scene-switcher")]
#[command(about = "Switch OBS scenes and toggle audio from the command line", long_about = None)]
pub struct Cli {
	/// OBS WebSocket host
	#[arg(long, env = "OBS_HOST", default_value = "localhost")]
	pub host: String,

	/// OBS WebSocket port
	#[arg(long, env = "OBS_PORT", default_value_t = 4455)]
	pub port: u16,

	/// OBS WebSocket password, if authentication is enabled
	#[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
	pub password: Option<String>,

	#[arg(long, env = "OBS_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
	pub connect_timeout_ms: u64,

	#[arg(long, env = "OBS_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
	pub request_timeout_ms: u64,

	/// Reconnect attempts after the connection drops (0 disables)
	#[arg(long, env = "OBS_RECONNECT_ATTEMPTS", default_value_t = 5)]
	pub reconnect_attempts: u32,

	#[arg(long, env = "OBS_RECONNECT_DELAY_MS", default_value_t = 3000)]
	pub reconnect_delay_ms: u64,

	/// Print results as JSON
	#[arg(long, global = true)]
	pub json: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
	/// List scenes, marking the current one
	Scenes,
	/// Print the current program scene
	Current,
	/// Switch the program scene
	Switch { scene: String },
	/// List inputs
	Inputs,
	/// Toggle mute on an input by name
	MuteToggle { input: String },
	/// Toggle the first input that looks like a microphone
	ToggleMic,
	/// Toggle the first input that looks like desktop audio
	ToggleDesktop,
	/// Toggle mute by role
	ToggleAudio {
		#[arg(value_enum)]
		role: Role,
	},
	/// Print OBS and obs-websocket versions
	Version,
	/// Stay connected and print notifications until Ctrl-C
	Watch,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Role {
	Desktop,
	Mic,
}

impl From<Role> for AudioRole {
	fn from(role: Role) -> Self {
		match role {
			Role::Desktop => Self::Desktop,
			Role::Mic => Self::Microphone,
		}
	}
}

impl Cli {
	pub fn obs_config(&self) -> ObsConfig {
		let config = ObsConfig::new(self.host.clone(), self.port)
			.with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
			.with_request_timeout(Duration::from_millis(self.request_timeout_ms));
		match &self.password {
			Some(password) => config.with_password(password.clone()),
			None => config,
		}
	}

	pub fn reconnect_config(&self) -> ReconnectConfig {
		if self.reconnect_attempts == 0 {
			return ReconnectConfig::disabled();
		}
		ReconnectConfig {
			enabled: true,
			max_attempts: self.reconnect_attempts,
			delay: Duration::from_millis(self.reconnect_delay_ms),
		}
	}
}
