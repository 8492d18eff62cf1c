use crate::{Command, Result, SwitcherService};
use obs_link::{AudioRole, Input, Scene, VersionInfo};
use serde::Serialize;
use std::fmt;
use tracing::instrument;

/// Result of a one-shot command, printable as text or JSON.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Report {
	Scenes(Vec<Scene>),
	Scene { scene: String },
	Inputs(Vec<Input>),
	Mute { input: String, muted: bool },
	Version(VersionInfo),
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Scenes(scenes) => {
				for scene in scenes {
					let marker = if scene.is_current { "*" } else { " " };
					writeln!(f, "{marker} {}", scene.name)?;
				}
				Ok(())
			}
			Self::Scene { scene } => writeln!(f, "{scene}"),
			Self::Inputs(inputs) => {
				for input in inputs {
					writeln!(f, "{} ({})", input.name, input.kind.as_deref().unwrap_or("unknown"))?;
				}
				Ok(())
			}
			Self::Mute { input, muted } => writeln!(f, "{input}: {}", if *muted { "muted" } else { "unmuted" }),
			Self::Version(version) => writeln!(
				f,
				"OBS {} / obs-websocket {} (rpc {})",
				version.obs_version, version.obs_web_socket_version, version.rpc_version
			),
		}
	}
}

impl Report {
	pub fn render(&self, json: bool) -> Result<String> {
		if json {
			return Ok(serde_json::to_string_pretty(self)?);
		}
		Ok(self.to_string().trim_end().to_string())
	}
}

impl SwitcherService {
	/// Run a one-shot command and print its result.
	#[instrument(skip(self))]
	pub(crate) async fn execute(&self, command: Command) -> Result<()> {
		if let Some(report) = self.report(command).await? {
			println!("{}", report.render(self.json_output())?);
		}
		Ok(())
	}

	async fn report(&self, command: Command) -> Result<Option<Report>> {
		let client = self.client();
		let report = match command {
			Command::Scenes => Report::Scenes(client.get_scene_list().await?),
			Command::Current => Report::Scene {
				scene: client.get_current_scene().await?,
			},
			Command::Switch { scene } => {
				client.set_current_scene(&scene).await?;
				tracing::info!("🎬 Switched to '{}'", scene);
				Report::Scene { scene }
			}
			Command::Inputs => Report::Inputs(client.get_input_list().await?),
			Command::MuteToggle { input } => {
				let muted = client.toggle_input_mute(&input).await?;
				Report::Mute { input, muted }
			}
			Command::ToggleMic => self.toggle_role(AudioRole::Microphone).await?,
			Command::ToggleDesktop => self.toggle_role(AudioRole::Desktop).await?,
			Command::ToggleAudio { role } => self.toggle_role(role.into()).await?,
			Command::Version => Report::Version(client.get_version().await?),
			Command::Watch => return Ok(None),
		};
		Ok(Some(report))
	}

	async fn toggle_role(&self, role: AudioRole) -> Result<Report> {
		let input = self.client().find_audio_input(role).await?;
		let muted = self.client().toggle_input_mute(&input.name).await?;
		tracing::info!("🎚️ {} '{}' is now {}", role, input.name, if muted { "muted" } else { "live" });
		Ok(Report::Mute { input: input.name, muted })
	}
}
