use crate::SwitcherService;
use async_broadcast::RecvError;
use obs_link::ObsEvent;
use std::sync::Arc;

impl SwitcherService {
	/// Spawn task printing OBS notifications until shutdown
	pub fn spawn_event_printer(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			tracing::info!("👀 Watching OBS events");
			let mut events = self.client().events();

			loop {
				tokio::select! {
					() = self.cancel_token.cancelled() => {
						tracing::info!("🛑 Event printer shutting down");
						break;
					}
					result = events.recv() => match result {
						Ok(event) => self.print_event(&event),
						Err(RecvError::Overflowed(skipped)) => {
							tracing::warn!("⚠️ Event printer lagged, skipped {} events", skipped);
						}
						Err(RecvError::Closed) => break,
					}
				}
			}

			tracing::info!("✅ Event printer stopped");
		})
	}

	fn print_event(&self, event: &ObsEvent) {
		if self.json_output() {
			match serde_json::to_string(event) {
				Ok(line) => println!("{line}"),
				Err(e) => tracing::warn!("Failed to serialize {}: {}", event.name(), e),
			}
			return;
		}
		if let Some(line) = describe(event) {
			println!("{line}");
		}
	}
}

/// One-line text for an event, `None` for events not worth printing.
pub fn describe(event: &ObsEvent) -> Option<String> {
	let line = match event {
		ObsEvent::ConnectionChanged { connected: true } => "connected".to_string(),
		ObsEvent::ConnectionChanged { connected: false } => "disconnected".to_string(),
		ObsEvent::Reconnecting { attempt, max_attempts } => format!("reconnecting ({attempt}/{max_attempts})"),
		ObsEvent::ReconnectExhausted { attempts } => format!("gave up reconnecting after {attempts} attempts"),
		ObsEvent::SceneChanged { scene_name } => format!("scene: {scene_name}"),
		ObsEvent::SceneListChanged { scenes } if scenes.is_empty() => "scene list changed".to_string(),
		ObsEvent::SceneListChanged { scenes } => format!("scenes: {}", scenes.join(", ")),
		ObsEvent::SceneCreated { scene_name, .. } => format!("scene created: {scene_name}"),
		ObsEvent::SceneRemoved { scene_name } => format!("scene removed: {scene_name}"),
		ObsEvent::SceneRenamed { old_name, new_name } => format!("scene renamed: {old_name} -> {new_name}"),
		ObsEvent::InputCreated { input_name, .. } => format!("input created: {input_name}"),
		ObsEvent::InputRemoved { input_name } => format!("input removed: {input_name}"),
		ObsEvent::InputRenamed { old_name, new_name } => format!("input renamed: {old_name} -> {new_name}"),
		ObsEvent::InputMuteChanged { input_name, muted } => format!("{input_name}: {}", if *muted { "muted" } else { "unmuted" }),
		ObsEvent::Unknown { .. } => return None,
	};
	Some(line)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_describe_scene_events() {
		let event = ObsEvent::SceneRenamed {
			old_name: "A".to_string(),
			new_name: "B".to_string(),
		};
		assert_eq!(describe(&event).as_deref(), Some("scene renamed: A -> B"));
		let refetch = ObsEvent::SceneListChanged { scenes: Vec::new() };
		assert_eq!(describe(&refetch).as_deref(), Some("scene list changed"));
	}

	#[test]
	fn test_unknown_events_are_skipped() {
		let event = ObsEvent::Unknown {
			event_type: "StudioModeStateChanged".to_string(),
			data: serde_json::Value::Null,
		};
		assert!(describe(&event).is_none());
	}
}
