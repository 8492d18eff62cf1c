use crate::messages::{CodecError, EventData, ObsEvent};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, CodecError>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneNamePayload {
	scene_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneCreatedPayload {
	scene_name: String,
	#[serde(default)]
	is_group: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneRenamedPayload {
	old_scene_name: String,
	scene_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneListEntry {
	scene_name: String,
}

#[derive(Deserialize)]
struct SceneListPayload {
	#[serde(default)]
	scenes: Vec<SceneListEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputCreatedPayload {
	input_name: String,
	#[serde(default)]
	input_kind: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputNamePayload {
	input_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputRenamedPayload {
	old_input_name: String,
	input_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputMutePayload {
	input_name: String,
	input_muted: bool,
}

/// Handles parsing of OBS events (op: 5)
pub(crate) struct EventMessageParser;

impl EventMessageParser {
	pub fn parse(event: &EventData) -> Result<ObsEvent> {
		let event_type = event.event_type.as_str();
		let data = event.event_data.clone().unwrap_or(Value::Null);

		trace!("Parsing event type: {}", event_type);

		let parsed = match event_type {
			"CurrentProgramSceneChanged" | "CurrentSceneChanged" => {
				let d: SceneNamePayload = Self::fields(event_type, data)?;
				ObsEvent::SceneChanged { scene_name: d.scene_name }
			}
			"SceneListChanged" => {
				let d: SceneListPayload = Self::fields(event_type, Self::or_empty_object(data))?;
				ObsEvent::SceneListChanged {
					scenes: d.scenes.into_iter().map(|s| s.scene_name).collect(),
				}
			}
			"SceneCreated" => {
				let d: SceneCreatedPayload = Self::fields(event_type, data)?;
				ObsEvent::SceneCreated {
					scene_name: d.scene_name,
					is_group: d.is_group,
				}
			}
			"SceneRemoved" => {
				let d: SceneNamePayload = Self::fields(event_type, data)?;
				ObsEvent::SceneRemoved { scene_name: d.scene_name }
			}
			"SceneNameChanged" => {
				let d: SceneRenamedPayload = Self::fields(event_type, data)?;
				ObsEvent::SceneRenamed {
					old_name: d.old_scene_name,
					new_name: d.scene_name,
				}
			}
			"InputCreated" => {
				let d: InputCreatedPayload = Self::fields(event_type, data)?;
				ObsEvent::InputCreated {
					input_name: d.input_name,
					input_kind: d.input_kind,
				}
			}
			"InputRemoved" => {
				let d: InputNamePayload = Self::fields(event_type, data)?;
				ObsEvent::InputRemoved { input_name: d.input_name }
			}
			"InputNameChanged" => {
				let d: InputRenamedPayload = Self::fields(event_type, data)?;
				ObsEvent::InputRenamed {
					old_name: d.old_input_name,
					new_name: d.input_name,
				}
			}
			"InputMuteStateChanged" => {
				let d: InputMutePayload = Self::fields(event_type, data)?;
				ObsEvent::InputMuteChanged {
					input_name: d.input_name,
					muted: d.input_muted,
				}
			}
			_ => {
				debug!("Unhandled event type: {}, passing through as Unknown", event_type);
				ObsEvent::Unknown {
					event_type: event_type.to_string(),
					data,
				}
			}
		};

		Ok(parsed)
	}

	fn fields<T: DeserializeOwned>(event_type: &str, data: Value) -> Result<T> {
		serde_json::from_value(data).map_err(|e| CodecError::malformed(format!("{event_type} event data: {e}")))
	}

	fn or_empty_object(data: Value) -> Value {
		if data.is_null() {
			Value::Object(serde_json::Map::new())
		} else {
			data
		}
	}
}
