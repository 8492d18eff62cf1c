use super::decode_response;
use crate::{ObsClient, ObsClientError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
	#[serde(rename = "inputName")]
	pub name: String,
	#[serde(rename = "inputKind", default)]
	pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioRole {
	Desktop,
	Microphone,
}

impl AudioRole {
	const fn name_hints(self) -> &'static [&'static str] {
		match self {
			Self::Desktop => &["desktop audio", "audio output capture", "speakers"],
			Self::Microphone => &["mic", "microphone", "audio input capture"],
		}
	}

	const fn kinds(self) -> &'static [&'static str] {
		match self {
			Self::Desktop => &["wasapi_output_capture", "pulse_output_capture", "coreaudio_output_capture"],
			Self::Microphone => &["wasapi_input_capture", "pulse_input_capture", "coreaudio_input_capture", "alsa_input_capture"],
		}
	}

	/// Whether `input` looks like a source for this role, by name or kind.
	pub fn matches(self, input: &Input) -> bool {
		let name = input.name.to_lowercase();
		if self.name_hints().iter().any(|hint| name.contains(hint)) {
			return true;
		}
		input.kind.as_deref().is_some_and(|kind| self.kinds().contains(&kind))
	}

	/// First matching input in server order.
	pub fn find(self, inputs: &[Input]) -> Option<&Input> {
		inputs.iter().find(|input| self.matches(input))
	}
}

impl fmt::Display for AudioRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Desktop => write!(f, "desktop audio"),
			Self::Microphone => write!(f, "microphone"),
		}
	}
}

#[derive(Deserialize)]
struct InputListResponse {
	#[serde(default)]
	inputs: Vec<Input>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputMuteResponse {
	input_muted: bool,
}

impl ObsClient {
	pub async fn get_input_list(&self) -> Result<Vec<Input>, ObsClientError> {
		let value = self.call("GetInputList", None).await?;
		let response: InputListResponse = decode_response("GetInputList", value)?;
		Ok(response.inputs)
	}

	pub async fn get_input_mute(&self, input_name: &str) -> Result<bool, ObsClientError> {
		let input_name = non_empty(input_name)?;
		let response: InputMuteResponse = self.request("GetInputMute", Some(json!({ "inputName": input_name }))).await?;
		Ok(response.input_muted)
	}

	/// Flip the mute state and return the new one.
	#[instrument(skip(self))]
	pub async fn toggle_input_mute(&self, input_name: &str) -> Result<bool, ObsClientError> {
		let input_name = non_empty(input_name)?;
		let response: InputMuteResponse = self.request("ToggleInputMute", Some(json!({ "inputName": input_name }))).await?;
		info!("{} is now {}", input_name, if response.input_muted { "muted" } else { "live" });
		Ok(response.input_muted)
	}

	pub async fn set_input_mute(&self, input_name: &str, muted: bool) -> Result<(), ObsClientError> {
		let input_name = non_empty(input_name)?;
		self.call("SetInputMute", Some(json!({ "inputName": input_name, "inputMuted": muted }))).await?;
		Ok(())
	}

	pub async fn find_audio_input(&self, role: AudioRole) -> Result<Input, ObsClientError> {
		let inputs = self.get_input_list().await?;
		let found = role.find(&inputs).cloned().ok_or(ObsClientError::NoMatchingInputFound(role))?;
		debug!("Using {:?} as {}", found.name, role);
		Ok(found)
	}

	/// Toggle the first input that looks like `role` and return its new mute state.
	pub async fn toggle_audio(&self, role: AudioRole) -> Result<bool, ObsClientError> {
		let input = self.find_audio_input(role).await?;
		self.toggle_input_mute(&input.name).await
	}
}

fn non_empty(input_name: &str) -> Result<&str, ObsClientError> {
	if input_name.trim().is_empty() {
		return Err(ObsClientError::InvalidArgument("input name must not be empty".to_string()));
	}
	Ok(input_name)
}
