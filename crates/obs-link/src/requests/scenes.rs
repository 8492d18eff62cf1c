use super::decode_response;
use crate::{ObsClient, ObsClientError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
	pub name: String,
	pub is_current: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneEntry {
	scene_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneListResponse {
	#[serde(default, alias = "currentScene")]
	current_program_scene_name: Option<String>,
	#[serde(default)]
	scenes: Vec<SceneEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentSceneResponse {
	#[serde(alias = "sceneName")]
	current_program_scene_name: String,
}

/// Decode a `GetSceneList` response body, marking the program scene.
pub(crate) fn scene_list(value: Value) -> Result<Vec<Scene>, ObsClientError> {
	let response: SceneListResponse = decode_response("GetSceneList", value)?;
	let current = response.current_program_scene_name.filter(|name| !name.is_empty());
	Ok(response
		.scenes
		.into_iter()
		.map(|entry| Scene {
			is_current: current.as_deref() == Some(entry.scene_name.as_str()),
			name: entry.scene_name,
		})
		.collect())
}

impl ObsClient {
	/// Scenes in the order OBS reports them, with the program scene marked.
	#[instrument(skip(self))]
	pub async fn get_scene_list(&self) -> Result<Vec<Scene>, ObsClientError> {
		let value = self.call("GetSceneList", None).await?;
		scene_list(value)
	}

	pub async fn get_current_scene(&self) -> Result<String, ObsClientError> {
		let response: CurrentSceneResponse = self.request("GetCurrentProgramScene", None).await?;
		Ok(response.current_program_scene_name)
	}

	#[instrument(skip(self))]
	pub async fn set_current_scene(&self, scene_name: &str) -> Result<(), ObsClientError> {
		if scene_name.trim().is_empty() {
			return Err(ObsClientError::InvalidArgument("scene name must not be empty".to_string()));
		}

		self.call("SetCurrentProgramScene", Some(json!({ "sceneName": scene_name }))).await?;
		info!("Scene switched to: {}", scene_name);
		Ok(())
	}
}
