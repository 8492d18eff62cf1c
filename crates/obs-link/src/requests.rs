//! Typed OBS requests layered on [`ObsClient::call`].

mod inputs;
mod scenes;

use crate::core::{EventDispatcher, RequestError};
use crate::messages::ObsEvent;
use crate::{ObsClient, ObsClientError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

pub use inputs::{AudioRole, Input};
pub use scenes::Scene;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
	pub obs_version: String,
	pub obs_web_socket_version: String,
	#[serde(default)]
	pub rpc_version: u32,
	#[serde(default)]
	pub available_requests: Vec<String>,
	#[serde(default)]
	pub platform: Option<String>,
}

impl ObsClient {
	/// Call `request_type` and deserialize its `responseData` into `T`.
	pub async fn request<T: DeserializeOwned>(&self, request_type: &str, request_data: Option<Value>) -> Result<T, ObsClientError> {
		let value = self.call(request_type, request_data).await?;
		decode_response(request_type, value)
	}

	pub async fn get_version(&self) -> Result<VersionInfo, ObsClientError> {
		self.request("GetVersion", None).await
	}
}

pub(crate) fn decode_response<T: DeserializeOwned>(request_type: &str, value: Value) -> Result<T, ObsClientError> {
	serde_json::from_value(value).map_err(|e| {
		RequestError::Decode {
			request_type: request_type.to_string(),
			reason: e.to_string(),
		}
		.into()
	})
}

/// Scene names and the current program scene as last seen from OBS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSnapshot {
	pub scenes: Vec<String>,
	pub current: Option<String>,
}

impl SceneSnapshot {
	pub fn scenes(&self) -> Vec<Scene> {
		self.scenes
			.iter()
			.map(|name| Scene {
				name: name.clone(),
				is_current: self.current.as_deref() == Some(name),
			})
			.collect()
	}
}

/// Cache of the scene list kept current from scene notifications.
///
/// Filled by [`ObsClient::get_scene_list`] and cleared when the connection
/// drops.
#[derive(Default)]
pub struct SceneView {
	snapshot: RwLock<SceneSnapshot>,
}

impl SceneView {
	pub fn snapshot(&self) -> SceneSnapshot {
		self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn current(&self) -> Option<String> {
		self.snapshot.read().unwrap_or_else(|e| e.into_inner()).current.clone()
	}

	pub(crate) fn track(view: &Arc<Self>, dispatcher: &EventDispatcher) {
		let view = Arc::downgrade(view);
		dispatcher
			.subscribe(move |event| {
				if let Some(view) = view.upgrade() {
					view.apply(event);
				}
			})
			.detach();
	}

	/// Refresh from a `GetSceneList` response body as it arrives.
	pub(crate) fn observe_scene_list(&self, data: &Value) {
		match scenes::scene_list(data.clone()) {
			Ok(list) => self.replace(&list),
			Err(e) => debug!("Scene cache not refreshed: {}", e),
		}
	}

	pub(crate) fn replace(&self, scenes: &[Scene]) {
		let mut snapshot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
		snapshot.scenes = scenes.iter().map(|s| s.name.clone()).collect();
		snapshot.current = scenes.iter().find(|s| s.is_current).map(|s| s.name.clone());
	}

	pub(crate) fn apply(&self, event: &ObsEvent) {
		let mut snapshot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
		match event {
			ObsEvent::SceneChanged { scene_name } => snapshot.current = Some(scene_name.clone()),
			ObsEvent::SceneListChanged { scenes } if !scenes.is_empty() => {
				snapshot.scenes.clone_from(scenes);
				if snapshot.current.as_ref().is_some_and(|current| !scenes.contains(current)) {
					snapshot.current = None;
				}
			}
			ObsEvent::SceneCreated { scene_name, is_group: false } => {
				if !snapshot.scenes.contains(scene_name) {
					snapshot.scenes.push(scene_name.clone());
				}
			}
			ObsEvent::SceneRemoved { scene_name } => {
				snapshot.scenes.retain(|name| name != scene_name);
				if snapshot.current.as_ref() == Some(scene_name) {
					snapshot.current = None;
				}
			}
			ObsEvent::SceneRenamed { old_name, new_name } => {
				for name in &mut snapshot.scenes {
					if name == old_name {
						name.clone_from(new_name);
					}
				}
				if snapshot.current.as_ref() == Some(old_name) {
					snapshot.current = Some(new_name.clone());
				}
			}
			ObsEvent::ConnectionChanged { connected: false } => *snapshot = SceneSnapshot::default(),
			_ => {}
		}
	}
}

impl fmt::Debug for SceneView {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SceneView").field(&self.snapshot()).finish()
	}
}
