use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// RPC version this client speaks during Identify.
pub const RPC_VERSION: u32 = 1;

/// Event subscription bits sent in Identify/Reidentify.
pub struct EventSubscription;

impl EventSubscription {
	pub const NONE: u32 = 0;
	pub const GENERAL: u32 = 1 << 0;
	pub const CONFIG: u32 = 1 << 1;
	pub const SCENES: u32 = 1 << 2;
	pub const INPUTS: u32 = 1 << 3;
	pub const TRANSITIONS: u32 = 1 << 4;
	pub const FILTERS: u32 = 1 << 5;
	pub const OUTPUTS: u32 = 1 << 6;
	pub const SCENE_ITEMS: u32 = 1 << 7;
	pub const MEDIA_INPUTS: u32 = 1 << 8;
	pub const VENDORS: u32 = 1 << 9;
	pub const UI: u32 = 1 << 10;
	/// Every non high-volume category.
	pub const ALL: u32 = Self::GENERAL
		| Self::CONFIG
		| Self::SCENES
		| Self::INPUTS
		| Self::TRANSITIONS
		| Self::FILTERS
		| Self::OUTPUTS
		| Self::SCENE_ITEMS
		| Self::MEDIA_INPUTS
		| Self::VENDORS
		| Self::UI;
	/// What a scene switcher needs: scene and input lifecycle plus general events.
	pub const SCENE_SWITCHER: u32 = Self::GENERAL | Self::SCENES | Self::INPUTS;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
	pub challenge: String,
	pub salt: String,
}

/// op 0, server -> client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloData {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub obs_web_socket_version: Option<String>,
	#[serde(default = "default_rpc_version")]
	pub rpc_version: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authentication: Option<AuthChallenge>,
}

/// op 1, client -> server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyData {
	pub rpc_version: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authentication: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event_subscriptions: Option<u32>,
}

/// op 2, server -> client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedData {
	#[serde(default = "default_rpc_version")]
	pub negotiated_rpc_version: u32,
	/// Not part of upstream OBS (which closes with 4009 instead) but sent by
	/// simpler servers to reject an Identify.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// op 3, client -> server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReidentifyData {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event_subscriptions: Option<u32>,
}

/// op 5, server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
	pub event_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event_intent: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event_data: Option<Value>,
}

/// op 6, client -> server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
	pub request_type: String,
	#[serde(deserialize_with = "string_or_number")]
	pub request_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub request_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
	pub result: bool,
	pub code: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
}

/// op 7, server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
	pub request_type: String,
	#[serde(deserialize_with = "string_or_number")]
	pub request_id: String,
	pub request_status: RequestStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_data: Option<Value>,
}

/// Notifications delivered to subscribers.
///
/// Server events are decoded from op 5 frames; the connection and reconnect
/// variants are produced locally by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ObsEvent {
	ConnectionChanged { connected: bool },
	Reconnecting { attempt: u32, max_attempts: u32 },
	ReconnectExhausted { attempts: u32 },
	SceneChanged { scene_name: String },
	/// Scene names as carried by the event, in server order. Empty when the
	/// server sends no list and the caller should re-fetch.
	SceneListChanged { scenes: Vec<String> },
	SceneCreated { scene_name: String, is_group: bool },
	SceneRemoved { scene_name: String },
	SceneRenamed { old_name: String, new_name: String },
	InputCreated { input_name: String, input_kind: Option<String> },
	InputRemoved { input_name: String },
	InputRenamed { old_name: String, new_name: String },
	InputMuteChanged { input_name: String, muted: bool },
	Unknown { event_type: String, data: Value },
}

impl ObsEvent {
	pub const fn name(&self) -> &'static str {
		match self {
			Self::ConnectionChanged { .. } => "ConnectionChanged",
			Self::Reconnecting { .. } => "Reconnecting",
			Self::ReconnectExhausted { .. } => "ReconnectExhausted",
			Self::SceneChanged { .. } => "SceneChanged",
			Self::SceneListChanged { .. } => "SceneListChanged",
			Self::SceneCreated { .. } => "SceneCreated",
			Self::SceneRemoved { .. } => "SceneRemoved",
			Self::SceneRenamed { .. } => "SceneRenamed",
			Self::InputCreated { .. } => "InputCreated",
			Self::InputRemoved { .. } => "InputRemoved",
			Self::InputRenamed { .. } => "InputRenamed",
			Self::InputMuteChanged { .. } => "InputMuteChanged",
			Self::Unknown { .. } => "Unknown",
		}
	}
}

const fn default_rpc_version() -> u32 {
	RPC_VERSION
}

/// OBS sends string ids, but echo servers may send back plain numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Id {
		Text(String),
		Number(u64),
	}

	Ok(match Id::deserialize(deserializer)? {
		Id::Text(text) => text,
		Id::Number(number) => number.to_string(),
	})
}
