// obs-link
//
// Client for the OBS WebSocket v5 protocol: connection lifecycle with
// authentication and automatic reconnection, request/response correlation,
// event subscriptions and the scene/audio operations a scene switcher needs.

use thiserror::Error;

mod auth;
mod config;
mod core;
mod manager;
mod messages;
mod requests;
mod transport;

pub use auth::authentication_response;
pub use config::{ConfigError, ObsConfig, ReconnectConfig};
pub use crate::core::{ConnectError, ConnectionPhase, ConnectionStatus, LinkState, RequestError, Subscription};
pub use manager::ObsClient;
pub use messages::{decode, encode, CodecError, EventSubscription, Frame, ObsEvent, OpCode, RPC_VERSION};
pub use requests::{AudioRole, Input, Scene, SceneSnapshot, SceneView, VersionInfo};

/// Protocol payload types, for callers that speak raw frames.
pub mod protocol {
	pub use crate::messages::{AuthChallenge, EventData, HelloData, IdentifiedData, IdentifyData, ReidentifyData, RequestData, RequestStatus, ResponseData};
}

/// Errors for obs-link
#[derive(Debug, Error)]
pub enum ObsClientError {
	#[error("Connection error: {0}")]
	Connect(#[from] ConnectError),

	#[error("Request error: {0}")]
	Request(#[from] RequestError),

	#[error("Invalid configuration: {0}")]
	InvalidConfig(#[from] ConfigError),

	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("No input found for {0}")]
	NoMatchingInputFound(AudioRole),
}

impl ObsClientError {
	/// OBS status code when the server rejected the request.
	pub const fn request_code(&self) -> Option<u32> {
		match self {
			Self::Request(RequestError::RequestFailed { code, .. }) => Some(*code),
			_ => None,
		}
	}
}

macro_rules! subscription_helpers {
	($($(#[$doc:meta])* $method:ident => $variant:ident { $($field:ident: $ty:ty),+ }),+ $(,)?) => {
		impl ObsClient {
			$(
				$(#[$doc])*
				pub fn $method<F>(&self, callback: F) -> Subscription
				where
					F: Fn($(&$ty),+) + Send + Sync + 'static,
				{
					self.dispatcher().subscribe(move |event| {
						if let ObsEvent::$variant { $($field),+ } = event {
							callback($($field),+);
						}
					})
				}
			)+
		}
	};
}

subscription_helpers! {
	/// `true` once identified, `false` whenever the link goes away.
	on_connection_changed => ConnectionChanged { connected: bool },
	on_scene_changed => SceneChanged { scene_name: String },
	/// Empty when OBS only signalled that the list changed; re-fetch with
	/// [`ObsClient::get_scene_list`] in that case.
	on_scene_list_changed => SceneListChanged { scenes: Vec<String> },
	on_scene_created => SceneCreated { scene_name: String, is_group: bool },
	on_scene_removed => SceneRemoved { scene_name: String },
	on_scene_renamed => SceneRenamed { old_name: String, new_name: String },
	on_input_created => InputCreated { input_name: String, input_kind: Option<String> },
	on_input_removed => InputRemoved { input_name: String },
	on_input_renamed => InputRenamed { old_name: String, new_name: String },
	on_mute_changed => InputMuteChanged { input_name: String, muted: bool },
	on_reconnecting => Reconnecting { attempt: u32, max_attempts: u32 },
	on_reconnect_exhausted => ReconnectExhausted { attempts: u32 },
}
