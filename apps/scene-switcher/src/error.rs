use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("OBS error: {0}")]
	Obs(#[from] obs_link::ObsClientError),

	#[error("JSON serialization error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Failed to listen for shutdown signal: {0}")]
	Signal(#[source] std::io::Error),
}
