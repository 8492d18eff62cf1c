use thiserror::Error;

/// Errors raised while encoding or decoding `{op, d}` frames.
#[derive(Debug, Error)]
pub enum CodecError {
	/// Inbound frame that cannot be understood. Never fatal to a connection.
	#[error("Malformed frame: {reason}")]
	MalformedFrame { reason: String },

	#[error("Failed to encode frame: {0}")]
	Encode(#[from] serde_json::Error),
}

impl CodecError {
	pub(crate) fn malformed(reason: impl Into<String>) -> Self {
		Self::MalformedFrame { reason: reason.into() }
	}
}
