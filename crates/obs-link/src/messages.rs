//! Wire codec for the OBS WebSocket v5 envelope.
//!
//! Every frame is a JSON object `{"op": <u8>, "d": {...}}`. Decoding is
//! strict about structure and lenient about optional fields; anything that
//! does not fit surfaces as [`CodecError::MalformedFrame`], which callers log
//! and drop.

mod error;
mod parsers;
mod types;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

pub use error::CodecError;
pub(crate) use parsers::EventMessageParser;
pub use types::{
	AuthChallenge, EventData, EventSubscription, HelloData, IdentifiedData, IdentifyData, ObsEvent, ReidentifyData, RequestData, RequestStatus, ResponseData, RPC_VERSION,
};

type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
	Hello = 0,
	Identify = 1,
	Identified = 2,
	Reidentify = 3,
	Event = 5,
	Request = 6,
	RequestResponse = 7,
}

impl OpCode {
	pub const fn as_u8(self) -> u8 {
		self as u8
	}

	pub const fn from_u64(op: u64) -> Option<Self> {
		match op {
			0 => Some(Self::Hello),
			1 => Some(Self::Identify),
			2 => Some(Self::Identified),
			3 => Some(Self::Reidentify),
			5 => Some(Self::Event),
			6 => Some(Self::Request),
			7 => Some(Self::RequestResponse),
			_ => None,
		}
	}
}

/// A decoded frame, one variant per operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
	Hello(HelloData),
	Identify(IdentifyData),
	Identified(IdentifiedData),
	Reidentify(ReidentifyData),
	Event(EventData),
	Request(RequestData),
	RequestResponse(ResponseData),
}

impl Frame {
	pub const fn op_code(&self) -> OpCode {
		match self {
			Self::Hello(_) => OpCode::Hello,
			Self::Identify(_) => OpCode::Identify,
			Self::Identified(_) => OpCode::Identified,
			Self::Reidentify(_) => OpCode::Reidentify,
			Self::Event(_) => OpCode::Event,
			Self::Request(_) => OpCode::Request,
			Self::RequestResponse(_) => OpCode::RequestResponse,
		}
	}
}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T: Serialize> {
	op: u8,
	d: &'a T,
}

#[derive(Deserialize)]
struct IncomingEnvelope {
	op: u64,
	d: Value,
}

/// Serialize a frame into its text representation.
pub fn encode(frame: &Frame) -> Result<String> {
	let op = frame.op_code().as_u8();
	let text = match frame {
		Frame::Hello(d) => envelope(op, d),
		Frame::Identify(d) => envelope(op, d),
		Frame::Identified(d) => envelope(op, d),
		Frame::Reidentify(d) => envelope(op, d),
		Frame::Event(d) => envelope(op, d),
		Frame::Request(d) => envelope(op, d),
		Frame::RequestResponse(d) => envelope(op, d),
	}?;
	Ok(text)
}

/// Parse a text frame.
pub fn decode(text: &str) -> Result<Frame> {
	let envelope: IncomingEnvelope = serde_json::from_str(text).map_err(|e| {
		trace!("Rejected frame (first 200 chars): {}", text.chars().take(200).collect::<String>());
		CodecError::malformed(format!("invalid envelope: {e}"))
	})?;

	let op = OpCode::from_u64(envelope.op).ok_or_else(|| CodecError::malformed(format!("unknown op code {}", envelope.op)))?;

	let frame = match op {
		OpCode::Hello => Frame::Hello(payload(op, envelope.d)?),
		OpCode::Identify => Frame::Identify(payload(op, envelope.d)?),
		OpCode::Identified => Frame::Identified(payload(op, envelope.d)?),
		OpCode::Reidentify => Frame::Reidentify(payload(op, envelope.d)?),
		OpCode::Event => Frame::Event(payload(op, envelope.d)?),
		OpCode::Request => Frame::Request(payload(op, envelope.d)?),
		OpCode::RequestResponse => Frame::RequestResponse(payload(op, envelope.d)?),
	};

	Ok(frame)
}

fn envelope<T: Serialize>(op: u8, d: &T) -> Result<String> {
	Ok(serde_json::to_string(&OutgoingEnvelope { op, d })?)
}

fn payload<T: DeserializeOwned>(op: OpCode, d: Value) -> Result<T> {
	serde_json::from_value(d).map_err(|e| CodecError::malformed(format!("{op:?} payload: {e}")))
}
