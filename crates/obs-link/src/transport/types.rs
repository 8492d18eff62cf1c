use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseInitiator {
	Local,
	Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
	pub initiator: CloseInitiator,
	pub code: Option<u16>,
	pub reason: Option<String>,
}

impl CloseInfo {
	pub const fn local() -> Self {
		Self {
			initiator: CloseInitiator::Local,
			code: None,
			reason: None,
		}
	}

	pub fn remote(code: Option<u16>, reason: Option<String>) -> Self {
		Self {
			initiator: CloseInitiator::Remote,
			code,
			reason: reason.filter(|r| !r.is_empty()),
		}
	}

	pub fn is_local(&self) -> bool {
		self.initiator == CloseInitiator::Local
	}
}

impl fmt::Display for CloseInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let side = match self.initiator {
			CloseInitiator::Local => "local",
			CloseInitiator::Remote => "remote",
		};
		match (self.code, self.reason.as_deref()) {
			(Some(code), Some(reason)) => write!(f, "{side} close {code}: {reason}"),
			(Some(code), None) => write!(f, "{side} close {code}"),
			(None, Some(reason)) => write!(f, "{side} close: {reason}"),
			(None, None) => write!(f, "{side} close"),
		}
	}
}

/// Everything a session reports upward, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	Message(String),
	Error(String),
	/// Emitted exactly once, always last.
	Closed(CloseInfo),
}
