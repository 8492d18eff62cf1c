use crate::messages::ResponseData;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
	#[error("Not connected to OBS")]
	NotConnected,

	#[error("{request_type} failed with code {code}{}", comment.as_deref().map(|c| format!(": {c}")).unwrap_or_default())]
	RequestFailed { request_type: String, code: u32, comment: Option<String> },

	#[error("Connection closed before a response arrived")]
	ConnectionClosed,

	#[error("{request_type} timed out after {}ms", timeout.as_millis())]
	Timeout { request_type: String, timeout: Duration },

	#[error("Failed to send request: {0}")]
	Send(String),

	#[error("Failed to encode request: {0}")]
	Codec(String),

	#[error("Unexpected response data for {request_type}: {reason}")]
	Decode { request_type: String, reason: String },
}

pub type Completion = oneshot::Receiver<Result<Value, RequestError>>;

struct PendingRequest {
	request_type: String,
	issued_at: Instant,
	completion: oneshot::Sender<Result<Value, RequestError>>,
}

/// Pairs responses with the callers waiting on them.
#[derive(Default)]
pub struct RequestCorrelator {
	next_id: AtomicU64,
	pending: DashMap<String, PendingRequest>,
}

impl RequestCorrelator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, request_type: &str) -> (String, Completion) {
		let id = (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
		let (tx, rx) = oneshot::channel();

		self.pending.insert(
			id.clone(),
			PendingRequest {
				request_type: request_type.to_string(),
				issued_at: Instant::now(),
				completion: tx,
			},
		);
		(id, rx)
	}

	/// Complete the caller waiting on this response. Returns false for ids
	/// nobody is waiting on.
	pub fn resolve(&self, response: ResponseData) -> bool {
		let Some((_, pending)) = self.pending.remove(&response.request_id) else {
			debug!("Ignoring response to unknown request {} ({})", response.request_id, response.request_type);
			return false;
		};

		trace!("{} #{} answered in {:?}", pending.request_type, response.request_id, pending.issued_at.elapsed());

		let status = response.request_status;
		let outcome = if status.result {
			Ok(response.response_data.unwrap_or(Value::Null))
		} else {
			Err(RequestError::RequestFailed {
				request_type: pending.request_type,
				code: status.code,
				comment: status.comment,
			})
		};

		// The caller may have given up already.
		let _ = pending.completion.send(outcome);
		true
	}

	pub fn forget(&self, id: &str) {
		self.pending.remove(id);
	}

	pub fn fail_all(&self) {
		let ids: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
		if !ids.is_empty() {
			debug!("Failing {} pending requests", ids.len());
		}

		for id in ids {
			if let Some((_, pending)) = self.pending.remove(&id) {
				let _ = pending.completion.send(Err(RequestError::ConnectionClosed));
			}
		}
	}

	#[cfg(test)]
	pub fn pending_count(&self) -> usize {
		self.pending.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::messages::RequestStatus;
	use serde_json::json;

	fn response(id: &str, result: bool, code: u32, data: Option<Value>) -> ResponseData {
		ResponseData {
			request_type: "GetSceneList".into(),
			request_id: id.into(),
			request_status: RequestStatus { result, code, comment: None },
			response_data: data,
		}
	}

	#[test]
	fn ids_are_unique_and_increasing() {
		let correlator = RequestCorrelator::new();
		let (a, _ra) = correlator.register("A");
		let (b, _rb) = correlator.register("B");
		assert_eq!(a, "1");
		assert_eq!(b, "2");
		assert_eq!(correlator.pending_count(), 2);
	}

	#[tokio::test]
	async fn resolves_out_of_order() {
		let correlator = RequestCorrelator::new();
		let (first, first_rx) = correlator.register("GetSceneList");
		let (second, second_rx) = correlator.register("GetSceneList");

		assert!(correlator.resolve(response(&second, true, 100, Some(json!({ "n": 2 })))));
		assert!(correlator.resolve(response(&first, true, 100, None)));

		assert_eq!(second_rx.await.unwrap(), Ok(json!({ "n": 2 })));
		assert_eq!(first_rx.await.unwrap(), Ok(Value::Null));
		assert_eq!(correlator.pending_count(), 0);
	}

	#[tokio::test]
	async fn failure_status_carries_request_type() {
		let correlator = RequestCorrelator::new();
		let (id, rx) = correlator.register("SetCurrentProgramScene");
		let mut failed = response(&id, false, 600, None);
		failed.request_status.comment = Some("Scene not found".into());
		correlator.resolve(failed);

		assert_eq!(
			rx.await.unwrap(),
			Err(RequestError::RequestFailed {
				request_type: "SetCurrentProgramScene".into(),
				code: 600,
				comment: Some("Scene not found".into())
			})
		);
	}

	#[test]
	fn unknown_ids_are_ignored() {
		let correlator = RequestCorrelator::new();
		let (_id, _rx) = correlator.register("GetVersion");
		assert!(!correlator.resolve(response("999", true, 100, None)));
		assert_eq!(correlator.pending_count(), 1);
	}

	#[tokio::test]
	async fn fail_all_drains_everything() {
		let correlator = RequestCorrelator::new();
		let receivers: Vec<_> = (0..3).map(|_| correlator.register("Hang").1).collect();
		correlator.fail_all();

		assert_eq!(correlator.pending_count(), 0);
		for rx in receivers {
			assert_eq!(rx.await.unwrap(), Err(RequestError::ConnectionClosed));
		}
	}
}
