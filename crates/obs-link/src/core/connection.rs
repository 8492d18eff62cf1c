use super::{ConnectionPhase, EventDispatcher, Handshake, HandshakeStep, RequestCorrelator, RequestError};
use crate::config::ObsConfig;
use crate::messages::{self, EventMessageParser, Frame, RequestData, ResponseData};
use crate::requests::SceneView;
use crate::transport::{CloseInfo, TransportError, TransportEvent, TransportSession};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::{
	sync::{mpsc, watch},
	task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

/// Why a connection attempt did not reach `Ready`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
	#[error("Connection timeout after {}ms", timeout.as_millis())]
	ConnectTimeout { timeout: Duration },

	#[error("Connection refused by {url}: {reason}")]
	ConnectionRefused { url: String, reason: String },

	#[error("OBS requires a password but none was configured")]
	AuthenticationRequired,

	#[error("Authentication failed: {reason}")]
	AuthenticationFailed { reason: String },

	#[error("Connection closed during handshake (code {code:?}, reason {reason:?})")]
	ClosedDuringHandshake { code: Option<u16>, reason: Option<String> },

	#[error("Protocol error: {0}")]
	Protocol(String),

	#[error("Connection attempt superseded")]
	Superseded,
}

impl From<TransportError> for ConnectError {
	fn from(error: TransportError) -> Self {
		match error {
			TransportError::ConnectTimeout { timeout } => Self::ConnectTimeout { timeout },
			TransportError::ConnectionRefused { url, reason } => Self::ConnectionRefused { url, reason },
			TransportError::NotConnected => Self::ClosedDuringHandshake { code: None, reason: None },
			TransportError::SendFailed { reason } => Self::ClosedDuringHandshake { code: None, reason: Some(reason) },
		}
	}
}

type Opened = (Arc<TransportSession>, mpsc::Receiver<TransportEvent>, u32);

/// Everything the reader task needs, parked until [`Connection::start`].
struct Router {
	events: mpsc::Receiver<TransportEvent>,
	dispatcher: Arc<EventDispatcher>,
	scenes: Arc<SceneView>,
	phase: watch::Sender<ConnectionPhase>,
	closed: watch::Sender<Option<CloseInfo>>,
}

enum Reader {
	Parked(Router),
	Running(JoinHandle<()>),
	Done,
}

/// One identified session with OBS.
pub struct Connection {
	id: Uuid,
	transport: Arc<TransportSession>,
	correlator: Arc<RequestCorrelator>,
	phase: watch::Receiver<ConnectionPhase>,
	closed: watch::Receiver<Option<CloseInfo>>,
	negotiated_rpc_version: u32,
	connected_at: DateTime<Utc>,
	request_timeout: Duration,
	reader: Mutex<Reader>,
}

impl Connection {
	/// Open the socket and run Hello/Identify/Identified, bounded by the
	/// configured connect timeout. Cancelling `cancel` aborts the attempt
	/// with [`ConnectError::Superseded`].
	///
	/// Inbound frames are held until [`Connection::start`] is called.
	#[instrument(skip_all, fields(url = %config.url()))]
	pub async fn establish(config: &ObsConfig, dispatcher: Arc<EventDispatcher>, scenes: Arc<SceneView>, cancel: CancellationToken) -> Result<Arc<Self>, ConnectError> {
		let url = config.url();
		let timeout = config.connect_timeout;
		let mut handshake = Handshake::new(config.password.clone(), config.event_subscriptions);
		handshake.start();

		let mut opened_socket = None;
		let outcome = tokio::select! {
			biased;

			() = cancel.cancelled() => Err(ConnectError::Superseded),
			result = tokio::time::timeout(timeout, Self::handshake(&mut handshake, &url, timeout, &mut opened_socket)) => {
				result.unwrap_or(Err(ConnectError::ConnectTimeout { timeout }))
			}
		};

		let (transport, events, negotiated_rpc_version) = match outcome {
			Ok(opened) => opened,
			Err(e) => {
				if let Some(transport) = opened_socket {
					transport.close().await;
				}
				debug!("Handshake ended in {:?}: {}", handshake.phase(), e);
				return Err(e);
			}
		};

		let id = Uuid::new_v4();
		let (phase_tx, phase) = watch::channel(ConnectionPhase::Ready);
		let (closed_tx, closed) = watch::channel(None);
		let router = Router {
			events,
			dispatcher,
			scenes,
			phase: phase_tx,
			closed: closed_tx,
		};

		info!("✅ Connected to OBS at {} (rpc {}, connection {})", url, negotiated_rpc_version, id);

		Ok(Arc::new(Self {
			id,
			transport,
			correlator: Arc::new(RequestCorrelator::new()),
			phase,
			closed,
			negotiated_rpc_version,
			connected_at: Utc::now(),
			request_timeout: config.request_timeout,
			reader: Mutex::new(Reader::Parked(router)),
		}))
	}

	async fn handshake(handshake: &mut Handshake, url: &str, timeout: Duration, opened_socket: &mut Option<Arc<TransportSession>>) -> Result<Opened, ConnectError> {
		let (transport, mut events) = TransportSession::open(url, timeout).await?;
		*opened_socket = Some(transport.clone());
		handshake.on_transport_open();

		loop {
			let text = match events.recv().await {
				Some(TransportEvent::Message(text)) => text,
				Some(TransportEvent::Error(e)) => {
					debug!("Transport error during handshake: {}", e);
					continue;
				}
				Some(TransportEvent::Closed(info)) => return Err(handshake.on_close(&info)),
				None => return Err(handshake.on_close(&CloseInfo::remote(None, None))),
			};

			let frame = match messages::decode(&text) {
				Ok(frame) => frame,
				Err(e) => {
					warn!("Dropping malformed frame during handshake: {}", e);
					continue;
				}
			};

			match handshake.on_frame(frame) {
				HandshakeStep::Send(reply) => {
					let text = messages::encode(&reply).map_err(|e| ConnectError::Protocol(e.to_string()))?;
					transport.send(text).await?;
				}
				HandshakeStep::Ready { negotiated_rpc_version } => return Ok((transport, events, negotiated_rpc_version)),
				HandshakeStep::Fail(e) => return Err(e),
				HandshakeStep::Ignore => {}
			}
		}
	}

	pub const fn id(&self) -> Uuid {
		self.id
	}

	pub fn phase(&self) -> ConnectionPhase {
		*self.phase.borrow()
	}

	pub const fn negotiated_rpc_version(&self) -> u32 {
		self.negotiated_rpc_version
	}

	pub const fn connected_at(&self) -> DateTime<Utc> {
		self.connected_at
	}

	/// Send one request and wait for its response.
	#[instrument(skip(self, request_data), fields(connection = %self.id))]
	pub async fn call(&self, request_type: &str, request_data: Option<Value>) -> Result<Value, RequestError> {
		let (request_id, completion) = self.correlator.register(request_type);

		if self.phase() != ConnectionPhase::Ready {
			self.correlator.forget(&request_id);
			return Err(RequestError::NotConnected);
		}

		let frame = Frame::Request(RequestData {
			request_type: request_type.to_string(),
			request_id: request_id.clone(),
			request_data,
		});
		let text = match messages::encode(&frame) {
			Ok(text) => text,
			Err(e) => {
				self.correlator.forget(&request_id);
				return Err(RequestError::Codec(e.to_string()));
			}
		};

		if let Err(e) = self.transport.send(text).await {
			self.correlator.forget(&request_id);
			return Err(match e {
				TransportError::NotConnected => RequestError::NotConnected,
				other => RequestError::Send(other.to_string()),
			});
		}

		match tokio::time::timeout(self.request_timeout, completion).await {
			Ok(Ok(outcome)) => outcome,
			Ok(Err(_)) => Err(RequestError::ConnectionClosed),
			Err(_) => {
				self.correlator.forget(&request_id);
				warn!("{} #{} timed out", request_type, request_id);
				Err(RequestError::Timeout {
					request_type: request_type.to_string(),
					timeout: self.request_timeout,
				})
			}
		}
	}

	/// Resolves once the connection has closed, from either side.
	pub async fn closed(&self) -> CloseInfo {
		let mut closed = self.closed.clone();
		let info = match closed.wait_for(Option::is_some).await {
			Ok(info) => info.clone(),
			Err(_) => None,
		};
		info.unwrap_or_else(CloseInfo::local)
	}

	/// Start routing responses and events. Only the first call has an effect.
	pub fn start(&self) {
		let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
		if !matches!(*reader, Reader::Parked(_)) {
			return;
		}
		if let Reader::Parked(router) = std::mem::replace(&mut *reader, Reader::Done) {
			*reader = Reader::Running(tokio::spawn(read_loop(self.id, router, self.correlator.clone())));
		}
	}

	/// Close locally. Resolves after pending requests were failed and the
	/// reader has finished. Safe to call repeatedly.
	pub async fn close(&self) {
		self.transport.close().await;

		let reader = std::mem::replace(&mut *self.reader.lock().unwrap_or_else(|e| e.into_inner()), Reader::Done);
		match reader {
			Reader::Parked(router) => {
				debug!("Connection {} closed before it started routing", self.id);
				finish(self.id, &router, &self.correlator, CloseInfo::local());
			}
			Reader::Running(handle) => {
				if let Err(e) = handle.await {
					warn!("Reader task for connection {} failed: {}", self.id, e);
				}
			}
			Reader::Done => {}
		}

		let _ = self.closed().await;
	}
}

async fn read_loop(id: Uuid, mut router: Router, correlator: Arc<RequestCorrelator>) {
	let close_info = loop {
		let Some(event) = router.events.recv().await else {
			break CloseInfo::remote(None, None);
		};

		match event {
			TransportEvent::Message(text) => route_frame(&text, &router, &correlator),
			TransportEvent::Error(e) => warn!("Transport error on connection {}: {}", id, e),
			TransportEvent::Closed(info) => break info,
		}
	};

	finish(id, &router, &correlator, close_info);
}

fn finish(id: Uuid, router: &Router, correlator: &RequestCorrelator, close_info: CloseInfo) {
	router.phase.send_replace(ConnectionPhase::Closed);
	correlator.fail_all();

	if close_info.is_local() {
		info!("Connection {} closed locally", id);
	} else {
		warn!("Connection {} lost: {}", id, close_info);
	}
	router.closed.send_replace(Some(close_info));
}

fn route_frame(text: &str, router: &Router, correlator: &RequestCorrelator) {
	match messages::decode(text) {
		Ok(Frame::RequestResponse(response)) => {
			// Applied here so the cache sees responses and events in frame order.
			observe_response(&response, &router.scenes);
			correlator.resolve(response);
		}
		Ok(Frame::Event(event)) => match EventMessageParser::parse(&event) {
			Ok(parsed) => router.dispatcher.dispatch(&parsed),
			Err(e) => warn!("Dropping unparseable {} event: {}", event.event_type, e),
		},
		Ok(other) => trace!("Ignoring {:?} frame after identification", other.op_code()),
		Err(e) => warn!("Dropping malformed frame: {}", e),
	}
}

fn observe_response(response: &ResponseData, scenes: &SceneView) {
	if response.request_type != "GetSceneList" || !response.request_status.result {
		return;
	}
	if let Some(data) = &response.response_data {
		scenes.observe_scene_list(data);
	}
}
