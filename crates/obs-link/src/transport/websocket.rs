use super::{CloseInfo, TransportError, TransportEvent};
use futures_util::{
	sink::SinkExt,
	stream::{SplitSink, SplitStream, StreamExt},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::{
	net::TcpStream,
	sync::{mpsc, Mutex},
	time::Instant,
};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = Arc<Mutex<SplitSink<WsStream, TungsteniteMessage>>>;

const EVENT_BUFFER: usize = 256;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const IDLE_LIMIT: Duration = Duration::from_secs(120);
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// One open text-frame WebSocket.
///
/// Inbound traffic is delivered through the receiver returned by [`open`](Self::open);
/// the last item on that channel is always a single [`TransportEvent::Closed`].
pub struct TransportSession {
	url: String,
	sink: WsSink,
	closed: Arc<AtomicBool>,
	local_close: Arc<AtomicBool>,
	shutdown: CancellationToken,
}

impl TransportSession {
	#[instrument(skip_all, fields(url = %url))]
	pub async fn open(url: &str, timeout: Duration) -> Result<(Arc<Self>, mpsc::Receiver<TransportEvent>), TransportError> {
		let (ws_stream, _) = match tokio::time::timeout(timeout, connect_async(url)).await {
			Ok(Ok(result)) => result,
			Ok(Err(e)) => {
				debug!("WebSocket connect failed: {}", e);
				return Err(TransportError::ConnectionRefused {
					url: url.to_string(),
					reason: e.to_string(),
				});
			}
			Err(_) => {
				debug!("WebSocket connect timed out after {:?}", timeout);
				return Err(TransportError::ConnectTimeout { timeout });
			}
		};

		let (sink, stream) = ws_stream.split();
		let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

		let session = Arc::new(Self {
			url: url.to_string(),
			sink: Arc::new(Mutex::new(sink)),
			closed: Arc::new(AtomicBool::new(false)),
			local_close: Arc::new(AtomicBool::new(false)),
			shutdown: CancellationToken::new(),
		});

		let reader = ReaderLoop {
			stream,
			sink: session.sink.clone(),
			closed: session.closed.clone(),
			local_close: session.local_close.clone(),
			shutdown: session.shutdown.clone(),
			events_tx,
		};
		tokio::spawn(reader.run());

		info!("WebSocket open");
		Ok((session, events_rx))
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	pub async fn send(&self, text: String) -> Result<(), TransportError> {
		if self.is_closed() {
			return Err(TransportError::NotConnected);
		}

		trace!("-> {}", text);
		let mut sink = self.sink.lock().await;
		sink.send(TungsteniteMessage::Text(text.into()))
			.await
			.map_err(|e| TransportError::SendFailed { reason: e.to_string() })
	}

	/// Close from this side. Safe to call any number of times.
	pub async fn close(&self) {
		if self.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		self.local_close.store(true, Ordering::Release);
		self.shutdown.cancel();

		let mut sink = self.sink.lock().await;
		let goodbye = async {
			sink.send(TungsteniteMessage::Close(None)).await?;
			sink.close().await
		};
		match tokio::time::timeout(CLOSE_FRAME_TIMEOUT, goodbye).await {
			Ok(Ok(())) => debug!("Close frame sent to {}", self.url),
			Ok(Err(e)) => debug!("Close frame not delivered to {}: {}", self.url, e),
			Err(_) => debug!("Close frame to {} timed out", self.url),
		}
	}
}

impl Drop for TransportSession {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

struct ReaderLoop {
	stream: SplitStream<WsStream>,
	sink: WsSink,
	closed: Arc<AtomicBool>,
	local_close: Arc<AtomicBool>,
	shutdown: CancellationToken,
	events_tx: mpsc::Sender<TransportEvent>,
}

impl ReaderLoop {
	async fn run(mut self) {
		let mut last_activity = Instant::now();
		let mut ping_interval = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
		ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		let close_info = loop {
			tokio::select! {
				biased;

				() = self.shutdown.cancelled() => {
					break CloseInfo::local();
				}
				msg = self.stream.next() => {
					match msg {
						Some(Ok(TungsteniteMessage::Text(text))) => {
							last_activity = Instant::now();
							trace!("<- {}", text.as_str());
							self.emit(TransportEvent::Message(text.to_string())).await;
						}
						Some(Ok(TungsteniteMessage::Ping(payload))) => {
							last_activity = Instant::now();
							let mut sink_guard = self.sink.lock().await;
							let _ = sink_guard.send(TungsteniteMessage::Pong(payload)).await;
						}
						Some(Ok(TungsteniteMessage::Pong(_))) => {
							last_activity = Instant::now();
						}
						Some(Ok(TungsteniteMessage::Close(frame))) => {
							info!("WebSocket close frame received");
							break match frame {
								Some(frame) => CloseInfo::remote(Some(u16::from(frame.code)), Some(frame.reason.as_str().to_string())),
								None => CloseInfo::remote(None, None),
							};
						}
						Some(Ok(_)) => {
							last_activity = Instant::now();
							debug!("Ignoring non-text frame");
						}
						Some(Err(e)) => {
							error!("WebSocket error: {}", e);
							self.emit(TransportEvent::Error(e.to_string())).await;
							break CloseInfo::remote(None, Some(e.to_string()));
						}
						None => {
							info!("WebSocket stream ended");
							break CloseInfo::remote(None, None);
						}
					}
				}
				_ = ping_interval.tick() => {
					if last_activity.elapsed() > IDLE_LIMIT {
						warn!("No activity for {:?}, treating connection as dead", IDLE_LIMIT);
						break CloseInfo::remote(None, Some("keepalive timeout".to_string()));
					}

					let mut sink_guard = self.sink.lock().await;
					if sink_guard.send(TungsteniteMessage::Ping(Vec::new().into())).await.is_err() {
						error!("Failed to send ping, connection likely dead");
						break CloseInfo::remote(None, Some("ping failed".to_string()));
					}
				}
			}
		};

		self.closed.store(true, Ordering::Release);
		let close_info = if self.local_close.load(Ordering::Acquire) { CloseInfo::local() } else { close_info };

		debug!("Reader finished: {}", close_info);
		self.emit(TransportEvent::Closed(close_info)).await;
	}

	async fn emit(&self, event: TransportEvent) {
		if self.events_tx.send(event).await.is_err() {
			trace!("Transport listener gone, dropping event");
		}
	}
}
