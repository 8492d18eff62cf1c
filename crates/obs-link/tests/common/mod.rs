#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use obs_link::{authentication_response, LinkState, ObsClient, ObsConfig, ReconnectConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message};
use tokio_util::sync::CancellationToken;

pub const SALT: &str = "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=";
pub const CHALLENGE: &str = "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=";

#[derive(Clone, Debug)]
pub struct MockInput {
	pub name: String,
	pub kind: String,
	pub muted: bool,
}

#[derive(Clone, Debug)]
pub struct MockOptions {
	pub password: Option<String>,
	pub scenes: Vec<String>,
	pub current_scene: String,
	pub inputs: Vec<MockInput>,
	/// Close with 4009 on a bad secret instead of answering with an error.
	pub close_on_auth_failure: bool,
	/// Never send Hello.
	pub silent: bool,
	/// Send a non-protocol frame before Hello and before every response.
	pub send_garbage: bool,
	/// Answer GetSceneList with the legacy `currentScene` field.
	pub legacy_scene_list: bool,
	/// Switch to this scene and announce it right after answering GetSceneList.
	pub switch_after_scene_list: Option<String>,
	/// Announce the current scene right after Identified.
	pub event_after_identified: bool,
}

impl Default for MockOptions {
	fn default() -> Self {
		Self {
			password: None,
			scenes: vec!["Scene 1".into(), "Scene 2".into(), "Scene 3".into()],
			current_scene: "Scene 1".into(),
			inputs: vec![
				MockInput {
					name: "Desktop Audio".into(),
					kind: "pulse_output_capture".into(),
					muted: false,
				},
				MockInput {
					name: "Mic/Aux".into(),
					kind: "pulse_input_capture".into(),
					muted: false,
				},
				MockInput {
					name: "Camera".into(),
					kind: "v4l2_input".into(),
					muted: false,
				},
			],
			close_on_auth_failure: false,
			silent: false,
			send_garbage: false,
			legacy_scene_list: false,
			switch_after_scene_list: None,
			event_after_identified: false,
		}
	}
}

impl MockOptions {
	pub fn with_password(password: &str) -> Self {
		Self {
			password: Some(password.into()),
			..Self::default()
		}
	}
}

struct Shared {
	options: MockOptions,
	scenes: Mutex<(Vec<String>, String)>,
	inputs: Mutex<Vec<MockInput>>,
	clients: Mutex<Vec<mpsc::UnboundedSender<Message>>>,
	connections: AtomicUsize,
	identified: AtomicUsize,
	requests: Mutex<Vec<String>>,
}

/// In-process stand-in for obs-websocket.
pub struct MockObs {
	addr: SocketAddr,
	shared: Arc<Shared>,
	server: Option<(CancellationToken, JoinHandle<()>)>,
}

impl MockObs {
	pub async fn start(options: MockOptions) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let shared = Arc::new(Shared {
			scenes: Mutex::new((options.scenes.clone(), options.current_scene.clone())),
			inputs: Mutex::new(options.inputs.clone()),
			options,
			clients: Mutex::new(Vec::new()),
			connections: AtomicUsize::new(0),
			identified: AtomicUsize::new(0),
			requests: Mutex::new(Vec::new()),
		});

		let mut mock = Self { addr, shared, server: None };
		mock.serve(listener);
		mock
	}

	fn serve(&mut self, listener: TcpListener) {
		let token = CancellationToken::new();
		let handle = tokio::spawn(accept_loop(listener, self.shared.clone(), token.clone()));
		self.server = Some((token, handle));
	}

	pub fn port(&self) -> u16 {
		self.addr.port()
	}

	pub fn config(&self) -> ObsConfig {
		ObsConfig::new("127.0.0.1", self.port())
			.with_connect_timeout(Duration::from_secs(2))
			.with_request_timeout(Duration::from_secs(2))
	}

	/// Stop listening and close every open connection with 1001.
	pub async fn stop(&mut self) {
		if let Some((token, handle)) = self.server.take() {
			token.cancel();
			let _ = handle.await;
		}
		self.shared.clients.lock().unwrap().clear();
	}

	/// Listen again on the same port.
	pub async fn restart(&mut self) {
		self.stop().await;
		let listener = TcpListener::bind(self.addr).await.unwrap();
		self.serve(listener);
	}

	/// Close every identified client from the server side, keep listening.
	pub fn kick_clients(&self) {
		let clients = std::mem::take(&mut *self.shared.clients.lock().unwrap());
		for client in clients {
			let _ = client.send(close_message(CloseCode::Away, "kicked"));
		}
	}

	/// Push an op 5 frame to every identified client.
	pub fn emit_event(&self, event_type: &str, data: Value) {
		broadcast(&self.shared, event_type, data);
	}

	pub fn connections(&self) -> usize {
		self.shared.connections.load(Ordering::SeqCst)
	}

	pub fn identified(&self) -> usize {
		self.shared.identified.load(Ordering::SeqCst)
	}

	pub fn requests_of(&self, request_type: &str) -> usize {
		self.shared.requests.lock().unwrap().iter().filter(|r| *r == request_type).count()
	}

	pub fn current_scene(&self) -> String {
		self.shared.scenes.lock().unwrap().1.clone()
	}

	pub fn is_muted(&self, input_name: &str) -> bool {
		self.shared.inputs.lock().unwrap().iter().any(|i| i.name == input_name && i.muted)
	}
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, token: CancellationToken) {
	loop {
		tokio::select! {
			() = token.cancelled() => break,
			accepted = listener.accept() => {
				let Ok((stream, _)) = accepted else { break };
				shared.connections.fetch_add(1, Ordering::SeqCst);
				tokio::spawn(serve_connection(stream, shared.clone(), token.child_token()));
			}
		}
	}
}

async fn serve_connection(stream: TcpStream, shared: Arc<Shared>, token: CancellationToken) {
	let Ok(ws) = accept_async(stream).await else {
		return;
	};
	let (mut sink, mut source) = ws.split();
	let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

	tokio::spawn(async move {
		while let Some(message) = out_rx.recv().await {
			let closing = matches!(message, Message::Close(_));
			if sink.send(message).await.is_err() || closing {
				break;
			}
		}
	});

	if shared.options.send_garbage {
		send(&out_tx, "this is not json".to_string());
	}
	if !shared.options.silent {
		let authentication = shared.options.password.as_ref().map(|_| json!({ "challenge": CHALLENGE, "salt": SALT }));
		let mut hello = json!({ "obsWebSocketVersion": "5.3.0", "rpcVersion": 1 });
		if let Some(authentication) = authentication {
			hello["authentication"] = authentication;
		}
		send(&out_tx, json!({ "op": 0, "d": hello }).to_string());
	}

	loop {
		tokio::select! {
			() = token.cancelled() => {
				let _ = out_tx.send(close_message(CloseCode::Away, "server shutting down"));
				break;
			}
			message = source.next() => {
				let text = match message {
					Some(Ok(Message::Text(text))) => text.to_string(),
					Some(Ok(Message::Close(_)) | Err(_)) | None => break,
					Some(Ok(_)) => continue,
				};
				if !handle_frame(&text, &shared, &out_tx) {
					break;
				}
			}
		}
	}
}

/// Returns false when the connection should end.
fn handle_frame(text: &str, shared: &Arc<Shared>, out: &mpsc::UnboundedSender<Message>) -> bool {
	let frame: Value = serde_json::from_str(text).unwrap();
	let d = &frame["d"];

	match frame["op"].as_u64() {
		Some(1) => {
			let expected = shared.options.password.as_deref().map(|password| authentication_response(password, SALT, CHALLENGE));
			let accepted = match expected {
				None => true,
				Some(expected) => d["authentication"].as_str() == Some(expected.as_str()),
			};

			if !accepted {
				if shared.options.close_on_auth_failure {
					let _ = out.send(close_message(CloseCode::from(4009), "Authentication failed."));
					return false;
				}
				send(out, json!({ "op": 2, "d": { "negotiatedRpcVersion": 1, "error": "Authentication failed" } }).to_string());
				return true;
			}

			shared.identified.fetch_add(1, Ordering::SeqCst);
			shared.clients.lock().unwrap().push(out.clone());
			send(out, json!({ "op": 2, "d": { "negotiatedRpcVersion": 1 } }).to_string());
			if shared.options.event_after_identified {
				let current = shared.scenes.lock().unwrap().1.clone();
				let event = json!({ "op": 5, "d": { "eventType": "CurrentProgramSceneChanged", "eventIntent": 4, "eventData": { "sceneName": current } } });
				send(out, event.to_string());
			}
		}
		Some(6) => handle_request(d, shared, out),
		_ => {}
	}
	true
}

fn handle_request(d: &Value, shared: &Arc<Shared>, out: &mpsc::UnboundedSender<Message>) {
	let request_type = d["requestType"].as_str().unwrap_or_default().to_string();
	let request_id = d["requestId"].clone();
	let data = d["requestData"].clone();
	shared.requests.lock().unwrap().push(request_type.clone());

	if shared.options.send_garbage {
		send(out, json!({ "op": 42, "d": {} }).to_string());
	}

	let ok = |response_data: Option<Value>| response(&request_type, &request_id, true, 100, None, response_data);
	let fail = |code: u32, comment: &str| response(&request_type, &request_id, false, code, Some(comment), None);

	let reply = match request_type.as_str() {
		"GetVersion" => ok(Some(json!({
			"obsVersion": "30.1.2",
			"obsWebSocketVersion": "5.3.0",
			"rpcVersion": 1,
			"availableRequests": ["GetSceneList", "SetCurrentProgramScene"],
			"platform": "linux"
		}))),
		"GetSceneList" => {
			let (scenes, current) = shared.scenes.lock().unwrap().clone();
			let entries: Vec<Value> = scenes.iter().enumerate().map(|(i, name)| json!({ "sceneName": name, "sceneIndex": i })).collect();
			let key = if shared.options.legacy_scene_list { "currentScene" } else { "currentProgramSceneName" };
			let mut body = json!({ "scenes": entries });
			body[key] = json!(current);
			if let Some(next) = &shared.options.switch_after_scene_list {
				send(out, ok(Some(body)));
				shared.scenes.lock().unwrap().1.clone_from(next);
				broadcast(shared, "CurrentProgramSceneChanged", json!({ "sceneName": next }));
				return;
			}
			ok(Some(body))
		}
		"GetCurrentProgramScene" => {
			let current = shared.scenes.lock().unwrap().1.clone();
			ok(Some(json!({ "currentProgramSceneName": current })))
		}
		"SetCurrentProgramScene" => {
			let name = data["sceneName"].as_str().unwrap_or_default().to_string();
			let known = {
				let mut scenes = shared.scenes.lock().unwrap();
				let known = scenes.0.contains(&name);
				if known {
					scenes.1.clone_from(&name);
				}
				known
			};
			if known {
				send(out, ok(None));
				broadcast(shared, "CurrentProgramSceneChanged", json!({ "sceneName": name }));
				return;
			}
			fail(600, "Scene not found")
		}
		"GetInputList" => {
			let inputs = shared.inputs.lock().unwrap().clone();
			let entries: Vec<Value> = inputs.iter().map(|i| json!({ "inputName": i.name, "inputKind": i.kind, "unversionedInputKind": i.kind })).collect();
			ok(Some(json!({ "inputs": entries })))
		}
		"GetInputMute" | "ToggleInputMute" | "SetInputMute" => {
			let name = data["inputName"].as_str().unwrap_or_default().to_string();
			let muted = {
				let mut inputs = shared.inputs.lock().unwrap();
				inputs.iter_mut().find(|i| i.name == name).map(|input| {
					match request_type.as_str() {
						"ToggleInputMute" => input.muted = !input.muted,
						"SetInputMute" => input.muted = data["inputMuted"].as_bool().unwrap_or(input.muted),
						_ => {}
					}
					input.muted
				})
			};
			match muted {
				None => fail(600, "No source was found by the name of `inputName`."),
				Some(muted) => {
					if request_type != "GetInputMute" {
						send(out, ok(if request_type == "ToggleInputMute" { Some(json!({ "inputMuted": muted })) } else { None }));
						broadcast(shared, "InputMuteStateChanged", json!({ "inputName": name, "inputMuted": muted }));
						return;
					}
					ok(Some(json!({ "inputMuted": muted })))
				}
			}
		}
		"Hang" => return,
		"DelayedEcho" => {
			let delay = Duration::from_millis(data["delayMs"].as_u64().unwrap_or(0));
			let reply = ok(Some(json!({ "value": data["value"].clone() })));
			let out = out.clone();
			tokio::spawn(async move {
				tokio::time::sleep(delay).await;
				send(&out, reply);
			});
			return;
		}
		_ => fail(604, "Your request type is not valid."),
	};
	send(out, reply);
}

fn response(request_type: &str, request_id: &Value, result: bool, code: u32, comment: Option<&str>, response_data: Option<Value>) -> String {
	let mut d = json!({
		"requestType": request_type,
		"requestId": request_id,
		"requestStatus": { "result": result, "code": code },
	});
	if let Some(comment) = comment {
		d["requestStatus"]["comment"] = json!(comment);
	}
	if let Some(response_data) = response_data {
		d["responseData"] = response_data;
	}
	json!({ "op": 7, "d": d }).to_string()
}

fn broadcast(shared: &Shared, event_type: &str, data: Value) {
	let text = json!({ "op": 5, "d": { "eventType": event_type, "eventIntent": 4, "eventData": data } }).to_string();
	shared.clients.lock().unwrap().retain(|client| client.send(Message::Text(text.clone().into())).is_ok());
}

fn send(out: &mpsc::UnboundedSender<Message>, text: String) {
	let _ = out.send(Message::Text(text.into()));
}

fn close_message(code: CloseCode, reason: &str) -> Message {
	Message::Close(Some(CloseFrame {
		code,
		reason: reason.to_string().into(),
	}))
}

/// Accepts TCP connections and never answers the WebSocket upgrade.
pub async fn black_hole() -> (u16, JoinHandle<()>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let handle = tokio::spawn(async move {
		let mut held = Vec::new();
		while let Ok((stream, _)) = listener.accept().await {
			held.push(stream);
		}
	});
	(port, handle)
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	listener.local_addr().unwrap().port()
}

pub fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
	ReconnectConfig {
		enabled: true,
		max_attempts,
		delay: Duration::from_millis(100),
	}
}

pub async fn wait_for_state(client: &ObsClient, state: LinkState) {
	let mut updates = client.status_updates();
	tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|status| status.state == state))
		.await
		.unwrap_or_else(|_| panic!("timed out waiting for {state:?}, status is {:?}", client.status()))
		.unwrap();
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
	while !condition() {
		assert!(tokio::time::Instant::now() < deadline, "condition not met within 5s");
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
}
