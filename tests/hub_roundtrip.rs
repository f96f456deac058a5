//! Drives the blocking client over real TCP against an axum mock hub.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use constellation_http::client::{
    ClientConfig, ConstellationClient, MessageHandler, StateObjectPush,
};
use constellation_http::types::{MessageContext, ScopeType, StateObjectFilter};
use constellation_http::ConstellationError;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const ACCESS_KEY: &str = "secret";
const MSG_ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";
const SO_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

#[derive(Default)]
struct HubState {
    messages: VecDeque<Value>,
    state_objects: VecDeque<Value>,
    logs: Vec<(String, String)>,
    posts: Vec<(String, Value)>,
}

#[derive(Clone, Default)]
struct Hub(Arc<Mutex<HubState>>);

impl Hub {
    fn with<R>(&self, f: impl FnOnce(&mut HubState) -> R) -> R {
        let mut state = self.0.lock().unwrap();
        f(&mut state)
    }
}

#[derive(Clone, Copy)]
enum Feed {
    Messages,
    StateObjects,
}

async fn long_poll(hub: &Hub, feed: Feed, args: &HashMap<String, String>) -> Vec<Value> {
    let timeout: u64 = args.get("timeout").and_then(|t| t.parse().ok()).unwrap_or(1000);
    let limit: usize = args.get("limit").and_then(|l| l.parse().ok()).unwrap_or(1);
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout);
    loop {
        let batch = hub.with(|state| {
            let queue = match feed {
                Feed::Messages => &mut state.messages,
                Feed::StateObjects => &mut state.state_objects,
            };
            let n = limit.min(queue.len());
            queue.drain(..n).collect::<Vec<_>>()
        });
        if !batch.is_empty() || tokio::time::Instant::now() >= deadline {
            return batch;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn handle_get(
    State(hub): State<Hub>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Query(args): Query<HashMap<String, String>>,
) -> Response {
    let authorized = headers.get("AccessKey").and_then(|v| v.to_str().ok()) == Some(ACCESS_KEY);
    let renewing = args.contains_key("subscriptionId");

    match method.as_str() {
        "SubscribeToMessage" | "SubscribeToStateObjects" if !renewing => {
            if !authorized {
                return Json(Value::Null).into_response();
            }
            let id = if method == "SubscribeToMessage" { MSG_ID } else { SO_ID };
            Json(id).into_response()
        }
        "SubscribeToMessage" | "SubscribeToStateObjects" | "SubscribeToMessageGroup" => {
            StatusCode::OK.into_response()
        }
        "GetMessages" => Json(long_poll(&hub, Feed::Messages, &args).await).into_response(),
        "GetStateObjects" => Json(long_poll(&hub, Feed::StateObjects, &args).await).into_response(),
        "WriteLog" => {
            hub.with(|state| {
                state.logs.push((
                    args.get("level").cloned().unwrap_or_default(),
                    args.get("message").cloned().unwrap_or_default(),
                ))
            });
            StatusCode::NO_CONTENT.into_response()
        }
        "SendMessage" => {
            if let Some(saga_id) = args.get("sagaId") {
                let data: Value = args
                    .get("data")
                    .and_then(|d| serde_json::from_str(d).ok())
                    .unwrap_or(Value::Null);
                hub.with(|state| {
                    state.messages.push_back(json!({
                        "Key": "__Response",
                        "Data": data,
                        "Scope": { "Scope": 2, "Args": [], "SagaId": saga_id },
                        "Sender": { "Type": 2, "FriendlyName": "Calculator", "ConnectionId": "pkg-1" }
                    }))
                });
            }
            StatusCode::NO_CONTENT.into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn handle_post(
    State(hub): State<Hub>,
    Path(method): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    if method == "PushStateObject" {
        let mut state_object = body.clone();
        state_object["SentinelName"] = json!("ESP");
        state_object["PackageName"] = json!("Sensor");
        hub.with(|state| {
            state
                .state_objects
                .push_back(json!({ "StateObject": state_object }))
        });
    }
    hub.with(|state| state.posts.push((method, body)));
    StatusCode::NO_CONTENT
}

fn spawn_hub() -> (SocketAddr, Hub) {
    let hub = Hub::default();
    let app = Router::new()
        .route("/rest/constellation/{method}", get(handle_get).post(handle_post))
        .with_state(hub.clone());

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    (rx.recv().unwrap(), hub)
}

fn client_for(addr: SocketAddr, access_key: &str) -> ConstellationClient {
    let config = ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        ..Default::default()
    }
    .with_identity("ESP", "Sensor", access_key)
    .with_request_timeout(Duration::from_secs(2));
    ConstellationClient::with_tcp(config)
}

fn poll_until(client: &mut ConstellationClient, done: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let _ = client.poll_with(200, 5);
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_saga_reply_over_tcp() {
    let (addr, _hub) = spawn_hub();
    let mut client = client_for(addr, ACCESS_KEY);
    let replies = Rc::new(RefCell::new(Vec::new()));
    let sink = replies.clone();

    client.subscribe_to_message().unwrap();
    assert_eq!(client.message_subscription_id(), Some(MSG_ID));

    client
        .send_message_with_saga(
            MessageHandler::plain(move |item| sink.borrow_mut().push(item["Data"].clone())),
            ScopeType::Package,
            "Calculator",
            "Add",
            &json!([1, 2]),
        )
        .unwrap();

    assert!(poll_until(&mut client, || !replies.borrow().is_empty()));
    assert_eq!(*replies.borrow(), vec![json!([1, 2])]);
    assert_eq!(client.registry().pending_sagas(), 0);
}

#[test]
fn test_state_object_link_over_tcp() {
    let (addr, _hub) = spawn_hub();
    let mut client = client_for(addr, ACCESS_KEY);
    let values = Rc::new(RefCell::new(Vec::new()));
    let sink = values.clone();

    client
        .register_state_object_link(
            &StateObjectFilter::new("ESP", "Sensor").with_name("Temperature"),
            move |so| sink.borrow_mut().push(so["Value"].clone()),
        )
        .unwrap();
    assert_eq!(client.state_object_subscription_id(), Some(SO_ID));

    client
        .push_state_object(&StateObjectPush::new("Humidity", 40))
        .unwrap();
    client
        .push_state_object(&StateObjectPush::new("Temperature", 21.5))
        .unwrap();

    assert!(poll_until(&mut client, || !values.borrow().is_empty()));
    assert_eq!(*values.borrow(), vec![json!(21.5)]);
}

#[test]
fn test_saga_response_is_posted_to_sender() {
    let (addr, hub) = spawn_hub();
    let mut client = client_for(addr, ACCESS_KEY);
    let asked: Rc<RefCell<Option<MessageContext>>> = Rc::new(RefCell::new(None));
    let slot = asked.clone();

    client
        .register_message_callback(
            "Ask",
            MessageHandler::with_context(move |_, ctx| *slot.borrow_mut() = Some(ctx.clone())),
        )
        .unwrap();
    hub.with(|state| {
        state.messages.push_back(json!({
            "Key": "Ask",
            "Data": [],
            "Scope": { "Scope": 2, "Args": ["Sensor"], "SagaId": "saga-7" },
            "Sender": { "Type": 0, "FriendlyName": "Console", "ConnectionId": "conn-3" }
        }))
    });

    assert!(poll_until(&mut client, || asked.borrow().is_some()));
    let ctx = asked.borrow().clone().unwrap();
    assert!(ctx.is_saga);

    client.send_response(&ctx, json!({ "Answer": 42 })).unwrap();
    let (method, body) = hub.with(|state| state.posts.last().cloned()).unwrap();
    assert_eq!(method, "SendMessage");
    assert_eq!(
        body,
        json!({
            "Key": "__Response",
            "Data": { "Answer": 42 },
            "Scope": { "SagaId": "saga-7", "Scope": 2, "Args": ["conn-3"] }
        })
    );
}

#[test]
fn test_write_log_is_decoded_by_hub() {
    let (addr, hub) = spawn_hub();
    let mut client = client_for(addr, ACCESS_KEY);

    client.write_warn("low battery: 5% & falling").unwrap();
    client.write_info("ok").unwrap();

    let logs = hub.with(|state| state.logs.clone());
    assert_eq!(
        logs,
        vec![
            ("Warn".to_string(), "low battery: 5% & falling".to_string()),
            ("Info".to_string(), "ok".to_string()),
        ]
    );
}

#[test]
fn test_refused_credentials() {
    let (addr, _hub) = spawn_hub();
    let mut client = client_for(addr, "wrong");

    let err = client.subscribe_to_message().unwrap_err();
    assert!(matches!(err, ConstellationError::Credential));
    assert!(!err.is_retryable());
    assert_eq!(client.poll().unwrap(), 0);
}

#[test]
fn test_saga_reply_without_prior_subscription() {
    let (addr, _hub) = spawn_hub();
    let mut client = client_for(addr, ACCESS_KEY);
    let replies = Rc::new(RefCell::new(Vec::new()));
    let sink = replies.clone();

    client
        .send_message_with_saga(
            MessageHandler::plain(move |item| sink.borrow_mut().push(item["Data"].clone())),
            ScopeType::Package,
            "Calculator",
            "Echo",
            &json!(["ping"]),
        )
        .unwrap();
    assert_eq!(client.message_subscription_id(), Some(MSG_ID));

    assert!(poll_until(&mut client, || !replies.borrow().is_empty()));
    assert_eq!(*replies.borrow(), vec![json!(["ping"])]);
}
