//! HTTP routes and the WebSocket push channel.
//!
//! Handlers only translate between JSON and the engine's operations; bodies
//! are decoded into typed requests and rejected here with a 400 before they
//! reach the engine.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fleetsim_engine::{Bot, Engine, EngineError, Snapshot, Task, TaskRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/api/bots", get(list_bots))
        .route("/api/tasks", get(list_tasks).post(submit_task))
        .route("/api/tasks/pop", post(pop_task))
        .route("/admin/state", get(full_state))
        .route("/admin/toggle", post(toggle))
        .route("/admin/interval", post(set_interval))
        .route("/admin/addTask", post(submit_task))
        .route("/ws", get(push_channel))
        .with_state(engine)
}

/// A request rejected at the boundary. Rendered as `400 {"error": ...}`.
#[derive(Debug)]
pub struct ApiError(String);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection.body_text())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

async fn list_bots(State(engine): State<Engine>) -> Json<Vec<Bot>> {
    Json(engine.bots())
}

async fn list_tasks(State(engine): State<Engine>) -> Json<Vec<Task>> {
    Json(engine.tasks())
}

async fn submit_task(
    State(engine): State<Engine>,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(engine.enqueue(request)?))
}

#[derive(Debug, Serialize)]
struct Popped {
    popped: Option<Task>,
}

async fn pop_task(State(engine): State<Engine>) -> Json<Popped> {
    Json(Popped {
        popped: engine.dequeue(),
    })
}

async fn full_state(State(engine): State<Engine>) -> Json<Snapshot> {
    Json(Snapshot::clone(&engine.snapshot()))
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    action: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    ok: bool,
    running: bool,
}

/// `"stop"` stops the engine. Anything else starts it, including a missing
/// or undecodable body.
async fn toggle(
    State(engine): State<Engine>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> Json<ToggleResponse> {
    let stop = matches!(&payload, Ok(Json(req)) if req.action.as_deref() == Some("stop"));
    if let Err(rejection) = &payload {
        tracing::debug!(%rejection, "toggle body ignored");
    }
    if stop {
        engine.stop();
    } else {
        engine.start();
    }
    Json(ToggleResponse {
        ok: true,
        running: engine.is_running(),
    })
}

#[derive(Debug, Deserialize)]
struct IntervalRequest {
    ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IntervalResponse {
    ok: bool,
    interval_ms: u64,
}

async fn set_interval(
    State(engine): State<Engine>,
    payload: Result<Json<IntervalRequest>, JsonRejection>,
) -> Result<Json<IntervalResponse>, ApiError> {
    let Json(request) = payload?;
    let ms = request.ms.ok_or_else(|| ApiError("invalid ms".into()))?;
    let interval = engine.reconfigure(ms)?;
    Ok(Json(IntervalResponse {
        ok: true,
        interval_ms: interval.as_millis() as u64,
    }))
}

async fn push_channel(ws: WebSocketUpgrade, State(engine): State<Engine>) -> Response {
    ws.on_upgrade(move |socket| stream_snapshots(socket, engine))
}

/// Wire envelope for one pushed snapshot.
#[derive(Serialize)]
struct StateFrame<'a> {
    event: &'static str,
    data: &'a Snapshot,
}

fn state_frame(snapshot: &Snapshot) -> serde_json::Result<String> {
    serde_json::to_string(&StateFrame {
        event: "state",
        data: snapshot,
    })
}

/// Forward every snapshot to one WebSocket client until either side hangs up.
async fn stream_snapshots(mut socket: WebSocket, engine: Engine) {
    let mut subscription = engine.subscribe();
    let id = subscription.id();
    tracing::debug!(%id, "push channel opened");

    loop {
        tokio::select! {
            next = subscription.recv() => {
                let Some(snapshot) = next else { break };
                let frame = match state_frame(&snapshot) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(%id, %err, "failed to encode snapshot");
                        continue;
                    }
                };
                if let Err(err) = socket.send(Message::Text(frame.into())).await {
                    tracing::debug!(%id, %err, "push delivery failed");
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    engine.unsubscribe(id);
    tracing::debug!(%id, "push channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use fleetsim_engine::EngineConfig;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn engine() -> Engine {
        Engine::new(EngineConfig {
            seed: Some(7),
            autostart: false,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(engine: &Engine, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(engine.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn lists_bots_and_tasks() {
        let engine = engine();
        let (status, bots) = call(&engine, get_req("/api/bots")).await;
        assert_eq!(status, StatusCode::OK);
        let bots = bots.as_array().unwrap();
        assert_eq!(bots.len(), 10);
        assert_eq!(bots[0]["id"], "bot-1");
        assert_eq!(bots[0]["name"], "BOT-101");
        assert!(bots[0]["x"].is_number());

        let (status, tasks) = call(&engine, get_req("/api/tasks")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tasks.as_array().unwrap().len(), 4);
        assert_eq!(tasks[0]["id"], "task-1");
    }

    #[tokio::test]
    async fn submit_creates_task() {
        let engine = engine();
        let (status, task) = call(
            &engine,
            post_json(
                "/api/tasks",
                json!({ "type": "move", "priority": "low", "from": "A2", "comments": "rush" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["type"], "move");
        assert_eq!(task["priority"], "low");
        assert_eq!(task["from"], "A2");
        assert!(task["createdAt"].is_u64());
        assert_eq!(engine.tasks().len(), 5);
    }

    #[tokio::test]
    async fn submit_rejects_missing_or_invalid_fields() {
        let engine = engine();
        for body in [
            json!({ "type": "pickup" }),
            json!({ "priority": "high" }),
            json!({ "type": "teleport", "priority": "high" }),
            json!({ "type": "drop", "priority": "whenever" }),
            json!({ "type": 3, "priority": "high" }),
        ] {
            let (status, err) = call(&engine, post_json("/api/tasks", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(err["error"].is_string());
        }
        assert_eq!(engine.tasks().len(), 4);
    }

    #[tokio::test]
    async fn submit_rejects_non_json_body() {
        let engine = engine();
        let request = Request::post("/api/tasks")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, err) = call(&engine, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(err["error"].is_string());
    }

    #[tokio::test]
    async fn admin_add_task_matches_submit() {
        let engine = engine();
        let (status, task) = call(
            &engine,
            post_json("/admin/addTask", json!({ "type": "drop", "priority": "high" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["type"], "drop");

        let (status, _) = call(&engine, post_json("/admin/addTask", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pop_drains_in_fifo_order_then_returns_null() {
        let engine = engine();
        for expected in ["task-1", "task-2", "task-3", "task-4"] {
            let (status, body) = call(&engine, post_empty("/api/tasks/pop")).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["popped"]["id"], expected);
        }
        let (_, body) = call(&engine, post_empty("/api/tasks/pop")).await;
        assert_eq!(body, json!({ "popped": null }));
    }

    #[tokio::test]
    async fn full_state_has_bots_tasks_and_tick() {
        let engine = engine();
        engine.step();
        let (status, state) = call(&engine, get_req("/admin/state")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state["tick"], 1);
        assert_eq!(state["bots"].as_array().unwrap().len(), 10);
        assert_eq!(state["tasks"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn toggle_starts_and_stops() {
        let engine = engine();
        let (_, body) = call(&engine, post_json("/admin/toggle", json!({ "action": "start" }))).await;
        assert_eq!(body, json!({ "ok": true, "running": true }));
        assert!(engine.is_running());

        let (_, body) = call(&engine, post_json("/admin/toggle", json!({ "action": "stop" }))).await;
        assert_eq!(body, json!({ "ok": true, "running": false }));
        assert!(!engine.is_running());

        let (status, body) = call(&engine, post_empty("/admin/toggle")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], true);
        assert!(engine.is_running());
        engine.stop();
    }

    #[tokio::test]
    async fn toggle_treats_undecodable_body_as_start() {
        let engine = engine();
        let (status, body) = call(&engine, post_json("/admin/toggle", json!({ "action": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "running": true }));
        assert!(engine.is_running());
        engine.stop();

        let request = Request::post("/admin/toggle")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = call(&engine, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "running": true }));
        assert!(engine.is_running());
        engine.stop();
    }

    #[tokio::test]
    async fn interval_accepts_valid_values() {
        let engine = engine();
        let (status, body) = call(&engine, post_json("/admin/interval", json!({ "ms": 500 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "intervalMs": 500 }));
        assert_eq!(engine.interval(), Duration::from_millis(500));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn interval_rejects_short_or_non_numeric_values() {
        let engine = engine();
        for body in [
            json!({ "ms": 99 }),
            json!({ "ms": 0 }),
            json!({ "ms": "fast" }),
            json!({ "ms": -200 }),
            json!({}),
        ] {
            let (status, err) = call(&engine, post_json("/admin/interval", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(err["error"].is_string());
        }
        assert_eq!(engine.interval(), Duration::from_secs(10));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn state_frame_wraps_snapshot() {
        let engine = engine();
        let frame: Value = serde_json::from_str(&state_frame(&engine.snapshot()).unwrap()).unwrap();
        assert_eq!(frame["event"], "state");
        assert_eq!(frame["data"]["tick"], 0);
        assert_eq!(frame["data"]["bots"].as_array().unwrap().len(), 10);
    }

    fn read_frame<S>(socket: &mut tungstenite::WebSocket<S>) -> Value
    where
        S: std::io::Read + std::io::Write,
    {
        loop {
            if let tungstenite::Message::Text(text) = socket.read().unwrap() {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn push_channel_streams_in_order_and_detaches_on_close() {
        let engine = engine();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(engine.clone());
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let client_engine = engine.clone();
        let frames = tokio::task::spawn_blocking(move || {
            let url = format!("ws://{addr}/ws");
            let (mut socket, _) = tungstenite::connect(url.as_str()).unwrap();
            let mut frames = vec![read_frame(&mut socket)];
            assert_eq!(client_engine.subscriber_count(), 1);
            client_engine.step();
            client_engine.step();
            frames.push(read_frame(&mut socket));
            frames.push(read_frame(&mut socket));
            socket.close(None).unwrap();
            while socket.read().is_ok() {}
            frames
        })
        .await
        .unwrap();

        assert!(frames.iter().all(|f| f["event"] == "state"));
        let ticks: Vec<_> = frames.iter().map(|f| f["data"]["tick"].clone()).collect();
        assert_eq!(ticks, vec![json!(0), json!(1), json!(2)]);
        assert_eq!(frames[0]["data"]["tasks"].as_array().unwrap().len(), 4);

        for _ in 0..200 {
            if engine.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.subscriber_count(), 0);
        server.abort();
    }
}
