use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use ssc_signal::{
    commands::router, ChannelService, IceCandidate, SessionDescription, TransportEngine,
    TransportError, TransportEvents, TransportFactory,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const OFFER_SDP: &str = "v=0\r\no=- 42 2 IN IP4 127.0.0.1\r\ns=-\r\n";

/// Engine that gathers two host candidates as soon as it is opened
struct ScriptedTransport {
    events: TransportEvents,
    remote: Mutex<Option<SessionDescription>>,
    reject_remote: bool,
}

#[async_trait]
impl TransportEngine for ScriptedTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        Ok(SessionDescription::offer(OFFER_SDP))
    }

    async fn set_local_description(&self, _: SessionDescription) -> Result<(), TransportError> {
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        if self.reject_remote {
            return Err(TransportError::Rejected("malformed answer".into()));
        }
        *self.remote.lock() = Some(description);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedFactory {
    reject_remote: bool,
    opened: Mutex<Vec<Arc<ScriptedTransport>>>,
}

#[async_trait]
impl TransportFactory for ScriptedFactory {
    async fn open(
        &self,
        events: TransportEvents,
    ) -> Result<Arc<dyn TransportEngine>, TransportError> {
        for (i, ip) in ["192.168.1.10", "10.0.0.3"].iter().enumerate() {
            events.candidate_discovered(IceCandidate {
                candidate: format!("candidate:{i} 1 udp 2122260223 {ip} 5000{i} typ host"),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
            });
        }
        events.gathering_complete();

        let transport = Arc::new(ScriptedTransport {
            events,
            remote: Mutex::new(None),
            reject_remote: self.reject_remote,
        });
        self.opened.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}

fn app(factory: Arc<ScriptedFactory>) -> Router {
    router(ChannelService::new(factory, Duration::from_secs(5)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_raw(app, method, uri, body.map(|value| value.to_string())).await
}

async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(text) => {
            request = request.header("content-type", "application/json");
            Body::from(text)
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn answer_body() -> Value {
    json!({
        "answer": { "type": "answer", "sdp": "v=0\r\n" },
        "ice_candidates": [
            { "candidate": "candidate:9 1 udp 1 203.0.113.5 40000 typ srflx", "sdpMLineIndex": 0 }
        ]
    })
}

#[tokio::test]
async fn create_answer_open_close_scenario() {
    let factory = Arc::new(ScriptedFactory::default());
    let app = app(factory.clone());

    let (status, created) = send(&app, "POST", "/channels", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], true);
    assert_eq!(created["offer"], json!({ "type": "offer", "sdp": OFFER_SDP }));
    let candidates = created["ice_candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 2);
    assert!(candidates[0]["candidate"].as_str().unwrap().contains("192.168.1.10"));
    assert!(candidates[1]["candidate"].as_str().unwrap().contains("10.0.0.3"));
    assert_eq!(candidates[0]["sdpMLineIndex"], 0);

    let channel_id = created["channel_id"].as_str().unwrap().to_string();
    assert_eq!(channel_id.len(), 12);

    let (status, body) = send(&app, "GET", &format!("/channels/{channel_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "WAITING_FOR_ANSWER");

    let uri = format!("/channels/{channel_id}/answer");
    let (status, body) = send(&app, "POST", &uri, Some(answer_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    let transport = Arc::clone(&factory.opened.lock()[0]);
    assert_eq!(
        transport.remote.lock().clone(),
        Some(SessionDescription::answer("v=0\r\n"))
    );

    transport.events.channel_open();
    let status_uri = format!("/channels/{channel_id}");
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let (_, body) = send(&app, "GET", &status_uri, None).await;
            if body["status"] == "CHANNEL_ESTABLISHED" {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("channel never reached CHANNEL_ESTABLISHED");

    let close_uri = format!("/channels/{channel_id}/close");
    let (status, body) = send(&app, "POST", &close_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = send(&app, "POST", &close_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "reason": "channel not found" }));

    let (status, _) = send(&app, "POST", &uri, Some(answer_body())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_answer_is_a_bad_request() {
    let app = app(Arc::new(ScriptedFactory::default()));
    let (_, created) = send(&app, "POST", "/channels", None).await;
    let uri = format!("/channels/{}/answer", created["channel_id"].as_str().unwrap());

    let (status, _) = send(&app, "POST", &uri, Some(answer_body())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", &uri, Some(answer_body())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "success": false, "reason": "channel is not waiting for answer" })
    );
}

#[tokio::test]
async fn unknown_channels_return_not_found() {
    let app = app(Arc::new(ScriptedFactory::default()));

    let (status, body) = send(&app, "POST", "/channels/missing/answer", Some(answer_body())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "channel not found");

    let (status, _) = send(&app, "POST", "/channels/missing/close", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/channels/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health, json!({ "status": "ok", "channels": 0 }));
}

#[tokio::test]
async fn unreadable_answers_check_the_channel_first() {
    let app = app(Arc::new(ScriptedFactory::default()));
    let garbage = Some("{ not json".to_string());

    let (status, body) = send_raw(&app, "POST", "/channels/missing/answer", garbage.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "reason": "channel not found" }));

    let (_, created) = send(&app, "POST", "/channels", None).await;
    let channel_id = created["channel_id"].as_str().unwrap();
    let uri = format!("/channels/{channel_id}/answer");

    let (status, body) = send_raw(&app, "POST", &uri, garbage).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "reason": "malformed request body" }));

    // the channel still takes a proper answer afterwards
    let (status, _) = send(&app, "POST", &uri, Some(answer_body())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn engine_rejection_is_a_server_error() {
    let factory = Arc::new(ScriptedFactory {
        reject_remote: true,
        ..Default::default()
    });
    let app = app(factory);
    let (_, created) = send(&app, "POST", "/channels", None).await;
    let channel_id = created["channel_id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/channels/{channel_id}/answer"),
        Some(answer_body()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("malformed answer"));

    // the transition happened before the engine call
    let (_, body) = send(&app, "GET", &format!("/channels/{channel_id}"), None).await;
    assert_eq!(body["status"], "ANSWERED");
}
