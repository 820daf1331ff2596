//! Local HTTP responder for exercising the reqwest-based adapters without
//! network access.

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// One request as seen by [`serve`]
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Requests captured by [`serve`], in arrival order
pub type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

#[derive(Clone)]
struct Responder {
    replies: Arc<Mutex<VecDeque<(u16, String)>>>,
    captured: Captured,
}

/// Answer requests on a local port with the queued `(status, body)` pairs,
/// in order. Returns the base URL and the captured requests.
///
/// Once the queue is exhausted every request gets a 500.
pub async fn serve(responses: Vec<(u16, String)>) -> (String, Captured) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let responder = Responder {
        replies: Arc::new(Mutex::new(responses.into())),
        captured: captured.clone(),
    };
    let router = Router::new().fallback(respond).with_state(responder);

    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (format!("http://{}", addr), captured)
}

async fn respond(State(responder): State<Responder>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    responder.captured.lock().unwrap().push(CapturedRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let reply = responder.replies.lock().unwrap().pop_front();
    match reply {
        Some((status, body)) => (
            StatusCode::from_u16(status).unwrap(),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
