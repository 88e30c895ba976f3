//! Throwaway HTTP servers standing in for provider APIs.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::stream;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A streamed body that arrives in `piece`-byte chunks, so events straddle
/// chunk boundaries.
pub fn chunked(content_type: &'static str, body: String, piece: usize) -> Response {
    let pieces: Vec<Result<Vec<u8>, Infallible>> = body
        .into_bytes()
        .chunks(piece)
        .map(|c| Ok(c.to_vec()))
        .collect();
    (
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(stream::iter(pieces)),
    )
        .into_response()
}

/// SSE body of OpenAI-style chat chunks followed by `[DONE]`.
pub fn openai_sse(fragments: &[&str]) -> String {
    let mut body = String::new();
    for f in fragments {
        let chunk = serde_json::json!({"choices": [{"index": 0, "delta": {"content": f}}]});
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
