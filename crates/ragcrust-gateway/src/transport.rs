use std::convert::Infallible;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use ragcrust_agents::ReplyStream;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Forward reply fragments to the client as one chunked `text/plain` body,
/// each fragment written as soon as it is produced.
///
/// The body owns the receiving half of the reply channel, so a client
/// disconnect drops it and the generation task stops at its next send.
pub fn stream_reply(reply: ReplyStream, request_id: String) -> Response {
    let (rx, handle) = reply.into_parts();

    tokio::spawn(async move {
        match handle.await {
            Ok(report) => debug!(
                request_id = %request_id,
                winner = ?report.winner,
                model = ?report.model,
                fragments = report.fragments,
                cancelled = report.cancelled,
                timed_out = report.timed_out,
                "reply finished"
            ),
            Err(e) => warn!(request_id = %request_id, "generation task failed: {e}"),
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
