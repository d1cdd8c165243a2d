use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::Extension,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn health(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<JsonValue>, ApiError> {
    Ok(Json(json!({
        "status": "ok",
        "events": services.event_count()?,
        "timestamp": Utc::now(),
    })))
}

/// Server-sent change notifications, one per committed event.
///
/// Slow clients that fall behind the channel skip the missed messages.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
