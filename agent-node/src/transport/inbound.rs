use std::sync::Arc;

use rst_common::standard::serde_json::{self, Value};
use rst_common::with_http_tokio::axum::body::Bytes;
use rst_common::with_http_tokio::axum::extract::State;
use rst_common::with_http_tokio::axum::http::{header, StatusCode};
use rst_common::with_http_tokio::axum::response::{IntoResponse, Response};
use rst_common::with_http_tokio::axum::routing::post;
use rst_common::with_http_tokio::axum::Router;
use rst_common::with_logging::log::{debug, warn};

use prople_agent_core::agent::Agent;
use prople_agent_core::storage::StorageBuilder;
use prople_agent_core::transport::TransportSession;

use super::session::HttpSession;
use super::DIDCOMM_CONTENT_TYPE;

/// `routes` mounts the inbound endpoint on `/`
pub fn routes<TStorage>(agent: Agent<TStorage>) -> Router
where
    TStorage: StorageBuilder,
{
    Router::new()
        .route("/", post(receive::<TStorage>))
        .with_state(agent)
}

/// `receive` hands one envelope to the agent, answering with the reply written to the
/// request session when the sender asked for a return route
pub async fn receive<TStorage>(State(agent): State<Agent<TStorage>>, body: Bytes) -> Response
where
    TStorage: StorageBuilder,
{
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("http inbound: invalid payload: {}", err);
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    let session = Arc::new(HttpSession::new());
    let transport_session: Arc<dyn TransportSession> = session.clone();
    if let Err(err) = agent.receive_message(raw, Some(transport_session)).await {
        warn!("http inbound: message dropped: {}", err);
    }

    match session.take_reply().await {
        Some(reply) => match serde_json::to_vec(&reply) {
            Ok(body) => {
                debug!("http inbound: answer on return route {}", session.id());
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, DIDCOMM_CONTENT_TYPE)],
                    body,
                )
                    .into_response()
            }
            Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        },
        None => StatusCode::OK.into_response(),
    }
}
