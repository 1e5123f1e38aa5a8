//! HTTP front-end of the coordinator, for callers that are not
//! themselves Rust clients: a read and a write endpoint mirroring the
//! coordinator API. Errors surface as 500 with a plaintext message.

use crate::{Coordinator, Error};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use register::{ValueVersion, WriteRequest};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(coordinator: Arc<Coordinator>) -> axum::Router {
    axum::Router::new()
        .route("/read", get(read))
        .route("/write", post(write))
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

#[derive(Debug, serde::Deserialize)]
struct ReadParams {
    address: String,
}

async fn read(
    State(coordinator): State<Arc<Coordinator>>,
    Query(ReadParams { address }): Query<ReadParams>,
) -> Result<axum::Json<ValueVersion>, Error> {
    Ok(axum::Json(coordinator.read(&address).await?))
}

async fn write(
    State(coordinator): State<Arc<Coordinator>>,
    axum::Json(WriteRequest { address, value }): axum::Json<WriteRequest>,
) -> Result<(), Error> {
    coordinator.write(&address, &value).await
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            self.to_string(),
        )
            .into_response()
    }
}
