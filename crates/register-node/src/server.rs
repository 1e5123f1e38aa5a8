//! HTTP surface of a replica node.
//!
//! Thin translation between the wire DTOs and `Node`: errors surface as
//! 500 with the error text as a plaintext body, unknown paths as 404, and
//! wrong methods as 405.

use crate::{Error, Node};
use axum::extract::{Query, State};
use axum::routing::{get, post, put};
use register::{ConfirmRequest, ReadResponse, UpdateRequest, WriteRequest, WriteResponse};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(node: Arc<Node>) -> axum::Router {
    axum::Router::new()
        .route("/read", get(read))
        .route("/write", post(write))
        .route("/confirm", put(confirm))
        .route("/update", put(update))
        .layer(TraceLayer::new_for_http())
        .with_state(node)
}

#[derive(Debug, serde::Deserialize)]
struct ReadParams {
    address: String,
}

async fn read(
    State(node): State<Arc<Node>>,
    Query(ReadParams { address }): Query<ReadParams>,
) -> Result<axum::Json<ReadResponse>, Error> {
    Ok(axum::Json(node.read(&address)?))
}

async fn write(
    State(node): State<Arc<Node>>,
    axum::Json(WriteRequest { address, value }): axum::Json<WriteRequest>,
) -> Result<axum::Json<WriteResponse>, Error> {
    Ok(axum::Json(node.write(&address, &value)?))
}

async fn confirm(
    State(node): State<Arc<Node>>,
    axum::Json(ConfirmRequest { address }): axum::Json<ConfirmRequest>,
) -> Result<(), Error> {
    node.confirm(&address)
}

async fn update(
    State(node): State<Arc<Node>>,
    axum::Json(UpdateRequest {
        address,
        value,
        version,
    }): axum::Json<UpdateRequest>,
) {
    node.update(&address, &value, version)
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
