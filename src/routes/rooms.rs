use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
    routing::{get, post},
};
use axum_valid::Valid;
use futures::Stream;
use tracing::info;

use crate::{
    dto::room::{
        CategoriesResponse, CreateRoomRequest, CreateRoomResponse, InitRoomRequest,
        InitRoomResponse, RoomSnapshot,
    },
    error::AppError,
    services::{room_service, sse_service},
    state::SharedState,
};

/// Routes handling room setup and inspection.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/init", post(init_room))
        .route("/rooms/{id}/events", get(room_events))
        .route("/categories", get(get_categories))
}

/// Create a room with a generated id and host key.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = CreateRoomResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "No person available for the category"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    let origin = room_service::request_origin(&headers);
    let created = room_service::create_room(&state, payload, origin).await?;
    Ok(Json(created))
}

/// Initialize a room under a caller-chosen id. Idempotent.
#[utoipa::path(
    post,
    path = "/rooms/{id}/init",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room")),
    request_body = InitRoomRequest,
    responses(
        (status = 200, description = "Room ready", body = InitRoomResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "No person available for the category"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn init_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<InitRoomRequest>>,
) -> Result<Json<InitRoomResponse>, AppError> {
    let response = room_service::init_room(&state, id, payload).await?;
    Ok(Json(response))
}

/// Return the room snapshot after applying an overdue round timeout.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Current room state", body = RoomSnapshot),
        (status = 404, description = "Unknown room"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = room_service::room_state(&state, id).await?;
    Ok(Json(snapshot))
}

/// Stream `roomUpdate` and `guessResult` events to spectators.
#[utoipa::path(
    get,
    path = "/rooms/{id}/events",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room")),
    responses((status = 200, description = "Room SSE stream", content_type = "text/event-stream", body = String))
)]
pub async fn room_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (initial, receiver) = sse_service::subscribe_room(&state, &id).await?;
    info!(room_id = %id, "new room SSE connection");
    Ok(sse_service::to_sse_stream(id, initial, receiver))
}

/// List the categories rooms can draw from.
#[utoipa::path(
    get,
    path = "/categories",
    tag = "rooms",
    responses((status = 200, description = "Known categories", body = CategoriesResponse))
)]
pub async fn get_categories(
    State(state): State<SharedState>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let response = room_service::categories(&state).await?;
    Ok(Json(response))
}
