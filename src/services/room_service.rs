use axum::http::{HeaderMap, header};
use tracing::info;

use crate::{
    dao::persons::MIX_CATEGORY,
    dto::{
        room::{
            CategoriesResponse, CreateRoomRequest, CreateRoomResponse, InitRoomRequest,
            InitRoomResponse, RoomSnapshot,
        },
        validation::validate_secret,
    },
    error::ServiceError,
    state::{SharedState, room::random_token},
};

/// Length of generated room ids.
pub const ROOM_ID_LEN: usize = 6;
/// Length of generated host keys.
pub const HOST_KEY_LEN: usize = 8;

/// Create a room under a fresh id and host key, then initialize it.
///
/// `origin` prefixes the invite link; without it the link is relative.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
    origin: Option<String>,
) -> Result<CreateRoomResponse, ServiceError> {
    let room_id = random_token(ROOM_ID_LEN);
    let host_key = random_token(HOST_KEY_LEN);
    let (total_rounds, category) = resolve_setup(state, request.total_rounds, request.category);

    let room_id = state
        .room(&room_id)
        .init(host_key.clone(), total_rounds, category)
        .await?;
    info!(%room_id, "room created through REST");
    let invite_url = invite_url(origin.as_deref(), &room_id);
    Ok(CreateRoomResponse {
        room_id,
        host_key,
        invite_url,
    })
}

/// Origin the caller reached us through: the `Origin` header, else `http://` plus `Host`.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let header_value = |name| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && *value != "null")
    };
    header_value(header::ORIGIN)
        .map(str::to_string)
        .or_else(|| header_value(header::HOST).map(|host| format!("http://{host}")))
}

fn invite_url(origin: Option<&str>, room_id: &str) -> String {
    let origin = origin.map(|origin| origin.trim_end_matches('/')).unwrap_or_default();
    format!("{origin}/room/{room_id}")
}

/// Initialize `room_id`; a room that already exists is left untouched.
pub async fn init_room(
    state: &SharedState,
    room_id: String,
    request: InitRoomRequest,
) -> Result<InitRoomResponse, ServiceError> {
    validate_secret(&room_id)
        .map_err(|_| ServiceError::InvalidInput("room id must be a non-blank token".into()))?;
    let host_key = request.host_key.trim().to_string();
    let (total_rounds, category) = resolve_setup(state, request.total_rounds, request.category);

    let room_id = state
        .room(&room_id)
        .init(host_key, total_rounds, category)
        .await?;
    Ok(InitRoomResponse { room_id })
}

/// Current snapshot of `room_id`, after applying any overdue timeout.
pub async fn room_state(state: &SharedState, room_id: String) -> Result<RoomSnapshot, ServiceError> {
    validate_secret(&room_id)
        .map_err(|_| ServiceError::NotFound(format!("room `{room_id}` not found")))?;
    state
        .room(&room_id)
        .snapshot()
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
}

/// Category codes available to rooms.
pub async fn categories(state: &SharedState) -> Result<CategoriesResponse, ServiceError> {
    let categories = state.persons().categories().await?;
    Ok(CategoriesResponse { categories })
}

fn resolve_setup(
    state: &SharedState,
    total_rounds: Option<u32>,
    category: Option<String>,
) -> (u32, String) {
    let total_rounds = total_rounds.unwrap_or(state.config().room_defaults().total_rounds);
    let category = category
        .map(|code| code.trim().to_lowercase())
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| MIX_CATEGORY.to_string());
    (total_rounds, category)
}
