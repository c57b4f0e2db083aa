use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Hint Quiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::init_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::room_events,
        crate::routes::rooms::get_categories,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::CreateRoomResponse,
            crate::dto::room::InitRoomRequest,
            crate::dto::room::InitRoomResponse,
            crate::dto::room::CategoriesResponse,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::PlayerView,
            crate::dto::room::GuessView,
            crate::dto::room::RoundRecordView,
            crate::dto::ws::JoinedPayload,
            crate::state::state_machine::RoundStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room setup, state, WebSocket and spectator streams"),
    )
)]
pub struct ApiDoc;
