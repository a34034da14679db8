use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the estimation rooms backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::index,
        crate::routes::room::create_room,
        crate::routes::room::get_room,
        crate::routes::room::update_room,
        crate::routes::room::poll_room,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::IndexView,
            crate::dto::room::RoomView,
            crate::dto::room::ParticipantView,
            crate::dto::room::RoomUpdateForm,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "room", description = "Room lifecycle, updates and long polling"),
    )
)]
pub struct ApiDoc;
