use utoipa::OpenApi;

use crate::api::handlers::{auth, envelope, health, users};

/// `OpenAPI` document served at `/api-docs/openapi.json` and by swagger-ui.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signin,
        auth::signup,
        auth::logout,
        auth::signin_token,
        users::available,
        users::get_user,
        users::create_user,
        users::list_users,
        users::update_user,
        users::update_me,
        users::delete_user,
    ),
    components(schemas(
        envelope::Envelope,
        envelope::ErrorCode,
        auth::SigninRequest,
        auth::SignupRequest,
    )),
    tags(
        (name = "users", description = "Admin-gated CRUD on user records"),
        (name = "auth", description = "Sign-in, sign-up, logout and sessions"),
        (name = "health", description = "Build metadata"),
    )
)]
pub struct ApiDoc;
