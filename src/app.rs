use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin};
use crate::state::AppState;

/// Build the full router: public, protected (JWT) and elevated (admin) tiers.
pub fn app(state: AppState) -> Router {
    let max_upload = state.config.api.max_upload_bytes;

    let mut router = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state, max_upload))
        .merge(elevated_routes(&state))
        .layer(cors_layer(&state.config.security.cors_origins))
        .layer(RequestBodyLimitLayer::new(max_upload));

    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root::root))
        .route("/health", get(public::root::health))
        .route("/api/auth/register", post(public::auth::register))
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/logs", post(public::logs::ingest))
}

fn protected_routes(state: &AppState, max_upload: usize) -> Router<AppState> {
    use protected::{auth, patients, projects, protocols, recordings, sessions, stats};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/stats", get(stats::stats))
        // Projects
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/:id",
            get(projects::show).put(projects::update).delete(projects::delete),
        )
        .route("/api/projects/:id/restore", post(projects::restore))
        // Patients
        .route("/api/patients", get(patients::list).post(patients::create))
        .route(
            "/api/patients/:id",
            get(patients::show).put(patients::update).delete(patients::delete),
        )
        .route("/api/patients/:id/restore", post(patients::restore))
        .route(
            "/api/patients/:id/recordings",
            get(recordings::list)
                .post(recordings::upload)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        // Sessions
        .route("/api/sessions/:id", get(sessions::show))
        .route("/api/sessions/:id/status", patch(sessions::update_status))
        // Protocols
        .route("/api/protocols", get(protocols::list).post(protocols::create))
        .route("/api/protocols/validate", post(protocols::validate))
        .route(
            "/api/protocols/:id",
            get(protocols::show).put(protocols::update).delete(protocols::delete),
        )
        .route("/api/protocols/:id/restore", post(protocols::restore))
        .route("/api/protocols/:id/analysis-plan", get(protocols::analysis_plan))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn elevated_routes(state: &AppState) -> Router<AppState> {
    use elevated::users;

    Router::new()
        .route("/api/admin/users", get(users::list))
        .route("/api/admin/users/:id/approve", post(users::approve))
        .route("/api/admin/users/:id/role", put(users::set_role))
        // Layers run bottom-up: authenticate first, then check the role.
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}
