// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, certificate, discussion, exam, profile},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exam, certificates, discussion, profile, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, session store).
pub fn create_router(state: AppState) -> Router {
    let origins: [HeaderValue; 2] = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Exam session routes carry no auth middleware: identity is read
    // opportunistically at session start, and anonymous attempts are legal
    // (they just never persist anything).
    let exam_routes = Router::new()
        .route("/start", post(exam::start_exam))
        .route(
            "/session/{id}",
            get(exam::session_status).delete(exam::abandon),
        )
        .route("/session/{id}/answer", post(exam::answer))
        .route("/session/{id}/restart", post(exam::restart));

    let certificate_routes = Router::new()
        // Public verification lookup by certificate id.
        .route("/{id}", get(certificate::verify_certificate))
        .merge(
            Router::new()
                .route("/", get(certificate::list_my_certificates))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let discussion_routes = Router::new()
        .route("/posts", get(discussion::list_posts))
        .route("/posts/{id}", get(discussion::get_post))
        .route("/posts/{id}/replies", get(discussion::list_replies))
        // Protected discussion routes
        .merge(
            Router::new()
                .route("/posts", post(discussion::create_post))
                .route("/posts/{id}/replies", post(discussion::create_reply))
                .route("/progress", get(discussion::my_progress))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/{id}", delete(admin::delete_user))
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/questions/{id}", delete(admin::delete_question))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exam", exam_routes)
        .nest("/api/certificates", certificate_routes)
        .nest("/api/discussion", discussion_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
