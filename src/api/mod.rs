// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::any::Any;
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tracing::error;

use crate::{
    auth::middleware::auth_gateway,
    auth::{AuthDispatcher, AuthError, AuthenticatedIdentity},
    state::AppState,
};

pub mod auth;
pub mod did;
pub mod status;

/// Build the HTTP application. Every route sits behind the authentication
/// gateway; the gateway's exempt table decides which ones are public.
pub fn router(state: AppState) -> Router {
    let dispatcher = state.dispatcher.clone();

    let routes = Router::new()
        .route("/", get(status::root))
        .route("/agents/example/ad.json", get(status::agent_description))
        .route("/auth/did-wba", post(auth::did_wba_auth))
        .route("/auth/verify", get(auth::verify_token))
        .route("/wba/test", get(auth::wba_test))
        .route("/wba/user/{user_id}/did.json", get(did::get_did_document))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));

    with_layers(routes, dispatcher)
}

/// Wrap routes in the gateway and the shared tower-http stack.
fn with_layers(routes: Router, dispatcher: Arc<AuthDispatcher>) -> Router {
    routes
        .layer(from_fn_with_state(dispatcher, auth_gateway))
        .layer(CatchPanicLayer::custom(internal_failure))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Render a handler panic as the generic internal error.
fn internal_failure(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "Request handler panicked");

    AuthError::Internal(detail).into_response()
}

#[derive(OpenApi)]
#[openapi(
    paths(
        status::root,
        status::agent_description,
        auth::did_wba_auth,
        auth::verify_token,
        auth::wba_test,
        did::get_did_document
    ),
    components(
        schemas(
            status::RootResponse,
            status::AgentDescription,
            status::AgentEndpoints,
            auth::TokenResponse,
            auth::VerifyResponse,
            AuthenticatedIdentity
        )
    ),
    tags(
        (name = "Status", description = "Service status and agent description"),
        (name = "Authentication", description = "DID WBA authentication and bearer tokens"),
        (name = "DID", description = "Hosted DID documents")
    )
)]
struct ApiDoc;
