use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    delete_certificate_handler, get_certificate_handler, health_handler,
    request_certificate_handler,
};
use crate::lifecycle::LifecycleManager;

#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<LifecycleManager>,
}

pub fn build_router(manager: Arc<LifecycleManager>) -> Router {
    let state = ApiState { manager };

    let certificates = Router::new().route(
        "/api/v1/certificates/{domain}",
        post(request_certificate_handler)
            .get(get_certificate_handler)
            .delete(delete_certificate_handler),
    );

    Router::new()
        .route("/health", get(health_handler))
        .merge(certificates)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            crate::request_span!(req.method(), req.uri().path())
        }))
}
