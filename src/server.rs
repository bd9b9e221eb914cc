//! HTTP application assembly.

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::assistants::{
    AssistantManager, AssistantRouteState, assistant_routes, assistant_ws_routes,
};
use crate::transcription::{Transcriber, TranscriptionRouteState, transcription_routes};

/// Merge every route group into one router.
///
/// CORS is permissive: the browser front-end is served from another origin.
pub fn app_router(manager: Arc<AssistantManager>, transcriber: Arc<dyn Transcriber>) -> Router {
    assistant_routes(AssistantRouteState {
        manager: Arc::clone(&manager),
    })
    .merge(assistant_ws_routes(manager))
    .merge(transcription_routes(TranscriptionRouteState { transcriber }))
    .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}
