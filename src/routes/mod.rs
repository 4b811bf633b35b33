use axum::Router;

use crate::state::SharedState;

pub mod catalog;
pub mod docs;
pub mod extract;
pub mod health;
pub mod parties;
pub mod songs;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = parties::router()
        .merge(songs::router())
        .merge(catalog::router());

    let root_router = health::router()
        .merge(websocket::router())
        .nest("/api", api_router);

    let docs_router = docs::router(state.clone());

    root_router.merge(docs_router).with_state(state)
}
