mod handlers;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};

use crate::server::handlers::{bids, rides};
use crate::{api::API, auth::User};

pub type DynAPI = Arc<dyn API + Send + Sync>;

pub async fn serve<T: API + Sync + Send + 'static>(api: T) {
    tracing_subscriber::fmt::init();

    let api = Arc::new(api) as DynAPI;

    let app = Router::new()
        .route("/rides", post(rides::create))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/cancel", patch(rides::cancel))
        .route("/rides/:id/hold", patch(rides::hold))
        .route("/rides/:id/reopen", patch(rides::reopen))
        .route("/rides/:id/en_route", patch(rides::en_route))
        .route("/rides/:id/arrived", patch(rides::arrived))
        .route("/rides/:id/begin", patch(rides::begin))
        .route("/rides/:id/complete", patch(rides::complete))
        .route(
            "/rides/:id/bids",
            post(bids::submit).get(bids::list_for_ride),
        )
        .route("/rides/:id/threads", get(bids::open_threads))
        .route("/bids/:id", get(bids::find))
        .route("/bids/:id/counter", patch(bids::counter))
        .route("/bids/:id/accept", patch(bids::accept))
        .route("/bids/:id/withdraw", patch(bids::withdraw))
        .route("/bids/:id/history", get(bids::history))
        .route("/drivers/:id/bids", get(bids::list_for_driver))
        .layer(Extension(api))
        .layer(Extension(User::new_system_user()));

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
