use crate::handlers::*;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the HTTP router with every API route
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let uploads = ServeDir::new(state.config.uploads.dir.clone());

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/users", post(register_user).put(update_user))
        .route("/sessions", post(create_session))
        .route("/files", post(upload_file))
        .nest_service("/uploads", uploads)
        .route("/meetups", get(list_meetups).post(create_meetup))
        // The mobile client requests the listing on the singular path
        .route("/meetup", get(list_meetups))
        .route(
            "/meetups/:id",
            get(show_meetup).put(update_meetup).delete(delete_meetup),
        )
        .route("/organizing", get(organizing))
        .route("/subscriptions", get(list_subscriptions).post(subscribe))
        .route("/subscription", get(list_subscriptions))
        .route("/subscriptions/:id", delete(unsubscribe))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/health");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
