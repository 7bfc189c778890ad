mod errors;
mod gemini;
mod models;
mod projector;
mod routes;
mod session;
mod vocab;
mod workflow;

use axum::routing::{get, patch, post};
use axum::Router;
use routes::{
    analyze_session, apply_preset, create_session, fetch_suggestions, generate_session,
    get_schematic, get_session, get_vocab, health, patch_camera, patch_lighting, patch_options,
    patch_scene, randomize_camera, randomize_lighting, set_character_count, set_mode,
    upload_image, AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, EnvFilter};

use crate::gemini::GeminiClient;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let api_key = std::env::var("GEMINI_API_KEY").ok();
    match &api_key {
        Some(key) => {
            tracing::info!("Using API key: {}...", &key[..std::cmp::min(10, key.len())])
        }
        None => tracing::warn!("GEMINI_API_KEY not set; model calls will fail until configured"),
    }
    let state = AppState {
        store: Arc::default(),
        prompts: Arc::new(GeminiClient::new(api_key)),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/vocab", get(get_vocab))
        .route("/api/session", post(create_session))
        .route("/api/session/:id", get(get_session))
        .route("/api/session/:id/schematic", get(get_schematic))
        .route("/api/session/:id/camera", patch(patch_camera))
        .route("/api/session/:id/camera/preset", post(apply_preset))
        .route("/api/session/:id/camera/randomize", post(randomize_camera))
        .route("/api/session/:id/lighting", patch(patch_lighting))
        .route("/api/session/:id/lighting/randomize", post(randomize_lighting))
        .route("/api/session/:id/scene", patch(patch_scene))
        .route("/api/session/:id/options", patch(patch_options))
        .route("/api/session/:id/options/character-count", post(set_character_count))
        .route("/api/session/:id/mode", post(set_mode))
        .route("/api/session/:id/image", post(upload_image))
        .route("/api/session/:id/analyze", post(analyze_session))
        .route("/api/session/:id/generate", post(generate_session))
        .route("/api/session/:id/suggestions", post(fetch_suggestions))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting server");
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app).await.unwrap();
}
