use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use quickstudy_api::agents::Coordinator;
use quickstudy_api::api::{self, AppState};
use quickstudy_api::config::AppConfig;
use quickstudy_api::llm::OpenAiCompatClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    tracing::info!(
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        "Using generation service"
    );
    let client = OpenAiCompatClient::new(config.llm.clone())?;

    let mut coordinator = Coordinator::with_generator(Arc::new(client));
    if let Some(deadline) = config.batch_deadline {
        tracing::info!("Batch deadline set to {:?}", deadline);
        coordinator = coordinator.with_deadline(deadline);
    }

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = api::router(AppState::new(coordinator))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}
