use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use punkmod::services::{AnthropicClient, ContentFetcher, GitHubClient, TokenManager};
use punkmod::{AppState, Config, handlers};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "punkmod"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "punkmod=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");

    info!(
        repo = format!("{}/{}", config.repo_owner, config.repo_name),
        bot = config.bot_login(),
        "Starting PunkModBot server on {}:{}",
        config.host,
        config.port
    );
    if config.webhook_secret.is_none() {
        tracing::warn!("GITHUB_WEBHOOK_SECRET is not set; webhook deliveries will be rejected");
    }

    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(http.clone(), &config));

    let github = Arc::new(GitHubClient::new(http.clone(), tokens.clone(), &config));
    let llm = Arc::new(AnthropicClient::new(
        http.clone(),
        config.anthropic_api_key.clone(),
        config.llm_model.clone(),
    ));
    let content = Arc::new(ContentFetcher::new(
        http,
        tokens,
        config.reader_proxy_base.clone(),
    ));

    let app_state = web::Data::new(AppState {
        config: config.clone(),
        github,
        llm,
        content,
    });

    let server_addr = format!("{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(health_check))
            .service(web::scope("/api").configure(handlers::configure_mod_routes))
    })
    .bind(&server_addr)?
    .run()
    .await
}
