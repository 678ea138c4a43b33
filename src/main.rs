// src/main.rs
use env_logger::Builder;
use log::{error, info};
use portfolio_advisor::api::{self, AppState};
use portfolio_advisor::config::Config;
use portfolio_advisor::db::{self, ScyllaStore};
use portfolio_advisor::extraction::OpenAiExtractor;
use portfolio_advisor::market::AlphaVantageClient;
use reqwest::Client;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            Builder::new().parse_default_env().init();
            error!("{}", e);
            std::process::exit(1);
        }
    };

    Builder::new()
        .filter_level(config.log_level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let session = match db::init(&config.scylla_node).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Connected to database...");

    if config.openai_api_key.is_none() {
        info!("OPENAI_API_KEY not set; portfolio analysis will be unavailable.");
    }

    let client = Client::new();
    let state = Arc::new(AppState {
        store: Arc::new(ScyllaStore::new(session)),
        market: Arc::new(AlphaVantageClient::new(
            client.clone(),
            config.alphavantage_url.clone(),
            config.alphavantage_api_key.clone(),
        )),
        extractor: Arc::new(OpenAiExtractor::new(
            client,
            config.openai_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
        )),
        jwt_secret: Arc::new(config.jwt_secret.clone()),
    });

    let api = api::routes(state);

    info!("Server running on http://{}", config.bind_addr);
    warp::serve(api).run(config.bind_addr).await;
}
