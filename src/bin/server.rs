use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use parcel_aoi::batch::{self, ParcelReport};
use parcel_aoi::config::Config;
use parcel_aoi::error::SearchError;
use parcel_aoi::score::{Layer, ParcelLayers};
use parcel_aoi::types::ResultRecord;
use serde::Deserialize;
use std::collections::BTreeMap;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    id: Option<String>,
    layers: BTreeMap<Layer, Vec<Vec<f64>>>,
    #[serde(default)]
    min_acres: Option<f64>,
    #[serde(default)]
    max_acres: Option<f64>,
    #[serde(default)]
    config: Option<Config>,
}

async fn search(
    Json(req): Json<SearchRequest>,
) -> Result<Json<ResultRecord>, (StatusCode, String)> {
    let id = req.id.unwrap_or_else(|| "parcel".to_string());
    let layers: Vec<&str> = req.layers.keys().map(Layer::name).collect();
    tracing::info!(parcel = %id, ?layers, "POST /search");

    let mut config = req.config.unwrap_or_default();
    if let Some(min) = req.min_acres {
        config.min_acres = min;
    }
    if let Some(max) = req.max_acres {
        config.max_acres = max;
    }
    config
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let rows = req.layers;
    let task_id = id.clone();
    let record = tokio::task::spawn_blocking(move || {
        batch::evaluate_parcel(&task_id, ParcelLayers::from_rows(rows), &config).record()
    })
    .await
    .unwrap_or_else(|e| {
        let err = SearchError::Internal(e.to_string());
        tracing::error!(parcel = %id, error = %err, "search task failed");
        ParcelReport::failed(&id, err.to_string()).record()
    });

    Ok(Json(record))
}

#[tokio::main]
async fn main() {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/search", post(search))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
