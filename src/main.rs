// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Newjilo API Server
//!
//! Serves health records and image analyses for Supabase users. Model
//! pipelines warm up in the background; the server accepts requests
//! immediately and reports model readiness on the status routes.

use newjilo_api::{
    config::Config,
    db::{Db, PostgrestStore},
    inference::{http::spawn_loading, Models},
    services::{StorageService, SupabaseAuth, SupabaseStorage},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Newjilo API");

    let identity = Arc::new(SupabaseAuth::new(
        &config.supabase_url,
        &config.supabase_anon_key,
        config.supabase_jwt_secret.as_deref(),
    ));
    tracing::info!(
        local_jwt = config.supabase_jwt_secret.is_some(),
        "Identity provider initialized"
    );

    let db = Db::new(Arc::new(PostgrestStore::new(
        &config.supabase_url,
        &config.supabase_service_role_key,
    )));
    let storage = StorageService::new(Arc::new(SupabaseStorage::new(
        &config.supabase_url,
        &config.supabase_service_role_key,
    )));

    // Load every model once, in the background
    let models = Arc::new(Models::new(&config.inference));
    spawn_loading(&models, &config.inference)?;
    tracing::info!(server = %config.inference.base_url, "Model loading started");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        identity,
        db,
        storage,
        models,
    });

    // Build router
    let app = newjilo_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("newjilo_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
