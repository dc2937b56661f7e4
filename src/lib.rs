// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Newjilo: health records and medical image analysis API.
//!
//! This crate provides the backend API for Supabase-authenticated users to
//! keep health records and run pretrained vision models (captioning, chest
//! X-ray classification, digit recognition, image/text similarity) whose
//! results are stored per user.

pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

#[cfg(test)]
mod test_server;

use std::sync::Arc;

use config::Config;
use db::Db;
use inference::Models;
use services::{IdentityProvider, StorageService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub db: Db,
    pub storage: StorageService,
    pub models: Arc<Models>,
}
