// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Awards Night: sign-in and like aggregation for the awards voting app.
//!
//! This crate provides the OAuth implicit-grant session manager, the
//! debounced like aggregator, and the Firestore persistence they write to.

pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod models;
pub mod services;
pub mod storage;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use host::Navigator;
use services::{IdentityClient, SessionManager};
use storage::SessionStorage;
use time_utils::SystemClock;

/// Build the process-wide session manager from configuration.
pub fn build_session_manager(
    config: &Config,
    storage: Arc<dyn SessionStorage>,
    navigator: Arc<dyn Navigator>,
) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        IdentityClient::new(config),
        storage,
        navigator,
        Arc::new(SystemClock),
    ))
}
