//! Tests for the crossvote tracing setup.

use std::sync::Mutex;

use crossvote_core::tracing::setup::{init_tracing, LOG_ENV_VAR};

static TRACING_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_log_env_accepted() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    std::env::set_var(LOG_ENV_VAR, "crossvote_analysis::sampler=debug,crossvote_core=warn");
    init_tracing();
    std::env::remove_var(LOG_ENV_VAR);
}

#[test]
fn test_init_tracing_idempotent() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    init_tracing();
    init_tracing();
    init_tracing();
}

#[test]
fn test_invalid_filter_falls_back() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    std::env::set_var(LOG_ENV_VAR, "this_is=garbage=not=a=filter");
    init_tracing();
    std::env::remove_var(LOG_ENV_VAR);
}
