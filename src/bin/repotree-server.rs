use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use anyhow::{Context, Result};
use axum::extract::{Multipart, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, extract::Path};
use tokio::sync::RwLock;

#[path = "repotree_server/http_error.rs"]
mod http_error;
use self::http_error::*;
#[path = "repotree_server/validators.rs"]
mod validators;
use self::validators::*;
#[path = "repotree_server/storage.rs"]
mod storage;
use self::storage::*;
#[path = "repotree_server/handlers.rs"]
mod handlers;
use self::handlers::*;
#[path = "repotree_server/runtime.rs"]
mod runtime;

struct AppState {
    data_dir: PathBuf,

    // Uploads take it exclusively so readers never see a half-replaced repo.
    content_lock: RwLock<()>,

    staging_seq: AtomicU64,
}

#[tokio::main]
async fn main() {
    if let Err(err) = runtime::run().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
