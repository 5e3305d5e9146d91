use mongodb::{options::ClientOptions, Client};
use std::env;
use std::sync::Arc;

use dotenvy::dotenv;

use crate::store::{MemoryStore, MongoStore, TransactionalStore};
use crate::utils::error::{AppError, AppResult};

/// Builds the persistent store. `STORE_BACKEND=memory` selects the ephemeral
/// in-process backend for local development; anything else connects to
/// MongoDB via `MONGO_URI` / `DB_NAME`.
pub async fn init_store() -> AppResult<Arc<dyn TransactionalStore>> {
    dotenv().ok();

    if env::var("STORE_BACKEND").as_deref() == Ok("memory") {
        tracing::warn!("using ephemeral in-memory store; data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let mongo_uri = env::var("MONGO_URI")
        .map_err(|_| AppError::InternalError("MONGO_URI must be set in .env".to_string()))?;
    let db_name = env::var("DB_NAME")
        .map_err(|_| AppError::InternalError("DB_NAME must be set in .env".to_string()))?;

    let mut client_options = ClientOptions::parse(&mongo_uri)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to parse MongoDB URI: {}", e)))?;

    client_options.app_name = Some("VoteApp".to_string());

    let client = Client::with_options(client_options)
        .map_err(|e| AppError::DatabaseError(format!("Failed to initialize MongoDB client: {}", e)))?;

    let db = client.database(&db_name);
    tracing::info!(db = %db_name, "database connection successful");

    Ok(Arc::new(MongoStore::new(client, db)))
}
