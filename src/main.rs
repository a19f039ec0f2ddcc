//! Alianca - membership backend for a discipleship network

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use alianca::{
    config::Args,
    db::MongoClient,
    logging,
    network::{InMemoryMemberStore, MemberStore, MongoMemberStore},
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let jwt = match args.jwt_validator() {
        Ok(jwt) => jwt,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("======================================");
    info!("  Alianca - discipleship network");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);
    info!("CORS origin: {}", args.cors_origin);
    info!("======================================");

    // MongoDB is required in production; dev mode falls back to memory
    let store: Arc<dyn MemberStore> = match connect(&args).await {
        Ok(store) => {
            info!("MongoDB connected successfully");
            Arc::new(store)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(InMemoryMemberStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let state = Arc::new(server::AppState::new(args, store, jwt));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn connect(args: &Args) -> alianca::Result<MongoMemberStore> {
    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    MongoMemberStore::new(mongo).await
}
