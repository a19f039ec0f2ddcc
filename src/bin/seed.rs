//! Alianca Seed - creates the initial administrator, pastor and cell leader
//!
//! Usage:
//!   alianca-seed --mongodb-uri mongodb://localhost:27017 --mongodb-db alianca
//!
//! Environment variables:
//!   MONGODB_URI - MongoDB connection URI (default: mongodb://localhost:27017)
//!   MONGODB_DB - Database name (default: alianca)
//!   SEED_ADMIN_EMAIL - Administrator login (default: admin@alianca.com)
//!   SEED_ADMIN_PASSWORD - Administrator password (default: admin123)

use clap::Parser;
use tracing::{error, info};

use alianca::{
    db::MongoClient,
    logging,
    network::{seed, MongoMemberStore},
};

#[derive(Parser, Debug)]
#[command(name = "alianca-seed")]
#[command(about = "Seed initial members for Alianca")]
#[command(version)]
struct Args {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "alianca")]
    mongodb_db: String,

    /// Administrator email
    #[arg(long, env = "SEED_ADMIN_EMAIL", default_value = "admin@alianca.com")]
    admin_email: String,

    /// Administrator password
    #[arg(long, env = "SEED_ADMIN_PASSWORD", default_value = "admin123")]
    admin_password: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args.log_level, false);

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };
    let store = MongoMemberStore::new(mongo).await?;

    let accounts = seed::default_accounts(&args.admin_email, &args.admin_password);
    let seeded = seed::seed_chain(&store, accounts).await?;

    info!("Seed complete:");
    for member in &seeded {
        info!("  {:<13} {}", member.role.as_str(), member.email);
    }

    Ok(())
}
