//! Keyward Web Server
//!
//! HTTP frontend for the Keyward identity service.

use clap::Parser;
use keyward_web::server::KeywardServer;
use keyward_web::{init_logging, WebConfig};

/// Keyward Web Server - authentication and authorization over HTTP
#[derive(Parser)]
#[command(name = "keyward-web")]
#[command(about = "Token issuance and identity management service")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Database URL for identity storage
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    std::env::set_var(
        "RUST_LOG",
        format!("keyward_web={},tower_http=debug", args.log_level),
    );
    init_logging();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = match WebConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            eprintln!("   Set KEYWARD_JWT_SECRET before starting the server.");
            std::process::exit(1);
        }
    };

    // Override with command line arguments
    config.host = args.host;
    config.port = args.port;
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }

    println!("🚀 Starting Keyward Web Server");
    println!("📍 Server: http://{}:{}", config.host, config.port);
    match &config.database_url {
        Some(db_url) => println!("🗄️  Database: {}", db_url),
        None => println!("🗄️  Database: in-memory (state is lost on restart)"),
    }

    let server = match KeywardServer::new(config).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("❌ Failed to build server: {}", e);
            std::process::exit(1);
        }
    };

    // Blocks until shutdown
    if let Err(e) = server.start().await {
        eprintln!("❌ Server failed to start: {}", e);
        std::process::exit(1);
    }

    println!("✅ Server shut down gracefully");
}
