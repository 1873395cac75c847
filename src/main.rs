use clap::Parser;
use tracing::{error, info};
use vidtube::cli::{
    Args, build_config, build_media_store, init_logging, load_token_secrets, open_database,
};
use vidtube::{init_cleanup, run_server};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(secrets) = load_token_secrets(
        args.access_token_secret_file.as_deref(),
        args.refresh_token_secret_file.as_deref(),
    ) else {
        std::process::exit(1);
    };

    let Some(media) = build_media_store(&args) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    if let Ok(local_addr) = listener.local_addr() {
        info!(address = %local_addr, "Listening");
    }
    if args.insecure_cookies {
        info!("Cookies are sent without the Secure flag");
    }

    let config = build_config(&args, db.clone(), secrets, media);
    init_cleanup(&db).await;

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
