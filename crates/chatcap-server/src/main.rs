//! chatcap: capture AI chat transcripts from page snapshots and export them.

use std::path::PathBuf;
use std::sync::Arc;

use chatcap_core::ChatcapConfig;
use chatcap_server::{build_router, AppState, CaptureOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CHATCAP_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("chatcap: capture AI chat transcripts and export them");
    println!();
    println!("Usage: chatcap [command]");
    println!();
    println!("Commands:");
    println!("  serve                          Start the local capture server (default)");
    println!("  extract <file.html> <url> [out-dir]");
    println!("                                 Capture a saved page and write JSON/Markdown exports");
    println!("  help                           Show this help message");
}

/// One-shot capture of a saved page through the full context pipeline.
async fn run_extract(args: &[String]) -> anyhow::Result<()> {
    if args.len() < 4 {
        eprintln!("Usage: chatcap extract <file.html> <url> [out-dir]");
        std::process::exit(1);
    }
    let html_path = PathBuf::from(&args[2]);
    let url = &args[3];

    let config = ChatcapConfig::from_env(resolve_data_dir())?;
    let out_dir = args
        .get(4)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data_paths.exports.clone());

    let html = std::fs::read_to_string(&html_path)?;
    let title = chatcap_extract::document_title(&html);

    let state = AppState::new(config);
    match state.capture(url, &title, &html).await? {
        CaptureOutcome::Captured(conversation) => {
            let paths = chatcap_export::write_exports(&out_dir, &conversation, chrono::Utc::now())?;
            println!("{}", state.preview.render_preview());
            println!();
            println!("Wrote {}", paths.json.display());
            println!("Wrote {}", paths.markdown.display());
            Ok(())
        }
        CaptureOutcome::Empty => {
            eprintln!("{}", chatcap_runtime::NO_CONVERSATION);
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "serve" => {}
            "extract" => return run_extract(&args).await,
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'chatcap help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = ChatcapConfig::from_env(&data_dir)?;
    let port = config.port;

    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("chatcap server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
