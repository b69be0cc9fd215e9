//! # 翻訳CLI
//!
//! Gatewayの3ステップを端末から実行する。
//!
//! ```text
//! translate-cli translate report.pdf --out report.ja.pdf
//! translate-cli upload-grant scan.png
//! translate-cli download-grant translated/<id>-translated.pdf
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use translate_client::{RouteStyle, TranslateClient};

#[derive(Parser)]
#[command(name = "translate-cli", about = "Document translation CLI")]
struct Cli {
    /// Base URL of the translation gateway
    #[arg(long, env = "TRANSLATE_GATEWAY_URL", default_value = "http://localhost:3000")]
    gateway_url: String,

    /// Use the single `/translate?mode=` route instead of the distinct routes
    #[arg(long)]
    mode_route: bool,

    /// Per-request timeout in seconds (does not cancel server-side work)
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a document, translate it and fetch the result
    Translate {
        /// Path to the PDF or image
        file: PathBuf,
        /// Content type to declare (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
        /// Where to write the translated artifact
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Request a signed upload URL
    UploadGrant {
        /// File name to register
        file_name: String,
        /// Content type the upload will be sent with
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Request a signed download URL for a translated object
    DownloadGrant {
        /// Object key in the translated namespace
        object_key: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{out}");
    Ok(())
}

/// 拡張子からContent-Typeを推定する。不明な場合は `application/octet-stream`。
fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let routes = if cli.mode_route {
        RouteStyle::Mode
    } else {
        RouteStyle::Distinct
    };
    let client = TranslateClient::new(
        &cli.gateway_url,
        routes,
        cli.timeout_secs.map(Duration::from_secs),
    )
    .context("Failed to create gateway client")?;

    match cli.command {
        Commands::Translate {
            file,
            content_type,
            out,
        } => {
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Not a file path: {}", file.display()))?
                .to_string();
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(&file));
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            tracing::info!(file = %file.display(), content_type = %content_type, "翻訳を開始");
            let output = client
                .translate_document(&file_name, &content_type, bytes)
                .await?;

            if let Some(text) = &output.result.translated_text {
                println!("{text}");
            }
            match (output.artifact, out) {
                (Some(artifact), Some(out)) => {
                    tokio::fs::write(&out, &artifact)
                        .await
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    eprintln!("Wrote {} bytes to {}", artifact.len(), out.display());
                }
                (Some(_), None) => {
                    if let Some(result_key) = &output.result.result_key {
                        eprintln!("Translated artifact: {result_key} (use --out to save it)");
                    }
                }
                (None, Some(_)) => eprintln!("No artifact was produced; nothing written"),
                (None, None) => {}
            }
        }
        Commands::UploadGrant {
            file_name,
            content_type,
        } => {
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(Path::new(&file_name)));
            let grant = client.request_upload_grant(&file_name, &content_type).await?;
            print_json(&grant)?;
        }
        Commands::DownloadGrant { object_key } => {
            let grant = client.request_download_grant(&object_key).await?;
            print_json(&grant)?;
        }
    }

    Ok(())
}
