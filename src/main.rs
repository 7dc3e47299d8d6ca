use std::path::PathBuf;

use clap::Parser;
use sha2::{Digest, Sha256};

use protopdf::{PrintTarget, RenderConfig, RenderRequest};

/// Render one vehicle handover protocol to PDF via headless Chrome.
#[derive(Parser, Debug)]
#[command(name = "protopdf", version, about)]
struct Cli {
    /// Base URL of the application serving the printable page
    #[arg(long)]
    site_url: String,

    /// Protocol checklist id to render
    #[arg(long)]
    checklist_id: String,

    /// Bearer token forwarded to the application's data proxy
    #[arg(long)]
    token: String,

    /// Quality tier: high, normal or economy. Unknown names mean normal.
    #[arg(long)]
    quality: Option<String>,

    /// Output file
    #[arg(short, long, default_value = "protocol.pdf")]
    output: PathBuf,

    /// Explicit Chrome/Chromium binary (autodetected when omitted)
    #[arg(long)]
    browser_path: Option<PathBuf>,

    /// Disable the Chrome sandbox (containers without user namespaces)
    #[arg(long)]
    no_sandbox: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut config = RenderConfig::new(PrintTarget::new(cli.site_url));
    config.browser_path = cli.browser_path;
    config.sandbox = !cli.no_sandbox;

    let request = RenderRequest {
        checklist_id: cli.checklist_id,
        quality: cli.quality,
        bearer_token: cli.token,
    };

    match protopdf::render_protocol_pdf(config, &request) {
        Ok(pdf) => {
            if let Err(e) = std::fs::write(&cli.output, &pdf.bytes) {
                eprintln!("Failed to write {}: {}", cli.output.display(), e);
                std::process::exit(1);
            }
            let digest = Sha256::digest(&pdf.bytes);
            println!(
                "{} ({} bytes, {} quality, sha256 {})",
                cli.output.display(),
                pdf.bytes.len(),
                pdf.quality_used,
                hex::encode(digest)
            );
        }
        Err(e) => {
            eprintln!("Render failed: {}", e);
            std::process::exit(1);
        }
    }
}
