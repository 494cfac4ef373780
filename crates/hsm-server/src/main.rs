//! Entry point: parse CLI arguments, initialize tracing, run the server.

use clap::Parser;
use hsm_core::HsmOptions;
use hsm_server::{Server, ServerConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default Local Master Key, used only when `--key` is not given.
const DEFAULT_LMK_HEX: &str = "deafbeedeafbeedeafbeedeafbeedeaf";

#[derive(Parser, Debug)]
#[command(name = "hsm-server", about = "Thales-style HSM host-command simulator")]
struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 1500)]
    port: u16,

    /// Local Master Key as 32 hex characters (16 bytes).
    #[arg(long)]
    key: Option<String>,

    /// Emit extra debug-level tracing for parity and verification outcomes.
    #[arg(long)]
    debug: bool,

    /// Treat every key-parity check as trivially successful.
    #[arg(long)]
    skip_parity: bool,

    /// Force every would-be-non-zero handler error code to `00`.
    #[arg(long)]
    approve_all: bool,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let key_hex = args.key.as_deref().unwrap_or(DEFAULT_LMK_HEX);
    let lmk_raw = hex::decode(key_hex).map_err(|e| format!("--key is not valid hex: {e}"))?;
    let lmk: [u8; 16] =
        lmk_raw.try_into().map_err(|v: Vec<u8>| format!("--key must decode to 16 bytes, got {}", v.len()))?;

    if args.approve_all {
        tracing::warn!("running with --approve-all: every handler error is forced to 00");
    }
    if args.skip_parity {
        tracing::warn!("running with --skip-parity: key-parity checks are disabled");
    }

    let config = ServerConfig {
        port: args.port,
        lmk,
        options: HsmOptions { debug: args.debug, skip_parity: args.skip_parity, approve_all: args.approve_all },
    };

    let server = Server::bind(config).await?;
    tracing::info!(addr = %server.local_addr()?, "hsm-server listening");
    server.run().await?;

    Ok(())
}
