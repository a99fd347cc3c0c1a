use std::net::{Ipv4Addr, SocketAddr};
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use server_arith_http::new_server;

/// Serves `Arith` over HTTP.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "0.0.0.0:2345")]
    addr: String,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let server = new_server(&cli.addr);
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(err) => {
            error!("listen error: {}", err);
            process::exit(1);
        }
    };
    let mut local = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            error!("listen error: {}", err);
            process::exit(1);
        }
    };
    if local.ip().is_unspecified() {
        local = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), local.port());
    }
    info!("rpcserver listening at {}", local);

    if let Err(err) = server.serve(listener).await {
        error!("serve error: {}", err);
        process::exit(1);
    }
}
