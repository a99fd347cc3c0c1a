use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use server_arith_protobuf::{listening_at, new_server};

/// Serves `Arith` over the framed TCP transport with protobuf payloads.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "0.0.0.0:50051")]
    addr: String,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let server = new_server(&cli.addr);
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to listen: {}", err);
            process::exit(1);
        }
    };
    match listener.local_addr() {
        Ok(addr) => info!("Arith server listening at {}", listening_at(addr)),
        Err(err) => {
            error!("failed to listen: {}", err);
            process::exit(1);
        }
    }

    if let Err(err) = server.serve(listener).await {
        error!("failed to serve: {}", err);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}
