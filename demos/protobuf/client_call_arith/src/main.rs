use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use arith_model::Args;

/// Calls `Arith.Multiply` and `Arith.Divide` once each.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "localhost:50051")]
    addr: String,

    #[arg(short, default_value_t = 9, allow_negative_numbers = true)]
    a: i64,

    #[arg(short, default_value_t = 4, allow_negative_numbers = true)]
    b: i64,

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

    if let Err(err) = client_call_arith_protobuf::run(&cli.addr, Args::new(cli.a, cli.b)).await {
        error!("{}", err);
        process::exit(1);
    }
}
