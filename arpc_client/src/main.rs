use std::process;

use bytes::BytesMut;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use arpc_client::{Client, HttpClient, RpcClient};
use arpc_protocol::{Error, ErrorKind, Metadata, Result, ServiceList};

/// Lists and calls services of a running arpc server.
#[derive(Parser)]
#[command(name = "arpc-cli", version, about, long_about = None)]
struct Cli {
    /// server address, host:port
    #[arg(long, default_value = "localhost:50051")]
    addr: String,

    /// talk to an HTTP server instead of the framed TCP one
    #[arg(long)]
    http: bool,

    /// more logs; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every service and method the server exposes.
    Services,
    /// Call `Service.Method` with a JSON argument and print the JSON reply.
    Call {
        method: String,
        #[arg(default_value = "{}")]
        args: String,
    },
}

enum Conn {
    Tcp(Client),
    Http(HttpClient),
}

impl Conn {
    async fn connect(addr: &str, http: bool) -> Result<Conn> {
        if http {
            let mut c = HttpClient::new(addr);
            c.start().await?;
            Ok(Conn::Http(c))
        } else {
            let mut c = Client::new(addr);
            c.start().await?;
            Ok(Conn::Tcp(c))
        }
    }

    async fn list_services(&self) -> Result<ServiceList> {
        match self {
            Conn::Tcp(c) => c.list_services().await,
            Conn::Http(c) => c.list_services().await,
        }
    }

    async fn call(&self, service_path: &str, service_method: &str, args: &BytesMut) -> Result<BytesMut> {
        let metadata = Metadata::new();
        match self {
            Conn::Tcp(c) => c.call(service_path, service_method, &metadata, args).await,
            Conn::Http(c) => c.call(service_path, service_method, &metadata, args).await,
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let conn = Conn::connect(&cli.addr, cli.http)
        .await
        .map_err(|err| Error::new(err.kind(), format!("dialing {}: {}", cli.addr, err)))?;

    match cli.command {
        Commands::Services => {
            for service in conn.list_services().await?.services {
                println!("{}", service.name);
                for method in service.methods {
                    if method.meta.is_empty() {
                        println!("  {}", method.name);
                    } else {
                        println!("  {}: {}", method.name, method.meta);
                    }
                }
            }
        }
        Commands::Call { method, args } => {
            let (service_path, service_method) = method.rsplit_once('.').ok_or_else(|| {
                Error::new(
                    ErrorKind::Client,
                    format!("{} is not of the form Service.Method", method),
                )
            })?;
            serde_json::from_str::<serde_json::Value>(&args)?;

            let reply = conn
                .call(service_path, service_method, &BytesMut::from(args.as_bytes()))
                .await?;
            println!("{}", String::from_utf8_lossy(&reply));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(err) = run(cli).await {
        error!("{}", err);
        process::exit(1);
    }
}
