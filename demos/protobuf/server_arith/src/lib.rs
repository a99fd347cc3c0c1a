use std::net::SocketAddr;

use arith_model::{Args, Arith, Production, Quotient};
use arpc::{Result, Server};
use tracing::info;

/// `Arith` over the framed TCP transport. Divide trusts its input.
pub struct ArithServer;

impl Arith for ArithServer {
    fn multiply(&self, args: Args) -> Result<Production> {
        info!("Received: A = {}, B = {}", args.a, args.b);
        Ok(Production {
            value: args.a.wrapping_mul(args.b),
        })
    }

    fn divide(&self, args: Args) -> Result<Quotient> {
        info!("Received: A = {}, B = {}", args.a, args.b);
        Ok(Quotient {
            quo: args.a / args.b,
            rem: args.a % args.b,
        })
    }
}

/// A server with `Arith` and the reflection service registered.
pub fn new_server(addr: &str) -> Server {
    let mut server = Server::new(addr.to_owned());
    arith_model::register(&mut server, ArithServer);
    server.register_reflection();
    server
}

/// How the startup log names a bound address; a wildcard bind reads as `localhost`.
pub fn listening_at(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("localhost:{}", addr.port())
    } else {
        addr.to_string()
    }
}
