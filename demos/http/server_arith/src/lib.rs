use arith_model::{Args, Arith, Production, Quotient};
use arpc::http::HttpServer;
use arpc::{Error, ErrorKind, Result};

/// `Arith` over HTTP. Divide rejects a zero divisor.
pub struct ArithServer;

impl Arith for ArithServer {
    fn multiply(&self, args: Args) -> Result<Production> {
        Ok(Production {
            value: args.a.wrapping_mul(args.b),
        })
    }

    fn divide(&self, args: Args) -> Result<Quotient> {
        if args.b == 0 {
            return Err(Error::new(ErrorKind::InvalidArgument, "divide by zero"));
        }
        Ok(Quotient {
            quo: args.a.wrapping_div(args.b),
            rem: args.a.wrapping_rem(args.b),
        })
    }
}

pub fn new_server(addr: &str) -> HttpServer {
    let mut server = HttpServer::new(addr.to_owned());
    arith_model::register(&mut server, ArithServer);
    server
}
