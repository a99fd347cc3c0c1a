use std::io::{self, Write};

use arith_model::{ArithClient, Args, Production, Quotient};
use arpc::http::HttpClient;
use arpc::{Error, Result, SerializeType};

/// Calls Multiply then Divide over HTTP and prints both results.
pub async fn run(addr: &str, args: Args) -> Result<(Production, Quotient)> {
    run_to(addr, args, &mut io::stdout()).await
}

/// Like `run`, writing the result lines to `out`.
pub async fn run_to<W>(addr: &str, args: Args, out: &mut W) -> Result<(Production, Quotient)>
where
    W: Write + Send,
{
    let mut c = HttpClient::new(addr);
    c.opt.serialize_type = SerializeType::JSON;
    c.start()
        .await
        .map_err(|err| Error::new(err.kind(), format!("dialing: {}", err)))?;

    let result = calls(&c, args, out).await;
    c.close();
    result
}

async fn calls<W>(c: &HttpClient, args: Args, out: &mut W) -> Result<(Production, Quotient)>
where
    W: Write + Send,
{
    let arith = ArithClient::new(c);
    let arith_error = |err: Error| Error::new(err.kind(), format!("arith error: {}", err));

    let p = arith.multiply(args).await.map_err(arith_error)?;
    writeln!(out, "Arith: {} * {} = {}", args.a, args.b, p.value)?;

    let q = arith.divide(args).await.map_err(arith_error)?;
    writeln!(out, "Arith: {} / {} = {} remains {}", args.a, args.b, q.quo, q.rem)?;

    Ok((p, q))
}
