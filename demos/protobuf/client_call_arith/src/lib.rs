use std::future::Future;
use std::time::Duration;

use arith_model::{ArithClient, Args, Production, Quotient};
use arpc::{Client, Error, ErrorKind, Result, SerializeType};
use tokio::time::Instant;
use tracing::info;

/// Both calls together must finish within this.
pub const DEADLINE: Duration = Duration::from_secs(1);

/// Calls Multiply then Divide on the server at `addr` and logs both results.
pub async fn run(addr: &str, args: Args) -> Result<(Production, Quotient)> {
    let mut c = Client::new(addr);
    c.opt.serialize_type = SerializeType::ProtoBuffer;
    c.start()
        .await
        .map_err(|err| context(err, "did not connect"))?;

    let result = calls(&c, args, Instant::now() + DEADLINE).await;
    c.close().await;
    result
}

async fn calls(c: &Client, args: Args, deadline: Instant) -> Result<(Production, Quotient)> {
    let arith = ArithClient::new(c);

    let p = before(deadline, "Multiply", arith.multiply(args)).await?;
    info!("{} * {} = {}", args.a, args.b, p.value);

    let q = before(deadline, "Divide", arith.divide(args)).await?;
    info!("{} / {} = {} remains {}", args.a, args.b, q.quo, q.rem);

    Ok((p, q))
}

async fn before<T>(
    deadline: Instant,
    method: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout_at(deadline, call).await {
        Ok(res) => res.map_err(|err| context(err, &format!("could not call {}", method))),
        Err(_) => Err(Error::new(
            ErrorKind::Timeout,
            format!("could not call {}: deadline exceeded", method),
        )),
    }
}

fn context(err: Error, msg: &str) -> Error {
    Error::new(err.kind(), format!("{}: {}", msg, err))
}
