use std::time::Duration;

use arith_model::{ArithClient, Args, Arith, Production, Quotient};
use arpc::*;
use tokio::net::TcpListener;

async fn serve(server: Server) -> String {
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

async fn arith_server() -> String {
    serve(server_arith_protobuf::new_server("127.0.0.1:0")).await
}

async fn protobuf_client(addr: &str) -> Client {
    let mut c = Client::new(addr);
    c.opt.serialize_type = SerializeType::ProtoBuffer;
    c.start().await.unwrap();
    c
}

#[tokio::test]
async fn multiply_and_divide() {
    let addr = arith_server().await;
    let (p, q) = client_call_arith_protobuf::run(&addr, Args::new(9, 4))
        .await
        .unwrap();
    assert_eq!(36, p.value);
    assert_eq!(Quotient { quo: 2, rem: 1 }, q);
}

#[tokio::test]
async fn divide_identity_holds() {
    let addr = arith_server().await;
    let c = protobuf_client(&addr).await;
    let arith = ArithClient::new(&c);

    for (a, b) in [(9, 4), (-9, 4), (9, -4), (0, 7), (i64::MAX, 3)] {
        let q = arith.divide(Args::new(a, b)).await.unwrap();
        assert_eq!(a, b * q.quo + q.rem, "{} / {}", a, b);
        let p = arith.multiply(Args::new(a, b)).await.unwrap();
        assert_eq!(a.wrapping_mul(b), p.value);
    }
}

#[tokio::test]
async fn divide_by_zero_fails_the_call_only() {
    let addr = arith_server().await;
    let c = protobuf_client(&addr).await;
    let arith = ArithClient::new(&c);

    let err = arith.divide(Args::new(9, 0)).await.unwrap_err();
    assert_eq!(ErrorKind::Server, err.kind());
    assert_eq!("service handler panicked", err.to_string());

    // the server and the connection keep working.
    assert_eq!(36, arith.multiply(Args::new(9, 4)).await.unwrap().value);
}

#[tokio::test]
async fn divide_by_zero_stops_the_client_run() {
    let addr = arith_server().await;
    let err = client_call_arith_protobuf::run(&addr, Args::new(9, 0))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("could not call Divide"), "{}", err);
}

#[tokio::test]
async fn unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = client_call_arith_protobuf::run(&addr, Args::new(9, 4))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("did not connect"), "{}", err);
}

#[tokio::test]
async fn reflection_lists_arith() {
    let addr = arith_server().await;
    let c = protobuf_client(&addr).await;

    let list = c.list_services().await.unwrap();
    let arith = list.service("Arith").unwrap();
    let methods: Vec<&str> = arith.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(vec!["Divide", "Multiply"], methods);
    assert_eq!("Args -> Production", arith.method("Multiply").unwrap().meta);
    assert!(list.service(REFLECTION_SERVICE_PATH).is_some());
}

struct Sleepy;

impl Arith for Sleepy {
    fn multiply(&self, args: Args) -> Result<Production> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(Production {
            value: args.a * args.b,
        })
    }

    fn divide(&self, _: Args) -> Result<Quotient> {
        Ok(Quotient::default())
    }
}

#[tokio::test]
async fn deadline_exceeded() {
    let mut server = Server::new("127.0.0.1:0".to_owned());
    arith_model::register(&mut server, Sleepy);
    let addr = serve(server).await;

    let mut c = Client::new(&addr);
    c.opt.serialize_type = SerializeType::ProtoBuffer;
    c.opt.timeout = Duration::from_millis(50);
    c.start().await.unwrap();

    let err = ArithClient::new(&c)
        .multiply(Args::new(9, 4))
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::Timeout, err.kind());
}

struct HalfDeadline;

impl Arith for HalfDeadline {
    fn multiply(&self, args: Args) -> Result<Production> {
        std::thread::sleep(Duration::from_millis(700));
        Ok(Production {
            value: args.a * args.b,
        })
    }

    fn divide(&self, args: Args) -> Result<Quotient> {
        std::thread::sleep(Duration::from_millis(700));
        Ok(Quotient {
            quo: args.a / args.b,
            rem: args.a % args.b,
        })
    }
}

#[tokio::test]
async fn one_deadline_covers_both_calls() {
    let mut server = Server::new("127.0.0.1:0".to_owned());
    arith_model::register(&mut server, HalfDeadline);
    let addr = serve(server).await;

    // each call fits the deadline alone, the pair does not.
    let err = client_call_arith_protobuf::run(&addr, Args::new(9, 4))
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::Timeout, err.kind());
    assert!(err.to_string().starts_with("could not call Divide"), "{}", err);
}
