use arith_model::{ArithClient, Args, Quotient};
use arpc::http::*;
use arpc::*;
use hyper::{Body, Method, Request, StatusCode};
use tokio::net::TcpListener;

async fn serve(server: HttpServer) -> String {
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

async fn arith_server() -> String {
    serve(server_arith_http::new_server("127.0.0.1:0")).await
}

async fn http_client(addr: &str) -> HttpClient {
    let mut c = HttpClient::new(addr);
    c.start().await.unwrap();
    c
}

#[tokio::test]
async fn multiply_and_divide() {
    let addr = arith_server().await;
    let (p, q) = client_call_arith_http::run(&addr, Args::new(9, 4))
        .await
        .unwrap();
    assert_eq!(36, p.value);
    assert_eq!(Quotient { quo: 2, rem: 1 }, q);
}

#[tokio::test]
async fn prints_both_results() {
    let addr = arith_server().await;
    let mut out = Vec::new();
    client_call_arith_http::run_to(&addr, Args::new(9, 4), &mut out)
        .await
        .unwrap();
    assert_eq!(
        "Arith: 9 * 4 = 36\nArith: 9 / 4 = 2 remains 1\n",
        String::from_utf8(out).unwrap()
    );
}

#[tokio::test]
async fn failed_divide_prints_only_multiply() {
    let addr = arith_server().await;
    let mut out = Vec::new();
    client_call_arith_http::run_to(&addr, Args::new(9, 0), &mut out)
        .await
        .unwrap_err();
    assert_eq!("Arith: 9 * 0 = 0\n", String::from_utf8(out).unwrap());
}

#[tokio::test]
async fn divide_by_zero_is_reported() {
    let addr = arith_server().await;
    let c = http_client(&addr).await;
    let arith = ArithClient::new(&c);

    let err = arith.divide(Args::new(9, 0)).await.unwrap_err();
    assert_eq!(ErrorKind::Server, err.kind());
    assert_eq!("divide by zero", err.to_string());

    let err = client_call_arith_http::run(&addr, Args::new(9, 0))
        .await
        .unwrap_err();
    assert_eq!("arith error: divide by zero", err.to_string());
}

#[tokio::test]
async fn unknown_method() {
    let addr = arith_server().await;
    let c = http_client(&addr).await;

    let err = c
        .call::<Quotient>("Arith", "Modulo", &Metadata::new(), &Args::new(9, 4))
        .await
        .unwrap_err();
    assert_eq!(ErrorKind::Server, err.kind());
    assert_eq!("can not find service Arith.Modulo", err.to_string());
}

#[tokio::test]
async fn msgpack_payloads() {
    let addr = arith_server().await;
    let mut c = HttpClient::new(&addr);
    c.opt.serialize_type = SerializeType::MsgPack;
    c.start().await.unwrap();

    let p = ArithClient::new(&c).multiply(Args::new(-6, 7)).await.unwrap();
    assert_eq!(-42, p.value);
}

#[tokio::test]
async fn unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = client_call_arith_http::run(&addr, Args::new(9, 4))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("dialing"), "{}", err);
}

#[tokio::test]
async fn debug_page_lists_arith() {
    let addr = arith_server().await;
    let c = http_client(&addr).await;

    let list = c.list_services().await.unwrap();
    let arith = list.service("Arith").unwrap();
    let methods: Vec<&str> = arith.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(vec!["Divide", "Multiply"], methods);
    assert_eq!("Args -> Quotient", arith.method("Divide").unwrap().meta);
}

#[tokio::test]
async fn rejects_bad_requests() {
    let addr = arith_server().await;
    let client = hyper::Client::new();
    let uri = |path: &str| format!("http://{}{}", addr, path);

    let res = client
        .request(
            Request::builder()
                .method(Method::GET)
                .uri(uri(RPC_PATH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(StatusCode::METHOD_NOT_ALLOWED, res.status());

    let res = client
        .request(
            Request::builder()
                .method(Method::POST)
                .uri(uri(RPC_PATH))
                .body(Body::from(r#"{"A":9,"B":4}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    let res = client
        .request(
            Request::builder()
                .method(Method::GET)
                .uri(uri("/nowhere"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    let res = client
        .request(
            Request::builder()
                .method(Method::GET)
                .uri(uri(DEBUG_PATH))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(StatusCode::OK, res.status());
}

#[tokio::test]
async fn json_call_with_headers() {
    let addr = arith_server().await;
    let client = hyper::Client::new();

    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("http://{}{}", addr, RPC_PATH))
        .header(HEADER_SERVICE_PATH, "Arith")
        .header(HEADER_SERVICE_METHOD, "Divide")
        .header(HEADER_MESSAGE_ID, "7")
        .body(Body::from(r#"{"A":9,"B":4}"#))
        .unwrap();
    let res = client.request(req).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());
    assert_eq!("Normal", res.headers()[HEADER_MESSAGE_STATUS_TYPE]);
    assert_eq!("7", res.headers()[HEADER_MESSAGE_ID]);

    let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
    assert_eq!(&br#"{"Quo":2,"Rem":1}"#[..], &body[..]);
}
