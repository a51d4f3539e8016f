//! Drives a real bound server over TCP.

use std::net::SocketAddr;
use std::time::Duration;

use plainhttp::context::Context;
use plainhttp::http::{Method, Response, SetCookie};
use plainhttp::router::{Registry, Requirements};
use plainhttp::server::{Server, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn spawn_server(registry: Registry, debug: bool) -> SocketAddr {
    let config = ServerConfig::new().port(0).debug(debug);
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run(registry.seal()));
    addr
}

async fn read_reply(mut stream: TcpStream) -> String {
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    read_reply(stream).await
}

fn body_of(reply: &str) -> &str {
    reply.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

// Status line and header lines, with the `Expires` timestamp blanked.
fn head_lines(reply: &str) -> Vec<String> {
    let head = reply.split_once("\r\n\r\n").map_or(reply, |(head, _)| head);
    head.split("\r\n")
        .map(|line| match line.split_once(": ") {
            Some(("Expires", _)) => "Expires: <date>".to_owned(),
            _ => line.to_owned(),
        })
        .collect()
}

fn demo_routes() -> Registry {
    let mut registry = Registry::new();
    registry.register("/", [Method::Get], || async { "hello" });
    registry.register_with_context(
        "/echo",
        [Method::Get, Method::Post],
        Requirements::new().get_params().post_params().method(),
        |ctx: Context| async move {
            let params = if ctx.method() == Some("GET") {
                ctx.get_params()
            } else {
                ctx.post_params()
            };
            let mut pairs: Vec<String> = params
                .map(|p| p.iter().map(|(k, v)| format!("{k}={v}")).collect())
                .unwrap_or_default();
            pairs.sort();
            format!("{} {}", ctx.method().unwrap_or("?"), pairs.join(","))
        },
    );
    registry.register_with_context(
        "/body",
        [Method::Post],
        Requirements::new().body(),
        |ctx: Context| async move {
            let body = ctx.body().cloned().unwrap_or_default();
            Response::default().text(String::from_utf8_lossy(&body).into_owned())
        },
    );
    registry.register("/login", [Method::Get], || async {
        Response::default().cookie(
            SetCookie::new("user name", "a=b; c")
                .path("/")
                .domain("localhost")
                .max_age(60),
        )
    });
    registry.register_with_context(
        "/whoami",
        [Method::Get],
        Requirements::new().cookie(),
        |ctx: Context| async move {
            ctx.cookies()
                .and_then(|c| c.get("user name"))
                .unwrap_or("nobody")
                .to_owned()
        },
    );
    registry.register("/fail", [Method::Get], || async {
        Err::<String, _>(std::io::Error::other("storage offline"))
    });
    registry
}

#[tokio::test]
async fn string_reply_is_200_html() {
    let addr = spawn_server(demo_routes(), false).await;
    let reply = exchange(addr, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.contains("Content-Type: text/html\r\n"));
    assert!(reply.contains("Connection: close\r\n"));
    assert!(reply.contains("Expires: "));
    assert_eq!(body_of(&reply), "hello");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let addr = spawn_server(demo_routes(), false).await;
    let reply = exchange(addr, b"GET /nope HTTP/1.1\r\n\r\n").await;

    assert!(reply.starts_with("HTTP/1.1 404 NOT FOUND\r\n"));
    assert_eq!(body_of(&reply), "404 NOT FOUND");
}

#[tokio::test]
async fn wrong_method_is_404() {
    let addr = spawn_server(demo_routes(), false).await;
    let reply = exchange(addr, b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;
    assert!(reply.starts_with("HTTP/1.1 404 NOT FOUND\r\n"));
}

#[tokio::test]
async fn malformed_request_line_is_404() {
    let addr = spawn_server(demo_routes(), false).await;
    let reply = exchange(addr, b"NONSENSE\r\n\r\n").await;
    assert!(reply.starts_with("HTTP/1.1 404 NOT FOUND\r\n"));
}

#[tokio::test]
async fn head_is_served_by_get_route() {
    let addr = spawn_server(demo_routes(), false).await;
    let get = exchange(addr, b"GET /echo?x=1 HTTP/1.1\r\n\r\n").await;
    let head = exchange(addr, b"HEAD /echo?x=1 HTTP/1.1\r\n\r\n").await;

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body_of(&head), "GET x=1");
    assert_eq!(body_of(&get), body_of(&head));

    let head_block = head_lines(&head);
    assert_eq!(head_lines(&get), head_block);
    assert_eq!(
        head_block,
        [
            "HTTP/1.1 200 OK".to_owned(),
            format!("Server: plainhttp/{}", env!("CARGO_PKG_VERSION")),
            "Connection: close".to_owned(),
            "Content-Type: text/html".to_owned(),
            "Expires: <date>".to_owned(),
        ]
    );
}

#[tokio::test]
async fn query_parameters_are_decoded() {
    let addr = spawn_server(demo_routes(), false).await;
    let reply = exchange(addr, b"GET /echo?a=%26&b=x%3Dy&c=50%25&d=two%20words HTTP/1.1\r\n\r\n").await;
    assert_eq!(body_of(&reply), "GET a=&,b=x=y,c=50%,d=two words");
}

#[tokio::test]
async fn form_post_is_decoded() {
    let addr = spawn_server(demo_routes(), false).await;
    let reply = exchange(
        addr,
        b"POST /echo HTTP/1.1\r\n\
          Content-Type: application/x-www-form-urlencoded\r\n\
          Content-Length: 17\r\n\r\n\
          a=1&b=two%20words",
    )
    .await;
    assert_eq!(body_of(&reply), "POST a=1,b=two words");
}

#[tokio::test]
async fn body_arriving_in_two_fragments_is_joined() {
    let addr = spawn_server(demo_routes(), false).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST /body HTTP/1.1\r\nContent-Length: 12\r\n\r\nfirst-")
        .await
        .unwrap();
    stream.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream.write_all(b"second").await.unwrap();

    let reply = read_reply(stream).await;
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(body_of(&reply), "first-second");
}

#[tokio::test]
async fn issued_cookie_comes_back_decoded() {
    let addr = spawn_server(demo_routes(), false).await;
    let login = exchange(addr, b"GET /login HTTP/1.1\r\n\r\n").await;

    let set_cookie = login
        .lines()
        .find_map(|line| line.strip_prefix("Set-Cookie: "))
        .unwrap();
    assert!(set_cookie.ends_with("; Path=/; Domain=localhost; Max-Age=60"));
    let (pair, _) = set_cookie.split_once(';').unwrap();

    let request = format!("GET /whoami HTTP/1.1\r\nCookie: theme=dark; {pair}\r\n\r\n");
    let reply = exchange(addr, request.as_bytes()).await;
    assert_eq!(body_of(&reply), "a=b; c");
}

#[tokio::test]
async fn fault_without_debug_is_generic() {
    let addr = spawn_server(demo_routes(), false).await;
    let reply = exchange(addr, b"GET /fail HTTP/1.1\r\n\r\n").await;

    assert!(reply.starts_with("HTTP/1.1 500 ERROR\r\n"));
    assert_eq!(body_of(&reply), "500 error");
}

#[tokio::test]
async fn fault_with_debug_carries_trace() {
    let addr = spawn_server(demo_routes(), true).await;
    let reply = exchange(addr, b"GET /fail HTTP/1.1\r\n\r\n").await;

    assert!(reply.starts_with("HTTP/1.1 500 ERROR\r\n"));
    let body = body_of(&reply);
    let trace = body.strip_prefix("500 error\r\n\r\nlog:\r\n").unwrap();
    assert!(!trace.is_empty());
    assert!(trace.contains("storage offline"));
}

#[tokio::test]
async fn empty_connection_gets_no_response() {
    let addr = spawn_server(demo_routes(), false).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.shutdown().await.unwrap();
    assert_eq!(read_reply(stream).await, "");
}

#[tokio::test]
async fn concurrent_connections_are_independent() {
    let addr = spawn_server(demo_routes(), false).await;

    // A client that never finishes its body must not hold up others.
    let mut stuck = TcpStream::connect(addr).await.unwrap();
    stuck
        .write_all(b"POST /body HTTP/1.1\r\nContent-Length: 100\r\n\r\npartial")
        .await
        .unwrap();

    let reply = exchange(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(body_of(&reply), "hello");
    drop(stuck);
}

#[tokio::test]
async fn huge_declared_length_does_not_take_the_server_down() {
    let addr = spawn_server(demo_routes(), false).await;

    for declared in ["18446744073709551615", "9000000000000"] {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("POST /body HTTP/1.1\r\nContent-Length: {declared}\r\n\r\nabc");
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        let reply = read_reply(stream).await;
        assert!(reply.starts_with("HTTP/1.1 500 ERROR\r\n"));
    }

    let reply = exchange(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(body_of(&reply), "hello");
}

#[tokio::test]
async fn custom_pages_replace_fixed_ones() {
    let mut registry = demo_routes();
    registry.on_not_found(Requirements::new(), |_ctx: Context| async {
        "<h1>lost?</h1>"
    });
    registry.on_fault(|fault| Response::default().status(500, "ERROR").text(format!("oops: {fault}")));
    let addr = spawn_server(registry, true).await;

    let missing = exchange(addr, b"GET /nope HTTP/1.1\r\n\r\n").await;
    assert!(missing.starts_with("HTTP/1.1 404 NOT FOUND\r\n"));
    assert_eq!(body_of(&missing), "<h1>lost?</h1>");

    let failed = exchange(addr, b"GET /fail HTTP/1.1\r\n\r\n").await;
    assert!(failed.starts_with("HTTP/1.1 500 ERROR\r\n"));
    assert_eq!(body_of(&failed), "oops: storage offline");

    let malformed = exchange(addr, b"NONSENSE\r\n\r\n").await;
    assert_eq!(body_of(&malformed), "404 NOT FOUND");
}

#[tokio::test]
async fn serves_with_access_log_disabled() {
    let config = ServerConfig::new().port(0).access_log(false);
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.run(demo_routes().seal()));

    let reply = exchange(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(body_of(&reply), "hello");
}
