//! Small demo application: a greeting page, an echo route for query and form
//! parameters, a cookie-backed counter, a static stylesheet, a route that
//! always faults and custom 404/500 pages.
//!
//! ```text
//! cargo run --example hello_world -- --port 5000 --debug
//! curl 'http://127.0.0.1:5000/echo?name=world'
//! curl -d 'a=1&b=two%20words' http://127.0.0.1:5000/echo
//! ```

use clap::Parser;
use plainhttp::context::Context;
use plainhttp::http::{Method, Response, SetCookie};
use plainhttp::router::{Registry, Requirements};
use plainhttp::server::{Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "plainhttp demo server")]
struct Args {
    /// Optional JSON config file; flags override its values.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Include fault diagnostics in 500 pages.
    #[arg(long)]
    debug: bool,

    /// Suppress the per-request access log line.
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = args.host {
        config = config.host(host);
    }
    if let Some(port) = args.port {
        config = config.port(port);
    }
    if args.debug {
        config = config.debug(true);
    }
    if args.quiet {
        config = config.access_log(false);
    }

    let server = Server::bind(&config).await?;
    println!("Server is running on http://{}", server.local_addr());
    server.run(routes().seal()).await?;
    Ok(())
}

fn routes() -> Registry {
    let mut registry = Registry::new();

    registry.register("/", [Method::Get], || async {
        "<!DOCTYPE html><html><body><h1>hello</h1></body></html>"
    });

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
            Response::default().json(&params)
        },
    );

    registry.register_with_context(
        "/visits",
        [Method::Get],
        Requirements::new().cookie(),
        |ctx: Context| async move {
            let seen: u64 = ctx
                .cookies()
                .and_then(|c| c.get("visits"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let visits = seen + 1;
            Response::default()
                .text(format!("visit #{visits}"))
                .cookie(SetCookie::new("visits", visits.to_string()).path("/").max_age(3600))
        },
    );

    registry.register("/forget", [Method::Get], || async {
        Response::default().delete_cookie("visits", Some("/"), None).redirect("/")
    });

    registry.register("/style.css", [Method::Get], || async {
        Response::static_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/style.css"), "text/css").await
    });

    registry.register("/fail", [Method::Get], || async {
        Err::<String, _>(std::io::Error::other("this route always fails"))
    });

    registry.on_not_found(Requirements::new(), |_ctx: Context| async {
        r#"<!DOCTYPE html><html><body><p>No such page. <a href="/">Home</a></p></body></html>"#
    });

    registry.on_fault(|fault| {
        Response::default()
            .status(500, "ERROR")
            .html(format!("<p>Something broke: {fault}</p>"))
    });

    registry
}
