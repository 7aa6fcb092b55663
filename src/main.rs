use clap::{crate_version, App, Arg};
use std::path::Path;
use trellis::{Request, Response, Server, Service};

struct Hello;

impl Service for Hello {
    fn handle_request(&self, request: Request) -> Response {
        Response::full(200, format!("hello from {}\n", request.path))
            .with_header("content-type", "text/plain")
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = App::new("trellis")
        .version(crate_version!())
        .arg(Arg::with_name("listen").required(true).index(1))
        .arg(Arg::with_name("cert").long("cert").takes_value(true))
        .arg(Arg::with_name("key").long("key").takes_value(true))
        .get_matches();
    let listen = matches.value_of("listen").expect("missing listen address");

    let server = match (matches.value_of("cert"), matches.value_of("key")) {
        (Some(cert), Some(key)) => Server::with_tls(Hello, Path::new(cert), Path::new(key))?,
        _ => Server::new(Hello),
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(server.serve(listen))
}
