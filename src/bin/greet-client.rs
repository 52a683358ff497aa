//! Greets someone via the greeter service over QUIC.
use std::net::{Ipv4Addr, SocketAddr};

use calc_rpc::{
    config::Config,
    greeter::GreeterClient,
    transport::quinn::QuinnConnector,
    util::{make_client_endpoint, make_insecure_client_endpoint, read_cert},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::from_env("GREET_RPC")?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    let endpoint = if config.tls {
        let cert = read_cert(&config.cert_path)?;
        make_client_endpoint(bind_addr, &[&cert])?
    } else {
        make_insecure_client_endpoint(bind_addr)?
    };
    let server_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
    let connection = endpoint.connect(server_addr, "localhost")?.await?;
    let client = GreeterClient::new(QuinnConnector::new(connection));

    let greeting = client.greet("Marie", "Curie").await?;
    println!("{greeting}");

    Ok(())
}
