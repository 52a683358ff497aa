//! Exercises all operations of the calculator service over QUIC.
//!
//! Connects to localhost on `CALC_RPC_PORT`. When `CALC_RPC_TLS` is set, the
//! server certificate is read from `CALC_RPC_CERT` and verified, otherwise
//! any certificate is accepted.
use std::net::{Ipv4Addr, SocketAddr};

use calc_rpc::{
    calculator::CalculatorClient,
    config::Config,
    transport::quinn::QuinnConnector,
    util::{make_client_endpoint, make_insecure_client_endpoint, read_cert},
};
use futures_lite::StreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::from_env("CALC_RPC")?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    let endpoint = if config.tls {
        let cert = read_cert(&config.cert_path)?;
        make_client_endpoint(bind_addr, &[&cert])?
    } else {
        make_insecure_client_endpoint(bind_addr)?
    };
    let server_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
    let connection = endpoint.connect(server_addr, "localhost")?.await?;
    let client = CalculatorClient::new(QuinnConnector::new(connection));

    let sum = client.sum(vec![3, 1, 4, 10]).await?;
    println!("sum(3, 1, 4, 10) = {sum}");

    let mut factors = client.prime_number_decomposition(120).await?;
    print!("prime factors of 120:");
    while let Some(factor) = factors.next().await {
        print!(" {}", factor?);
    }
    println!();

    let average = client.average([1, 2, 3, 4]).await?;
    println!("average(1, 2, 3, 4) = {average}");

    let maxima = client.max(vec![1, 5, 3, 6, 2, 20]).await?;
    println!("running max of (1, 5, 3, 6, 2, 20) = {maxima:?}");

    let root = client.square_root(16).await?;
    println!("sqrt(16) = {root:?}");
    let root = client.square_root(-4).await?;
    println!("sqrt(-4) = {root:?}");

    Ok(())
}
