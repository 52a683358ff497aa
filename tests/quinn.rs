#![cfg(feature = "quinn-transport")]
use std::net::SocketAddr;

use calc_rpc::{
    calculator::{CalculatorClient, CalculatorService, ErrorKind},
    transport::quinn::QuinnConnector,
    util::{
        make_client_endpoint, make_insecure_client_endpoint, make_server_endpoint, read_cert,
        write_cert,
    },
};
use quinn::Endpoint;

/// Spawn a calculator server on an ephemeral local port.
///
/// Returns the address to connect to and the server certificate in DER format.
fn setup_server() -> anyhow::Result<(SocketAddr, Vec<u8>)> {
    let (endpoint, cert) = make_server_endpoint("127.0.0.1:0".parse()?)?;
    let addr = endpoint.local_addr()?;
    tokio::spawn(async move {
        while let Some(incoming) = endpoint.accept().await {
            let Ok(connection) = incoming.await else {
                continue;
            };
            let listener = calc_rpc::transport::quinn::QuinnListener::new(connection, addr);
            tokio::spawn(CalculatorService.serve(listener));
        }
    });
    Ok((addr, cert))
}

async fn connect(endpoint: &Endpoint, addr: SocketAddr) -> anyhow::Result<quinn::Connection> {
    let connection = endpoint.connect(addr, "localhost")?.await?;
    Ok(connection)
}

#[tokio::test]
async fn calculator_over_quic() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let (addr, cert) = setup_server()?;
    let endpoint = make_client_endpoint("127.0.0.1:0".parse()?, &[&cert])?;
    let connection = connect(&endpoint, addr).await?;
    let client = CalculatorClient::new(QuinnConnector::new(connection));

    assert_eq!(client.sum(vec![3, 1, 4, 10]).await?, 18);
    assert_eq!(client.average([1, 2, 3, 4]).await?, 2.5);
    assert_eq!(client.max(vec![3, 1, 4, 1, 5]).await?, vec![3, 3, 4, 4, 5]);
    assert_eq!(client.square_root(16).await?, Ok(4.0));
    let err = client.square_root(-4).await?.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
    Ok(())
}

#[tokio::test]
async fn insecure_client() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let (addr, _cert) = setup_server()?;
    // no certificate needed, the client accepts anything
    let endpoint = make_insecure_client_endpoint("127.0.0.1:0".parse()?)?;
    let connection = connect(&endpoint, addr).await?;
    let client = CalculatorClient::new(QuinnConnector::new(connection));

    assert_eq!(client.sum(vec![1, 2, 3]).await?, 6);
    Ok(())
}

/// The server hands its certificate to clients through a file.
#[tokio::test]
async fn cert_via_file() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let (addr, cert) = setup_server()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cert.der");
    write_cert(&path, &cert)?;
    let cert = read_cert(&path)?;

    let endpoint = make_client_endpoint("127.0.0.1:0".parse()?, &[&cert])?;
    let connection = connect(&endpoint, addr).await?;
    let client = CalculatorClient::new(QuinnConnector::new(connection));
    assert_eq!(client.sum(vec![40, 2]).await?, 42);
    Ok(())
}
