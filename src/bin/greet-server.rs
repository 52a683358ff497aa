//! Serves the greeter service over QUIC.
//!
//! Configured via the `GREET_RPC_PORT` and `GREET_RPC_CERT` environment
//! variables.
use std::net::{Ipv4Addr, SocketAddr};

use calc_rpc::{
    config::Config,
    greeter::GreeterService,
    transport::quinn::QuinnListener,
    util::{make_server_endpoint, write_cert},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::from_env("GREET_RPC")?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let (endpoint, cert) = make_server_endpoint(bind_addr)?;
    write_cert(&config.cert_path, &cert)?;
    let local_addr = endpoint.local_addr()?;
    info!("greeter listening on {local_addr}");
    while let Some(incoming) = endpoint.accept().await {
        let connection = match incoming.await {
            Ok(connection) => connection,
            Err(cause) => {
                warn!("error accepting connection: {cause}");
                continue;
            }
        };
        info!("connection from {}", connection.remote_address());
        let listener = QuinnListener::new(connection, local_addr);
        tokio::spawn(async move {
            if let Err(cause) = GreeterService.serve(listener).await {
                info!("connection closed: {cause}");
            }
        });
    }
    Ok(())
}
