#![cfg(feature = "flume-transport")]
use calc_rpc::{
    greeter::{GreeterClient, GreeterService},
    transport::flume,
};

#[tokio::test]
async fn greet() -> anyhow::Result<()> {
    let (listener, connector) = flume::channel(1);
    tokio::spawn(GreeterService.serve(listener));
    let client = GreeterClient::new(connector);
    assert_eq!(client.greet("Ada", "Lovelace").await?, "Hello, Ada Lovelace!");
    assert_eq!(client.greet("Alan", "Turing").await?, "Hello, Alan Turing!");
    Ok(())
}
