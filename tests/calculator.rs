#![cfg(feature = "flume-transport")]
use calc_rpc::{
    calculator::{
        CalculatorClient, CalculatorRequest, CalculatorResponse, CalculatorService, ErrorKind,
        Sum,
    },
    transport::{
        flume::{self, FlumeConnector},
        Connector,
    },
};
use futures_lite::StreamExt;
use futures_util::SinkExt;
use rand::Rng;

type CalcClient = CalculatorClient<FlumeConnector<CalculatorResponse, CalculatorRequest>>;

/// Spawn a calculator server and return a client for it.
fn setup() -> CalcClient {
    let (listener, connector) = flume::channel(1);
    tokio::spawn(CalculatorService.serve(listener));
    CalculatorClient::new(connector)
}

async fn factors(client: &CalcClient, n: i64) -> anyhow::Result<Vec<i64>> {
    let mut stream = client.prime_number_decomposition(n).await?;
    let mut factors = Vec::new();
    while let Some(factor) = stream.next().await {
        factors.push(factor?);
    }
    Ok(factors)
}

#[tokio::test]
async fn sum() -> anyhow::Result<()> {
    let client = setup();
    assert_eq!(client.sum(vec![3, 1, 4, 10]).await?, 18);
    assert_eq!(client.sum(vec![]).await?, 0);
    assert_eq!(client.sum(vec![i32::MAX, 1]).await?, i32::MIN);
    Ok(())
}

#[tokio::test]
async fn prime_number_decomposition() -> anyhow::Result<()> {
    let client = setup();
    assert_eq!(factors(&client, 60).await?, vec![2, 2, 3, 5]);
    assert_eq!(factors(&client, 120).await?, vec![2, 2, 2, 3, 5]);
    assert_eq!(factors(&client, 7).await?, vec![7]);
    // no factors for numbers below 2
    assert!(factors(&client, 1).await?.is_empty());
    assert!(factors(&client, 0).await?.is_empty());
    assert!(factors(&client, -60).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn prime_number_decomposition_randomized() -> anyhow::Result<()> {
    let client = setup();
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let n = rng.gen_range(2i64..100_000);
        let factors = factors(&client, n).await?;
        // multiplying the factors must give back the number
        assert_eq!(factors.iter().product::<i64>(), n);
        // and they must come in ascending order
        assert!(factors.windows(2).all(|w| w[0] <= w[1]));
    }
    Ok(())
}

#[tokio::test]
async fn average() -> anyhow::Result<()> {
    let client = setup();
    assert_eq!(client.average([1, 2, 3, 4]).await?, 2.5);
    assert_eq!(client.average([5]).await?, 5.0);
    assert_eq!(client.average([]).await?, 0.0);
    Ok(())
}

#[tokio::test]
async fn max() -> anyhow::Result<()> {
    let client = setup();
    assert_eq!(
        client.max(vec![3, 1, 4, 1, 5]).await?,
        vec![3, 3, 4, 4, 5]
    );
    assert_eq!(
        client.max(vec![1, 5, 3, 6, 2, 20]).await?,
        vec![1, 5, 5, 6, 6, 20]
    );
    assert_eq!(client.max(vec![-3, -7]).await?, vec![-3, -3]);
    assert!(client.max(vec![]).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn square_root() -> anyhow::Result<()> {
    let client = setup();
    assert_eq!(client.square_root(16).await?, Ok(4.0));
    assert_eq!(client.square_root(0).await?, Ok(0.0));
    let err = client.square_root(-4).await?.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
    assert!(err.message.contains("-4"));
    Ok(())
}

/// The operations are pure, repeating a call gives the same answer.
#[tokio::test]
async fn idempotence() -> anyhow::Result<()> {
    let client = setup();
    for _ in 0..3 {
        assert_eq!(client.sum(vec![3, 1, 4, 10]).await?, 18);
        assert_eq!(client.square_root(16).await?, Ok(4.0));
    }
    Ok(())
}

#[tokio::test]
async fn concurrent_calls() -> anyhow::Result<()> {
    let client = setup();
    let mut tasks = Vec::new();
    for i in 0..10 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let sum = client.sum(vec![i, i]).await?;
            anyhow::Ok(sum)
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await??, 2 * i as i32);
    }
    Ok(())
}

/// An update message as the first message of a call is a protocol violation.
/// The server must drop that call and keep serving others.
#[tokio::test]
async fn update_as_start_message() -> anyhow::Result<()> {
    let (listener, connector) = flume::channel(1);
    tokio::spawn(CalculatorService.serve(listener));

    let (mut send, mut recv) = connector.open().await?;
    send.send(CalculatorRequest::AverageUpdate(
        calc_rpc::calculator::AverageUpdate(1),
    ))
    .await?;
    // the server rejects the call by dropping the channel
    assert!(recv.next().await.is_none());

    // but other calls on the same listener still work
    let client = CalculatorClient::new(connector);
    assert_eq!(client.sum(vec![1, 2]).await?, 3);
    Ok(())
}

/// The first message decides the call, further request messages on the same
/// channel are unexpected for rpc calls.
#[tokio::test]
async fn update_on_rpc_call() -> anyhow::Result<()> {
    let (listener, connector) = flume::channel(1);
    tokio::spawn(CalculatorService.serve(listener));

    let (mut send, mut recv) = connector.open().await?;
    send.send(Sum(vec![1]).into()).await?;
    send.send(Sum(vec![2]).into()).await?;
    // the server may answer the first request before noticing the second
    // message, but it must terminate the call
    while recv.next().await.is_some() {}

    let client = CalculatorClient::new(connector);
    assert_eq!(client.sum(vec![1, 2]).await?, 3);
    Ok(())
}
