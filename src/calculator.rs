//! The calculator service
//!
//! One message type per operation, grouped into a request and a response enum.
//! The four operations cover all four interaction patterns:
//!
//! - [`Sum`] and [`SquareRoot`] are plain rpc calls
//! - [`PrimeNumberDecomposition`] is server streaming
//! - [`Average`] is client streaming
//! - [`Max`] is bidi streaming
use std::fmt;

use derive_more::{From, TryInto};
use futures_lite::{Stream, StreamExt};
use futures_util::SinkExt;
use serde::{Deserialize, Serialize};

use crate::{
    client::RpcClient,
    message::{BidiStreaming, BidiStreamingMsg, ClientStreaming, ClientStreamingMsg, Msg, RpcMsg,
        ServerStreaming, ServerStreamingMsg},
    server::{RpcChannel, RpcServer, RpcServerError},
    Connector, Listener, Service,
};

/// Sum a list of numbers, rpc
///
/// The sum wraps around on overflow.
#[derive(Debug, Serialize, Deserialize)]
pub struct Sum(pub Vec<i32>);

/// Response for [`Sum`]
#[derive(Debug, Serialize, Deserialize)]
pub struct SumResponse(pub i32);

/// Decompose a number into prime factors, server streaming
///
/// The factors are sent in ascending order, one message per factor, with
/// multiplicity. Numbers smaller than 2 have no prime factors, so the
/// response stream is empty for them.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrimeNumberDecomposition(pub i64);

/// A single prime factor, response for [`PrimeNumberDecomposition`]
#[derive(Debug, Serialize, Deserialize)]
pub struct PrimeFactor(pub i64);

/// Compute the average of a stream of numbers, client streaming
#[derive(Debug, Serialize, Deserialize)]
pub struct Average;

/// Update for [`Average`], one number to include in the average
#[derive(Debug, Serialize, Deserialize)]
pub struct AverageUpdate(pub i64);

/// Response for [`Average`]
///
/// The average of an empty stream is defined as 0.
#[derive(Debug, Serialize, Deserialize)]
pub struct AverageResponse(pub f64);

/// Compute the running maximum of a stream of numbers, bidi streaming
///
/// For each update, the maximum seen so far is sent back.
#[derive(Debug, Serialize, Deserialize)]
pub struct Max;

/// Update for [`Max`], one number to include in the maximum
#[derive(Debug, Serialize, Deserialize)]
pub struct MaxUpdate(pub i64);

/// Response for [`Max`], the maximum of all updates seen so far
#[derive(Debug, Serialize, Deserialize)]
pub struct MaxResponse(pub i64);

/// Compute the square root of a number, rpc
///
/// Fails with an [`ErrorKind::InvalidArgument`] error for negative numbers.
#[derive(Debug, Serialize, Deserialize)]
pub struct SquareRoot(pub i32);

/// Response for [`SquareRoot`]
#[derive(Debug, Serialize, Deserialize)]
pub struct SquareRootResponse(pub f64);

/// The kind of a [`ServiceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The caller sent an argument the operation is not defined for
    InvalidArgument,
    /// The operation failed on the server side
    Internal,
}

/// An application level error, sent to the client as part of a response
///
/// This is distinct from the transport errors. A service error means the call
/// reached the server and was rejected there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    /// What kind of error this is
    pub kind: ErrorKind,
    /// Human readable description
    pub message: String,
}

impl ServiceError {
    /// Create an error of kind [`ErrorKind::InvalidArgument`]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidArgument,
            message: message.into(),
        }
    }

    /// Create an error of kind [`ErrorKind::Internal`]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ServiceError {}

/// All requests of the calculator service
#[derive(Debug, Serialize, Deserialize, From, TryInto)]
pub enum CalculatorRequest {
    Sum(Sum),
    PrimeNumberDecomposition(PrimeNumberDecomposition),
    Average(Average),
    AverageUpdate(AverageUpdate),
    Max(Max),
    MaxUpdate(MaxUpdate),
    SquareRoot(SquareRoot),
}

/// All responses of the calculator service
#[derive(Debug, Serialize, Deserialize, From, TryInto)]
pub enum CalculatorResponse {
    Sum(SumResponse),
    PrimeFactor(PrimeFactor),
    Average(AverageResponse),
    Max(MaxResponse),
    SquareRoot(Result<SquareRootResponse, ServiceError>),
}

/// A streaming calculator service
#[derive(Debug, Clone, Copy)]
pub struct CalculatorService;

impl Service for CalculatorService {
    type Req = CalculatorRequest;
    type Res = CalculatorResponse;
}

impl RpcMsg<CalculatorService> for Sum {
    type Response = SumResponse;
}

impl Msg<CalculatorService> for PrimeNumberDecomposition {
    type Pattern = ServerStreaming;
}

impl ServerStreamingMsg<CalculatorService> for PrimeNumberDecomposition {
    type Response = PrimeFactor;
}

impl Msg<CalculatorService> for Average {
    type Pattern = ClientStreaming;
}

impl ClientStreamingMsg<CalculatorService> for Average {
    type Update = AverageUpdate;
    type Response = AverageResponse;
}

impl Msg<CalculatorService> for Max {
    type Pattern = BidiStreaming;
}

impl BidiStreamingMsg<CalculatorService> for Max {
    type Update = MaxUpdate;
    type Response = MaxResponse;
}

impl RpcMsg<CalculatorService> for SquareRoot {
    type Response = Result<SquareRootResponse, ServiceError>;
}

impl CalculatorService {
    async fn sum(self, req: Sum) -> SumResponse {
        let sum = req.0.into_iter().fold(0i32, i32::wrapping_add);
        SumResponse(sum)
    }

    fn prime_number_decomposition(
        self,
        req: PrimeNumberDecomposition,
    ) -> impl Stream<Item = PrimeFactor> {
        async_stream::stream! {
            let mut n = req.0;
            let mut k = 2;
            while n > 1 {
                if n % k == 0 {
                    yield PrimeFactor(k);
                    n /= k;
                } else {
                    k += 1;
                }
            }
        }
    }

    async fn average(self, _req: Average, updates: impl Stream<Item = AverageUpdate>) -> AverageResponse {
        tokio::pin!(updates);
        let mut sum = 0i64;
        let mut count = 0u32;
        while let Some(AverageUpdate(value)) = updates.next().await {
            sum += value;
            count += 1;
        }
        if count == 0 {
            AverageResponse(0.0)
        } else {
            AverageResponse(sum as f64 / count as f64)
        }
    }

    fn max(
        self,
        _req: Max,
        updates: impl Stream<Item = MaxUpdate>,
    ) -> impl Stream<Item = MaxResponse> {
        async_stream::stream! {
            tokio::pin!(updates);
            let mut max = i64::MIN;
            while let Some(MaxUpdate(value)) = updates.next().await {
                max = max.max(value);
                yield MaxResponse(max);
            }
        }
    }

    async fn square_root(self, req: SquareRoot) -> Result<SquareRootResponse, ServiceError> {
        let number = req.0;
        if number < 0 {
            Err(ServiceError::invalid_argument(format!(
                "received a negative number: {number}"
            )))
        } else {
            Ok(SquareRootResponse(f64::from(number).sqrt()))
        }
    }

    /// Handle a single request on its own channel
    pub async fn handle_request<C: Listener<CalculatorService>>(
        self,
        req: CalculatorRequest,
        chan: RpcChannel<CalculatorService, C>,
    ) -> Result<(), RpcServerError<C>> {
        use CalculatorRequest::*;
        match req {
            Sum(msg) => chan.rpc(msg, self, Self::sum).await,
            PrimeNumberDecomposition(msg) => {
                chan.server_streaming(msg, self, Self::prime_number_decomposition)
                    .await
            }
            Average(msg) => {
                chan.client_streaming(msg, self, |target, msg, updates| {
                    target.average(msg, updates)
                })
                .await
            }
            Max(msg) => {
                chan.bidi_streaming(msg, self, |target, msg, updates| target.max(msg, updates))
                    .await
            }
            SquareRoot(msg) => chan.rpc(msg, self, Self::square_root).await,
            // updates are only valid within a call they belong to
            AverageUpdate(_) | MaxUpdate(_) => Err(RpcServerError::UnexpectedStartMessage),
        }
    }

    /// Serve the calculator on the given listener until the listener fails.
    ///
    /// Each request runs on its own task, so an error in a single call
    /// terminates just that call.
    pub async fn serve<C: Listener<CalculatorService>>(
        self,
        listener: C,
    ) -> Result<(), RpcServerError<C>> {
        let server = RpcServer::new(listener);
        loop {
            let (req, chan) = server.accept().await?;
            tracing::debug!("request: {req:?}");
            tokio::spawn(async move {
                if let Err(cause) = self.handle_request(req, chan).await {
                    tracing::warn!("error handling request: {cause}");
                }
            });
        }
    }
}

/// A typed client for the calculator service
///
/// This is a convenience wrapper around a [`RpcClient`] for the calculator,
/// with one method per operation.
#[derive(Debug, Clone)]
pub struct CalculatorClient<C> {
    inner: RpcClient<CalculatorService, C>,
}

impl<C: Connector<CalculatorService>> CalculatorClient<C> {
    /// Create a new calculator client from a connector
    pub fn new(source: C) -> Self {
        Self {
            inner: RpcClient::new(source),
        }
    }

    /// Sum a list of numbers
    pub async fn sum(&self, numbers: Vec<i32>) -> anyhow::Result<i32> {
        let res = self.inner.rpc(Sum(numbers)).await?;
        Ok(res.0)
    }

    /// Decompose a number into its prime factors
    ///
    /// The factors arrive as a stream, in ascending order, with multiplicity.
    pub async fn prime_number_decomposition(
        &self,
        number: i64,
    ) -> anyhow::Result<impl Stream<Item = anyhow::Result<i64>>> {
        let stream = self
            .inner
            .server_streaming(PrimeNumberDecomposition(number))
            .await?;
        Ok(stream.map(|item| match item {
            Ok(factor) => Ok(factor.0),
            Err(cause) => Err(cause.into()),
        }))
    }

    /// Compute the average of the given numbers
    pub async fn average(&self, numbers: impl IntoIterator<Item = i64>) -> anyhow::Result<f64> {
        let (mut updates, res) = self.inner.client_streaming(Average).await?;
        for number in numbers {
            updates
                .send(AverageUpdate(number))
                .await
                .map_err(anyhow::Error::msg)?;
        }
        // dropping the sink closes the update stream, which tells the server
        // that we are done sending
        drop(updates);
        let res = res.await?;
        Ok(res.0)
    }

    /// Compute the running maximum of the given numbers
    ///
    /// The result has one entry per input, the maximum of the inputs up to
    /// that point.
    pub async fn max(&self, numbers: Vec<i64>) -> anyhow::Result<Vec<i64>> {
        let (mut updates, mut res) = self.inner.bidi(Max).await?;
        // send and receive concurrently, so a slow consumer can not deadlock
        // the call
        let send = tokio::spawn(async move {
            for number in numbers {
                updates
                    .send(MaxUpdate(number))
                    .await
                    .map_err(anyhow::Error::msg)?;
            }
            drop(updates);
            anyhow::Ok(())
        });
        let mut maxima = Vec::new();
        while let Some(item) = res.next().await {
            maxima.push(item?.0);
        }
        send.await??;
        Ok(maxima)
    }

    /// Compute the square root of a number
    ///
    /// The outer error is a transport error, the inner error is an application
    /// level error such as a negative argument.
    pub async fn square_root(&self, number: i32) -> anyhow::Result<Result<f64, ServiceError>> {
        let res = self.inner.rpc(SquareRoot(number)).await?;
        Ok(res.map(|res| res.0))
    }
}

#[cfg(test)]
mod tests {
    use futures_lite::stream;

    use super::*;

    #[tokio::test]
    async fn sum_kernel() {
        let res = CalculatorService.sum(Sum(vec![3, 1, 4, 10])).await;
        assert_eq!(res.0, 18);
        let res = CalculatorService.sum(Sum(vec![])).await;
        assert_eq!(res.0, 0);
        // wraps instead of panicking
        let res = CalculatorService.sum(Sum(vec![i32::MAX, 1])).await;
        assert_eq!(res.0, i32::MIN);
    }

    #[tokio::test]
    async fn prime_number_decomposition_kernel() {
        let factors: Vec<_> = CalculatorService
            .prime_number_decomposition(PrimeNumberDecomposition(60))
            .map(|f| f.0)
            .collect()
            .await;
        assert_eq!(factors, vec![2, 2, 3, 5]);
        // numbers without prime factors give an empty stream
        for n in [-7, 0, 1] {
            let factors: Vec<_> = CalculatorService
                .prime_number_decomposition(PrimeNumberDecomposition(n))
                .collect()
                .await;
            assert!(factors.is_empty());
        }
    }

    #[tokio::test]
    async fn average_kernel() {
        let updates = stream::iter([1, 2, 3, 4].map(AverageUpdate));
        let res = CalculatorService.average(Average, updates).await;
        assert_eq!(res.0, 2.5);
        let res = CalculatorService.average(Average, stream::empty()).await;
        assert_eq!(res.0, 0.0);
    }

    #[tokio::test]
    async fn max_kernel() {
        let updates = stream::iter([3, 1, 4, 1, 5].map(MaxUpdate));
        let maxima: Vec<_> = CalculatorService
            .max(Max, updates)
            .map(|m| m.0)
            .collect()
            .await;
        assert_eq!(maxima, vec![3, 3, 4, 4, 5]);
    }

    #[tokio::test]
    async fn square_root_kernel() {
        let res = CalculatorService.square_root(SquareRoot(16)).await.unwrap();
        assert_eq!(res.0, 4.0);
        let err = CalculatorService
            .square_root(SquareRoot(-4))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(err.message.contains("-4"));
    }
}
