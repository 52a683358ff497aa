//! A streaming rpc calculator service
//!
//! Numeric operations exposed over the four classic rpc interaction patterns:
//! unary (Sum, SquareRoot, Greet), server streaming (PrimeNumberDecomposition),
//! client streaming (Average) and bidi streaming (Max).
//!
//! The service and client code is generic over a transport. Two transports are
//! provided: an in-memory transport based on flume channels, and a QUIC
//! transport based on quinn, with bincode framing.
//!
//! # Example
//! ```
//! # async fn example() -> anyhow::Result<()> {
//! use calc_rpc::{calculator::{CalculatorClient, CalculatorService}, transport::flume};
//!
//! // create a connected listener/connector pair in memory
//! let (listener, connector) = flume::channel(1);
//!
//! // serve the calculator on the listener
//! tokio::spawn(CalculatorService.serve(listener));
//!
//! // call it
//! let client = CalculatorClient::new(connector);
//! let sum = client.sum(vec![1, 2, 3]).await?;
//! assert_eq!(sum, 6);
//! # Ok(())
//! # }
//! ```
#![deny(rustdoc::broken_intra_doc_links)]
use std::fmt::{Debug, Display};

use serde::{de::DeserializeOwned, Serialize};

pub mod calculator;
pub mod client;
pub mod config;
pub mod greeter;
pub mod message;
pub mod server;
pub mod transport;
#[cfg(feature = "quinn-transport")]
pub mod util;

pub use client::RpcClient;
pub use server::RpcServer;

/// Requirements for a RPC message
///
/// Even when just using the mem transport, we require messages to be Serializable and Deserializable.
/// Likewise, even when using the quinn transport, we require messages to be Send.
///
/// This does not seem like a big restriction. If you want a pure memory channel without the possibility
/// to also use the quinn transport, you might want to use a mpsc channel directly.
pub trait RpcMessage: Debug + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {}

impl<T> RpcMessage for T where
    T: Debug + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
}

/// Requirements for an internal error
///
/// All errors have to be Send and 'static so they can be sent across threads.
pub trait RpcError: Debug + Display + Send + Sync + Unpin + 'static {}

impl<T> RpcError for T where T: Debug + Display + Send + Sync + Unpin + 'static {}

/// A service
///
/// A service has request and response message types. These types have to be
/// enums containing all messages of the service, with the conversions to and
/// from the individual message types derived via `derive_more`.
pub trait Service: Send + Sync + Debug + Clone + 'static {
    /// Type of request messages
    type Req: RpcMessage;
    /// Type of response messages
    type Res: RpcMessage;
}

/// A connector for a specific [`Service`]
///
/// This is just an alias for a [`transport::Connector`] with the right types. It is
/// used to make it easier to specify the bounds of a connector that matches a
/// specific service.
pub trait Connector<S: Service>: transport::Connector<In = S::Res, Out = S::Req> {}

impl<T: transport::Connector<In = S::Res, Out = S::Req>, S: Service> Connector<S> for T {}

/// A listener for a specific [`Service`]
///
/// This is just an alias for a [`transport::Listener`] with the right types. It is
/// used to make it easier to specify the bounds of a listener that matches a
/// specific service.
pub trait Listener<S: Service>: transport::Listener<In = S::Req, Out = S::Res> {}

impl<T: transport::Listener<In = S::Req, Out = S::Res>, S: Service> Listener<S> for T {}
