//! QUIC transport implementation based on [quinn]
//!
//! Each rpc call maps to one bidirectional QUIC stream. Messages are length
//! delimited and serialized with bincode.
//!
//! [quinn]: https://docs.rs/quinn/
use std::{fmt, io, marker::PhantomData, net::SocketAddr, pin::Pin, result, task::Poll};

use futures_lite::Stream;
use futures_sink::Sink;
use pin_project::pin_project;
use tokio_serde::{formats::SymmetricalBincode, SymmetricallyFramed};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::{
    transport::{ConnectionErrors, Connector, Listener, LocalAddr, StreamTypes},
    RpcMessage,
};

type Socket<In, Out> = (SendSink<Out>, RecvStream<In>);

type FramedSend<Out> = SymmetricallyFramed<
    FramedWrite<quinn::SendStream, LengthDelimitedCodec>,
    Out,
    SymmetricalBincode<Out>,
>;

type FramedRecv<In> = SymmetricallyFramed<
    FramedRead<quinn::RecvStream, LengthDelimitedCodec>,
    In,
    SymmetricalBincode<In>,
>;

/// A sink that wraps a quinn SendStream with length delimiting and bincode
#[pin_project]
pub struct SendSink<Out>(#[pin] FramedSend<Out>);

impl<Out> fmt::Debug for SendSink<Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendSink").finish()
    }
}

impl<Out: RpcMessage> Sink<Out> for SendSink<Out> {
    type Error = io::Error;

    fn poll_ready(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.project().0.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Out) -> Result<(), Self::Error> {
        self.project().0.start_send(item)
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.project().0.poll_flush(cx)
    }

    fn poll_close(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.project().0.poll_close(cx)
    }
}

/// A stream that wraps a quinn RecvStream with length delimiting and bincode
#[pin_project]
pub struct RecvStream<In>(#[pin] FramedRecv<In>);

impl<In> fmt::Debug for RecvStream<In> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecvStream").finish()
    }
}

impl<In: RpcMessage> Stream for RecvStream<In> {
    type Item = result::Result<In, io::Error>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.project().0.poll_next(cx)
    }
}

/// Wrap a raw quinn stream pair into a typed message channel
fn wrap_bi_stream<In: RpcMessage, Out: RpcMessage>(
    (send, recv): (quinn::SendStream, quinn::RecvStream),
) -> Socket<In, Out> {
    // turn chunks of bytes into a stream of frames using length delimiting
    let send = FramedWrite::new(send, LengthDelimitedCodec::new());
    let recv = FramedRead::new(recv, LengthDelimitedCodec::new());
    // now switch to streams of In and Out
    let send = SymmetricallyFramed::new(send, SymmetricalBincode::default());
    let recv = SymmetricallyFramed::new(recv, SymmetricalBincode::default());
    (SendSink(send), RecvStream(recv))
}

/// A connector using one quinn connection
pub struct QuinnConnector<In: RpcMessage, Out: RpcMessage> {
    connection: quinn::Connection,
    _p: PhantomData<(In, Out)>,
}

impl<In: RpcMessage, Out: RpcMessage> QuinnConnector<In, Out> {
    /// Create a new connector from an established quinn connection
    pub fn new(connection: quinn::Connection) -> Self {
        Self {
            connection,
            _p: PhantomData,
        }
    }
}

impl<In: RpcMessage, Out: RpcMessage> Clone for QuinnConnector<In, Out> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            _p: PhantomData,
        }
    }
}

impl<In: RpcMessage, Out: RpcMessage> fmt::Debug for QuinnConnector<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuinnConnector")
            .field("connection", &self.connection)
            .finish()
    }
}

impl<In: RpcMessage, Out: RpcMessage> ConnectionErrors for QuinnConnector<In, Out> {
    type SendError = io::Error;
    type RecvError = io::Error;
    type OpenError = quinn::ConnectionError;
    type AcceptError = quinn::ConnectionError;
}

impl<In: RpcMessage, Out: RpcMessage> StreamTypes for QuinnConnector<In, Out> {
    type In = In;
    type Out = Out;
    type SendSink = SendSink<Out>;
    type RecvStream = RecvStream<In>;
}

impl<In: RpcMessage, Out: RpcMessage> Connector for QuinnConnector<In, Out> {
    async fn open(&self) -> Result<Socket<In, Out>, quinn::ConnectionError> {
        let pair = self.connection.open_bi().await?;
        Ok(wrap_bi_stream(pair))
    }
}

/// A listener serving one accepted quinn connection
///
/// Accepting the connections themselves is left to the caller, so that one
/// process can serve many clients, each on its own task.
pub struct QuinnListener<In: RpcMessage, Out: RpcMessage> {
    connection: quinn::Connection,
    local_addr: [LocalAddr; 1],
    _p: PhantomData<(In, Out)>,
}

impl<In: RpcMessage, Out: RpcMessage> QuinnListener<In, Out> {
    /// Create a new listener from an accepted quinn connection
    pub fn new(connection: quinn::Connection, local_addr: SocketAddr) -> Self {
        Self {
            connection,
            local_addr: [LocalAddr::Socket(local_addr)],
            _p: PhantomData,
        }
    }
}

impl<In: RpcMessage, Out: RpcMessage> Clone for QuinnListener<In, Out> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            local_addr: self.local_addr.clone(),
            _p: PhantomData,
        }
    }
}

impl<In: RpcMessage, Out: RpcMessage> fmt::Debug for QuinnListener<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuinnListener")
            .field("connection", &self.connection)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl<In: RpcMessage, Out: RpcMessage> ConnectionErrors for QuinnListener<In, Out> {
    type SendError = io::Error;
    type RecvError = io::Error;
    type OpenError = quinn::ConnectionError;
    type AcceptError = quinn::ConnectionError;
}

impl<In: RpcMessage, Out: RpcMessage> StreamTypes for QuinnListener<In, Out> {
    type In = In;
    type Out = Out;
    type SendSink = SendSink<Out>;
    type RecvStream = RecvStream<In>;
}

impl<In: RpcMessage, Out: RpcMessage> Listener for QuinnListener<In, Out> {
    async fn accept(&self) -> Result<Socket<In, Out>, quinn::ConnectionError> {
        let pair = self.connection.accept_bi().await?;
        Ok(wrap_bi_stream(pair))
    }

    fn local_addr(&self) -> &[LocalAddr] {
        &self.local_addr
    }
}
