//! The greeter service, a minimal unary service
use derive_more::{From, TryInto};
use serde::{Deserialize, Serialize};

use crate::{
    client::RpcClient,
    message::RpcMsg,
    server::{RpcChannel, RpcServer, RpcServerError},
    Connector, Listener, Service,
};

/// A person to greet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Greeting {
    pub first_name: String,
    pub last_name: String,
}

/// Greet a person, rpc
#[derive(Debug, Serialize, Deserialize)]
pub struct Greet(pub Greeting);

/// Response for [`Greet`]
#[derive(Debug, Serialize, Deserialize)]
pub struct GreetResponse(pub String);

/// All requests of the greeter service
#[derive(Debug, Serialize, Deserialize, From, TryInto)]
pub enum GreeterRequest {
    Greet(Greet),
}

/// All responses of the greeter service
#[derive(Debug, Serialize, Deserialize, From, TryInto)]
pub enum GreeterResponse {
    Greet(GreetResponse),
}

/// A service that greets people
#[derive(Debug, Clone, Copy)]
pub struct GreeterService;

impl Service for GreeterService {
    type Req = GreeterRequest;
    type Res = GreeterResponse;
}

impl RpcMsg<GreeterService> for Greet {
    type Response = GreetResponse;
}

impl GreeterService {
    async fn greet(self, req: Greet) -> GreetResponse {
        let Greeting {
            first_name,
            last_name,
        } = req.0;
        GreetResponse(format!("Hello, {first_name} {last_name}!"))
    }

    /// Handle a single request on its own channel
    pub async fn handle_request<C: Listener<GreeterService>>(
        self,
        req: GreeterRequest,
        chan: RpcChannel<GreeterService, C>,
    ) -> Result<(), RpcServerError<C>> {
        match req {
            GreeterRequest::Greet(msg) => chan.rpc(msg, self, Self::greet).await,
        }
    }

    /// Serve the greeter on the given listener until the listener fails.
    pub async fn serve<C: Listener<GreeterService>>(
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

/// A typed client for the greeter service
#[derive(Debug, Clone)]
pub struct GreeterClient<C> {
    inner: RpcClient<GreeterService, C>,
}

impl<C: Connector<GreeterService>> GreeterClient<C> {
    /// Create a new greeter client from a connector
    pub fn new(source: C) -> Self {
        Self {
            inner: RpcClient::new(source),
        }
    }

    /// Greet a person by first and last name
    pub async fn greet(
        &self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> anyhow::Result<String> {
        let greeting = Greeting {
            first_name: first_name.into(),
            last_name: last_name.into(),
        };
        let res = self.inner.rpc(Greet(greeting)).await?;
        Ok(res.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greet_kernel() {
        let res = GreeterService
            .greet(Greet(Greeting {
                first_name: "Marie".into(),
                last_name: "Curie".into(),
            }))
            .await;
        assert_eq!(res.0, "Hello, Marie Curie!");
    }
}
