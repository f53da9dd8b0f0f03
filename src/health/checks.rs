//! Built-in health checkers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::net::TcpStream;

use crate::client::{BoxError, CallContext, ResilientClient};
use crate::health::registry::HealthCheck;

/// Healthy when a TCP connection to `address` can be opened.
#[derive(Debug, Clone)]
pub struct TcpCheck {
    name: String,
    address: String,
}

impl TcpCheck {
    /// `address` is `host:port`; host names are resolved on every check.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[async_trait]
impl HealthCheck for TcpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CallContext) -> Result<(), BoxError> {
        let stream = ctx.run(TcpStream::connect(&self.address)).await??;
        drop(stream);
        Ok(())
    }
}

type CheckFn = dyn Fn(CallContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// Adapts an async closure into a checker.
pub struct FnCheck {
    name: String,
    check: Arc<CheckFn>,
}

impl FnCheck {
    pub fn new<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(move |ctx: CallContext| check(ctx).boxed()),
        }
    }
}

impl std::fmt::Debug for FnCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCheck").field("name", &self.name).finish()
    }
}

#[async_trait]
impl HealthCheck for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CallContext) -> Result<(), BoxError> {
        (self.check)(ctx.clone()).await
    }
}

/// Health of a downstream dependency, from its client's probe endpoint.
///
/// Named after the client's peer service. 2xx is healthy; any other status,
/// an open circuit or a transport failure is unhealthy.
#[derive(Debug, Clone)]
pub struct ClientProbe {
    client: Arc<ResilientClient>,
}

impl ClientProbe {
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthCheck for ClientProbe {
    fn name(&self) -> &str {
        self.client.peer_service()
    }

    async fn check(&self, ctx: &CallContext) -> Result<(), BoxError> {
        let status = self.client.probe(ctx).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("probe returned {}", status.as_u16()).into())
        }
    }
}
