//! Gateway backed by asynchronous service handlers on a tokio runtime.
//!
//! The calling flow blocks on the runtime handle while the handler runs on
//! the runtime, so `call` must not be used from inside an async task. Run the
//! sequencer on a plain or `spawn_blocking` thread.

use super::{EndpointId, EndpointMap, ServiceGateway, ServiceRequest, ServiceResponse};
use crate::error::GatewayError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// A remote actor serving one endpoint
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn handle(
        &self,
        endpoint: EndpointId,
        request: ServiceRequest,
    ) -> Result<ServiceResponse, GatewayError>;
}

/// Routes calls by service name to registered handlers
pub struct AsyncServiceGateway {
    runtime: Handle,
    endpoints: EndpointMap,
    services: HashMap<String, Arc<dyn ServiceHandler>>,
}

impl AsyncServiceGateway {
    pub fn new(runtime: Handle, endpoints: EndpointMap) -> Self {
        AsyncServiceGateway {
            runtime,
            endpoints,
            services: HashMap::new(),
        }
    }

    /// Register a handler under a transport-level service name
    pub fn register(&mut self, service: impl Into<String>, handler: Arc<dyn ServiceHandler>) {
        self.services.insert(service.into(), handler);
    }

    /// Register a handler under the service name `endpoint` resolves to
    pub fn register_endpoint(&mut self, endpoint: EndpointId, handler: Arc<dyn ServiceHandler>) {
        let name = self.endpoints.service_name(endpoint).to_string();
        self.register(name, handler);
    }

    pub fn endpoints(&self) -> &EndpointMap {
        &self.endpoints
    }
}

impl ServiceGateway for AsyncServiceGateway {
    fn call(
        &self,
        endpoint: EndpointId,
        request: ServiceRequest,
        timeout: Duration,
    ) -> Result<ServiceResponse, GatewayError> {
        let service = self.endpoints.service_name(endpoint);
        let handler = self
            .services
            .get(service)
            .cloned()
            .ok_or(GatewayError::Unavailable(endpoint))?;

        debug!(%endpoint, service, ?timeout, "calling service");
        let outcome = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, handler.handle(endpoint, request)).await });

        match outcome {
            Ok(response) => response,
            Err(_elapsed) => Err(GatewayError::Timeout(endpoint, timeout)),
        }
    }
}
