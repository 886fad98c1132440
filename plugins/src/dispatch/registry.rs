use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use kondate_core::api::{DispatchOutcome, ServiceDispatcher};
use kondate_core::error::ExecutorError;

/// One named service behind the registry.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(
        &self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<DispatchOutcome, ExecutorError>;
}

/// String-keyed service router; the engine's one `ServiceDispatcher`.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, service: Arc<dyn Service>) -> Self {
        self.services.insert(service.name().to_string(), service);
        self
    }
}

#[async_trait]
impl ServiceDispatcher for ServiceRegistry {
    async fn invoke(
        &self,
        service: &str,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<DispatchOutcome, ExecutorError> {
        let Some(backend) = self.services.get(service) else {
            return Err(ExecutorError::ServiceNotFound {
                service: service.to_string(),
                method: method.to_string(),
            });
        };
        debug!(service, method, "dispatching");
        backend.handle(method, params).await
    }
}
