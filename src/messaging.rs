//! Event publishers: NATS for deployments, no-op and in-memory otherwise.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::events::{DomainEvent, EventPublisher, PublishError};

#[derive(Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        let subject = format!("{}.{}", self.prefix, event.subject());
        let payload = serde_json::to_vec(&event).map_err(|e| PublishError(e.to_string()))?;
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| PublishError(e.to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: DomainEvent) -> Result<(), PublishError> { Ok(()) }
}

/// Keeps every published event; used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
    pub fn subjects(&self) -> Vec<String> { self.events().iter().map(DomainEvent::subject).collect() }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event);
        Ok(())
    }
}
