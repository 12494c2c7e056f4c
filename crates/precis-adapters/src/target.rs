use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use precis_core::{Summary, ThreadBinding};

use crate::error::{DeliveryError, RegistryError};

/// Proof of a completed delivery to one target.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub target_id: String,
    /// Target-native reference (row id, message id, …), when the target
    /// provides one.
    pub reference: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

/// Common interface for summary delivery targets (Coda table, webhook, …).
#[async_trait]
pub trait Target: Send + Sync {
    /// Stable identifier used in configuration (e.g. `"coda"`).
    fn id(&self) -> &str;

    async fn deliver(
        &self,
        summary: &Summary,
        binding: &ThreadBinding,
    ) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Maps target ids to adapters. Resolution failure is a configuration error
/// surfaced by startup validation, never at request time.
#[derive(Default)]
pub struct TargetRegistry {
    adapters: HashMap<String, Arc<dyn Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn Target>) {
        info!(target = %adapter.id(), "registering target adapter");
        self.adapters.insert(adapter.id().to_string(), adapter);
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Target>, RegistryError> {
        self.adapters
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAdapter {
                kind: "target",
                id: id.to_string(),
            })
    }
}
