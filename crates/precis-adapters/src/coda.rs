//! Coda target adapter — appends one row per summary to a configured table.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use precis_core::{Summary, ThreadBinding};

use crate::error::DeliveryError;
use crate::target::{DeliveryReceipt, Target};

const CODA_API: &str = "https://coda.io/apis/v1";

pub struct CodaTarget {
    client: reqwest::Client,
    api_key: String,
    doc_id: String,
    table_id: String,
}

impl CodaTarget {
    pub fn new(api_key: String, doc_id: String, table_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            doc_id,
            table_id,
        }
    }
}

#[async_trait]
impl Target for CodaTarget {
    fn id(&self) -> &str {
        "coda"
    }

    async fn deliver(
        &self,
        summary: &Summary,
        binding: &ThreadBinding,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let body = serde_json::json!({
            "rows": [{
                "cells": [
                    { "column": "Fingerprint", "value": summary.fingerprint.as_str() },
                    { "column": "Summary", "value": summary.text },
                    { "column": "Tags", "value": summary.tags.join(", ") },
                    { "column": "Thread", "value": binding.thread_id },
                ],
            }],
            // Upsert on fingerprint so a re-triggered run updates in place.
            "keyColumns": ["Fingerprint"],
        });

        debug!(doc = %self.doc_id, table = %self.table_id, "upserting summary row into Coda");

        let resp = self
            .client
            .post(format!(
                "{CODA_API}/docs/{}/tables/{}/rows",
                self.doc_id, self.table_id
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 429 || status >= 500 {
            return Err(DeliveryError::Transient(format!("Coda API HTTP {status}")));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Coda API error");
            return Err(DeliveryError::Permanent(format!(
                "Coda API HTTP {status}: {text}"
            )));
        }

        let upsert: UpsertResponse = resp.json().await.unwrap_or_default();
        Ok(DeliveryReceipt {
            target_id: self.id().to_string(),
            reference: upsert.request_id,
            delivered_at: Utc::now(),
        })
    }
}

#[derive(Default, Deserialize)]
struct UpsertResponse {
    #[serde(rename = "requestId")]
    request_id: Option<String>,
}
