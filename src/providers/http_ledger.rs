use crate::core::{LedgerQuery, PurchaseLedger, PurchaseRecord};
use crate::providers::util::with_retry;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Url;
use tracing::debug;

/// Purchase ledger served over HTTP.
///
/// `GET {base_url}/purchases?product_id=..&warehouse_id=..&since=..&until=..`
/// answers a JSON array of purchase records with decimal-string costs.
pub struct HttpLedger {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLedger {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("margo/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpLedger {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn purchases_url(&self, query: &LedgerQuery) -> Result<Url> {
        let mut params = vec![
            ("product_id", query.product_id.clone()),
            ("since", query.since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("until", query.until.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        if let Some(warehouse_id) = &query.warehouse_id {
            params.push(("warehouse_id", warehouse_id.clone()));
        }
        Url::parse_with_params(&format!("{}/purchases", self.base_url), &params)
            .with_context(|| format!("Invalid ledger base URL: {}", self.base_url))
    }
}

#[async_trait]
impl PurchaseLedger for HttpLedger {
    async fn purchase_records(&self, query: &LedgerQuery) -> Result<Vec<PurchaseRecord>> {
        let url = self.purchases_url(query)?;
        debug!("Requesting purchase records from {}", url);

        let response = with_retry(|| self.client.get(url.clone()).send(), 3, 500)
            .await
            .with_context(|| format!("Failed to send request for product: {}", query.product_id))?;

        let response_text = response.text().await.with_context(|| {
            format!("Failed to get response text for product: {}", query.product_id)
        })?;

        if response_text.trim().is_empty() {
            return Err(anyhow!(
                "Received empty response for product: {}",
                query.product_id
            ));
        }

        let records: Vec<PurchaseRecord> =
            serde_json::from_str(&response_text).with_context(|| {
                format!(
                    "Failed to parse ledger response for product: {}. Response: '{response_text}'",
                    query.product_id
                )
            })?;

        debug!(
            "Received {} purchase records for {}",
            records.len(),
            query.product_id
        );
        Ok(records)
    }
}
