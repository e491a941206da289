use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

use crate::error::Error;

/// Outcome of a charge request against the payment collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ChargeOutcome {
    Approved { charge_id: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentGateway {
    async fn charge_rider(
        &self,
        rider_id: Uuid,
        amount_cents: i64,
        ride_id: Uuid,
    ) -> Result<ChargeOutcome, Error>;
}

/// The hosted payment collaborator. Gateway-side mechanics (cards on file,
/// retries, receipts) live behind its API.
#[derive(Debug)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct ChargeRequest {
    rider_id: Uuid,
    amount_cents: i64,
    ride_id: Uuid,
}

#[derive(Clone, Debug, Deserialize)]
struct ChargeResponse {
    status: String,
    charge_id: Option<String>,
    reason: Option<String>,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self))]
    async fn charge_rider(
        &self,
        rider_id: Uuid,
        amount_cents: i64,
        ride_id: Uuid,
    ) -> Result<ChargeOutcome, Error> {
        let api_base = env::var("PAYMENTS_API_BASE")?;
        let key = env::var("PAYMENTS_API_KEY")?;

        let url = format!("https://{}/v1/charges", api_base);

        let res = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(&ChargeRequest {
                rider_id,
                amount_cents,
                ride_id,
            })
            .send()
            .await?;

        let status_code = res.status().as_u16();

        if status_code != 200 {
            tracing::warn!("payment collaborator returned status {}", status_code);
            return Err(Error::upstream_error());
        }

        let body: ChargeResponse = res.json().await?;

        match body.status.as_str() {
            "approved" => {
                let charge_id = body.charge_id.ok_or_else(|| Error::upstream_error())?;
                Ok(ChargeOutcome::Approved { charge_id })
            }
            "declined" => Ok(ChargeOutcome::Declined {
                reason: body.reason.unwrap_or_else(|| "declined".into()),
            }),
            _ => Err(Error::upstream_error()),
        }
    }
}
