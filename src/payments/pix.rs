use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::payments::ProviderChargeStatus;

type HmacSha256 = Hmac<Sha256>;

/// How long we wait on any provider call before treating it as a transient
/// failure. A timed-out call never transitions a payment record.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct CreateChargeRequest<'a> {
    reference: &'a str,
    amount_cents: i64,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateChargeResponse {
    txid: String,
    qr_code: String,
    copy_paste: String,
}

#[derive(Debug, Deserialize)]
struct ChargeStatusResponse {
    status: String,
}

/// A PIX charge as handed back to the purchaser: the QR payload and its
/// copy-paste form. Rendering is the storefront's problem.
#[derive(Debug, Clone, Serialize)]
pub struct PixCharge {
    pub txid: String,
    pub qr_code: String,
    pub copy_paste: String,
}

/// Client for the PIX payment provider. Only the charge-create,
/// charge-status, and webhook-signature boundary is modeled here; the
/// provider's protocol internals stay on the other side of it.
#[derive(Clone)]
pub struct PixClient {
    client: Client,
    base_url: String,
    api_key: String,
    webhook_secret: String,
}

impl PixClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            api_key: config.provider_api_key.clone(),
            webhook_secret: config.provider_webhook_secret.clone(),
        }
    }

    pub async fn create_charge(
        &self,
        reference: &str,
        amount_cents: i64,
        description: &str,
    ) -> Result<PixCharge> {
        let response = self
            .client
            .post(format!("{}/v1/charges", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CreateChargeRequest {
                reference,
                amount_cents,
                description,
            })
            .send()
            .await?
            .error_for_status()?;

        let charge: CreateChargeResponse = response.json().await?;
        Ok(PixCharge {
            txid: charge.txid,
            qr_code: charge.qr_code,
            copy_paste: charge.copy_paste,
        })
    }

    pub async fn charge_status(&self, reference: &str) -> Result<ProviderChargeStatus> {
        let response = self
            .client
            .get(format!("{}/v1/charges/{}", self.base_url, reference))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;

        let body: ChargeStatusResponse = response.json().await?;
        body.status.parse().map_err(|_| {
            AppError::Internal(format!(
                "provider reported unknown charge status '{}'",
                body.status
            ))
        })
    }

    /// Verify a webhook signature: base64 HMAC-SHA256 of the raw body,
    /// compared in constant time.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        let Ok(provided) = BASE64.decode(signature.trim()) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(body);
        let expected = mac.finalize().into_bytes();
        provided.as_slice().ct_eq(expected.as_slice()).into()
    }
}
