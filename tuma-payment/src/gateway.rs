use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tuma_core::{Error, Result};

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

/// Tokens are refreshed when within this margin of expiry
const TOKEN_EXPIRY_MARGIN_SECONDS: i64 = 60;

fn default_environment() -> String {
    "sandbox".to_string()
}

fn default_country_code() -> String {
    "254".to_string()
}

fn default_trunk_prefix() -> String {
    "0".to_string()
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct MpesaConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_trunk_prefix")]
    pub trunk_prefix: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl MpesaConfig {
    pub fn base_url(&self) -> &'static str {
        if self.environment == "production" {
            PRODUCTION_BASE_URL
        } else {
            SANDBOX_BASE_URL
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StkPushOutcome {
    Accepted {
        checkout_request_id: String,
        merchant_request_id: String,
    },
    Rejected {
        reason: String,
        code: Option<String>,
    },
}

/// Terminal view of a push request as reported by the gateway query API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Completed,
    Failed,
    Cancelled,
    Timeout,
    Unknown,
}

/// Flattened webhook payload after unwrapping the callback envelope
#[derive(Debug, Clone)]
pub struct CallbackResult {
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub success: bool,
    pub result_code: i64,
    pub receipt_number: Option<String>,
    pub amount: Option<f64>,
    pub phone_number: Option<String>,
    pub transaction_time: Option<String>,
    pub failure_reason: Option<String>,
}

/// Seam between the reconciler and the mobile-money provider; tests
/// swap in a scripted implementation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn stk_push(
        &self,
        phone: &str,
        amount: u64,
        account_reference: &str,
        description: &str,
    ) -> Result<StkPushOutcome>;

    async fn query_status(&self, checkout_request_id: &str) -> Result<GatewayPaymentStatus>;
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: String,
}

/// Daraja STK push client. Constructed explicitly and injected; holds
/// its own access-token cache.
pub struct MpesaClient {
    config: MpesaConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Unexpected(format!("http client: {e}")))?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    /// Normalize a subscriber number to international format without the
    /// plus sign: "0712 345-678" becomes "254712345678".
    pub fn normalize_phone(&self, raw: &str) -> String {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
        if let Some(rest) = cleaned.strip_prefix(&self.config.trunk_prefix) {
            format!("{}{rest}", self.config.country_code)
        } else if cleaned.starts_with(&self.config.country_code) {
            cleaned.to_string()
        } else {
            format!("{}{cleaned}", self.config.country_code)
        }
    }

    /// Request password for the given YYYYMMDDHHMMSS timestamp
    fn password(&self, timestamp: &str) -> String {
        BASE64.encode(format!(
            "{}{}{timestamp}",
            self.config.shortcode, self.config.passkey
        ))
    }

    /// OAuth client-credentials token, cached until shortly before expiry
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at - Utc::now() > Duration::seconds(TOKEN_EXPIRY_MARGIN_SECONDS) {
                return Ok(cached.token.clone());
            }
        }

        let credentials = BASE64.encode(format!(
            "{}:{}",
            self.config.consumer_key, self.config.consumer_secret
        ));
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url()
        );
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Basic {credentials}"))
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("token request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Gateway(format!(
                "token request returned {}",
                response.status()
            )));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("malformed token response: {e}")))?;
        let expires_in: i64 = body.expires_in.parse().unwrap_or(3600);

        let token = body.access_token;
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
        });
        Ok(token)
    }
}

#[async_trait]
impl PaymentGateway for MpesaClient {
    async fn stk_push(
        &self,
        phone: &str,
        amount: u64,
        account_reference: &str,
        description: &str,
    ) -> Result<StkPushOutcome> {
        let token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let phone = self.normalize_phone(phone);

        let body = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": self.password(&timestamp),
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount,
            "PartyA": phone,
            "PartyB": self.config.shortcode,
            "PhoneNumber": phone,
            "CallBackURL": self.config.callback_url,
            "AccountReference": account_reference,
            "TransactionDesc": description,
        });

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("stk push request failed: {e}")))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("malformed stk push response: {e}")))?;

        if payload.get("ResponseCode").and_then(Value::as_str) == Some("0") {
            let checkout_request_id = payload
                .get("CheckoutRequestID")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Gateway("accepted push without CheckoutRequestID".to_string()))?
                .to_string();
            let merchant_request_id = payload
                .get("MerchantRequestID")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            tracing::info!(%checkout_request_id, "stk push accepted");
            Ok(StkPushOutcome::Accepted {
                checkout_request_id,
                merchant_request_id,
            })
        } else {
            let reason = payload
                .get("ResponseDescription")
                .or_else(|| payload.get("errorMessage"))
                .and_then(Value::as_str)
                .unwrap_or("push request rejected")
                .to_string();
            let code = payload
                .get("ResponseCode")
                .or_else(|| payload.get("errorCode"))
                .and_then(Value::as_str)
                .map(str::to_string);
            tracing::warn!(?code, %reason, "stk push rejected");
            Ok(StkPushOutcome::Rejected { reason, code })
        }
    }

    async fn query_status(&self, checkout_request_id: &str) -> Result<GatewayPaymentStatus> {
        let token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let body = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": self.password(&timestamp),
            "Timestamp": timestamp,
            "CheckoutRequestID": checkout_request_id,
        });

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.config.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("status query failed: {e}")))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Gateway(format!("malformed query response: {e}")))?;

        let code = payload
            .get("ResultCode")
            .and_then(result_code_value)
            .ok_or_else(|| Error::Gateway("query response without ResultCode".to_string()))?;
        Ok(map_result_code(code))
    }
}

pub fn map_result_code(code: i64) -> GatewayPaymentStatus {
    match code {
        0 => GatewayPaymentStatus::Completed,
        1 | 2001 => GatewayPaymentStatus::Failed,
        1032 => GatewayPaymentStatus::Cancelled,
        1037 => GatewayPaymentStatus::Timeout,
        _ => GatewayPaymentStatus::Unknown,
    }
}

// The gateway sends result codes as either numbers or strings
fn result_code_value(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Unwrap the Body.stkCallback envelope of a payment webhook
pub fn parse_callback(payload: &Value) -> Result<CallbackResult> {
    let callback = payload
        .get("Body")
        .and_then(|b| b.get("stkCallback"))
        .ok_or_else(|| Error::Validation("malformed callback envelope".to_string()))?;

    let checkout_request_id = callback
        .get("CheckoutRequestID")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation("callback without CheckoutRequestID".to_string()))?
        .to_string();
    let merchant_request_id = callback
        .get("MerchantRequestID")
        .and_then(Value::as_str)
        .map(str::to_string);
    let result_code = callback
        .get("ResultCode")
        .and_then(result_code_value)
        .ok_or_else(|| Error::Validation("callback without ResultCode".to_string()))?;
    let result_desc = callback
        .get("ResultDesc")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let success = result_code == 0;

    let mut receipt_number = None;
    let mut amount = None;
    let mut phone_number = None;
    let mut transaction_time = None;
    if let Some(items) = callback
        .get("CallbackMetadata")
        .and_then(|m| m.get("Item"))
        .and_then(Value::as_array)
    {
        for item in items {
            let value = item.get("Value");
            match item.get("Name").and_then(Value::as_str) {
                Some("MpesaReceiptNumber") => {
                    receipt_number = value.and_then(Value::as_str).map(str::to_string);
                }
                Some("Amount") => {
                    amount = value.and_then(Value::as_f64);
                }
                Some("PhoneNumber") => {
                    phone_number = value.and_then(|v| {
                        v.as_i64()
                            .map(|n| n.to_string())
                            .or_else(|| v.as_str().map(str::to_string))
                    });
                }
                Some("TransactionDate") => {
                    transaction_time = value.and_then(|v| {
                        v.as_i64()
                            .map(|n| n.to_string())
                            .or_else(|| v.as_str().map(str::to_string))
                    });
                }
                _ => {}
            }
        }
    }

    Ok(CallbackResult {
        checkout_request_id,
        merchant_request_id,
        success,
        result_code,
        receipt_number,
        amount,
        phone_number,
        transaction_time,
        failure_reason: if success { None } else { Some(result_desc) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MpesaConfig {
        MpesaConfig {
            environment: "sandbox".to_string(),
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_url: "https://example.com/api/payments/callback".to_string(),
            country_code: "254".to_string(),
            trunk_prefix: "0".to_string(),
            timeout_seconds: 30,
        }
    }

    #[test]
    fn test_normalize_phone_variants() {
        let client = MpesaClient::new(config()).unwrap();
        assert_eq!(client.normalize_phone("0712345678"), "254712345678");
        assert_eq!(client.normalize_phone("+254712345678"), "254712345678");
        assert_eq!(client.normalize_phone("254712345678"), "254712345678");
        assert_eq!(client.normalize_phone("0712 345-678"), "254712345678");
        assert_eq!(client.normalize_phone("712345678"), "254712345678");
    }

    #[test]
    fn test_password_is_base64_of_shortcode_passkey_timestamp() {
        let client = MpesaClient::new(config()).unwrap();
        let encoded = client.password("20250307143000");
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, b"174379passkey20250307143000");
    }

    #[test]
    fn test_result_code_mapping() {
        assert_eq!(map_result_code(0), GatewayPaymentStatus::Completed);
        assert_eq!(map_result_code(1), GatewayPaymentStatus::Failed);
        assert_eq!(map_result_code(1032), GatewayPaymentStatus::Cancelled);
        assert_eq!(map_result_code(1037), GatewayPaymentStatus::Timeout);
        assert_eq!(map_result_code(2001), GatewayPaymentStatus::Failed);
        assert_eq!(map_result_code(9999), GatewayPaymentStatus::Unknown);
    }

    #[test]
    fn test_parse_successful_callback() {
        let payload = serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 380.0},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "TransactionDate", "Value": 20191219102115u64},
                            {"Name": "PhoneNumber", "Value": 254712345678u64}
                        ]
                    }
                }
            }
        });
        let result = parse_callback(&payload).unwrap();
        assert!(result.success);
        assert_eq!(result.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(result.receipt_number.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(result.amount, Some(380.0));
        assert_eq!(result.phone_number.as_deref(), Some("254712345678"));
        assert!(result.failure_reason.is_none());
    }

    #[test]
    fn test_parse_cancelled_callback() {
        let payload = serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });
        let result = parse_callback(&payload).unwrap();
        assert!(!result.success);
        assert_eq!(result.result_code, 1032);
        assert_eq!(result.failure_reason.as_deref(), Some("Request cancelled by user"));
        assert!(result.receipt_number.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_envelope() {
        assert!(parse_callback(&serde_json::json!({})).is_err());
        assert!(parse_callback(&serde_json::json!({"Body": {}})).is_err());
        assert!(parse_callback(&serde_json::json!({
            "Body": {"stkCallback": {"ResultCode": 0}}
        }))
        .is_err());
    }
}
