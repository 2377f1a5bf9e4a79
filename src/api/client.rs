use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::retry::retry;
use crate::config::AppConfig;

/// Acknowledgement messages the service returns for the POST operations.
const ACTIVATION_ACK: &str = "node action executed successfully";
const CLAIM_ACK: &str = "node points claimed successfully";

/// Reward snapshot for one wallet, as reported by the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletDetails {
    pub points: u64,
    pub streak: u64,
    pub last_claimed: Option<DateTime<Utc>>,
}

/// Typed operations against the light-node reward service.
///
/// The lifecycle drives this trait rather than the concrete client so tests
/// can script responses without a network.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// True iff the remote node session is running.
    async fn node_status(&self, address: &str) -> Result<bool, ApiError>;

    /// Points, streak and last-claim instant for a wallet.
    async fn wallet_details(&self, address: &str) -> Result<WalletDetails, ApiError>;

    /// Request activation of the wallet's node session.
    async fn activate_node(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<(), ApiError>;

    /// Claim the daily reward. `Ok(false)` means it was already claimed
    /// today; only `Ok(true)` changes anything server-side.
    async fn claim_daily_points(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<bool, ApiError>;
}

pub struct LightNodeClient {
    http: reqwest::Client,
    base_url: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl LightNodeClient {
    pub fn new(cfg: &AppConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .default_headers(identity_headers())
            .timeout(cfg.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            retry_attempts: cfg.retry_attempts,
            retry_delay: cfg.retry_delay,
        })
    }

    async fn fetch_node_status(&self, address: &str) -> Result<bool, ApiError> {
        let url = format!("{}/light-node/node-status/{}", self.base_url, address);
        let response = check_status(self.http.get(&url).send().await?)?;
        let body: Envelope<NodeStatusData> = response.json().await?;
        Ok(body
            .data
            .map(|d| d.start_timestamp.is_some())
            .unwrap_or(false))
    }

    async fn fetch_wallet_details(&self, address: &str) -> Result<WalletDetails, ApiError> {
        let url = format!("{}/referral/wallet-details/{}", self.base_url, address);
        let response = check_status(self.http.get(&url).send().await?)?;
        let body: Envelope<WalletDetailsData> = response.json().await?;
        Ok(body.data.unwrap_or_default().into())
    }

    async fn submit_activation(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/light-node/node-action/{}/start",
            self.base_url, address
        );
        let request = StartRequest {
            sign: signature,
            timestamp,
        };
        let response = check_status(self.http.post(&url).json(&request).send().await?)?;
        let body: ActionResponse = response.json().await?;
        match body.message.as_deref() {
            Some(ACTIVATION_ACK) => Ok(()),
            other => Err(ApiError::UnexpectedResponse(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    async fn submit_claim(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<(), ApiError> {
        let url = format!("{}/light-node/claim-node-points", self.base_url);
        let request = ClaimRequest {
            wallet_address: address,
            timestamp,
            sign: signature,
        };
        let response = self.http.post(&url).json(&request).send().await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            return Err(ApiError::AlreadyClaimed);
        }
        let response = check_status(response)?;
        let body: ActionResponse = response.json().await?;
        match body.message.as_deref() {
            Some(CLAIM_ACK) => Ok(()),
            other => Err(ApiError::UnexpectedResponse(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

#[async_trait]
impl NodeApi for LightNodeClient {
    async fn node_status(&self, address: &str) -> Result<bool, ApiError> {
        retry(
            || self.fetch_node_status(address),
            ApiError::is_transient,
            self.retry_attempts,
            self.retry_delay,
        )
        .await
    }

    async fn wallet_details(&self, address: &str) -> Result<WalletDetails, ApiError> {
        retry(
            || self.fetch_wallet_details(address),
            ApiError::is_transient,
            self.retry_attempts,
            self.retry_delay,
        )
        .await
    }

    async fn activate_node(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<(), ApiError> {
        retry(
            || self.submit_activation(address, signature, timestamp),
            ApiError::is_transient,
            self.retry_attempts,
            self.retry_delay,
        )
        .await
    }

    async fn claim_daily_points(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<bool, ApiError> {
        let outcome = retry(
            || self.submit_claim(address, signature, timestamp),
            ApiError::is_transient,
            self.retry_attempts,
            self.retry_delay,
        )
        .await;
        map_claim_outcome(address, outcome)
    }
}

/// Collapse the already-claimed rejection into the boolean the lifecycle
/// wants: 405 is a terminal non-error, never a recorded failure.
fn map_claim_outcome(address: &str, outcome: Result<(), ApiError>) -> Result<bool, ApiError> {
    match outcome {
        Ok(()) => Ok(true),
        Err(ApiError::AlreadyClaimed) => {
            debug!("[{}] daily points already claimed", address);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status(status))
    }
}

/// Fixed identity header set sent with every request. Cosmetic constants;
/// the service only requires them to be present.
fn identity_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        header::ORIGIN,
        HeaderValue::from_static("https://dashboard.layeredge.io"),
    );
    headers.insert(
        header::REFERER,
        HeaderValue::from_static("https://referralapi.layeredge.io/"),
    );
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        ),
    );
    headers
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeStatusData {
    start_timestamp: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WalletDetailsData {
    node_points: Option<u64>,
    daily_streak: Option<u64>,
    last_claimed: Option<String>,
}

impl From<WalletDetailsData> for WalletDetails {
    fn from(data: WalletDetailsData) -> Self {
        Self {
            points: data.node_points.unwrap_or(0),
            streak: data.daily_streak.unwrap_or(0),
            last_claimed: parse_last_claimed(data.last_claimed.as_deref()),
        }
    }
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    sign: &'a str,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest<'a> {
    wallet_address: &'a str,
    timestamp: i64,
    sign: &'a str,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    message: Option<String>,
}

/// Parse the server's `lastClaimed` value. An absent or unparseable
/// timestamp means the wallet is treated as eligible to claim.
fn parse_last_claimed(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_node_status_running_iff_timestamp_present() {
        let running: Envelope<NodeStatusData> =
            serde_json::from_str(r#"{"data":{"startTimestamp":"2025-03-01T10:00:00Z"}}"#)
                .unwrap();
        assert!(running.data.unwrap().start_timestamp.is_some());

        let stopped: Envelope<NodeStatusData> =
            serde_json::from_str(r#"{"data":{"startTimestamp":null}}"#).unwrap();
        assert!(stopped.data.unwrap().start_timestamp.is_none());

        let empty: Envelope<NodeStatusData> = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(empty.data.is_none());
    }

    #[test]
    fn test_wallet_details_defaults_for_missing_fields() {
        let body: Envelope<WalletDetailsData> =
            serde_json::from_str(r#"{"data":{}}"#).unwrap();
        let details: WalletDetails = body.data.unwrap().into();
        assert_eq!(details.points, 0);
        assert_eq!(details.streak, 0);
        assert!(details.last_claimed.is_none());
    }

    #[test]
    fn test_wallet_details_full_payload() {
        let body: Envelope<WalletDetailsData> = serde_json::from_str(
            r#"{"data":{"nodePoints":4210,"dailyStreak":7,"lastClaimed":"2025-03-01T10:15:30Z"}}"#,
        )
        .unwrap();
        let details: WalletDetails = body.data.unwrap().into();
        assert_eq!(details.points, 4210);
        assert_eq!(details.streak, 7);
        assert_eq!(
            details.last_claimed,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 30).unwrap())
        );
    }

    #[test]
    fn test_last_claimed_parse_fallbacks() {
        assert!(parse_last_claimed(None).is_none());
        assert!(parse_last_claimed(Some("")).is_none());
        assert!(parse_last_claimed(Some("garbage")).is_none());
        // Naive timestamps are normalized to UTC.
        assert_eq!(
            parse_last_claimed(Some("2025-03-01T10:15:30.250")),
            Some(
                Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 30).unwrap()
                    + chrono::Duration::milliseconds(250)
            )
        );
    }

    #[test]
    fn test_claim_outcome_mapping() {
        assert!(map_claim_outcome("0xabc", Ok(())).unwrap());
        assert!(!map_claim_outcome("0xabc", Err(ApiError::AlreadyClaimed)).unwrap());
        assert!(map_claim_outcome(
            "0xabc",
            Err(ApiError::UnexpectedResponse("invalid sign".into()))
        )
        .is_err());
    }
}
