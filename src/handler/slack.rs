use hmac::{Hmac, Mac};
use lambda_http::Error;
use reqwest::Client;
use sha2::Sha256;

use crate::types::SlackUserInfo;

type HmacSha256 = Hmac<Sha256>;

// Requests older than this are treated as replays.
const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;

pub fn verify_slack_signature(
    signing_secret: &str,
    body: &str,
    timestamp: &str,
    signature: &str,
) -> Result<bool, Error> {
    verify_signature_at(
        chrono::Utc::now().timestamp(),
        signing_secret,
        body,
        timestamp,
        signature,
    )
}

fn verify_signature_at(
    now: i64,
    signing_secret: &str,
    body: &str,
    timestamp: &str,
    signature: &str,
) -> Result<bool, Error> {
    let request_timestamp: i64 = timestamp.parse()?;

    if (now - request_timestamp).abs() > MAX_REQUEST_AGE_SECS {
        return Ok(false);
    }

    let base_string = format!("v0:{}:{}", timestamp, body);

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())?;
    mac.update(base_string.as_bytes());
    let calculated_signature = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

    Ok(calculated_signature == signature)
}

/// Slack Web API client used to map a user id to their email address.
pub struct SlackClient {
    client: Client,
    api_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(api_url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn get_user_email(&self, user_id: &str) -> Result<Option<String>, Error> {
        let info: SlackUserInfo = self
            .client
            .get(format!("{}/users.info", self.api_url))
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await?
            .json()
            .await?;

        if !info.ok {
            let error = info.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(format!("Slack API error: {}", error).into());
        }

        Ok(info.user.and_then(|user| user.profile.email))
    }
}
