//! Bilibili HTTP Client
//!
//! Talks to api.bilibili.com directly. Bilibili rejects requests without a
//! browser User-Agent and Referer, and stream urls require the SESSDATA
//! cookie for anything above the lowest quality.

use std::sync::LazyLock;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;

use crate::error::{check_response, json_with_limit, ApiClientError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const REFERER: &str = "https://www.bilibili.com";

/// Shared HTTP client for all Bilibili requests (connection pooling).
/// Redirects are disabled to prevent SSRF via redirect to private IPs.
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build Bilibili shared HTTP client")
});

/// Video metadata from the view API.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub bvid: String,
    pub cid: u64,
    pub title: String,
    pub owner_name: String,
    pub cover_url: String,
    pub duration_secs: u64,
}

/// Bilibili HTTP client.
pub struct BilibiliClient {
    client: Client,
    cookie: RwLock<String>,
}

impl BilibiliClient {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            client: SHARED_CLIENT.clone(),
            cookie: RwLock::new(cookie.into()),
        }
    }

    /// Swap the active cookie after the caller validated it via
    /// [`Self::check_cookie`].
    pub fn set_cookie(&self, cookie: String) {
        *self.cookie.write() = cookie;
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ApiClientError> {
        let cookie = self.cookie.read().clone();
        let mut req = self
            .client
            .get(url)
            .query(query)
            .header("Referer", REFERER);
        if !cookie.is_empty() {
            req = req.header("Cookie", cookie);
        }
        let resp = check_response(req.send().await?)?;
        json_with_limit(resp).await
    }

    /// Validate a candidate cookie against the nav endpoint.
    pub async fn check_cookie(&self, cookie: &str) -> Result<bool, ApiClientError> {
        let req = self
            .client
            .get("https://api.bilibili.com/x/web-interface/nav")
            .header("Referer", REFERER)
            .header("Cookie", cookie.to_string());
        let resp = check_response(req.send().await?)?;
        let body: Value = json_with_limit(resp).await?;
        Ok(body["data"]["isLogin"].as_bool().unwrap_or(false))
    }

    /// Get video information by BVID.
    pub async fn video_info(&self, bvid: &str) -> Result<VideoInfo, ApiClientError> {
        let body = self
            .get_json(
                "https://api.bilibili.com/x/web-interface/view",
                &[("bvid", bvid)],
            )
            .await?;

        let code = body["code"].as_i64().unwrap_or(-1);
        if code != 0 {
            return Err(ApiClientError::api(code, &body));
        }

        let data = &body["data"];
        Ok(VideoInfo {
            bvid: data["bvid"].as_str().unwrap_or(bvid).to_string(),
            cid: data["cid"].as_u64().unwrap_or(0),
            title: data["title"].as_str().unwrap_or("").to_string(),
            owner_name: data["owner"]["name"].as_str().unwrap_or("").to_string(),
            cover_url: data["pic"].as_str().unwrap_or("").to_string(),
            duration_secs: data["duration"].as_u64().unwrap_or(0),
        })
    }

    /// Get a playback URL at the requested quality (qn code).
    ///
    /// Returns `Ok(None)` when the API answers without a usable durl entry
    /// at that quality so the caller can retry a lower tier; the raw
    /// envelope goes to the debug log.
    pub async fn play_url(
        &self,
        bvid: &str,
        cid: u64,
        quality: u32,
    ) -> Result<Option<String>, ApiClientError> {
        let cid_s = cid.to_string();
        let qn = quality.to_string();
        let body = self
            .get_json(
                "https://api.bilibili.com/x/player/playurl",
                &[("bvid", bvid), ("cid", &cid_s), ("qn", &qn)],
            )
            .await?;

        let code = body["code"].as_i64().unwrap_or(-1);
        let url = body["data"]["durl"]
            .as_array()
            .and_then(|durl| durl.first())
            .and_then(|item| item["url"].as_str())
            .unwrap_or("");
        if code != 0 || url.is_empty() {
            tracing::debug!(bvid, cid, quality, response = %body, "Bilibili stream url unavailable at this quality");
            return Ok(None);
        }
        Ok(Some(url.to_string()))
    }
}
