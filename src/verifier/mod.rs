//! Coupon verification against the game vendor.
//!
//! Two vendor calls are used: the redemption endpoint, which tells whether a
//! code is currently accepted, and the public coupon landing page, which shows
//! an expiry banner once a code is dead. Neither call ever surfaces an error to
//! the caller; failures collapse into a negative or neutral answer.

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::config::Config;
use crate::models::Verification;

/// Vendor reply text for a code that was accepted.
pub const GIFT_SENT_MESSAGE: &str = "The coupon gift has been sent.";

/// Message recorded when the vendor could not be reached or answered garbage.
pub const NETWORK_FAILURE_MESSAGE: &str = "Validation failed - network error";

/// Heading the landing page shows for expired codes.
const EXPIRED_MARKER_SELECTOR: &str = "h1.pop_tit";

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 9_1 like Mac OS X) \
     AppleWebKit/601.1.46 (KHTML, like Gecko) Version/9.0 Mobile/13B137 Safari/601.1";

/// Checks coupon codes with the vendor.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Ask the vendor whether `code` is redeemable. Fails closed.
    async fn verify(&self, code: &str) -> Verification;

    /// Whether the vendor's landing page reports `code` as expired. Fails open.
    async fn is_expired(&self, code: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct RedeemResponse {
    #[serde(rename = "retMsg")]
    ret_msg: Option<String>,
}

/// HTTP client for the vendor's coupon endpoints.
#[derive(Clone)]
pub struct HiveVerifier {
    client: Client,
    verify_url: String,
    probe_url: String,
    hive_id: String,
}

impl HiveVerifier {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            verify_url: config.verify_url.clone(),
            probe_url: config.expiry_probe_url.clone(),
            hive_id: config.hive_id.clone(),
        }
    }

    async fn redeem(&self, code: &str) -> Result<Verification, reqwest::Error> {
        let form = [
            ("country", "US"),
            ("lang", "en"),
            ("server", "global"),
            ("hiveid", self.hive_id.as_str()),
            ("coupon", code),
        ];

        let response: RedeemResponse = self
            .client
            .post(&self.verify_url)
            .header(header::USER_AGENT, DESKTOP_USER_AGENT)
            .header(header::ACCEPT, "application/json, text/javascript, */*; q=0.01")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(header::ORIGIN, "https://event.withhive.com")
            .header(header::REFERER, "https://event.withhive.com/ci/smon/evt_coupon")
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        Ok(verification_from_message(response.ret_msg))
    }

    fn probe_url_for(&self, code: &str) -> Option<Url> {
        let mut url = Url::parse(&self.probe_url).ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().push(code);
        Some(url)
    }

    async fn fetch_landing_page(&self, url: Url) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .header(header::USER_AGENT, MOBILE_USER_AGENT)
            .send()
            .await?
            .text()
            .await
    }
}

#[async_trait]
impl Verifier for HiveVerifier {
    async fn verify(&self, code: &str) -> Verification {
        match self.redeem(code).await {
            Ok(verification) => {
                tracing::info!(
                    code,
                    valid = verification.is_valid,
                    message = %verification.message,
                    "Vendor verification finished"
                );
                verification
            }
            Err(e) => {
                tracing::warn!(code, "Vendor verification failed: {}", e);
                Verification::rejected(NETWORK_FAILURE_MESSAGE)
            }
        }
    }

    async fn is_expired(&self, code: &str) -> bool {
        let Some(url) = self.probe_url_for(code) else {
            tracing::warn!(probe_url = %self.probe_url, "Expiry probe URL is not usable");
            return false;
        };

        match self.fetch_landing_page(url).await {
            Ok(page) => page_shows_expiry(&page),
            Err(e) => {
                tracing::warn!(code, "Expiry probe failed: {}", e);
                false
            }
        }
    }
}

fn verification_from_message(ret_msg: Option<String>) -> Verification {
    match ret_msg {
        Some(msg) if msg == GIFT_SENT_MESSAGE => Verification::accepted(msg),
        Some(msg) => Verification::rejected(msg),
        None => Verification::rejected("Unknown response"),
    }
}

/// True when the page has an `<h1>` carrying the expiry marker class.
pub fn page_shows_expiry(page: &str) -> bool {
    let Ok(selector) = Selector::parse(EXPIRED_MARKER_SELECTOR) else {
        return false;
    };
    Html::parse_document(page).select(&selector).next().is_some()
}
