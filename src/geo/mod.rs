//! Region lookup for endpoint addresses
//!
//! Maps an endpoint's IP to a display label such as "🇩🇪 Germany". The lookup
//! is a single attempt against ipinfo.io; any failure yields the localized
//! "unknown" label and is only logged.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::error::WatchErrorTrait;
use crate::i18n::{t, Locale};
use crate::models::RegionLabel;
use crate::utils::error::GeoError;

/// Default lookup service
pub const DEFAULT_GEO_BASE_URL: &str = "https://ipinfo.io";

/// Resolves an address to a region label; never fails
#[async_trait]
pub trait GeoResolver: Send + Sync {
    async fn resolve(&self, ip: &str) -> RegionLabel;
}

/// Flag and localized name for a known country code
pub fn region_for_country(country: &str, locale: Locale) -> RegionLabel {
    let locale = locale.as_str();
    let code = country.trim().to_uppercase();

    let known = match code.as_str() {
        "RU" => Some(("🇷🇺", t!("regions.ru", locale = locale))),
        "US" => Some(("🇺🇸", t!("regions.us", locale = locale))),
        "FR" => Some(("🇫🇷", t!("regions.fr", locale = locale))),
        "CN" => Some(("🇨🇳", t!("regions.cn", locale = locale))),
        // ipinfo reports GB; UK is accepted for hand-written data
        "GB" | "UK" => Some(("🇬🇧", t!("regions.gb", locale = locale))),
        "DE" => Some(("🇩🇪", t!("regions.de", locale = locale))),
        "JP" => Some(("🇯🇵", t!("regions.jp", locale = locale))),
        "IT" => Some(("🇮🇹", t!("regions.it", locale = locale))),
        "IN" => Some(("🇮🇳", t!("regions.in", locale = locale))),
        _ => None,
    };

    match known {
        Some((flag, name)) => RegionLabel::known(code, format!("{flag} {name}")),
        None => unknown_region_with(locale),
    }
}

/// The localized "unknown" label
pub fn unknown_region(locale: Locale) -> RegionLabel {
    unknown_region_with(locale.as_str())
}

fn unknown_region_with(locale: &str) -> RegionLabel {
    RegionLabel::unknown(t!("regions.unknown", locale = locale).to_string())
}

#[derive(Debug, Deserialize)]
struct IpInfoReply {
    country: Option<String>,
}

/// ipinfo.io client
pub struct IpInfoResolver {
    client: Client,
    base_url: String,
    token: Option<String>,
    locale: Locale,
}

impl IpInfoResolver {
    /// Create a resolver against the public ipinfo.io service
    pub fn new(token: Option<String>, timeout: Duration, locale: Locale) -> Result<Self, GeoError> {
        Self::with_base_url(DEFAULT_GEO_BASE_URL, token, timeout, locale)
    }

    /// Create a resolver against a custom base URL (used by tests with mock servers)
    pub fn with_base_url(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        locale: Locale,
    ) -> Result<Self, GeoError> {
        url::Url::parse(base_url).map_err(|e| GeoError::InvalidUrl(format!("{base_url}: {e}")))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            locale,
        })
    }

    /// Fetch the country code of `ip`
    pub async fn lookup_country(&self, ip: &str) -> Result<String, GeoError> {
        let url = format!("{}/{}/json", self.base_url, ip);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let reply: IpInfoReply = response.json().await?;
        reply
            .country
            .filter(|c| !c.trim().is_empty())
            .ok_or(GeoError::MissingCountry)
    }
}

#[async_trait]
impl GeoResolver for IpInfoResolver {
    async fn resolve(&self, ip: &str) -> RegionLabel {
        match self.lookup_country(ip).await {
            Ok(country) => {
                let region = region_for_country(&country, self.locale);
                if !region.is_known() {
                    tracing::debug!(ip = %ip, country = %country, "Country has no region label");
                }
                region
            }
            Err(e) => {
                tracing::warn!(
                    ip = %ip,
                    error = %e,
                    category = e.category().as_str(),
                    "Region lookup failed"
                );
                unknown_region(self.locale)
            }
        }
    }
}
