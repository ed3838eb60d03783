//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Admin API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2021-10";

/// Configuration for the admin API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Shop name, the `{shop}` in `{shop}.myshopify.com`.
    pub shop: String,

    /// Admin API access token, sent as `X-Shopify-Access-Token`.
    #[serde(default, skip_serializing)]
    pub access_token: String,

    /// Admin API version (default: 2021-10)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Base URL override (default: https://{shop}.myshopify.com)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Log request and response bodies at debug level
    #[serde(default)]
    pub log_bodies: bool,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            shop: String::new(),
            access_token: String::new(),
            api_version: default_api_version(),
            base_url: None,
            timeout: default_timeout(),
            log_bodies: false,
        }
    }
}

impl ClientConfig {
    /// Configuration for `shop` authenticated with `access_token`.
    #[must_use]
    pub fn new(shop: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            shop: shop.into(),
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// Load from `SHOPIFY_SHOP` and `SHOPIFY_TOKEN`.
    ///
    /// `SHOPIFY_API_VERSION` and `SHOPIFY_BASE_URL` are optional; `DEBUG=1`
    /// enables body logging.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let shop = lookup("SHOPIFY_SHOP").ok_or(ConfigError::MissingEnv("SHOPIFY_SHOP"))?;
        let access_token =
            lookup("SHOPIFY_TOKEN").ok_or(ConfigError::MissingEnv("SHOPIFY_TOKEN"))?;
        let mut config = Self::new(shop, access_token);
        if let Some(version) = lookup("SHOPIFY_API_VERSION") {
            config.api_version = version;
        }
        config.base_url = lookup("SHOPIFY_BASE_URL");
        config.log_bodies = lookup("DEBUG").as_deref() == Some("1");
        Ok(config)
    }

    /// Scheme and host requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.base_url.as_ref().map_or_else(
            || format!("https://{}.myshopify.com", self.shop),
            |url| url.trim_end_matches('/').to_string(),
        )
    }

    /// URL of an admin API resource such as `graphql` or `themes/1/assets`.
    #[must_use]
    pub fn endpoint(&self, resource: &str) -> String {
        format!(
            "{}/admin/api/{}/{}.json",
            self.base_url(),
            self.api_version,
            resource.trim_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn endpoint_uses_shop_host() {
        let config = ClientConfig::new("acme", "token");
        assert_eq!(
            config.endpoint("graphql"),
            "https://acme.myshopify.com/admin/api/2021-10/graphql.json"
        );
        assert_eq!(
            config.endpoint("/themes/7/assets"),
            "https://acme.myshopify.com/admin/api/2021-10/themes/7/assets.json"
        );
    }

    #[test]
    fn base_url_override() {
        let config = ClientConfig {
            base_url: Some("http://127.0.0.1:8080/".into()),
            api_version: "2024-01".into(),
            ..ClientConfig::new("acme", "token")
        };
        assert_eq!(
            config.endpoint("graphql"),
            "http://127.0.0.1:8080/admin/api/2024-01/graphql.json"
        );
    }

    #[test]
    fn deserialize_applies_defaults() {
        let config: ClientConfig =
            serde_json::from_value(serde_json::json!({"shop": "acme", "access_token": "t"}))
                .expect("config");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.log_bodies);

        let serialized = serde_json::to_value(&config).expect("serialize");
        assert!(serialized.get("access_token").is_none());
    }

    #[test]
    fn lookup_requires_shop_and_token() {
        let env: HashMap<&str, &str> = HashMap::from([("SHOPIFY_SHOP", "acme")]);
        let err = ClientConfig::from_lookup(|key| env.get(key).map(ToString::to_string))
            .expect_err("token missing");
        assert_eq!(err, ConfigError::MissingEnv("SHOPIFY_TOKEN"));

        let env: HashMap<&str, &str> = HashMap::from([
            ("SHOPIFY_SHOP", "acme"),
            ("SHOPIFY_TOKEN", "shpat"),
            ("DEBUG", "1"),
        ]);
        let config = ClientConfig::from_lookup(|key| env.get(key).map(ToString::to_string))
            .expect("config");
        assert_eq!(config.access_token, "shpat");
        assert!(config.log_bodies);
        assert_eq!(config.base_url, None);
    }
}
