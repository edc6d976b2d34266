//! OAuth 1.0a request signing (HMAC-SHA1) for X user-context endpoints

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Application and user credentials for OAuth 1.0a
#[derive(Debug, Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: SecretString,
    pub access_token: String,
    pub access_token_secret: SecretString,
}

impl OAuth1Credentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: SecretString,
        access_token: impl Into<String>,
        access_token_secret: SecretString,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret,
            access_token: access_token.into(),
            access_token_secret,
        }
    }

    /// Names of credentials that are blank
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.consumer_key.trim().is_empty() {
            missing.push("consumer key");
        }
        if self.consumer_secret.expose_secret().trim().is_empty() {
            missing.push("consumer secret");
        }
        if self.access_token.trim().is_empty() {
            missing.push("access token");
        }
        if self.access_token_secret.expose_secret().trim().is_empty() {
            missing.push("access token secret");
        }
        missing
    }

    /// Build the `Authorization` header for a request with a fresh nonce and timestamp.
    ///
    /// `params` are query or form parameters; JSON bodies are not signed.
    pub fn authorization_header(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = time::OffsetDateTime::now_utc().unix_timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth_params = self.oauth_params(nonce, timestamp);

        let mut all_params = oauth_params.clone();
        all_params.extend(params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let base = signature_base_string(method, url, &all_params);
        let signature = sign(
            &base,
            self.consumer_secret.expose_secret(),
            self.access_token_secret.expose_secret(),
        );
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        format!("OAuth {}", fields)
    }

    fn oauth_params(&self, nonce: &str, timestamp: &str) -> Vec<(String, String)> {
        vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.access_token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ]
    }
}

/// RFC 3986 encoding: only unreserved characters stay literal
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    )
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));

    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base.as_bytes());

    STANDARD.encode(mac.finalize().into_bytes())
}
