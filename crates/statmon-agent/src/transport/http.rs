use std::path::Path;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use statmon_common::retry::{retry, Backoff, DEFAULT_BACKOFF};
use statmon_common::sign;
use statmon_common::types::Metric;

use super::SendError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// PKCS#1 v1.5 padding overhead; one block carries at most `modulus - 11`
/// bytes.
const PKCS1V15_OVERHEAD: usize = 11;

/// HTTP delivery to `POST /updates/`.
///
/// The body pipeline is encode → gzip → (optional base64 + RSA). The
/// `HashSHA256` header, when a key is configured, signs the bytes that
/// actually leave the process.
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
    hash_key: Option<String>,
    public_key: Option<RsaPublicKey>,
    backoff: Backoff,
}

fn is_transient(err: &SendError) -> bool {
    match err {
        SendError::Request(e) => e.is_connect() || e.is_timeout(),
        _ => false,
    }
}

impl HttpTransport {
    pub fn new(
        addr: &str,
        hash_key: Option<String>,
        crypto_key: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let public_key = match crypto_key {
            Some(path) => {
                let pem = std::fs::read_to_string(path)?;
                Some(RsaPublicKey::from_public_key_pem(&pem)?)
            }
            None => None,
        };

        Ok(Self {
            endpoint: format!("http://{addr}/updates/"),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            hash_key,
            public_key,
            backoff: DEFAULT_BACKOFF,
        })
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn encode_body(&self, metrics: &[Metric]) -> Result<Vec<u8>, SendError> {
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        serde_json::to_writer(&mut gz, metrics)?;
        let compressed = gz.finish()?;

        let Some(key) = &self.public_key else {
            return Ok(compressed);
        };

        use base64::Engine as _;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&compressed);
        let max = key.size() - PKCS1V15_OVERHEAD;
        if encoded.len() > max {
            return Err(SendError::PayloadTooLarge {
                len: encoded.len(),
                max,
            });
        }
        Ok(key.encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, encoded.as_bytes())?)
    }

    pub async fn send_metrics(&self, metrics: &[Metric], ip: &str) -> Result<(), SendError> {
        let body = self.encode_body(metrics)?;
        let digest = self
            .hash_key
            .as_ref()
            .map(|key| sign::sign(key.as_bytes(), &body));

        let response = retry(self.backoff, is_transient, || {
            let mut request = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_ENCODING, "gzip")
                .header("X-Real-IP", ip)
                .body(body.clone());
            if let Some(digest) = &digest {
                request = request.header("HashSHA256", digest.clone());
            }
            async move { request.send().await.map_err(SendError::from) }
        })
        .await?;

        if response.status() != StatusCode::OK {
            return Err(SendError::Status(response.status()));
        }
        Ok(())
    }
}
