use std::sync::Arc;

use rsa::RsaPrivateKey;

use crate::application::Application;

/// Shared handler state. Cloned per request; everything heavy sits behind an
/// `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<Application>,
    /// HMAC key; the integrity middleware is active only when set.
    pub hash_key: Option<Arc<String>>,
    /// Envelope decryption key; the decrypt middleware is active only when set.
    pub private_key: Option<Arc<RsaPrivateKey>>,
    /// Trusted CIDR in text form; parsed per request so a bad value surfaces
    /// as a 500 on the filtered path rather than at startup.
    pub trusted_subnet: Option<Arc<String>>,
}

impl AppState {
    pub fn new(app: Arc<Application>) -> Self {
        Self {
            app,
            hash_key: None,
            private_key: None,
            trusted_subnet: None,
        }
    }

    pub fn with_hash_key(mut self, key: Option<String>) -> Self {
        self.hash_key = key.map(Arc::new);
        self
    }

    pub fn with_private_key(mut self, key: Option<RsaPrivateKey>) -> Self {
        self.private_key = key.map(Arc::new);
        self
    }

    pub fn with_trusted_subnet(mut self, subnet: Option<String>) -> Self {
        self.trusted_subnet = subnet.map(Arc::new);
        self
    }
}
