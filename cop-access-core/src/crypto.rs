use crate::errors::{DecryptError, DecryptResult};
use crate::types::{SessionCredentials, WorkerConfig};
#[allow(deprecated)]
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const NONCE_LEN: usize = 12;

/// Decrypts opaque ciphertext payloads inside a worker unit.
///
/// The concrete scheme is a deployment concern; the pipeline depends only on
/// this seam.
pub trait DecryptionEngine: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8]) -> DecryptResult<Vec<u8>>;
}

/// Builds one engine per worker unit from the configuration and session
/// material broadcast at initialization time.
pub trait EngineFactory: Send + Sync {
    fn build(
        &self,
        config: &WorkerConfig,
        credentials: &SessionCredentials,
    ) -> DecryptResult<Arc<dyn DecryptionEngine>>;
}

/// Reference engine: nonce-prefixed AES-256-GCM.
pub struct AesGcmEngine {
    key: [u8; 32],
}

impl AesGcmEngine {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive an engine key from session material, standing in for the
    /// platform-mediated key release a production deployment performs.
    pub fn from_session(credentials: &SessionCredentials) -> Self {
        let key = Sha256::digest(credentials.access_token.as_bytes()).into();
        Self { key }
    }

    /// Seal plaintext into the nonce-prefixed wire form. The read path never
    /// needs this; seeding tools and tests do.
    pub fn seal(&self, plaintext: &[u8]) -> DecryptResult<Vec<u8>> {
        let cipher = self.cipher()?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(GenericArray::from_slice(&nonce), plaintext)
            .map_err(|_| DecryptError::Crypto("seal failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn cipher(&self) -> DecryptResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| DecryptError::Crypto("invalid key length".into()))
    }
}

impl DecryptionEngine for AesGcmEngine {
    fn decrypt(&self, ciphertext: &[u8]) -> DecryptResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN {
            return Err(DecryptError::Crypto("ciphertext too short".into()));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        self.cipher()?
            .decrypt(GenericArray::from_slice(nonce), body)
            .map_err(|_| DecryptError::Crypto("message authentication failed".into()))
    }
}

/// Default factory pairing the reference engine with the broadcast session
/// credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionKeyFactory;

impl EngineFactory for SessionKeyFactory {
    fn build(
        &self,
        _config: &WorkerConfig,
        credentials: &SessionCredentials,
    ) -> DecryptResult<Arc<dyn DecryptionEngine>> {
        Ok(Arc::new(AesGcmEngine::from_session(credentials)))
    }
}
