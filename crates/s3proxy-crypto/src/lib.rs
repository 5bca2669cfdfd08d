//! Object-scoped envelope encryption.
//!
//! Keys are derived per object id from a single process secret, and the
//! resulting token is a Fernet-compatible envelope: version byte, timestamp,
//! IV, AES-128-CBC ciphertext, and an HMAC-SHA256 over all of it.

mod error;

pub use error::{CryptoError, Result};

use aes::Aes128;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = 1 + 8 + IV_LEN; // version + timestamp + iv

/// Derive a url-safe base64-encoded 32-byte key scoped to `object_id`.
///
/// Single-iteration PBKDF2 is a domain-separation step, not a
/// password-stretching KDF: its security rests on `secret` being
/// high-entropy, not on the iteration count.
pub fn generate_key(secret: &str, object_id: &str) -> String {
    let salt = format!("{secret}{object_id}");
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(object_id.as_bytes(), salt.as_bytes(), 1, &mut key);
    URL_SAFE.encode(key)
}

fn split_key(key_b64: &str) -> Result<([u8; 16], [u8; 16])> {
    let key = URL_SAFE
        .decode(key_b64)
        .map_err(|_| CryptoError::InvalidToken)?;
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidToken);
    }
    let mut signing = [0u8; 16];
    let mut encrypting = [0u8; 16];
    signing.copy_from_slice(&key[..16]);
    encrypting.copy_from_slice(&key[16..]);
    Ok((signing, encrypting))
}

/// Encrypt `plaintext` into a url-safe base64 envelope under `key_b64`.
pub fn encrypt(key_b64: &str, plaintext: &[u8]) -> Result<String> {
    let (signing_key, encryption_key) = split_key(key_b64)?;

    let mut iv = [0u8; IV_LEN];
    rand::Rng::fill(&mut rand::thread_rng(), &mut iv);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let ciphertext =
        Aes128CbcEnc::new(&encryption_key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut body = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    body.push(VERSION);
    body.extend_from_slice(&timestamp.to_be_bytes());
    body.extend_from_slice(&iv);
    body.extend_from_slice(&ciphertext);

    let mut mac = HmacSha256::new_from_slice(&signing_key).expect("HMAC accepts any key length");
    mac.update(&body);
    let tag = mac.finalize().into_bytes();

    let mut envelope = body;
    envelope.extend_from_slice(&tag);
    Ok(URL_SAFE.encode(envelope))
}

/// Decrypt a url-safe base64 envelope minted by [`encrypt`] under the same key.
pub fn decrypt(key_b64: &str, token: &str) -> Result<Vec<u8>> {
    let (signing_key, encryption_key) = split_key(key_b64)?;

    let envelope = URL_SAFE
        .decode(token)
        .map_err(|_| CryptoError::InvalidToken)?;
    if envelope.len() < HEADER_LEN + MAC_LEN {
        return Err(CryptoError::InvalidToken);
    }

    let (body, tag) = envelope.split_at(envelope.len() - MAC_LEN);
    if body[0] != VERSION {
        return Err(CryptoError::InvalidToken);
    }

    let mut mac = HmacSha256::new_from_slice(&signing_key).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(tag).map_err(|_| CryptoError::InvalidToken)?;

    let iv = &body[9..HEADER_LEN];
    let ciphertext = &body[HEADER_LEN..];

    Aes128CbcDec::new(&encryption_key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidToken)
}
