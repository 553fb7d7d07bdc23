//! Symmetric gating primitives.
//!
//! Keys are the SHA-256 digest of a secret string. Payloads are encrypted
//! with AES-256-CBC and PKCS#7 padding under a fresh random 16-byte IV;
//! both IV and ciphertext travel hex-encoded.

use aes::cipher::{
    block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::GatingError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// A 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key([REDACTED])")
    }
}

/// Hex-encoded output of [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    pub iv: String,
    pub content: String,
}

/// Derive a symmetric key from a secret string. Deterministic and one-way.
pub fn derive_key(secret: &str) -> Key {
    let digest = Sha256::digest(secret.as_bytes());
    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&digest);
    Key(bytes)
}

/// Encrypt `plaintext` under `key` with a freshly generated IV.
pub fn encrypt(plaintext: &str, key: &Key) -> Ciphertext {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let content = Aes256CbcEnc::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(&iv),
    )
    .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ciphertext {
        iv: hex::encode(iv),
        content: hex::encode(content),
    }
}

/// Decrypt hex-encoded `content` with the hex-encoded `iv` under `key`.
///
/// Bad padding or non UTF-8 output means the key does not belong to this
/// ciphertext and is reported as [`GatingError::Decryption`].
pub fn decrypt(iv: &str, content: &str, key: &Key) -> Result<String, GatingError> {
    let iv = hex::decode(iv).map_err(|_| GatingError::MalformedEvent("iv is not hex".into()))?;
    if iv.len() != IV_LEN {
        return Err(GatingError::MalformedEvent(format!(
            "iv must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }

    let content = hex::decode(content)
        .map_err(|_| GatingError::Decryption("ciphertext is not hex".into()))?;

    let plaintext = Aes256CbcDec::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(&iv),
    )
    .decrypt_padded_vec_mut::<Pkcs7>(&content)
    .map_err(|_| GatingError::Decryption("bad padding".into()))?;

    String::from_utf8(plaintext)
        .map_err(|_| GatingError::Decryption("plaintext is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let key = derive_key("Tomatoes");
        let sealed = encrypt("Hello world.", &key);
        assert_eq!(decrypt(&sealed.iv, &sealed.content, &key).unwrap(), "Hello world.");
    }

    #[test]
    fn test_roundtrip_empty_and_block_aligned() {
        let key = derive_key("k");
        for text in ["", "0123456789abcdef", "ünïcödé ⚡ payload"] {
            let sealed = encrypt(text, &key);
            assert_eq!(decrypt(&sealed.iv, &sealed.content, &key).unwrap(), text);
        }
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        assert_eq!(derive_key("abc"), derive_key("abc"));
        assert_ne!(derive_key("abc"), derive_key("abd"));
    }

    #[test]
    fn test_derive_key_is_sha256() {
        // sha256("abc")
        assert_eq!(
            hex::encode(derive_key("abc").as_bytes()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = derive_key("same");
        let a = encrypt("same text", &key);
        let b = encrypt("same text", &key);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.content, b.content);
        assert_eq!(a.iv.len(), IV_LEN * 2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(r#"{"id":"abc","content":"secret stuff"}"#, &derive_key("right"));
        // A wrong key passes PKCS#7 only by chance; when it does the
        // output is still garbage and must not equal the plaintext.
        match decrypt(&sealed.iv, &sealed.content, &derive_key("wrong")) {
            Err(GatingError::Decryption(_)) => {}
            Ok(garbled) => assert_ne!(garbled, r#"{"id":"abc","content":"secret stuff"}"#),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_iv() {
        let key = derive_key("k");
        let sealed = encrypt("x", &key);
        assert!(matches!(
            decrypt("zz", &sealed.content, &key),
            Err(GatingError::MalformedEvent(_))
        ));
        assert!(matches!(
            decrypt("00ff", &sealed.content, &key),
            Err(GatingError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext() {
        let key = derive_key("k");
        let sealed = encrypt("some longer plaintext here", &key);
        let truncated = &sealed.content[..sealed.content.len() - 2];
        assert!(matches!(
            decrypt(&sealed.iv, truncated, &key),
            Err(GatingError::Decryption(_))
        ));
    }

    #[test]
    fn test_key_debug_is_redacted() {
        assert_eq!(format!("{:?}", derive_key("secret")), "Key([REDACTED])");
    }
}
