//! Per-document encryption for stored statements.
//!
//! Each document gets its own AES-256-GCM key, derived as
//! `HMAC-SHA256(master_key, document_id)`. The document id is also bound as
//! associated data, so a ciphertext copied onto another row fails to open.

use hmac::{Hmac, Mac};
use ring::{
    aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey},
    rand::{SecureRandom, SystemRandom},
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Ciphertext (with the GCM tag appended) and the nonce it was sealed with.
#[derive(Debug, Clone)]
pub struct SealedDocument {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

pub fn derive_document_key(master_key: &[u8; 32], document_id: Uuid) -> Result<[u8; 32], AppError> {
    let mut mac = HmacSha256::new_from_slice(master_key)
        .map_err(|e| AppError::Crypto(format!("invalid master key: {e}")))?;
    mac.update(document_id.as_bytes());

    let mut key = [0u8; 32];
    key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(key)
}

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey, AppError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| AppError::Crypto("could not build AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under a fresh random nonce.
pub fn seal(key: &[u8; 32], document_id: Uuid, plaintext: &[u8]) -> Result<SealedDocument, AppError> {
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| AppError::Crypto("no randomness for nonce".to_string()))?;

    let mut in_out = plaintext.to_vec();
    aead_key(key)?
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(document_id.as_bytes()),
            &mut in_out,
        )
        .map_err(|_| AppError::Crypto("encryption failed".to_string()))?;

    Ok(SealedDocument {
        nonce: nonce.to_vec(),
        ciphertext: in_out,
    })
}

/// Decrypt and authenticate. Any tampering with nonce, ciphertext, tag or
/// document id is a `Crypto` error.
pub fn open(key: &[u8; 32], document_id: Uuid, sealed: &SealedDocument) -> Result<Vec<u8>, AppError> {
    let nonce = Nonce::try_assume_unique_for_key(&sealed.nonce)
        .map_err(|_| AppError::Crypto("stored nonce has the wrong length".to_string()))?;

    let mut in_out = sealed.ciphertext.clone();
    let plaintext = aead_key(key)?
        .open_in_place(nonce, Aad::from(document_id.as_bytes()), &mut in_out)
        .map_err(|_| AppError::Crypto(format!("document {document_id} failed authentication")))?;

    Ok(plaintext.to_vec())
}

/// Hex SHA-256 of a plaintext document.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compare a document against its stored checksum.
pub fn verify_checksum(bytes: &[u8], expected: &str) -> Result<(), AppError> {
    if checksum(bytes).eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(AppError::Crypto("document checksum mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: [u8; 32] = [7u8; 32];

    #[test]
    fn keys_differ_per_document() {
        let a = derive_document_key(&MASTER, Uuid::new_v4()).unwrap();
        let b = derive_document_key(&MASTER, Uuid::new_v4()).unwrap();
        assert_ne!(a, b);

        let id = Uuid::new_v4();
        assert_eq!(
            derive_document_key(&MASTER, id).unwrap(),
            derive_document_key(&MASTER, id).unwrap()
        );
    }

    #[test]
    fn sealed_document_opens_with_same_key_and_id() {
        let id = Uuid::new_v4();
        let key = derive_document_key(&MASTER, id).unwrap();

        let sealed = seal(&key, id, b"%PDF-1.4 statement").unwrap();
        assert_eq!(sealed.nonce.len(), NONCE_LEN);
        assert_ne!(sealed.ciphertext.as_slice(), b"%PDF-1.4 statement");

        assert_eq!(open(&key, id, &sealed).unwrap(), b"%PDF-1.4 statement");
    }

    #[test]
    fn nonces_are_fresh() {
        let id = Uuid::new_v4();
        let key = derive_document_key(&MASTER, id).unwrap();
        let first = seal(&key, id, b"same").unwrap();
        let second = seal(&key, id, b"same").unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let id = Uuid::new_v4();
        let key = derive_document_key(&MASTER, id).unwrap();
        let mut sealed = seal(&key, id, b"balance 100.00").unwrap();
        sealed.ciphertext[0] ^= 0x01;

        assert!(matches!(open(&key, id, &sealed), Err(AppError::Crypto(_))));
    }

    #[test]
    fn ciphertext_is_bound_to_its_document() {
        let id = Uuid::new_v4();
        let key = derive_document_key(&MASTER, id).unwrap();
        let sealed = seal(&key, id, b"balance 100.00").unwrap();

        assert!(open(&key, Uuid::new_v4(), &sealed).is_err());

        let other_key = derive_document_key(&MASTER, Uuid::new_v4()).unwrap();
        assert!(open(&other_key, id, &sealed).is_err());
    }

    #[test]
    fn short_nonce_is_rejected() {
        let id = Uuid::new_v4();
        let key = derive_document_key(&MASTER, id).unwrap();
        let mut sealed = seal(&key, id, b"x").unwrap();
        sealed.nonce.pop();
        assert!(open(&key, id, &sealed).is_err());
    }

    #[test]
    fn checksum_verification() {
        let digest = checksum(b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(verify_checksum(b"abc", &digest.to_uppercase()).is_ok());
        assert!(matches!(
            verify_checksum(b"abd", &digest),
            Err(AppError::Crypto(_))
        ));
    }
}
