//! Signing keypairs (sr25519 and ed25519)
//!
//! Keypairs come from raw seeds, BIP39 mnemonics or secret URIs of the form
//! `<phrase or 0x seed>[//hard][/soft][///password]`. A URI that starts with
//! a path (`//Alice`) derives from [`DEV_PHRASE`].

use crate::address::{decode_ss58, encode_ss58};
use crate::codec::blake2_256;
use crate::error::{InterfaceError, Result};
use crate::types::from_hex;
use bip39::Mnemonic;
use ed25519_dalek::{Signer, Verifier};
use parity_scale_codec::Encode;
use schnorrkel::derive::{ChainCode, Derivation};
use schnorrkel::ExpansionMode;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;

/// Signing context substrate uses for sr25519
const SR25519_CONTEXT: &[u8] = b"substrate";

/// Well-known development mnemonic behind `//Alice`, `//Bob`, ...
pub const DEV_PHRASE: &str = "bottom drive obey lake curtain smoke basket hold race lonely fit walk";

const PBKDF2_ROUNDS: u32 = 2048;

/// Signature scheme of a keypair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoType {
    Ed25519,
    Sr25519,
}

impl CryptoType {
    /// `MultiSignature` variant index
    pub fn multi_signature_index(self) -> u8 {
        match self {
            CryptoType::Ed25519 => 0x00,
            CryptoType::Sr25519 => 0x01,
        }
    }

    pub fn from_multi_signature_index(index: u8) -> Option<Self> {
        match index {
            0x00 => Some(CryptoType::Ed25519),
            0x01 => Some(CryptoType::Sr25519),
            _ => None,
        }
    }
}

#[derive(Clone)]
enum SecretKey {
    Sr25519(Box<schnorrkel::Keypair>),
    Ed25519(Box<ed25519_dalek::SigningKey>),
}

/// A public key plus, optionally, the secret needed to sign with it
#[derive(Clone)]
pub struct Keypair {
    crypto_type: CryptoType,
    public_key: [u8; 32],
    secret: Option<SecretKey>,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("crypto_type", &self.crypto_type)
            .field("public_key", &hex::encode(self.public_key))
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl Keypair {
    /// Keypair from a 32-byte seed (mini secret key for sr25519).
    pub fn from_seed(seed: &[u8], crypto_type: CryptoType) -> Result<Self> {
        Self::derive(seed_array(seed)?, &[], crypto_type)
    }

    /// Keypair from a `0x`-prefixed hex seed
    pub fn from_seed_hex(seed: &str, crypto_type: CryptoType) -> Result<Self> {
        Self::from_seed(&from_hex(seed)?, crypto_type)
    }

    /// Keypair from a BIP39 mnemonic and optional password
    pub fn from_mnemonic(phrase: &str, password: Option<&str>, crypto_type: CryptoType) -> Result<Self> {
        Self::derive(seed_from_phrase(phrase, password)?, &[], crypto_type)
    }

    /// Keypair from a secret URI such as `//Alice` or `<mnemonic>//stash///password`
    pub fn from_uri(uri: &str, crypto_type: CryptoType) -> Result<Self> {
        let secret = SecretUri::parse(uri)?;
        let seed = if secret.phrase.starts_with("0x") {
            seed_array(&from_hex(secret.phrase)?)?
        } else {
            seed_from_phrase(secret.phrase, secret.password)?
        };
        Self::derive(seed, &secret.junctions, crypto_type)
    }

    fn derive(seed: [u8; 32], junctions: &[DeriveJunction], crypto_type: CryptoType) -> Result<Self> {
        let (public_key, secret) = match crypto_type {
            CryptoType::Sr25519 => {
                let mini = schnorrkel::MiniSecretKey::from_bytes(&seed)
                    .map_err(|e| InterfaceError::InvalidInput(format!("Invalid seed: {}", e)))?;
                let secret = junctions
                    .iter()
                    .fold(mini.expand(ExpansionMode::Ed25519), |secret, junction| match junction {
                        DeriveJunction::Hard(cc) => secret
                            .hard_derive_mini_secret_key(Some(ChainCode(*cc)), b"")
                            .0
                            .expand(ExpansionMode::Ed25519),
                        DeriveJunction::Soft(cc) => secret.derived_key_simple(ChainCode(*cc), b"").0,
                    });
                let keypair = secret.to_keypair();
                (
                    keypair.public.to_bytes(),
                    SecretKey::Sr25519(Box::new(keypair)),
                )
            }
            CryptoType::Ed25519 => {
                let seed = junctions.iter().try_fold(seed, |seed, junction| match junction {
                    DeriveJunction::Hard(cc) => Ok(blake2_256(&("Ed25519HDKD", seed, *cc).encode())),
                    DeriveJunction::Soft(_) => Err(InterfaceError::InvalidInput(
                        "Soft derivation is not supported for ed25519".to_string(),
                    )),
                })?;
                let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
                (
                    signing_key.verifying_key().to_bytes(),
                    SecretKey::Ed25519(Box::new(signing_key)),
                )
            }
        };

        Ok(Self {
            crypto_type,
            public_key,
            secret: Some(secret),
        })
    }

    /// Verification-only keypair; signing fails with `Signing`
    pub fn from_public_key(public_key: [u8; 32], crypto_type: CryptoType) -> Self {
        Self {
            crypto_type,
            public_key,
            secret: None,
        }
    }

    /// Verification-only keypair for an SS58 address
    pub fn from_ss58_address(address: &str, crypto_type: CryptoType) -> Result<Self> {
        let (public_key, _) = decode_ss58(address)?;
        Ok(Self::from_public_key(public_key, crypto_type))
    }

    pub fn crypto_type(&self) -> CryptoType {
        self.crypto_type
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn can_sign(&self) -> bool {
        self.secret.is_some()
    }

    pub fn ss58_address(&self, format: u16) -> Result<String> {
        encode_ss58(&self.public_key, format)
    }

    /// Sign `message` with the keypair's scheme
    pub fn sign(&self, message: &[u8]) -> Result<[u8; 64]> {
        match &self.secret {
            Some(SecretKey::Sr25519(keypair)) => {
                let context = schnorrkel::signing_context(SR25519_CONTEXT);
                Ok(keypair.sign(context.bytes(message)).to_bytes())
            }
            Some(SecretKey::Ed25519(signing_key)) => Ok(signing_key.sign(message).to_bytes()),
            None => Err(InterfaceError::Signing(
                "Keypair has no private key".to_string(),
            )),
        }
    }

    /// Check a signature against this keypair's public key
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        match self.crypto_type {
            CryptoType::Sr25519 => {
                let Ok(public) = schnorrkel::PublicKey::from_bytes(&self.public_key) else {
                    return false;
                };
                let Ok(signature) = schnorrkel::Signature::from_bytes(signature) else {
                    return false;
                };
                public
                    .verify_simple(SR25519_CONTEXT, message, &signature)
                    .is_ok()
            }
            CryptoType::Ed25519 => {
                let Ok(public) = ed25519_dalek::VerifyingKey::from_bytes(&self.public_key) else {
                    return false;
                };
                let signature = ed25519_dalek::Signature::from_bytes(signature);
                public.verify(message, &signature).is_ok()
            }
        }
    }

    /// Signature wrapped as `MultiSignature` (variant byte + 64 bytes)
    pub fn multi_signature(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self.sign(message)?;
        let mut encoded = Vec::with_capacity(65);
        encoded.push(self.crypto_type.multi_signature_index());
        encoded.extend_from_slice(&signature);
        Ok(encoded)
    }
}

fn seed_array(seed: &[u8]) -> Result<[u8; 32]> {
    seed.try_into().map_err(|_| {
        InterfaceError::InvalidInput(format!("Seed must be 32 bytes, got {}", seed.len()))
    })
}

/// Mini secret key for a mnemonic: PBKDF2-HMAC-SHA512 over the entropy, salted
/// with `mnemonic` plus the password, truncated to 32 bytes
fn seed_from_phrase(phrase: &str, password: Option<&str>) -> Result<[u8; 32]> {
    let mnemonic = Mnemonic::parse(phrase)
        .map_err(|e| InterfaceError::InvalidInput(format!("Invalid mnemonic: {}", e)))?;
    let salt = format!("mnemonic{}", password.unwrap_or_default());
    let mut seed = [0u8; 64];
    pbkdf2::pbkdf2_hmac::<Sha512>(&mnemonic.to_entropy(), salt.as_bytes(), PBKDF2_ROUNDS, &mut seed);
    seed_array(&seed[..32])
}

/// One step of a derivation path, holding its chain code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeriveJunction {
    Soft([u8; 32]),
    Hard([u8; 32]),
}

impl DeriveJunction {
    /// Numeric segments are encoded as u64, anything else as a SCALE string;
    /// codes longer than 32 bytes are hashed.
    fn chain_code(segment: &str) -> [u8; 32] {
        let encoded = match segment.parse::<u64>() {
            Ok(n) => n.encode(),
            Err(_) => segment.encode(),
        };
        if encoded.len() > 32 {
            return blake2_256(&encoded);
        }
        let mut cc = [0u8; 32];
        cc[..encoded.len()].copy_from_slice(&encoded);
        cc
    }

    pub fn soft(segment: &str) -> Self {
        DeriveJunction::Soft(Self::chain_code(segment))
    }

    pub fn hard(segment: &str) -> Self {
        DeriveJunction::Hard(Self::chain_code(segment))
    }
}

#[derive(Debug)]
struct SecretUri<'a> {
    phrase: &'a str,
    junctions: Vec<DeriveJunction>,
    password: Option<&'a str>,
}

impl<'a> SecretUri<'a> {
    fn parse(uri: &'a str) -> Result<Self> {
        let (body, password) = match uri.find("///") {
            Some(pos) => (&uri[..pos], Some(&uri[pos + 3..])),
            None => (uri, None),
        };
        let (phrase, mut path) = body.split_at(body.find('/').unwrap_or(body.len()));
        let phrase = match phrase.trim() {
            "" => DEV_PHRASE,
            phrase => phrase,
        };

        let mut junctions = Vec::new();
        while let Some(rest) = path.strip_prefix('/') {
            let (hard, rest) = match rest.strip_prefix('/') {
                Some(rest) => (true, rest),
                None => (false, rest),
            };
            let end = rest.find('/').unwrap_or(rest.len());
            let segment = &rest[..end];
            if segment.is_empty() {
                return Err(InterfaceError::InvalidInput(
                    "Empty derivation junction in secret URI".to_string(),
                ));
            }
            junctions.push(if hard {
                DeriveJunction::hard(segment)
            } else {
                DeriveJunction::soft(segment)
            });
            path = &rest[end..];
        }

        Ok(Self {
            phrase,
            junctions,
            password,
        })
    }
}
