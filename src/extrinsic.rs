//! Signed extrinsic envelope (transaction version 4)

use crate::builder::Call;
use crate::codec::{blake2_256, decode_compact, encode_compact};
use crate::error::{InterfaceError, Result};
use crate::keypair::{CryptoType, Keypair};
use crate::types::{to_hex, AddressType, Era, Hash, Material};
use parity_scale_codec::{Decode, Encode};

/// Version byte of a signed v4 extrinsic
const SIGNED_V4: u8 = 0x84;

/// Signing payloads longer than this are hashed before signing
const MAX_UNHASHED_PAYLOAD: usize = 256;

/// Per-transaction fields that go into the signed extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtrinsicParams {
    pub era: Era,
    pub nonce: u32,
    pub tip: u128,
    /// Hash of the era's birth block; genesis for immortal extrinsics
    pub checkpoint: Hash,
}

/// Bytes the signer signs over.
///
/// `call ‖ era ‖ nonce ‖ tip ‖ spec_version ‖ tx_version ‖ genesis ‖ checkpoint`
pub fn signing_payload(call_data: &[u8], params: &ExtrinsicParams, material: &Material) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(call_data);
    params.era.encode_to(&mut payload);
    encode_compact(params.nonce as u128, &mut payload);
    encode_compact(params.tip, &mut payload);
    payload.extend_from_slice(&material.spec_version.to_le_bytes());
    payload.extend_from_slice(&material.transaction_version.to_le_bytes());
    payload.extend_from_slice(&material.genesis_hash);
    payload.extend_from_slice(&params.checkpoint);

    if payload.len() > MAX_UNHASHED_PAYLOAD {
        blake2_256(&payload).to_vec()
    } else {
        payload
    }
}

/// A signed extrinsic; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extrinsic {
    bytes: Vec<u8>,
    hash: Hash,
    signer: [u8; 32],
    crypto_type: CryptoType,
    signature: [u8; 64],
    era: Era,
    nonce: u32,
    tip: u128,
    call_data: Vec<u8>,
}

impl Extrinsic {
    /// Sign `call` with `keypair`.
    ///
    /// Fails with `Signing` if the keypair holds no private key.
    pub fn sign(
        call: &Call,
        keypair: &Keypair,
        params: &ExtrinsicParams,
        material: &Material,
        address_type: AddressType,
    ) -> Result<Self> {
        let payload = signing_payload(call.as_bytes(), params, material);
        let signature = keypair.sign(&payload)?;
        Ok(Self::assemble(
            *keypair.public_key(),
            keypair.crypto_type(),
            signature,
            params,
            call.as_bytes(),
            address_type,
        ))
    }

    /// Same layout and length as a signed extrinsic, with an all-zero signature.
    ///
    /// Only used for fee estimation; never valid on chain.
    pub fn placeholder(
        call: &Call,
        signer: &Keypair,
        params: &ExtrinsicParams,
        address_type: AddressType,
    ) -> Self {
        Self::assemble(
            *signer.public_key(),
            signer.crypto_type(),
            [0u8; 64],
            params,
            call.as_bytes(),
            address_type,
        )
    }

    fn assemble(
        signer: [u8; 32],
        crypto_type: CryptoType,
        signature: [u8; 64],
        params: &ExtrinsicParams,
        call_data: &[u8],
        address_type: AddressType,
    ) -> Self {
        let mut body = vec![SIGNED_V4];

        if address_type == AddressType::MultiAddress {
            // MultiAddress::Id
            body.push(0x00);
        }
        body.extend_from_slice(&signer);

        body.push(crypto_type.multi_signature_index());
        body.extend_from_slice(&signature);

        params.era.encode_to(&mut body);
        encode_compact(params.nonce as u128, &mut body);
        encode_compact(params.tip, &mut body);
        body.extend_from_slice(call_data);

        let mut bytes = Vec::with_capacity(body.len() + 5);
        encode_compact(body.len() as u128, &mut bytes);
        bytes.extend_from_slice(&body);

        Self {
            hash: blake2_256(&bytes),
            bytes,
            signer,
            crypto_type,
            signature,
            era: params.era,
            nonce: params.nonce,
            tip: params.tip,
            call_data: call_data.to_vec(),
        }
    }

    /// Parse a length-prefixed signed extrinsic.
    pub fn decode(bytes: &[u8], address_type: AddressType) -> Result<Self> {
        let input = &mut &bytes[..];
        let length = decode_compact(input)? as usize;
        if length != input.len() {
            return Err(InterfaceError::Decode(format!(
                "Length prefix {} does not match body length {}",
                length,
                input.len()
            )));
        }

        let version = u8::decode(input)?;
        if version != SIGNED_V4 {
            return Err(InterfaceError::Decode(format!(
                "Unsupported extrinsic version byte 0x{:02x}",
                version
            )));
        }

        if address_type == AddressType::MultiAddress {
            let variant = u8::decode(input)?;
            if variant != 0x00 {
                return Err(InterfaceError::Decode(format!(
                    "Unsupported address type: {}",
                    variant
                )));
            }
        }
        let signer = <[u8; 32]>::decode(input)?;

        let signature_type = u8::decode(input)?;
        let crypto_type = CryptoType::from_multi_signature_index(signature_type).ok_or_else(|| {
            InterfaceError::Decode(format!("Unsupported signature type: {}", signature_type))
        })?;
        let signature = <[u8; 64]>::decode(input)?;

        let era = Era::decode(input)?;
        let nonce = u32::try_from(decode_compact(input)?)
            .map_err(|_| InterfaceError::Decode("Nonce out of range".to_string()))?;
        let tip = decode_compact(input)?;
        let call_data = input.to_vec();

        Ok(Self {
            hash: blake2_256(bytes),
            bytes: bytes.to_vec(),
            signer,
            crypto_type,
            signature,
            era,
            nonce,
            tip,
            call_data,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Blake2-256 of the encoded extrinsic
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        to_hex(&self.hash)
    }

    pub fn signer(&self) -> &[u8; 32] {
        &self.signer
    }

    pub fn crypto_type(&self) -> CryptoType {
        self.crypto_type
    }

    pub fn signature(&self) -> &[u8; 64] {
        &self.signature
    }

    pub fn era(&self) -> Era {
        self.era
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn tip(&self) -> u128 {
        self.tip
    }

    pub fn call_data(&self) -> &[u8] {
        &self.call_data
    }

    /// Check the signature against the signer key
    pub fn verify(&self, material: &Material, checkpoint: Hash) -> bool {
        let params = ExtrinsicParams {
            era: self.era,
            nonce: self.nonce,
            tip: self.tip,
            checkpoint,
        };
        let payload = signing_payload(&self.call_data, &params, material);
        Keypair::from_public_key(self.signer, self.crypto_type).verify(&payload, &self.signature)
    }
}
