// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Detached-signature verification with replay protection.
//!
//! Signatures are 65 bytes, `r ‖ s ‖ v`, over the EIP-191 digest built in
//! [`super::message`]. Verification:
//!
//! 1. reads the claimed signer's nonce and rebuilds the signed digest
//! 2. normalizes `v` (`0/1` → `27/28`)
//! 3. folds high-s signatures onto their low-s twin (`s' = n - s`, parity
//!    flipped) so both encodings verify identically
//! 4. recovers the signer and compares it to the claimed identity
//!
//! Only a fully successful verification advances the nonce. The registry
//! uses the two halves separately ([`authorize`] then
//! [`NonceLedger::consume`]) so that a later failure in the same operation
//! leaves the nonce untouched.

use alloy::primitives::{keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use super::error::AuthError;
use super::message::{signing_hash, MessageBuilder};
use super::nonce::NonceLedger;

/// Expected signature length: 32-byte `r`, 32-byte `s`, 1-byte `v`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Proof that `signer` signed a payload at `nonce`.
///
/// Only obtainable from [`authorize`]; consuming it advances the nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an authorization does nothing until its nonce is consumed"]
pub struct Authorization {
    signer: Address,
    nonce: U256,
}

impl Authorization {
    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }
}

/// Check `signature` over `payload` for `claimed` at its current nonce.
///
/// Does not mutate anything.
pub fn authorize(
    nonces: &NonceLedger,
    payload: &MessageBuilder,
    signature: &[u8],
    claimed: Address,
) -> Result<Authorization, AuthError> {
    let nonce = nonces.current(&claimed);
    let digest = signing_hash(nonce, payload.hash());
    let recovered = recover_signer(&digest, signature)?;

    if recovered != claimed {
        return Err(AuthError::InvalidSigner { claimed, recovered });
    }

    Ok(Authorization {
        signer: claimed,
        nonce,
    })
}

/// Verify and, on success, consume the claimed signer's nonce.
pub fn verify(
    nonces: &mut NonceLedger,
    payload: &MessageBuilder,
    signature: &[u8],
    claimed: Address,
) -> Result<(), AuthError> {
    let authorization = authorize(nonces, payload, signature, claimed)?;
    nonces.consume(authorization);
    Ok(())
}

impl NonceLedger {
    /// Advance the nonce an [`Authorization`] was checked against.
    pub(crate) fn consume(&mut self, authorization: Authorization) {
        debug_assert_eq!(
            self.current(&authorization.signer),
            authorization.nonce,
            "authorization consumed against a moved nonce"
        );
        self.advance(authorization.signer);
    }
}

/// Recover the signing address from a 65-byte signature over `digest`.
///
/// Pure: no nonce handling.
pub fn recover_signer(digest: &B256, signature: &[u8]) -> Result<Address, AuthError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(AuthError::InvalidSignatureLength(signature.len()));
    }

    let (rs, v) = signature.split_at(64);
    let mut y_odd = normalize_v(v[0])? == 28;

    // Rejects r or s equal to zero or not below the curve order.
    let mut sig = Signature::from_slice(rs).map_err(|_| AuthError::InvalidSignature)?;
    if let Some(low_s) = sig.normalize_s() {
        sig = low_s;
        y_odd = !y_odd;
    }

    let recovery_id = RecoveryId::new(y_odd, false);
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|_| AuthError::InvalidSignature)?;

    let address = address_from_key(&key);
    if address == Address::ZERO {
        return Err(AuthError::InvalidSignature);
    }
    Ok(address)
}

/// Map a recovery byte onto the 27/28 convention.
fn normalize_v(v: u8) -> Result<u8, AuthError> {
    match v {
        0 | 1 => Ok(v + 27),
        27 | 28 => Ok(v),
        _ => Err(AuthError::InvalidSignature),
    }
}

/// EVM address of a public key: last 20 bytes of `keccak256(x ‖ y)`.
pub fn address_from_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
