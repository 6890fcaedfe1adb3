#![forbid(unsafe_code)]

use accord_kernel_contracts::consent::QrToken;
use base64::Engine as _;
use rand::RngCore;

const TOKEN_ENTROPY_BYTES: usize = 24;

/// Generate a recipient-correlation token: 192 bits of OS entropy,
/// URL-safe base64, no identity material.
pub fn generate_qr_token() -> QrToken {
    qr_token_from_rng(&mut rand::thread_rng())
}

pub fn qr_token_from_rng(rng: &mut impl RngCore) -> QrToken {
    let mut raw = [0u8; TOKEN_ENTROPY_BYTES];
    rng.fill_bytes(&mut raw);
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw);
    // 24 bytes encode to 32 chars, inside QrToken's 16..=64 contract.
    QrToken::new(encoded).expect("encoded token must satisfy the QrToken contract")
}
