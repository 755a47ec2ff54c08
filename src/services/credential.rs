// src/services/credential.rs
use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine,
};
use serde::Deserialize;

// JWT usa base64url; aceitamos o segmento com ou sem padding
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: f64,
}

/// Lê o `exp` (segundos) do payload de um token JWT, sem validar a assinatura.
pub fn expiry_of(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    claim.exp.is_finite().then(|| claim.exp.floor() as i64)
}

/// Um token está expirado se não for possível ler o `exp`, ou se `exp <= now`.
pub fn is_expired(token: &str, now_secs: i64) -> bool {
    match expiry_of(token) {
        Some(exp) => exp <= now_secs,
        None => {
            tracing::debug!("Token sem 'exp' legível, tratado como expirado.");
            true
        }
    }
}
