// orderflow/src/payment/signature.rs

//! HMAC-SHA256 payment signatures, as Razorpay issues them for a completed
//! checkout: `hex(HMAC_SHA256(key_secret, "<order_id>|<payment_id>"))`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, provider_order_id: &str, payment_id: &str) -> Option<HmacSha256> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
  mac.update(provider_order_id.as_bytes());
  mac.update(b"|");
  mac.update(payment_id.as_bytes());
  Some(mac)
}

/// Lower-case hex signature for `provider_order_id|payment_id`.
pub fn sign(secret: &str, provider_order_id: &str, payment_id: &str) -> Option<String> {
  mac_for(secret, provider_order_id, payment_id).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. Anything that is not valid hex
/// is rejected.
pub fn verify(secret: &str, provider_order_id: &str, payment_id: &str, signature_hex: &str) -> bool {
  let Ok(candidate) = hex::decode(signature_hex.trim()) else {
    return false;
  };
  mac_for(secret, provider_order_id, payment_id).is_some_and(|mac| mac.verify_slice(&candidate).is_ok())
}
