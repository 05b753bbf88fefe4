use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

// Header format: "t=<unix seconds>,v1=<hex hmac>", signed over "{t}.{raw body}".
pub fn parse_signature_header(value: &str) -> Option<(i64, String)> {
    let mut timestamp: Option<i64> = None;
    let mut signature: Option<String> = None;
    for part in value.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(raw)) => timestamp = raw.parse().ok(),
            (Some("v1"), Some(raw)) => signature = Some(raw.to_string()),
            _ => {}
        }
    }
    Some((timestamp?, signature?))
}

pub fn compute_signature(secret: &str, timestamp: i64, raw_body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_signature(secret: &str, timestamp: i64, raw_body: &[u8], provided_hex: &str) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();

    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };
    if provided.len() != expected.len() {
        return false;
    }
    ConstantTimeEq::ct_eq(provided.as_slice(), expected.as_slice()).into()
}

pub fn signature_header(secret: &str, timestamp: i64, raw_body: &[u8]) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_signature(secret, timestamp, raw_body)
    )
}
