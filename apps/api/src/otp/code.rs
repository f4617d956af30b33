use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::otp::OtpChannel;

pub const CODE_LENGTH: usize = 6;

/// Uniform 6-digit code, zero padded.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

/// Hex SHA-256 over the server secret, the record id and the code. Binding the
/// id means equal codes on different records never share a hash.
pub fn hash_code(secret: &str, record_id: Uuid, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(record_id.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares in time independent of where the inputs first differ.
pub fn hashes_match(expected: &str, actual: &str) -> bool {
    expected.len() == actual.len()
        && expected
            .bytes()
            .zip(actual.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Digits only, 10 to 15 of them.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (10..=15).contains(&digits.len()).then_some(digits)
}

/// `local@domain.tld` with no whitespace.
pub fn is_valid_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && !host.is_empty()
        && !tld.is_empty()
        && !domain.contains('@')
        && !raw.chars().any(char::is_whitespace)
}

/// Canonical form of a destination for storage and lookups.
pub fn normalize_destination(channel: OtpChannel, raw: &str) -> Option<String> {
    match channel {
        OtpChannel::Whatsapp => normalize_phone(raw),
        OtpChannel::Email => {
            let email = raw.trim().to_lowercase();
            is_valid_email(&email).then_some(email)
        }
    }
}

/// `+********1234`: only the last four digits survive.
pub fn mask_phone(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let keep = digits.len().min(4);
    let hidden = digits.len() - keep;
    let tail: String = digits[hidden..].iter().collect();
    format!("+{}{}", "*".repeat(hidden.max(4)), tail)
}

/// `j***@example.com`
pub fn mask_email(raw: &str) -> String {
    match raw.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

pub fn mask_destination(channel: OtpChannel, destination: &str) -> String {
    match channel {
        OtpChannel::Whatsapp => mask_phone(destination),
        OtpChannel::Email => mask_email(destination),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert!(is_well_formed_code(&code), "{code}");
        }
    }

    #[test]
    fn test_hash_binds_secret_and_record() {
        let id = Uuid::new_v4();
        let hash = hash_code("s3cret", id, "123456");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_code("s3cret", id, "123456"));
        assert_ne!(hash, hash_code("other", id, "123456"));
        assert_ne!(hash, hash_code("s3cret", Uuid::new_v4(), "123456"));
        assert_ne!(hash, hash_code("s3cret", id, "123457"));
    }

    #[test]
    fn test_hashes_match() {
        assert!(hashes_match("abcd", "abcd"));
        assert!(!hashes_match("abcd", "abce"));
        assert!(!hashes_match("abcd", "abc"));
    }

    #[test]
    fn test_well_formed_code() {
        assert!(is_well_formed_code("012345"));
        assert!(!is_well_formed_code("12345"));
        assert!(!is_well_formed_code("12a456"));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("+91 98765-43210").as_deref(), Some("919876543210"));
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("1234567890123456"), None);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jane@example.com"));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane doe@example.com"));
        assert!(!is_valid_email("jane@@example.com"));
    }

    #[test]
    fn test_destination_normalization() {
        assert_eq!(
            normalize_destination(OtpChannel::Email, " Jane@Example.COM ").as_deref(),
            Some("jane@example.com")
        );
        assert_eq!(normalize_destination(OtpChannel::Whatsapp, "abc"), None);
    }

    #[test]
    fn test_masking() {
        assert_eq!(mask_phone("919876543210"), "+********3210");
        assert_eq!(mask_phone("12"), "+****12");
        assert_eq!(mask_email("jane@example.com"), "j***@example.com");
    }
}
