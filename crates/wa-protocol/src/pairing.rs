//! Pairing-code generation and formatting (spec.md §6, GLOSSARY).

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("pairing code must be 8 alphanumeric characters, got '{0}'")]
pub struct PairingCodeError(String);

/// Render a raw 8-character pairing code as `XXXX-XXXX`.
pub fn format_pairing_code(raw: &str) -> Result<String, PairingCodeError> {
    if raw.len() != 8 || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PairingCodeError(raw.to_owned()));
    }
    let upper = raw.to_ascii_uppercase();
    Ok(format!("{}-{}", &upper[..4], &upper[4..]))
}

/// Generate a fresh 8-character alphanumeric pairing code. This stands in
/// for the library's `requestPairingCode` response in the mock adapter
/// (`wa-baileys`); a real adapter would forward whatever the library
/// returns through [`format_pairing_code`] instead.
pub fn generate_raw_code(rng: &mut impl Rng) -> String {
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn formats_eight_char_code() {
        assert_eq!(format_pairing_code("abcd1234").unwrap(), "ABCD-1234");
    }

    #[test]
    fn rejects_wrong_length_or_non_alphanumeric() {
        assert!(format_pairing_code("abc").is_err());
        assert!(format_pairing_code("abcd-123").is_err());
    }

    #[test]
    fn generated_code_is_eight_alphanumeric_chars() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let code = generate_raw_code(&mut rng);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(format_pairing_code(&code).is_ok());
    }
}
