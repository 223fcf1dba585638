//! Base64 wire encoding used throughout the EBICS request/response bodies

use crate::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Base64-encode bytes using the standard alphabet with padding, as EBICS
/// requires.
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64-decode a string using the standard alphabet with padding.
pub fn decode(data: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(data.as_bytes())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips() {
        let data = b"segment of encrypted+compressed order data";
        let encoded = encode(data);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, data.to_vec());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(decode("not valid base64!!!").is_err());
    }
}
