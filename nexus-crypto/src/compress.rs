//! Raw DEFLATE (RFC 1951, no zlib/gzip header) as EBICS applies to order data

use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use std::io::Read;

/// DEFLATE-compress order data before E002 encryption.
pub fn deflate(plain: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(plain, Compression::default());
    let mut out = Vec::new();
    encoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(out)
}

/// INFLATE order data after E002 decryption.
pub fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_arbitrary_data() {
        let plain = b"<Document>camt.053 statement bytes go here, repeated repeated repeated</Document>";
        let compressed = deflate(plain).unwrap();
        let recovered = inflate(&compressed).unwrap();
        assert_eq!(recovered, plain.to_vec());
    }

    #[test]
    fn compresses_repetitive_data() {
        let plain = vec![b'A'; 4096];
        let compressed = deflate(&plain).unwrap();
        assert!(compressed.len() < plain.len());
    }

    #[test]
    fn garbage_input_fails_to_inflate() {
        let garbage = vec![0xffu8; 16];
        assert!(inflate(&garbage).is_err());
    }

    proptest::proptest! {
        #[test]
        fn inflate_undoes_deflate_for_any_input(plain in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..4096)) {
            let compressed = deflate(&plain).unwrap();
            let recovered = inflate(&compressed).unwrap();
            proptest::prop_assert_eq!(recovered, plain);
        }
    }
}
