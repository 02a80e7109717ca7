//! Bracketed section markers.
//!
//! Every section of a 118 file is framed by `<name>` ... `</name>`
//! markers. A marker that does not match the expected bytes is an
//! unrecoverable format error; there is no resynchronization.

use std::io::Read;

use crate::codec::read_vec;
use crate::error::{DtaError, Result};

/// The byte image of a section marker.
pub fn token_bytes(name: &str, closing: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(name.len() + 3);
    buf.push(b'<');
    if closing {
        buf.push(b'/');
    }
    buf.extend_from_slice(name.as_bytes());
    buf.push(b'>');
    buf
}

/// Read a marker and fail unless it is exactly `<name>` / `</name>`.
pub fn expect_token<R: Read>(reader: &mut R, name: &str, closing: bool) -> Result<()> {
    let expected = token_bytes(name, closing);
    let found = read_vec(reader, expected.len())?;
    if found != expected {
        return Err(DtaError::token_mismatch(
            String::from_utf8_lossy(&expected).into_owned(),
            &found,
        ));
    }
    Ok(())
}

/// Read `prefix.len()` bytes and check them against a marker prefix
/// already partially consumed by a lookahead. Used by sections that
/// must distinguish a repeated element marker from the closing marker.
pub fn expect_remainder<R: Read>(reader: &mut R, full: &str, consumed: &[u8]) -> Result<()> {
    let expected = token_bytes(full, true);
    if !expected.starts_with(consumed) {
        return Err(DtaError::token_mismatch(
            String::from_utf8_lossy(&expected).into_owned(),
            consumed,
        ));
    }
    let rest = read_vec(reader, expected.len() - consumed.len())?;
    if rest != expected[consumed.len()..] {
        return Err(DtaError::token_mismatch(
            String::from_utf8_lossy(&expected).into_owned(),
            &rest,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_token_bytes() {
        assert_eq!(token_bytes("map", false), b"<map>");
        assert_eq!(token_bytes("map", true), b"</map>");
    }

    #[test]
    fn test_expect_token_matches() {
        let mut cur = Cursor::new(b"<header>".to_vec());
        expect_token(&mut cur, "header", false).unwrap();

        let mut cur = Cursor::new(b"</header>".to_vec());
        expect_token(&mut cur, "header", true).unwrap();
    }

    #[test]
    fn test_expect_token_mismatch() {
        let mut cur = Cursor::new(b"<headex>".to_vec());
        let err = expect_token(&mut cur, "header", false).unwrap_err();
        assert!(matches!(err, DtaError::TokenMismatch { .. }));
        assert!(err.is_format());
    }

    #[test]
    fn test_expect_remainder() {
        // Lookahead consumed "</ch"; the rest must spell "aracteristics>".
        let mut cur = Cursor::new(b"aracteristics>".to_vec());
        expect_remainder(&mut cur, "characteristics", b"</ch").unwrap();

        let mut cur = Cursor::new(b"aracteristicsX".to_vec());
        assert!(expect_remainder(&mut cur, "characteristics", b"</ch").is_err());
    }
}
