//! Hexadecimal helpers for diagnostics, fixtures and the demo binary

use crate::error::HexConvError;
use std::fmt::{self, Write};

/// Formats a sequence of bytes as a `String` containing a hexadecimal blob
///
/// # Examples
///
/// ```
/// # use protium::util::hex_of_bytes;
/// assert_eq!(hex_of_bytes(vec![0xde,0xad,0xbe,0xef]), String::from("deadbeef"));
/// ```
#[must_use]
pub fn hex_of_bytes<T>(val: T) -> String
where
    T: AsRef<[u8]>,
{
    Hex(val.as_ref()).to_string()
}

/// Lowercase hexadecimal display of a byte slice, written without an
/// intermediate `String`
///
/// ```
/// # use protium::util::Hex;
/// assert_eq!(format!("0x{}", Hex(&[0x0a, 0xff])), "0x0aff");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_all_hex(self.0, f)
    }
}

pub(crate) fn write_all_hex(bytes: &[u8], tgt: &mut impl Write) -> fmt::Result {
    for &byte in bytes {
        write!(tgt, "{byte:02x}")?
    }
    Ok(())
}

/// Attempt to parse a string-like type as a hexadecimal blob, returning
/// the sequence of bytes encoded if it is a valid hex-string.
///
/// # Examples
///
/// ```
/// # use protium::util::bytes_of_hex;
/// assert_eq!(Ok(vec![0xde,0xad,0xbe,0xef]), bytes_of_hex("deadbeef"));
/// ```
pub fn bytes_of_hex<T>(src: &T) -> Result<Vec<u8>, HexConvError>
where
    T: AsRef<str> + ?Sized,
{
    let src: &str = src.as_ref();
    if src.len() % 2 != 0 {
        return Err(HexConvError::OddParity(src.to_owned()));
    }
    (0..src.len())
        .step_by(2)
        .map(|ix| {
            src.get(ix..ix + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| HexConvError::NonHex(src.to_owned()))
        })
        .collect()
}
