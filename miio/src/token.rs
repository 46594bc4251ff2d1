use std::fmt::{self, Debug, Display, Formatter, LowerHex, UpperHex};
use thiserror::Error;

/// An error parsing a device token from a string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Invalid miio token '{0}', expected 32 hex digits")]
pub struct ParseTokenError(String);

/// The 128-bit secret a miio device uses to encrypt its traffic.
///
/// The `Debug` implementation doesn't print the token, so it is safe to log structs containing one.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Token([u8; 16]);

impl Token {
    pub fn new(bytes: [u8; 16]) -> Self {
        Token(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        LowerHex::fmt(self, f)
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("Token(..)")
    }
}

impl LowerHex for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl UpperHex for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Token {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseTokenError(s.to_string()));
        }
        let mut bytes = [0; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseTokenError(s.to_string()))?;
        }
        Ok(Token(bytes))
    }
}
