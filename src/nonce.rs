use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const NONCE_BITS: u32 = 80;

/// Single-use challenge binding a request or presentation to one exchange. An 80-bit random
/// integer in decimal form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    pub fn new() -> Self {
        let value = rand::thread_rng().gen::<u128>() >> (128 - NONCE_BITS);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}

pub fn generate_nonce() -> Nonce {
    Nonce::new()
}

impl TryFrom<String> for Nonce {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        match !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            true => Ok(Self(value)),
            false => Err(Error::invalid(format!("invalid nonce: {value:?}"))),
        }
    }
}

impl TryFrom<&str> for Nonce {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.to_owned())
    }
}

impl From<Nonce> for String {
    fn from(value: Nonce) -> String {
        value.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::{generate_nonce, Nonce};

    #[test]
    fn fresh_nonces_are_decimal_and_distinct() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
        assert!(a.as_str().parse::<u128>().unwrap() < 1u128 << 80);
    }

    #[test]
    fn parse() {
        Nonce::try_from("1234567890").unwrap();
        for bad in ["", "12a4", "-1", "1 2"] {
            assert!(Nonce::try_from(bad).is_err(), "{bad:?}");
        }
        assert!(serde_json::from_str::<Nonce>("\"0x12\"").is_err());
    }
}
