//! Credential attribute names and values, and their encoding into scalars.

use std::collections::{BTreeMap, BTreeSet};

use blake2::{Blake2b512, Digest};
use bls12_381::Scalar;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum number of attributes in a schema.
pub const MAX_ATTRIBUTES_COUNT: usize = 125;

/// Attribute names are compared case-insensitively and without whitespace.
pub fn canonical_attr_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Set of canonical attribute names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeNames(pub BTreeSet<String>);

impl AttributeNames {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&canonical_attr_name(name))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AttributeNames {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|name| canonical_attr_name(name.as_ref()))
                .collect(),
        )
    }
}

/// Encode a raw attribute value into the decimal string that is signed.
///
/// Values that parse as a 32-bit signed integer encode to themselves, which lets predicates be
/// proven over them. Any other value encodes to the 128-bit prefix of its Blake2b-512 digest.
pub fn encode_credential_attribute(raw: &str) -> String {
    match raw.parse::<i32>() {
        Ok(value) => value.to_string(),
        Err(_) => {
            let digest = Blake2b512::digest(raw.as_bytes());
            let mut prefix = [0u8; 16];
            prefix.copy_from_slice(&digest[..16]);
            u128::from_be_bytes(prefix).to_string()
        }
    }
}

/// Map an encoded decimal string into the scalar field.
pub fn encoded_to_scalar(encoded: &str) -> Result<Scalar> {
    let (negative, digits) = match encoded.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, encoded),
    };
    if digits.is_empty() {
        return Err(Error::invalid("encoded attribute value is empty"));
    }
    let ten = Scalar::from(10u64);
    let mut value = Scalar::zero();
    for c in digits.chars() {
        let digit = c
            .to_digit(10)
            .ok_or_else(|| Error::invalid(format!("encoded attribute is not decimal: {encoded}")))?;
        value = value * ten + Scalar::from(u64::from(digit));
    }
    Ok(if negative { -value } else { value })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValues {
    pub raw: String,
    pub encoded: String,
}

/// Attribute values of a credential, keyed by canonical attribute name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialValues(pub BTreeMap<String, AttributeValues>);

impl CredentialValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw value, encoding it with [encode_credential_attribute].
    pub fn add_raw(&mut self, name: impl AsRef<str>, raw: impl Into<String>) -> &mut Self {
        let raw = raw.into();
        let encoded = encode_credential_attribute(&raw);
        self.add_encoded(name, raw, encoded)
    }

    pub fn add_encoded(
        &mut self,
        name: impl AsRef<str>,
        raw: impl Into<String>,
        encoded: impl Into<String>,
    ) -> &mut Self {
        self.0.insert(
            canonical_attr_name(name.as_ref()),
            AttributeValues {
                raw: raw.into(),
                encoded: encoded.into(),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValues> {
        self.0.get(&canonical_attr_name(name))
    }

    pub fn names(&self) -> AttributeNames {
        AttributeNames(self.0.keys().cloned().collect())
    }

    /// Encoded scalar for each attribute, in name order.
    pub(crate) fn scalars(&self) -> Result<BTreeMap<String, Scalar>> {
        self.0
            .iter()
            .map(|(name, value)| Ok((name.clone(), encoded_to_scalar(&value.encoded)?)))
            .collect()
    }
}

/// Typed credential contents. Usually implemented with `#[derive(Attributes)]`.
pub trait Attributes {
    fn attribute_names() -> AttributeNames;

    fn credential_values(&self) -> CredentialValues;
}

#[cfg(test)]
mod test {
    use bls12_381::Scalar;
    use proptest::prelude::*;

    use super::{canonical_attr_name, encode_credential_attribute, encoded_to_scalar};
    use crate::{Attributes, CredentialValues};

    #[derive(anoncreds_bls_derive::Attributes)]
    struct Example {
        name: String,
        #[anoncreds(name = "Age")]
        age: u32,
    }

    #[test]
    fn derive_example() {
        let names = Example::attribute_names();
        assert_eq!(names.iter().collect::<Vec<_>>(), vec!["age", "name"]);

        let values = Example {
            name: "Alex".to_string(),
            age: 28,
        }
        .credential_values();
        assert_eq!(values.get("age").unwrap().encoded, "28");
        assert_eq!(values.get("NAME").unwrap().raw, "Alex");
    }

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_attr_name("First Name"), "firstname");
        assert_eq!(canonical_attr_name(" AGE"), "age");
    }

    #[test]
    fn non_integer_encoding_is_stable() {
        let a = encode_credential_attribute("Moussa");
        assert_eq!(a, encode_credential_attribute("Moussa"));
        assert_ne!(a, encode_credential_attribute("moussa"));
        assert!(a.parse::<u128>().is_ok());
    }

    #[test]
    fn non_integer_encoding_is_blake2b_prefix() {
        assert_eq!(
            encode_credential_attribute("Moussa"),
            "109336218303463992602018735954851587762"
        );
    }

    #[test]
    fn integer_out_of_range_is_hashed() {
        let encoded = encode_credential_attribute("2147483648");
        assert_ne!(encoded, "2147483648");
    }

    #[test]
    fn encoded_to_scalar_rejects_garbage() {
        assert!(encoded_to_scalar("12a").is_err());
        assert!(encoded_to_scalar("-").is_err());
        assert!(encoded_to_scalar("").is_err());
    }

    #[test]
    fn add_raw_canonicalizes() {
        let mut values = CredentialValues::new();
        values.add_raw("Given Name", "Alex");
        assert!(values.get("givenname").is_some());
        assert!(values.names().contains("GivenName"));
    }

    proptest! {
        #[test]
        fn integers_encode_to_themselves(x in any::<i32>()) {
            prop_assert_eq!(encode_credential_attribute(&x.to_string()), x.to_string());
            let expected = if x < 0 {
                -Scalar::from(u64::from(x.unsigned_abs()))
            } else {
                Scalar::from(x as u64)
            };
            prop_assert_eq!(encoded_to_scalar(&x.to_string()).unwrap(), expected);
        }

        #[test]
        fn encoding_is_always_decimal(raw in ".*") {
            let encoded = encode_credential_attribute(&raw);
            prop_assert!(encoded_to_scalar(&encoded).is_ok());
        }
    }
}
