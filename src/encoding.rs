//! Base58 string encoding of group elements and scalars, and serde adapters built on it.

use std::{collections::BTreeMap, fmt, marker::PhantomData};

use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use serde::{
    de::{self, DeserializeOwned, Visitor},
    Deserializer, Serialize, Serializer,
};
use zeroize::Zeroize;

/// JSON exchange format of the public protocol objects.
pub trait Json: Sized {
    fn to_json(&self) -> crate::error::Result<String>;

    fn from_json(json: &str) -> crate::error::Result<Self>;
}

impl<T: Serialize + DeserializeOwned> Json for T {
    fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub trait Base58: Sized {
    fn to_base58(&self) -> String;

    fn from_base58(s: &str) -> Option<Self>;
}

fn decode_array<const N: usize>(s: &str) -> Option<[u8; N]> {
    let bytes = bs58::decode(s).into_vec().ok()?;
    bytes.try_into().ok()
}

impl Base58 for G1Projective {
    fn to_base58(&self) -> String {
        bs58::encode(G1Affine::from(self).to_compressed()).into_string()
    }

    fn from_base58(s: &str) -> Option<Self> {
        let bytes = decode_array::<48>(s)?;
        Option::<G1Affine>::from(G1Affine::from_compressed(&bytes)).map(G1Projective::from)
    }
}

impl Base58 for G2Projective {
    fn to_base58(&self) -> String {
        bs58::encode(G2Affine::from(self).to_compressed()).into_string()
    }

    fn from_base58(s: &str) -> Option<Self> {
        let bytes = decode_array::<96>(s)?;
        Option::<G2Affine>::from(G2Affine::from_compressed(&bytes)).map(G2Projective::from)
    }
}

// Scalars may be secrets, so their byte buffers are wiped after use.
impl Base58 for Scalar {
    fn to_base58(&self) -> String {
        let mut bytes = self.to_bytes();
        let encoded = bs58::encode(bytes).into_string();
        bytes.zeroize();
        encoded
    }

    fn from_base58(s: &str) -> Option<Self> {
        let mut bytes = decode_array::<32>(s)?;
        let scalar = Option::<Scalar>::from(Scalar::from_bytes(&bytes));
        bytes.zeroize();
        scalar
    }
}

struct Base58Visitor<T>(PhantomData<T>);

impl<T: Base58> Visitor<'_> for Base58Visitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a base58 encoded group element or scalar")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        T::from_base58(v).ok_or_else(|| E::custom(format!("invalid encoding: {v}")))
    }
}

fn decode<E: de::Error, T: Base58>(s: &str) -> Result<T, E> {
    T::from_base58(s).ok_or_else(|| E::custom(format!("invalid encoding: {s}")))
}

pub mod base58 {
    use super::*;

    pub fn serialize<T: Base58, S: Serializer>(
        value: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_base58())
    }

    pub fn deserialize<'de, T: Base58, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<T, D::Error> {
        deserializer.deserialize_str(Base58Visitor(PhantomData))
    }
}

pub mod base58_option {
    use serde::{Deserialize, Serialize};

    use super::*;

    pub fn serialize<T: Base58, S: Serializer>(
        value: &Option<T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.as_ref().map(Base58::to_base58).serialize(serializer)
    }

    pub fn deserialize<'de, T: Base58, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<T>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| decode(&s))
            .transpose()
    }
}

pub mod base58_seq {
    use serde::{Deserialize, Serialize};

    use super::*;

    pub fn serialize<T: Base58, S: Serializer>(
        value: &[T],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .iter()
            .map(Base58::to_base58)
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, T: Base58, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<T>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| decode(s))
            .collect()
    }
}

pub mod base58_map {
    use serde::{Deserialize, Serialize};

    use super::*;

    pub fn serialize<T: Base58, S: Serializer>(
        value: &BTreeMap<String, T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .iter()
            .map(|(k, v)| (k, v.to_base58()))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, T: Base58, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, T>, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, v)| Ok((k, decode::<D::Error, T>(&v)?)))
            .collect()
    }
}

/// Status bits serialized as a JSON array of `0`/`1`.
pub mod bit_list {
    use serde::{Deserialize, Serialize};

    use super::*;

    pub fn serialize<S: Serializer>(value: &[bool], serializer: S) -> Result<S::Ok, S::Error> {
        value
            .iter()
            .map(|b| u8::from(*b))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<bool>, D::Error> {
        Vec::<u8>::deserialize(deserializer)?
            .into_iter()
            .map(|b| match b {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(de::Error::custom(format!("invalid status bit {other}"))),
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use bls12_381::{G1Projective, G2Projective, Scalar};
    use ff::Field;
    use group::Group;

    use super::Base58;

    #[test]
    fn base58_group_elements() {
        let g1 = G1Projective::random(rand::thread_rng());
        let g2 = G2Projective::random(rand::thread_rng());
        let x = Scalar::random(rand::thread_rng());
        assert_eq!(G1Projective::from_base58(&g1.to_base58()), Some(g1));
        assert_eq!(G2Projective::from_base58(&g2.to_base58()), Some(g2));
        assert_eq!(Scalar::from_base58(&x.to_base58()), Some(x));
    }

    #[test]
    fn base58_rejects_wrong_length() {
        let x = Scalar::random(rand::thread_rng());
        assert!(G1Projective::from_base58(&x.to_base58()).is_none());
        assert!(Scalar::from_base58("not base58 0OIl").is_none());
    }
}
