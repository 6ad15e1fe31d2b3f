//! String identifiers for ledger objects.
//!
//! Identifiers are URIs or DIDs: non-empty, without whitespace, and carrying a `scheme:` prefix.
//! Schema, credential definition and registry identifiers are derived deterministically from the
//! objects they name. Free-form names, versions and tags are percent-encoded into a single path
//! segment.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    hash::short_digest,
};

macro_rules! define_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Result<Self> {
                let id = id.into();
                validate(stringify!($name), &id)?;
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }
    };
}

fn validate(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::invalid(format!("{kind} is empty")));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(Error::invalid(format!("{kind} contains whitespace: {id:?}")));
    }
    match id.split_once(':') {
        Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => Ok(()),
        _ => Err(Error::invalid(format!(
            "{kind} is not a URI or DID: {id:?}"
        ))),
    }
}

define_identifier!(
    /// Identifier of a credential issuer, typically a DID.
    IssuerId
);
define_identifier!(SchemaId);
define_identifier!(CredentialDefinitionId);
define_identifier!(RevocationRegistryDefinitionId);

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

// Derived identifiers inherit the issuer's scheme prefix, so they always validate.
fn derived<T: TryFrom<String, Error = Error>>(issuer_id: &IssuerId, path: String) -> Result<T> {
    T::try_from(format!("{issuer_id}/anoncreds/v0/{path}"))
}

impl SchemaId {
    pub fn derive(issuer_id: &IssuerId, name: &str, version: &str) -> Result<Self> {
        derived(
            issuer_id,
            format!("SCHEMA/{}/{}", segment(name), segment(version)),
        )
    }
}

impl CredentialDefinitionId {
    pub fn derive(issuer_id: &IssuerId, schema_id: &SchemaId, tag: &str) -> Result<Self> {
        let schema = short_digest(schema_id.as_str().as_bytes());
        derived(issuer_id, format!("CLAIM_DEF/{schema}/{}", segment(tag)))
    }
}

impl RevocationRegistryDefinitionId {
    pub fn derive(
        issuer_id: &IssuerId,
        cred_def_id: &CredentialDefinitionId,
        tag: &str,
    ) -> Result<Self> {
        let cred_def = short_digest(cred_def_id.as_str().as_bytes());
        derived(issuer_id, format!("REV_REG_DEF/{cred_def}/{}", segment(tag)))
    }
}

#[cfg(test)]
mod test {
    use super::{CredentialDefinitionId, IssuerId, RevocationRegistryDefinitionId, SchemaId};
    use crate::error::ErrorKind;

    #[test]
    fn validation() {
        IssuerId::new("did:web:xyz").unwrap();
        IssuerId::new("https://example.org/issuer").unwrap();
        for bad in ["", "did web", "no-scheme", ":empty", "did:"] {
            assert_eq!(
                IssuerId::new(bad).unwrap_err().kind(),
                ErrorKind::InvalidArgument,
                "{bad:?}"
            );
        }
    }

    #[test]
    fn derived_ids_are_deterministic() {
        let issuer = IssuerId::new("did:web:xyz").unwrap();
        let schema = SchemaId::derive(&issuer, "employee", "1.0").unwrap();
        assert_eq!(schema.as_str(), "did:web:xyz/anoncreds/v0/SCHEMA/employee/1.0");

        let a = CredentialDefinitionId::derive(&issuer, &schema, "default").unwrap();
        let b = CredentialDefinitionId::derive(&issuer, &schema, "default").unwrap();
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("did:web:xyz/anoncreds/v0/CLAIM_DEF/"));
        assert!(a.as_str().ends_with("/default"));
    }

    #[test]
    fn free_form_segments_are_escaped() {
        let issuer = IssuerId::new("did:web:xyz").unwrap();
        let schema = SchemaId::derive(&issuer, "Employee Card", "1.0").unwrap();
        assert_eq!(
            schema.as_str(),
            "did:web:xyz/anoncreds/v0/SCHEMA/Employee%20Card/1.0"
        );
        let schema = SchemaId::derive(&issuer, "tést/schema", "1.0 beta").unwrap();
        assert_eq!(
            schema.as_str(),
            "did:web:xyz/anoncreds/v0/SCHEMA/t%C3%A9st%2Fschema/1.0%20beta"
        );

        let cred_def = CredentialDefinitionId::derive(&issuer, &schema, "my tag").unwrap();
        assert!(cred_def.as_str().ends_with("/my%20tag"));
        let registry =
            RevocationRegistryDefinitionId::derive(&issuer, &cred_def, "tag\twith\ttabs").unwrap();
        assert!(registry.as_str().ends_with("/tag%09with%09tabs"));
    }

    #[test]
    fn serde_validates() {
        let id: SchemaId = serde_json::from_str("\"did:web:xyz/s/1\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"did:web:xyz/s/1\"");
        assert!(serde_json::from_str::<SchemaId>("\"not an id\"").is_err());
    }
}
