use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    attributes::AttributeNames,
    bbs,
    error::{Error, Result},
    identifiers::{CredentialDefinitionId, IssuerId, SchemaId},
    schema::Schema,
    zkp::Transcript,
};

/// Signature type of a credential definition. Credentials are BBS+ signatures over BLS12-381,
/// advertised as `"BBS"`. Camenisch-Lysyanskaya (`"CL"`) keys are not implemented and are refused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    #[default]
    #[serde(rename = "BBS")]
    Bbs,
}

impl FromStr for SignatureType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BBS" => Ok(SignatureType::Bbs),
            other => Err(Error::UnsupportedSignatureType(other.to_owned())),
        }
    }
}

impl std::fmt::Display for SignatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureType::Bbs => f.write_str("BBS"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CredentialDefinitionConfig {
    pub support_revocation: bool,
}

impl CredentialDefinitionConfig {
    pub fn new(support_revocation: bool) -> Self {
        Self { support_revocation }
    }
}

/// Signing key material. Message `0` is the link secret; messages `1..=n` are the attributes in
/// name order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPrimaryPublicKey {
    #[serde(flatten)]
    pub key: bbs::PublicKey,
    pub attr_names: AttributeNames,
}

/// Marks a credential definition as supporting revocation. The accumulator keys themselves live on
/// each registry definition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRevocationSupport {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDefinitionData {
    pub primary: CredentialPrimaryPublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<CredentialRevocationSupport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDefinition {
    pub schema_id: SchemaId,
    #[serde(rename = "type")]
    pub signature_type: SignatureType,
    pub tag: String,
    pub value: CredentialDefinitionData,
    pub issuer_id: IssuerId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialDefinitionPrivate {
    pub value: bbs::SecretKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialKeyCorrectnessProof(pub bbs::KeyCorrectnessProof);

pub(crate) const LINK_SECRET_INDEX: usize = 0;

impl CredentialDefinition {
    pub fn id(&self) -> Result<CredentialDefinitionId> {
        CredentialDefinitionId::derive(&self.issuer_id, &self.schema_id, &self.tag)
    }

    pub fn supports_revocation(&self) -> bool {
        self.value.revocation.is_some()
    }

    pub fn public_key(&self) -> &bbs::PublicKey {
        &self.value.primary.key
    }

    pub fn attr_names(&self) -> &AttributeNames {
        &self.value.primary.attr_names
    }

    /// Signature message index of an attribute.
    pub fn attr_index(&self, name: &str) -> Option<usize> {
        let name = crate::attributes::canonical_attr_name(name);
        self.attr_names()
            .iter()
            .position(|n| *n == name)
            .map(|i| i + 1)
    }

    /// Check that the key has one generator per attribute plus the link secret.
    pub(crate) fn check_shape(&self) -> Result<()> {
        match self.public_key().generators.len() == self.attr_names().len() + 1 {
            true => Ok(()),
            false => Err(Error::invalid(
                "credential definition key does not match its attributes",
            )),
        }
    }

    pub(crate) fn verify_key_correctness(
        &self,
        proof: &CredentialKeyCorrectnessProof,
    ) -> Result<()> {
        let id = self.id()?;
        self.check_shape()?;
        self.public_key()
            .verify_key_correctness(&proof.0, &mut key_correctness_transcript(&id))
            .map_err(|e| Error::invalid(format!("key correctness proof is invalid: {e}")))
    }
}

fn key_correctness_transcript(id: &CredentialDefinitionId) -> Transcript {
    let mut transcript = Transcript::new(b"anoncreds_bls::cred_def::key_correctness");
    transcript.append_message(b"cred_def_id", id.as_str().as_bytes());
    transcript
}

pub fn create_credential_definition(
    schema: &Schema,
    issuer_id: IssuerId,
    tag: &str,
    signature_type: &str,
    config: CredentialDefinitionConfig,
) -> Result<(
    CredentialDefinition,
    CredentialDefinitionPrivate,
    CredentialKeyCorrectnessProof,
)> {
    tracing::trace!(%issuer_id, tag, signature_type, ?config, "create_credential_definition");
    let signature_type = signature_type.parse::<SignatureType>()?;
    schema.validate()?;
    if tag.is_empty() {
        return Err(Error::invalid("credential definition tag is empty"));
    }

    let sk = bbs::SecretKey::gen(schema.attr_names.len() + 1, &mut rand::thread_rng());
    let cred_def = CredentialDefinition {
        schema_id: schema.id()?,
        signature_type,
        tag: tag.to_owned(),
        value: CredentialDefinitionData {
            primary: CredentialPrimaryPublicKey {
                key: sk.public_key(),
                attr_names: schema.attr_names.clone(),
            },
            revocation: config
                .support_revocation
                .then(CredentialRevocationSupport::default),
        },
        issuer_id,
    };
    let id = cred_def.id()?;
    let proof = sk.prove_key_correctness(
        cred_def.public_key(),
        &mut key_correctness_transcript(&id),
    );
    tracing::debug!(
        cred_def_id = %id,
        attributes = schema.attr_names.len(),
        "created credential definition"
    );
    Ok((
        cred_def,
        CredentialDefinitionPrivate { value: sk },
        CredentialKeyCorrectnessProof(proof),
    ))
}
