//! Credential issuance: offers, blinded requests bound to the holder's link secret, signing and
//! holder-side processing.

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, Scalar};
use ff::Field;
use group::Group;
use serde::{Deserialize, Serialize};

use crate::{
    attributes::{encoded_to_scalar, CredentialValues},
    bbs,
    cred_def::{
        CredentialDefinition, CredentialDefinitionPrivate, CredentialKeyCorrectnessProof,
        LINK_SECRET_INDEX,
    },
    encoding::{base58, base58_option},
    error::{Error, Result},
    identifiers::{CredentialDefinitionId, RevocationRegistryDefinitionId, SchemaId},
    nonce::Nonce,
    pedersen::{PedersenCommitment, PedersenGenerators},
    rev_reg::{
        RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate, RevocationStatusList,
    },
    tails::{TailsFileReader, TailsReader},
    zkp::{CompactProof, Transcript},
};

/// Holder secret shared by all of a holder's credentials. Never leaves the holder.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkSecret(#[serde(with = "base58")] Scalar);

impl LinkSecret {
    pub(crate) fn value(&self) -> Scalar {
        self.0
    }
}

impl core::fmt::Debug for LinkSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("LinkSecret(..)")
    }
}

impl Drop for LinkSecret {
    fn drop(&mut self) {
        self.0 = Scalar::zero();
    }
}

pub fn create_link_secret() -> LinkSecret {
    LinkSecret(Scalar::random(rand::thread_rng()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOffer {
    pub schema_id: SchemaId,
    pub cred_def_id: CredentialDefinitionId,
    pub key_correctness_proof: CredentialKeyCorrectnessProof,
    pub nonce: Nonce,
}

pub fn create_credential_offer(
    schema_id: SchemaId,
    cred_def_id: CredentialDefinitionId,
    key_correctness_proof: &CredentialKeyCorrectnessProof,
) -> Result<CredentialOffer> {
    tracing::trace!(%schema_id, %cred_def_id, "create_credential_offer");
    Ok(CredentialOffer {
        schema_id,
        cred_def_id,
        key_correctness_proof: key_correctness_proof.clone(),
        nonce: Nonce::new(),
    })
}

/// Commitment `U = ls * H_ls + s' * H0` to the holder's link secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedLinkSecret {
    #[serde(with = "base58")]
    pub u: G1Projective,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prover_did: Option<String>,
    pub cred_def_id: CredentialDefinitionId,
    pub blinded_link_secret: BlindedLinkSecret,
    pub blinded_link_secret_correctness_proof: CompactProof,
    pub nonce: Nonce,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequestMetadata {
    #[serde(with = "base58")]
    pub link_secret_blinding_data: Scalar,
    pub nonce: Nonce,
    pub link_secret_name: String,
}

impl core::fmt::Debug for CredentialRequestMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialRequestMetadata")
            .field("nonce", &self.nonce)
            .field("link_secret_name", &self.link_secret_name)
            .finish_non_exhaustive()
    }
}

fn link_secret_generators(
    cred_def: &CredentialDefinition,
) -> Result<PedersenGenerators<G1Projective>> {
    cred_def.check_shape()?;
    let pk = cred_def.public_key();
    Ok(PedersenGenerators::new(
        pk.h0,
        vec![pk.generators[LINK_SECRET_INDEX]],
    ))
}

fn request_transcript(
    offer_nonce: &Nonce,
    cred_def_id: &CredentialDefinitionId,
    request: (&Option<String>, &Option<String>),
) -> Transcript {
    let mut transcript = Transcript::new(b"anoncreds_bls::credential::request");
    transcript.append_message(b"offer_nonce", offer_nonce.as_bytes());
    transcript.append_message(b"cred_def_id", cred_def_id.as_str().as_bytes());
    if let Some(entropy) = request.0 {
        transcript.append_message(b"entropy", entropy.as_bytes());
    }
    if let Some(prover_did) = request.1 {
        transcript.append_message(b"prover_did", prover_did.as_bytes());
    }
    transcript
}

/// Build a request for the offered credential, blinding the link secret.
///
/// Exactly one of `entropy` and `prover_did` must be given. Both are only bound into the blinding
/// proof; neither influences the blinding itself.
pub fn create_credential_request(
    entropy: Option<&str>,
    prover_did: Option<&str>,
    cred_def: &CredentialDefinition,
    link_secret: &LinkSecret,
    link_secret_id: &str,
    offer: &CredentialOffer,
) -> Result<(CredentialRequest, CredentialRequestMetadata)> {
    tracing::trace!(cred_def_id = %offer.cred_def_id, link_secret_id, "create_credential_request");
    let (entropy, prover_did) = match (entropy, prover_did) {
        (Some(entropy), None) => (Some(entropy.to_owned()), None),
        (None, Some(did)) => (None, Some(did.to_owned())),
        _ => {
            return Err(Error::invalid(
                "exactly one of entropy and prover_did must be given",
            ))
        }
    };
    let cred_def_id = cred_def.id()?;
    if offer.cred_def_id != cred_def_id {
        return Err(Error::invalid(format!(
            "offer is for {}, not {cred_def_id}",
            offer.cred_def_id
        )));
    }
    cred_def.verify_key_correctness(&offer.key_correctness_proof)?;

    let gens = link_secret_generators(cred_def)?;
    let ls = [link_secret.value()];
    let (commit, blind) = gens
        .commit(&ls, &mut rand::thread_rng())
        .map_err(|e| Error::invalid(format!("cannot blind link secret: {e}")))?;
    let mut transcript = request_transcript(&offer.nonce, &cred_def_id, (&entropy, &prover_did));
    let proof = gens
        .prove_opening(&mut transcript, &commit, &ls, blind)
        .map_err(|e| Error::invalid(format!("cannot prove link secret blinding: {e}")))?;

    let nonce = Nonce::new();
    let request = CredentialRequest {
        entropy,
        prover_did,
        cred_def_id,
        blinded_link_secret: BlindedLinkSecret { u: commit.elem },
        blinded_link_secret_correctness_proof: proof,
        nonce: nonce.clone(),
    };
    let metadata = CredentialRequestMetadata {
        link_secret_blinding_data: blind,
        nonce,
        link_secret_name: link_secret_id.to_owned(),
    };
    Ok((request, metadata))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSignature {
    #[serde(flatten)]
    pub signature: bbs::Signature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_index: Option<u32>,
    /// Accumulator element `g_i` of the registry index, folded into the signed base.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base58_option"
    )]
    pub index_element: Option<G1Projective>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub schema_id: SchemaId,
    pub cred_def_id: CredentialDefinitionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevocationRegistryDefinitionId>,
    pub values: CredentialValues,
    pub signature: CredentialSignature,
}

impl Credential {
    /// Signed messages: the link secret followed by the attributes in name order.
    pub(crate) fn messages(
        &self,
        cred_def: &CredentialDefinition,
        link_secret: &LinkSecret,
    ) -> Result<Vec<Scalar>> {
        check_values(cred_def, &self.values)?;
        let mut messages = Vec::with_capacity(cred_def.attr_names().len() + 1);
        messages.push(link_secret.value());
        for scalar in self.values.scalars()?.into_values() {
            messages.push(scalar);
        }
        Ok(messages)
    }

    pub(crate) fn extra_base(&self) -> G1Projective {
        self.signature
            .index_element
            .unwrap_or(G1Projective::identity())
    }

    pub fn rev_reg_index(&self) -> Option<u32> {
        self.signature.rev_reg_index
    }
}

fn check_values(cred_def: &CredentialDefinition, values: &CredentialValues) -> Result<()> {
    let names = values.names();
    if names != *cred_def.attr_names() {
        let missing = cred_def.attr_names().0.difference(&names.0).collect::<Vec<_>>();
        let extra = names.0.difference(&cred_def.attr_names().0).collect::<Vec<_>>();
        return Err(Error::AttributeMismatch(format!(
            "missing {missing:?}, unexpected {extra:?}"
        )));
    }
    Ok(())
}

/// Registry context for issuing a revocable credential.
#[derive(Clone, Copy, Debug)]
pub struct CredentialRevocationConfig<'a> {
    pub reg_def: &'a RevocationRegistryDefinition,
    pub reg_def_private: &'a RevocationRegistryDefinitionPrivate,
    pub registry_idx: Option<u32>,
}

/// Sign the requested credential.
///
/// For a revocable credential the registry index is allocated in a copy of `rev_status_list`,
/// which is returned with the index marked issued.
#[allow(clippy::too_many_arguments)]
pub fn create_credential(
    cred_def: &CredentialDefinition,
    cred_def_private: &CredentialDefinitionPrivate,
    offer: &CredentialOffer,
    request: &CredentialRequest,
    values: CredentialValues,
    rev_reg_id: Option<RevocationRegistryDefinitionId>,
    rev_status_list: Option<&RevocationStatusList>,
    revocation_config: Option<CredentialRevocationConfig<'_>>,
) -> Result<(Credential, Option<RevocationStatusList>)> {
    tracing::trace!(cred_def_id = %offer.cred_def_id, ?rev_reg_id, "create_credential");
    let cred_def_id = cred_def.id()?;
    if offer.cred_def_id != cred_def_id || request.cred_def_id != cred_def_id {
        return Err(Error::invalid(
            "offer and request must refer to the given credential definition",
        ));
    }
    check_values(cred_def, &values)?;

    let gens = link_secret_generators(cred_def)?;
    let mut transcript = request_transcript(
        &offer.nonce,
        &cred_def_id,
        (&request.entropy, &request.prover_did),
    );
    gens.verify_opening(
        &mut transcript,
        &PedersenCommitment {
            elem: request.blinded_link_secret.u,
        },
        &request.blinded_link_secret_correctness_proof,
    )
    .map_err(|_| Error::invalid("blinded link secret correctness proof is invalid"))?;

    let registry = (rev_reg_id.as_ref(), rev_status_list, revocation_config);
    let (revocation, status_list) = match registry {
        (None, None, None) => (None, None),
        (Some(rev_reg_id), Some(list), Some(config)) => {
            if !cred_def.supports_revocation() {
                return Err(Error::invalid(
                    "credential definition does not support revocation",
                ));
            }
            if config.reg_def.id()? != *rev_reg_id || config.reg_def.cred_def_id != cred_def_id {
                return Err(Error::invalid(format!(
                    "registry {rev_reg_id} does not belong to {cred_def_id}"
                )));
            }
            list.check_registry(config.reg_def)?;
            let max_cred_num = config.reg_def.max_cred_num();
            let secret = &config.reg_def_private.value;
            let mut list = list.clone();
            let index = list.allocate(
                config.registry_idx,
                max_cred_num,
                &mut secret.tails_reader(max_cred_num),
            )?;
            tracing::debug!(%rev_reg_id, index, "allocated registry index");
            (Some((index, secret.index_element(index))), Some(list))
        }
        _ => {
            return Err(Error::invalid(
                "revocation requires a registry id, status list and revocation config",
            ))
        }
    };

    let known = values
        .scalars()?
        .into_values()
        .enumerate()
        .map(|(i, m)| (i + 1, m))
        .collect::<Vec<_>>();
    let extra = revocation
        .map(|(_, g)| g)
        .unwrap_or(G1Projective::identity());
    let signature = cred_def_private
        .value
        .blind_sign(
            cred_def.public_key(),
            request.blinded_link_secret.u,
            &known,
            extra,
            &mut rand::thread_rng(),
        )
        .map_err(|e| Error::invalid(format!("cannot sign credential: {e}")))?;

    let credential = Credential {
        schema_id: offer.schema_id.clone(),
        cred_def_id,
        rev_reg_id,
        values,
        signature: CredentialSignature {
            signature,
            rev_reg_index: revocation.map(|(i, _)| i),
            index_element: revocation.map(|(_, g)| g),
        },
    };
    Ok((credential, status_list))
}

/// Unblind a received credential with the request metadata and check its signature.
pub fn process_credential(
    credential: &Credential,
    metadata: &CredentialRequestMetadata,
    link_secret: &LinkSecret,
    cred_def: &CredentialDefinition,
    rev_reg_def: Option<&RevocationRegistryDefinition>,
) -> Result<Credential> {
    tracing::trace!(cred_def_id = %credential.cred_def_id, "process_credential");
    if credential.cred_def_id != cred_def.id()? {
        return Err(Error::invalid(format!(
            "credential was issued under {}",
            credential.cred_def_id
        )));
    }
    let mut processed = credential.clone();
    processed
        .signature
        .signature
        .unblind(metadata.link_secret_blinding_data);

    let messages = processed.messages(cred_def, link_secret)?;
    processed
        .signature
        .signature
        .verify(cred_def.public_key(), &messages, processed.extra_base())
        .map_err(|e| Error::SignatureVerificationFailed(e.to_string()))?;

    match (
        &processed.rev_reg_id,
        processed.signature.rev_reg_index,
        processed.signature.index_element,
    ) {
        (None, None, None) => {}
        (Some(rev_reg_id), Some(index), Some(index_element)) => {
            if let Some(rev_reg_def) = rev_reg_def {
                if rev_reg_def.id()? != *rev_reg_id {
                    return Err(Error::invalid(format!(
                        "credential was issued under registry {rev_reg_id}"
                    )));
                }
                rev_reg_def.check_index(index)?;
                let mut tails = TailsFileReader::new(&rev_reg_def.value.tails_location);
                check_index_element(&mut tails, index, index_element)?;
            }
        }
        _ => {
            return Err(Error::SignatureVerificationFailed(
                "incomplete revocation data in credential".into(),
            ))
        }
    }
    Ok(processed)
}

// g_i = γ^(i+1) * P1 exactly when e(g_i, P2) = e(P1, T_(i+1)).
fn check_index_element(
    tails: &mut impl TailsReader,
    index: u32,
    index_element: G1Projective,
) -> Result<()> {
    let tail = tails.tail(index + 1)?;
    let lhs = pairing(&G1Affine::from(index_element), &G2Affine::generator());
    let rhs = pairing(&G1Affine::generator(), &G2Affine::from(tail));
    match lhs == rhs {
        true => Ok(()),
        false => Err(Error::SignatureVerificationFailed(format!(
            "index element does not match registry index {index}"
        ))),
    }
}

/// Check that a raw value encodes to the signed value.
pub(crate) fn check_encoding(raw: &str, encoded: &str) -> Result<bool> {
    Ok(encoded_to_scalar(&crate::attributes::encode_credential_attribute(raw))?
        == encoded_to_scalar(encoded)?)
}
