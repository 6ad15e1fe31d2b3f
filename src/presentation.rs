//! Presentations: one proof of knowledge over several credentials, answering a presentation
//! request.
//!
//! Each credential used contributes a sub-proof: a BBS+ proof of knowledge revealing the requested
//! attributes, range proofs for predicates, and optionally a non-revocation proof. All sub-proofs
//! share one Schnorr challenge and one link secret variable, which ties the credentials to the
//! same holder.
//!
//! The non-revocation proof reveals `Ĝ = r * g_i` and `Ŵ = r * w_i` for the registry index
//! element `g_i` and witness `w_i`. With `ρ = 1/r` the signature proof shows that `ρ * Ĝ` is the
//! index element that was signed, and membership becomes `ρ * X = e(z, P2)` for the public
//! `X = e(Ĝ, acc) - e(P1, Ŵ)`. That relation is proven in the target group with the commitments
//! `T_g = k * Ĝ` and `T_w = k * Ŵ`, where `k` is the Schnorr nonce of `ρ`.

use std::collections::BTreeMap;

use bls12_381::{G1Projective, G2Projective};
use group::Group;
use serde::{Deserialize, Serialize};

use crate::{
    attributes::AttributeValues,
    bbs,
    encoding::base58,
    identifiers::{CredentialDefinitionId, RevocationRegistryDefinitionId, SchemaId},
    nonce::Nonce,
    pedersen::PedersenGenerators,
    pres_request::PredicateType,
    range::RangeProof,
    zkp::{CompactProof, Transcript},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub proof: AggregatedProof,
    pub requested_proof: RequestedProof,
    pub identifiers: Vec<Identifier>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedProof {
    pub proofs: Vec<SubProof>,
    pub aggregated_proof: CompactProof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProof {
    pub signature_proof: bbs::SignatureProof,
    /// Encoded value of each revealed attribute.
    pub revealed_attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<PredicateProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revocation: Option<NonRevocationProof>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateProof {
    pub attr_name: String,
    pub p_type: PredicateType,
    pub p_value: i32,
    #[serde(flatten)]
    pub range: RangeProof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonRevocationProof {
    #[serde(with = "base58")]
    pub g_hat: G1Projective,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accumulator: Option<AccumulatorProof>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorProof {
    #[serde(with = "base58")]
    pub w_hat: G2Projective,
    #[serde(with = "base58")]
    pub t_g: G1Projective,
    #[serde(with = "base58")]
    pub t_w: G2Projective,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedProof {
    #[serde(default)]
    pub revealed_attrs: BTreeMap<String, RevealedAttributeInfo>,
    #[serde(default)]
    pub revealed_attr_groups: BTreeMap<String, RevealedAttributeGroupInfo>,
    #[serde(default)]
    pub self_attested_attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub unrevealed_attrs: BTreeMap<String, SubProofReferent>,
    #[serde(default)]
    pub predicates: BTreeMap<String, SubProofReferent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAttributeInfo {
    pub sub_proof_index: u32,
    pub raw: String,
    pub encoded: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAttributeGroupInfo {
    pub sub_proof_index: u32,
    pub values: BTreeMap<String, AttributeValues>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProofReferent {
    pub sub_proof_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub schema_id: SchemaId,
    pub cred_def_id: CredentialDefinitionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevocationRegistryDefinitionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Labels shared by the prover and verifier constraint systems.
pub(crate) mod label {
    macro_rules! label {
        ($s:literal) => {
            concat!("anoncreds_bls::presentation::", $s)
        };
    }

    pub const CONSTRAINTS: &str = label!("constraints");
    pub const LINK_SECRET: &str = label!("link_secret");
    pub const ATTRIBUTE: &str = label!("attribute");
    pub const RHO: &str = label!("rho");
    pub const G_HAT: &str = label!("g_hat");
    pub const W_HAT: &str = label!("w_hat");
    pub const T_G: &str = label!("t_g");
    pub const T_W: &str = label!("t_w");
}

/// Transcript bound to the request nonce and to the identifiers and timestamps of every
/// sub-proof.
pub(crate) fn presentation_transcript(nonce: &Nonce, identifiers: &[Identifier]) -> Transcript {
    let mut transcript = Transcript::new(b"anoncreds_bls::presentation");
    transcript.append_message(b"nonce", nonce.as_bytes());
    for identifier in identifiers {
        transcript.append_message(b"schema_id", identifier.schema_id.as_str().as_bytes());
        transcript.append_message(b"cred_def_id", identifier.cred_def_id.as_str().as_bytes());
        if let Some(rev_reg_id) = &identifier.rev_reg_id {
            transcript.append_message(b"rev_reg_id", rev_reg_id.as_str().as_bytes());
        }
        if let Some(timestamp) = identifier.timestamp {
            transcript.append_message(b"timestamp", &timestamp.to_le_bytes());
        }
    }
    transcript
}

/// Generators for predicate bit commitments under a credential definition.
pub(crate) fn range_generators(pk: &bbs::PublicKey) -> PedersenGenerators<G1Projective> {
    PedersenGenerators::new(pk.h0, vec![G1Projective::generator()])
}

/// Append the revealed non-revocation elements, in the order both sides use.
pub(crate) fn append_non_revocation(transcript: &mut Transcript, proof: &NonRevocationProof) {
    transcript.append_point(label::G_HAT.as_bytes(), &proof.g_hat);
    if let Some(accumulator) = &proof.accumulator {
        transcript.append_point(label::W_HAT.as_bytes(), &accumulator.w_hat);
        transcript.append_point(label::T_G.as_bytes(), &accumulator.t_g);
        transcript.append_point(label::T_W.as_bytes(), &accumulator.t_w);
    }
}
