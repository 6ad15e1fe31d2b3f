//! Holder side of a presentation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bls12_381::{G1Projective, Scalar};
use serde::{Deserialize, Serialize};

use crate::{
    attributes::canonical_attr_name,
    bbs,
    cred_def::{CredentialDefinition, LINK_SECRET_INDEX},
    credential::{Credential, LinkSecret},
    error::{Error, Result},
    identifiers::{CredentialDefinitionId, SchemaId},
    pres_request::{PredicateInfo, PresentationRequest},
    presentation::{
        append_non_revocation, label, presentation_transcript, range_generators,
        AccumulatorProof, AggregatedProof, Identifier, NonRevocationProof, PredicateProof,
        Presentation, RequestedProof, RevealedAttributeGroupInfo, RevealedAttributeInfo, SubProof,
        SubProofReferent,
    },
    range,
    rev_state::RevocationState,
    schema::Schema,
    zkp::{Prover, ScalarVar, SchnorrCS},
};

/// A credential offered for a presentation, with its revocation state if the holder wants to
/// prove non-revocation.
#[derive(Clone, Copy, Debug)]
pub struct PresentCredential<'a> {
    pub credential: &'a Credential,
    pub timestamp: Option<u64>,
    pub rev_state: Option<&'a RevocationState>,
}

/// Assignment of one requested referent to a credential entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialProve {
    pub entry_idx: usize,
    pub referent: String,
    pub is_predicate: bool,
    pub reveal: bool,
}

#[derive(Default)]
struct EntryPlan {
    revealed: BTreeSet<String>,
    predicates: Vec<PredicateInfo>,
}

// Referents of a request, checked against what the holder supplies.
fn plan_entries(
    pres_req: &PresentationRequest,
    credentials: &[PresentCredential<'_>],
    credentials_prove: &[CredentialProve],
    self_attested: &HashMap<String, String>,
) -> Result<BTreeMap<usize, EntryPlan>> {
    let mut seen = BTreeSet::new();
    let mut plans = BTreeMap::<usize, EntryPlan>::new();
    for prove in credentials_prove {
        if !seen.insert(prove.referent.clone()) {
            return Err(Error::invalid(format!(
                "referent {} is proven more than once",
                prove.referent
            )));
        }
        let entry = credentials.get(prove.entry_idx).ok_or_else(|| {
            Error::invalid(format!("no credential entry {}", prove.entry_idx))
        })?;
        let values = &entry.credential.values;
        let plan = plans.entry(prove.entry_idx).or_default();
        match prove.is_predicate {
            true => {
                let info = pres_req
                    .requested_predicates
                    .get(&prove.referent)
                    .ok_or_else(|| {
                        Error::invalid(format!("unknown predicate referent {}", prove.referent))
                    })?;
                if values.get(&info.name).is_none() {
                    return Err(Error::AttributeMismatch(format!(
                        "credential has no attribute {}",
                        info.name
                    )));
                }
                plan.predicates.push(info.clone());
            }
            false => {
                let info = pres_req
                    .requested_attributes
                    .get(&prove.referent)
                    .ok_or_else(|| {
                        Error::invalid(format!("unknown attribute referent {}", prove.referent))
                    })?;
                for name in info.names()? {
                    if values.get(&name).is_none() {
                        return Err(Error::AttributeMismatch(format!(
                            "credential has no attribute {name}"
                        )));
                    }
                    if prove.reveal || info.names.is_some() {
                        plan.revealed.insert(canonical_attr_name(&name));
                    }
                }
            }
        }
    }

    for referent in self_attested.keys() {
        let info = pres_req.requested_attributes.get(referent).ok_or_else(|| {
            Error::invalid(format!("unknown self-attested referent {referent}"))
        })?;
        if seen.contains(referent) {
            return Err(Error::invalid(format!(
                "referent {referent} is both proven and self-attested"
            )));
        }
        if info.has_restrictions() {
            return Err(Error::invalid(format!(
                "referent {referent} has restrictions and cannot be self-attested"
            )));
        }
    }

    let missing = pres_req
        .requested_attributes
        .keys()
        .filter(|r| !self_attested.contains_key(*r))
        .chain(pres_req.requested_predicates.keys())
        .find(|r| !seen.contains(*r));
    if let Some(referent) = missing {
        return Err(Error::MissingReferent(referent.clone()));
    }

    for plan in plans.values() {
        if let Some(info) = plan
            .predicates
            .iter()
            .find(|p| plan.revealed.contains(&canonical_attr_name(&p.name)))
        {
            return Err(Error::invalid(format!(
                "attribute {} is both revealed and used in a predicate",
                info.name
            )));
        }
    }
    Ok(plans)
}

fn requested_proof(
    pres_req: &PresentationRequest,
    credentials: &[PresentCredential<'_>],
    credentials_prove: &[CredentialProve],
    self_attested: &HashMap<String, String>,
    sub_proof_index: &BTreeMap<usize, u32>,
) -> Result<RequestedProof> {
    let mut requested = RequestedProof::default();
    for prove in credentials_prove {
        let sub_proof_index = sub_proof_index[&prove.entry_idx];
        let values = &credentials[prove.entry_idx].credential.values;
        let referent = SubProofReferent { sub_proof_index };
        if prove.is_predicate {
            requested.predicates.insert(prove.referent.clone(), referent);
            continue;
        }
        let info = &pres_req.requested_attributes[&prove.referent];
        match (&info.name, &info.names) {
            (Some(name), None) if prove.reveal => {
                let value = values
                    .get(name)
                    .ok_or_else(|| Error::AttributeMismatch(name.clone()))?;
                requested.revealed_attrs.insert(
                    prove.referent.clone(),
                    RevealedAttributeInfo {
                        sub_proof_index,
                        raw: value.raw.clone(),
                        encoded: value.encoded.clone(),
                    },
                );
            }
            (Some(_), None) => {
                requested
                    .unrevealed_attrs
                    .insert(prove.referent.clone(), referent);
            }
            _ => {
                let group = info
                    .names()?
                    .into_iter()
                    .map(|name| {
                        let value = values
                            .get(&name)
                            .ok_or_else(|| Error::AttributeMismatch(name.clone()))?;
                        Ok((name, value.clone()))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?;
                requested.revealed_attr_groups.insert(
                    prove.referent.clone(),
                    RevealedAttributeGroupInfo {
                        sub_proof_index,
                        values: group,
                    },
                );
            }
        }
    }
    requested.self_attested_attrs = self_attested
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(requested)
}

/// Build a presentation answering `pres_req`.
///
/// Every requested referent must be assigned exactly once, either to a credential entry through
/// `credentials_prove` or, for unrestricted attributes, to a value in `self_attested`.
pub fn create_presentation(
    pres_req: &PresentationRequest,
    credentials: &[PresentCredential<'_>],
    credentials_prove: &[CredentialProve],
    self_attested: &HashMap<String, String>,
    link_secret: &LinkSecret,
    schemas: &HashMap<SchemaId, Schema>,
    cred_defs: &HashMap<CredentialDefinitionId, CredentialDefinition>,
) -> Result<Presentation> {
    tracing::trace!(
        name = %pres_req.name,
        credentials = credentials.len(),
        referents = credentials_prove.len(),
        "create_presentation"
    );
    pres_req.validate()?;
    let plans = plan_entries(pres_req, credentials, credentials_prove, self_attested)?;
    let sub_proof_index = plans
        .keys()
        .enumerate()
        .map(|(i, entry_idx)| (*entry_idx, i as u32))
        .collect::<BTreeMap<_, _>>();

    let mut identifiers = Vec::with_capacity(plans.len());
    let mut entries = Vec::with_capacity(plans.len());
    for (entry_idx, plan) in plans.iter() {
        let entry = &credentials[*entry_idx];
        let credential = entry.credential;
        if !schemas.contains_key(&credential.schema_id) {
            return Err(Error::invalid(format!(
                "schema {} not provided",
                credential.schema_id
            )));
        }
        let cred_def = cred_defs.get(&credential.cred_def_id).ok_or_else(|| {
            Error::invalid(format!(
                "credential definition {} not provided",
                credential.cred_def_id
            ))
        })?;
        let timestamp = match (entry.rev_state, &credential.rev_reg_id) {
            (None, _) => None,
            (Some(state), Some(_)) => Some(entry.timestamp.unwrap_or(state.timestamp)),
            (Some(_), None) => {
                return Err(Error::invalid(format!(
                    "revocation state given for non-revocable credential {entry_idx}"
                )))
            }
        };
        identifiers.push(Identifier {
            schema_id: credential.schema_id.clone(),
            cred_def_id: credential.cred_def_id.clone(),
            rev_reg_id: credential.rev_reg_id.clone(),
            timestamp,
        });
        entries.push((entry, cred_def, plan));
    }

    let rng = &mut rand::thread_rng();
    let mut transcript = presentation_transcript(&pres_req.nonce, &identifiers);
    let mut prover = Prover::<G1Projective>::new(label::CONSTRAINTS.as_bytes(), &mut transcript);
    let ls_var = prover.alloc_scalars([(label::LINK_SECRET, link_secret.value())])[0];

    let mut proofs = Vec::with_capacity(entries.len());
    for (entry, cred_def, plan) in entries {
        let credential = entry.credential;
        let messages = credential.messages(cred_def, link_secret)?;
        let pk = cred_def.public_key();

        let mut hidden = vec![(LINK_SECRET_INDEX, ls_var)];
        let mut attr_vars = BTreeMap::<&String, ScalarVar>::new();
        let mut revealed_attrs = BTreeMap::new();
        for (i, name) in cred_def.attr_names().iter().enumerate() {
            match plan.revealed.contains(name) {
                true => {
                    let value = credential
                        .values
                        .get(name)
                        .ok_or_else(|| Error::AttributeMismatch(name.clone()))?;
                    revealed_attrs.insert(name.clone(), value.encoded.clone());
                }
                false => {
                    let var = prover.alloc_scalars([(label::ATTRIBUTE, messages[i + 1])])[0];
                    hidden.push((i + 1, var));
                    attr_vars.insert(name, var);
                }
            }
        }

        let (extra, non_revocation) = match (
            &credential.rev_reg_id,
            credential.signature.index_element,
        ) {
            (Some(_), Some(index_element)) => {
                let r = bbs::random_nonzero(rng);
                let rho = r.invert().unwrap_or(Scalar::zero());
                let g_hat = index_element * r;
                let rho_var = prover.alloc_scalars([(label::RHO, rho)])[0];
                let accumulator = entry.rev_state.map(|state| {
                    let k = prover.blinding(rho_var);
                    let w_hat = state.witness * r;
                    AccumulatorProof {
                        w_hat,
                        t_g: g_hat * k,
                        t_w: w_hat * k,
                    }
                });
                let proof = NonRevocationProof { g_hat, accumulator };
                append_non_revocation(prover.transcript(), &proof);
                (Some((rho_var, g_hat, index_element)), Some(proof))
            }
            (None, None) => (None, None),
            _ => {
                return Err(Error::invalid(
                    "credential has incomplete revocation data",
                ))
            }
        };

        let signature_proof = credential
            .signature
            .signature
            .prove_constraints(&mut prover, pk, &messages, &hidden, extra, rng)
            .map_err(|e| Error::invalid(format!("cannot prove credential signature: {e}")))?;

        let gens = range_generators(pk);
        let mut predicates = Vec::with_capacity(plan.predicates.len());
        for info in plan.predicates.iter() {
            let name = canonical_attr_name(&info.name);
            let m_var = *attr_vars
                .get(&name)
                .ok_or_else(|| Error::AttributeMismatch(name.clone()))?;
            let value = credential
                .values
                .get(&name)
                .and_then(|v| v.encoded.parse::<i32>().ok())
                .ok_or_else(|| {
                    Error::invalid(format!("predicate attribute {name} is not an integer"))
                })?;
            let range = range::prove_predicate_constraints(
                &mut prover,
                &gens,
                m_var,
                value,
                info.p_type,
                info.p_value,
                rng,
            )
            .map_err(|e| Error::invalid(format!("predicate on {name}: {e}")))?;
            predicates.push(PredicateProof {
                attr_name: name,
                p_type: info.p_type,
                p_value: info.p_value,
                range,
            });
        }

        proofs.push(SubProof {
            signature_proof,
            revealed_attrs,
            predicates,
            non_revocation,
        });
    }
    let aggregated_proof = prover.prove_compact();

    let requested_proof = requested_proof(
        pres_req,
        credentials,
        credentials_prove,
        self_attested,
        &sub_proof_index,
    )?;
    tracing::debug!(sub_proofs = proofs.len(), "created presentation");
    Ok(Presentation {
        proof: AggregatedProof {
            proofs,
            aggregated_proof,
        },
        requested_proof,
        identifiers,
    })
}
