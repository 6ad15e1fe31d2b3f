//! Verifier side of a presentation.

use std::collections::{BTreeMap, HashMap};

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine};
use group::Group;

use crate::{
    attributes::{canonical_attr_name, encoded_to_scalar},
    bbs,
    cred_def::{CredentialDefinition, LINK_SECRET_INDEX},
    credential::check_encoding,
    error::{Error, Result},
    identifiers::{CredentialDefinitionId, RevocationRegistryDefinitionId, SchemaId},
    pres_request::{NonRevokedInterval, PresentationRequest},
    presentation::{
        append_non_revocation, label, presentation_transcript, range_generators,
        AccumulatorProof, Identifier, Presentation, SubProof,
    },
    range,
    restrictions::{Query, RestrictionTags},
    rev_reg::{RevocationRegistryDefinition, RevocationStatusList},
    schema::Schema,
    zkp::{ProofError, ScalarVar, SchnorrCS, Verifier},
};

macro_rules! reject {
    ($($arg:tt)*) => {{
        tracing::warn!($($arg)*);
        return Ok(false);
    }};
}

/// Accumulator relation left to check once the Schnorr challenge is known.
struct PendingAccumulator<'a> {
    rho_var: ScalarVar,
    g_hat: G1Projective,
    proof: &'a AccumulatorProof,
    rev_reg_def: &'a RevocationRegistryDefinition,
    status_list: &'a RevocationStatusList,
}

// Referents answered by one sub-proof, and their local intervals.
#[derive(Default)]
struct SubProofReferents<'a> {
    intervals: Vec<&'a Option<NonRevokedInterval>>,
    restrictions: Vec<(&'a str, &'a Query)>,
}

fn get_sub_proof<'a>(presentation: &'a Presentation, index: u32) -> Result<&'a SubProof> {
    presentation
        .proof
        .proofs
        .get(index as usize)
        .ok_or_else(|| Error::invalid(format!("sub-proof index {index} out of range")))
}

fn restriction_tags(
    presentation: &Presentation,
    pres_req: &PresentationRequest,
    sub_proof_index: u32,
    identifier: &Identifier,
    schema: &Schema,
    cred_def: &CredentialDefinition,
) -> RestrictionTags {
    let mut tags = RestrictionTags::new();
    tags.insert("schema_id", identifier.schema_id.as_str())
        .insert("schema_issuer_id", schema.issuer_id.as_str())
        .insert("schema_name", schema.name.as_str())
        .insert("schema_version", schema.version.as_str())
        .insert("issuer_id", cred_def.issuer_id.as_str())
        .insert("cred_def_id", identifier.cred_def_id.as_str());
    if let Some(rev_reg_id) = &identifier.rev_reg_id {
        tags.insert("rev_reg_id", rev_reg_id.as_str());
    }
    for name in cred_def.attr_names().iter() {
        tags.insert_marker(name);
    }
    let requested = &presentation.requested_proof;
    for (referent, info) in requested.revealed_attrs.iter() {
        if info.sub_proof_index != sub_proof_index {
            continue;
        }
        if let Some(name) = pres_req
            .requested_attributes
            .get(referent)
            .and_then(|a| a.name.as_ref())
        {
            tags.insert_attribute(name, &info.raw);
        }
    }
    for info in requested
        .revealed_attr_groups
        .values()
        .filter(|info| info.sub_proof_index == sub_proof_index)
    {
        for (name, value) in info.values.iter() {
            tags.insert_attribute(name, &value.raw);
        }
    }
    tags
}

/// Verify a presentation against the request it answers.
///
/// Returns `Ok(false)` for a presentation that is well-formed but does not satisfy the request or
/// whose proofs do not verify. Errors indicate inputs that cannot be checked at all, such as
/// missing ledger objects or a malformed presentation.
///
/// `nonrevoke_interval_override` maps a registry and a requested `from` time to an earlier time
/// the verifier also accepts, for registries whose status lists were not published at `from`.
pub fn verify_presentation(
    presentation: &Presentation,
    pres_req: &PresentationRequest,
    schemas: &HashMap<SchemaId, Schema>,
    cred_defs: &HashMap<CredentialDefinitionId, CredentialDefinition>,
    rev_reg_defs: Option<&HashMap<RevocationRegistryDefinitionId, RevocationRegistryDefinition>>,
    rev_status_lists: Option<&[RevocationStatusList]>,
    nonrevoke_interval_override: Option<
        &HashMap<RevocationRegistryDefinitionId, HashMap<u64, u64>>,
    >,
) -> Result<bool> {
    tracing::trace!(
        name = %pres_req.name,
        sub_proofs = presentation.proof.proofs.len(),
        "verify_presentation"
    );
    pres_req.validate()?;
    let proofs = &presentation.proof.proofs;
    let identifiers = &presentation.identifiers;
    if proofs.len() != identifiers.len() {
        return Err(Error::invalid(format!(
            "{} sub-proofs but {} identifiers",
            proofs.len(),
            identifiers.len()
        )));
    }

    let mut ledger = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let schema = schemas.get(&identifier.schema_id).ok_or_else(|| {
            Error::invalid(format!("schema {} not provided", identifier.schema_id))
        })?;
        let cred_def = cred_defs.get(&identifier.cred_def_id).ok_or_else(|| {
            Error::invalid(format!(
                "credential definition {} not provided",
                identifier.cred_def_id
            ))
        })?;
        cred_def.check_shape()?;
        if cred_def.schema_id != identifier.schema_id {
            reject!(
                cred_def_id = %identifier.cred_def_id,
                "credential definition is not for the identified schema"
            );
        }
        ledger.push((schema, cred_def));
    }

    let requested = &presentation.requested_proof;
    let mut referents: BTreeMap<u32, SubProofReferents<'_>> = BTreeMap::new();

    for (referent, info) in pres_req.requested_attributes.iter() {
        let names = info.names()?;
        if let Some(value) = requested.self_attested_attrs.get(referent) {
            if info.has_restrictions() {
                reject!(%referent, "self-attested attribute has restrictions");
            }
            tracing::trace!(%referent, %value, "self-attested");
            continue;
        }
        let index = if let Some(revealed) = requested.revealed_attrs.get(referent) {
            let [name] = names.as_slice() else {
                return Err(Error::invalid(format!(
                    "attribute group {referent} answered as a single attribute"
                )));
            };
            let sub_proof = get_sub_proof(presentation, revealed.sub_proof_index)?;
            if !check_encoding(&revealed.raw, &revealed.encoded)? {
                reject!(%referent, "revealed value does not match its encoding");
            }
            if sub_proof.revealed_attrs.get(&canonical_attr_name(name)) != Some(&revealed.encoded)
            {
                reject!(%referent, "revealed value differs from the proven value");
            }
            revealed.sub_proof_index
        } else if let Some(group) = requested.revealed_attr_groups.get(referent) {
            let sub_proof = get_sub_proof(presentation, group.sub_proof_index)?;
            if group.values.len() != names.len() {
                reject!(%referent, "attribute group does not answer every name");
            }
            for name in names.iter() {
                let Some(value) = group
                    .values
                    .iter()
                    .find(|(n, _)| canonical_attr_name(n) == canonical_attr_name(name))
                    .map(|(_, v)| v)
                else {
                    reject!(%referent, %name, "attribute group is missing a name");
                };
                if !check_encoding(&value.raw, &value.encoded)? {
                    reject!(%referent, %name, "revealed value does not match its encoding");
                }
                if sub_proof.revealed_attrs.get(&canonical_attr_name(name)) != Some(&value.encoded)
                {
                    reject!(%referent, %name, "revealed value differs from the proven value");
                }
            }
            group.sub_proof_index
        } else if let Some(unrevealed) = requested.unrevealed_attrs.get(referent) {
            let index = unrevealed.sub_proof_index;
            get_sub_proof(presentation, index)?;
            let (_, cred_def) = ledger[index as usize];
            if names.iter().any(|name| cred_def.attr_index(name).is_none()) {
                reject!(%referent, "credential does not contain the attribute");
            }
            index
        } else {
            return Err(Error::MissingReferent(referent.clone()));
        };
        let entry = referents.entry(index).or_default();
        entry.intervals.push(&info.non_revoked);
        if let Some(query) = &info.restrictions {
            entry.restrictions.push((referent.as_str(), query));
        }
    }

    for (referent, info) in pres_req.requested_predicates.iter() {
        let index = requested
            .predicates
            .get(referent)
            .ok_or_else(|| Error::MissingReferent(referent.clone()))?
            .sub_proof_index;
        let sub_proof = get_sub_proof(presentation, index)?;
        let name = canonical_attr_name(&info.name);
        if !sub_proof.predicates.iter().any(|p| {
            p.attr_name == name && p.p_type == info.p_type && p.p_value == info.p_value
        }) {
            reject!(%referent, "predicate is not proven");
        }
        let entry = referents.entry(index).or_default();
        entry.intervals.push(&info.non_revoked);
        if let Some(query) = &info.restrictions {
            entry.restrictions.push((referent.as_str(), query));
        }
    }

    for (index, entry) in referents.iter() {
        let i = *index as usize;
        let (schema, cred_def) = ledger[i];
        let tags = restriction_tags(
            presentation,
            pres_req,
            *index,
            &identifiers[i],
            schema,
            cred_def,
        );
        for (referent, query) in entry.restrictions.iter() {
            if !query.matches(&tags) {
                reject!(%referent, "restrictions are not satisfied");
            }
        }
    }

    let mut transcript = presentation_transcript(&pres_req.nonce, identifiers);
    let mut verifier =
        Verifier::<G1Projective>::new(label::CONSTRAINTS.as_bytes(), &mut transcript);
    let ls_var = verifier.alloc_scalars([label::LINK_SECRET])[0];

    let mut pending = Vec::new();
    for (i, (sub_proof, identifier)) in proofs.iter().zip(identifiers).enumerate() {
        let (_, cred_def) = ledger[i];
        let pk = cred_def.public_key();

        if let Some(name) = sub_proof
            .revealed_attrs
            .keys()
            .find(|name| cred_def.attr_index(name).is_none())
        {
            return Err(Error::invalid(format!(
                "sub-proof {i} reveals unknown attribute {name}"
            )));
        }
        let mut hidden = vec![(LINK_SECRET_INDEX, ls_var)];
        let mut revealed = Vec::new();
        let mut attr_vars = BTreeMap::<&String, ScalarVar>::new();
        for (j, name) in cred_def.attr_names().iter().enumerate() {
            match sub_proof.revealed_attrs.get(name) {
                Some(encoded) => revealed.push((j + 1, encoded_to_scalar(encoded)?)),
                None => {
                    let var = verifier.alloc_scalars([label::ATTRIBUTE])[0];
                    hidden.push((j + 1, var));
                    attr_vars.insert(name, var);
                }
            }
        }

        let local = referents
            .get(&(i as u32))
            .map(|entry| entry.intervals.as_slice())
            .unwrap_or_default();
        let interval = pres_req
            .interval_for(local.iter().copied())
            .map(|mut interval| {
                if let Some(overrides) = identifier
                    .rev_reg_id
                    .as_ref()
                    .and_then(|id| nonrevoke_interval_override?.get(id))
                {
                    interval.update_with_override(overrides);
                }
                interval
            });

        let extra = match (&identifier.rev_reg_id, &sub_proof.non_revocation) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(Error::invalid(format!(
                    "sub-proof {i} has a non-revocation proof for a non-revocable credential"
                )))
            }
            (Some(_), None) => {
                return Err(Error::invalid(format!(
                    "sub-proof {i} is missing the revealed index element"
                )))
            }
            (Some(rev_reg_id), Some(non_revocation)) => {
                if bool::from(non_revocation.g_hat.is_identity()) {
                    reject!(sub_proof = i, "index element is the identity");
                }
                let rho_var = verifier.alloc_scalars([label::RHO])[0];
                append_non_revocation(verifier.transcript(), non_revocation);

                if let Some(interval) = interval {
                    let Some(timestamp) = identifier.timestamp else {
                        reject!(sub_proof = i, "non-revocation required without a timestamp");
                    };
                    let Some(proof) = &non_revocation.accumulator else {
                        reject!(sub_proof = i, "non-revocation required but not proven");
                    };
                    if !interval.is_valid(timestamp) {
                        reject!(
                            sub_proof = i,
                            timestamp,
                            ?interval,
                            "timestamp outside the non-revocation interval"
                        );
                    }
                    let rev_reg_def = rev_reg_defs
                        .and_then(|defs| defs.get(rev_reg_id))
                        .ok_or_else(|| {
                            Error::invalid(format!(
                                "revocation registry definition {rev_reg_id} not provided"
                            ))
                        })?;
                    if rev_reg_def.cred_def_id != identifier.cred_def_id {
                        reject!(
                            sub_proof = i,
                            %rev_reg_id,
                            "registry belongs to another credential definition"
                        );
                    }
                    let status_list = rev_status_lists
                        .and_then(|lists| {
                            lists.iter().find(|list| {
                                list.rev_reg_def_id == *rev_reg_id && list.timestamp == timestamp
                            })
                        })
                        .ok_or_else(|| {
                            Error::invalid(format!(
                                "no status list of {rev_reg_id} at timestamp {timestamp}"
                            ))
                        })?;
                    pending.push(PendingAccumulator {
                        rho_var,
                        g_hat: non_revocation.g_hat,
                        proof,
                        rev_reg_def,
                        status_list,
                    });
                }
                Some((rho_var, non_revocation.g_hat))
            }
        };

        match bbs::constrain_signature_proof(
            &mut verifier,
            pk,
            &sub_proof.signature_proof,
            &revealed,
            &hidden,
            extra,
        ) {
            Ok(()) => {}
            Err(bbs::Error::VerificationFailed) => {
                reject!(sub_proof = i, "signature pairing check failed")
            }
            Err(e) => return Err(Error::invalid(format!("sub-proof {i}: {e}"))),
        }

        let gens = range_generators(pk);
        for predicate in sub_proof.predicates.iter() {
            let m_var = *attr_vars.get(&predicate.attr_name).ok_or_else(|| {
                Error::invalid(format!(
                    "predicate on {} is not over a hidden attribute",
                    predicate.attr_name
                ))
            })?;
            range::constrain_predicate(
                &mut verifier,
                &gens,
                m_var,
                predicate.p_type,
                predicate.p_value,
                &predicate.range,
            )
            .map_err(|e| Error::invalid(format!("sub-proof {i}: {e}")))?;
        }
    }

    let aggregated_proof = &presentation.proof.aggregated_proof;
    match verifier.verify_compact(aggregated_proof) {
        Ok(()) => {}
        Err(ProofError::VerificationFailure) => reject!("aggregated proof does not verify"),
        Err(e) => return Err(Error::invalid(format!("aggregated proof: {e}"))),
    }

    // e(T_g, acc) - e(P1, T_w) = s_rho * X + c * e(z, P2), where X = e(Ĝ, acc) - e(P1, Ŵ)
    for check in pending {
        let s_rho = aggregated_proof
            .response(check.rho_var)
            .ok_or_else(|| Error::invalid("aggregated proof is missing a response"))?;
        let accum = G2Affine::from(check.status_list.current_accumulator);
        let p1 = G1Affine::generator();
        let x = pairing(&G1Affine::from(check.g_hat), &accum)
            - pairing(&p1, &G2Affine::from(check.proof.w_hat));
        let t = pairing(&G1Affine::from(check.proof.t_g), &accum)
            - pairing(&p1, &G2Affine::from(check.proof.t_w));
        let z = pairing(
            &G1Affine::from(check.rev_reg_def.value.public_keys.accum_key.z),
            &G2Affine::generator(),
        );
        if t != x * s_rho + z * aggregated_proof.challenge {
            reject!(
                rev_reg_id = %check.status_list.rev_reg_def_id,
                "non-revocation proof does not verify"
            );
        }
    }
    tracing::debug!("presentation verified");
    Ok(true)
}
