use std::collections::{BTreeSet, HashMap};

use anoncreds_bls::{
    cred_def::{CredentialDefinition, CredentialDefinitionConfig},
    create_credential, create_credential_definition, create_credential_offer,
    create_credential_request, create_link_secret, create_or_update_revocation_state,
    create_presentation, create_revocation_registry_def, create_revocation_status_list,
    create_schema,
    credential::{Credential, CredentialRevocationConfig, LinkSecret},
    generate_nonce,
    identifiers::{CredentialDefinitionId, IssuerId, SchemaId},
    pres_request::{NonRevokedInterval, PresentationRequest},
    presentation::Presentation,
    process_credential,
    prover::{CredentialProve, PresentCredential},
    rev_state::RevocationState,
    schema::Schema,
    tails::TailsFileWriter,
    update_revocation_status_list, verify_presentation, CredentialValues, Json,
};
use anyhow::{bail, ensure, Result};
use tracing_subscriber::EnvFilter;

fn present(
    pres_req: &PresentationRequest,
    credential: &Credential,
    rev_state: &RevocationState,
    link_secret: &LinkSecret,
    schemas: &HashMap<SchemaId, Schema>,
    cred_defs: &HashMap<CredentialDefinitionId, CredentialDefinition>,
) -> Result<Presentation> {
    Ok(create_presentation(
        pres_req,
        &[PresentCredential {
            credential,
            timestamp: None,
            rev_state: Some(rev_state),
        }],
        &[CredentialProve {
            entry_idx: 0,
            referent: "name".to_string(),
            is_predicate: false,
            reveal: true,
        }],
        &HashMap::new(),
        link_secret,
        schemas,
        cred_defs,
    )?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let tails_dir = tempfile::tempdir()?;

    let issuer_id = IssuerId::new("did:web:xyz")?;
    let schema = create_schema("person", "1.0", issuer_id.clone(), &["name", "age"])?;
    let schema_id = schema.id()?;
    let (cred_def, cred_def_private, key_proof) = create_credential_definition(
        &schema,
        issuer_id.clone(),
        "default",
        "BBS",
        CredentialDefinitionConfig::new(true),
    )?;
    let cred_def_id = cred_def.id()?;

    let mut tails_writer = TailsFileWriter::new(Some(tails_dir.path().to_path_buf()));
    let (rev_reg_def, rev_reg_private) = create_revocation_registry_def(
        &cred_def,
        issuer_id.clone(),
        "registry",
        "CL_ACCUM",
        100,
        &mut tails_writer,
    )?;
    let rev_reg_id = rev_reg_def.id()?;
    let list = create_revocation_status_list(&rev_reg_id, &rev_reg_def, issuer_id, Some(12), true)?;
    println!(
        "Published registry {rev_reg_id} with tails file {}",
        rev_reg_def.value.tails_location
    );

    let link_secret = create_link_secret();
    let offer = create_credential_offer(schema_id.clone(), cred_def_id.clone(), &key_proof)?;
    let (request, metadata) = create_credential_request(
        None,
        Some("did:web:holder"),
        &cred_def,
        &link_secret,
        "main",
        &offer,
    )?;
    let mut values = CredentialValues::new();
    values.add_raw("name", "Moussa").add_raw("age", "28");
    let (credential, list) = create_credential(
        &cred_def,
        &cred_def_private,
        &offer,
        &request,
        values,
        Some(rev_reg_id.clone()),
        Some(&list),
        Some(CredentialRevocationConfig {
            reg_def: &rev_reg_def,
            reg_def_private: &rev_reg_private,
            registry_idx: Some(1),
        }),
    )?;
    let Some(list) = list else {
        bail!("revocable issuance did not return a status list");
    };
    let credential =
        process_credential(&credential, &metadata, &link_secret, &cred_def, Some(&rev_reg_def))?;
    println!("Issued credential at registry index {:?}", credential.rev_reg_index());

    let tails = rev_reg_def.value.tails_location.clone();
    let state = create_or_update_revocation_state(&rev_reg_def, &list, 1, &tails, None, None)?;

    let mut pres_req = PresentationRequest::from_json(&format!(
        r#"{{"nonce": "{}", "name": "age check", "version": "1.0",
            "requested_attributes": {{"name": {{"name": "name"}}}}}}"#,
        generate_nonce()
    ))?;
    pres_req.non_revoked = Some(NonRevokedInterval::new(Some(10), Some(200)));

    let schemas = HashMap::from([(schema_id, schema)]);
    let cred_defs = HashMap::from([(cred_def_id, cred_def)]);
    let rev_reg_defs = HashMap::from([(rev_reg_id, rev_reg_def.clone())]);

    let presentation = present(&pres_req, &credential, &state, &link_secret, &schemas, &cred_defs)?;
    let valid = verify_presentation(
        &presentation,
        &pres_req,
        &schemas,
        &cred_defs,
        Some(&rev_reg_defs),
        Some(std::slice::from_ref(&list)),
        None,
    )?;
    ensure!(valid, "unrevoked credential should verify");
    println!("Verifier accepted the credential against the list at {}", list.timestamp);

    let (revoked_list, delta) = update_revocation_status_list(
        None,
        Some(&BTreeSet::from([1])),
        Some(13),
        &rev_reg_def,
        &list,
    )?;
    println!("Revoked indices {:?} at {}", delta.revoked, delta.to_timestamp);
    let state = create_or_update_revocation_state(
        &rev_reg_def,
        &revoked_list,
        1,
        &tails,
        Some(&state),
        Some(&list),
    )?;
    let presentation = present(&pres_req, &credential, &state, &link_secret, &schemas, &cred_defs)?;
    let valid = verify_presentation(
        &presentation,
        &pres_req,
        &schemas,
        &cred_defs,
        Some(&rev_reg_defs),
        Some(std::slice::from_ref(&revoked_list)),
        None,
    )?;
    ensure!(!valid, "revoked credential should not verify");
    println!("Verifier rejected the revoked credential");

    Ok(())
}
