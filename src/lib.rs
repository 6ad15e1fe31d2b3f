//! Anonymous credentials over BLS12-381: schemas, credential definitions, blind issuance bound to a
//! holder's link secret, revocation registries backed by a pairing accumulator, and
//! zero-knowledge presentations with selective disclosure and predicates.

pub mod accumulator;
pub mod attributes;
pub use attributes::{Attributes, AttributeNames, AttributeValues, CredentialValues};

#[cfg(feature = "derive")]
pub use anoncreds_bls_derive::Attributes;

pub mod bbs;
pub mod encoding;
pub use encoding::Json;

pub mod error;
pub use error::{Error, ErrorKind, Result};

pub mod hash;
pub mod pedersen;
pub mod range;
pub mod tails;
pub mod zkp;

pub mod cred_def;
pub mod credential;
pub mod identifiers;
pub mod nonce;
pub mod pres_request;
pub mod presentation;
pub mod restrictions;
pub mod rev_reg;
pub mod rev_state;
pub mod schema;

pub mod prover;
pub mod verifier;

pub use cred_def::create_credential_definition;
pub use credential::{
    create_credential, create_credential_offer, create_credential_request, create_link_secret,
    process_credential,
};
pub use nonce::generate_nonce;
pub use prover::create_presentation;
pub use rev_reg::{
    create_revocation_registry_def, create_revocation_status_list,
    update_revocation_status_list, update_revocation_status_list_timestamp_only,
};
pub use rev_state::create_or_update_revocation_state;
pub use schema::create_schema;
pub use verifier::verify_presentation;
