use serde::{Deserialize, Serialize};

use crate::{
    attributes::{canonical_attr_name, AttributeNames, MAX_ATTRIBUTES_COUNT},
    error::{Error, Result},
    identifiers::{IssuerId, SchemaId},
};

/// Attribute set of a credential type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub issuer_id: IssuerId,
    pub name: String,
    pub version: String,
    pub attr_names: AttributeNames,
}

impl Schema {
    pub fn id(&self) -> Result<SchemaId> {
        SchemaId::derive(&self.issuer_id, &self.name, &self.version)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.attr_names.is_empty() {
            return Err(Error::InvalidSchema("schema has no attributes".into()));
        }
        if self.attr_names.len() > MAX_ATTRIBUTES_COUNT {
            return Err(Error::InvalidSchema(format!(
                "schema has {} attributes, the maximum is {MAX_ATTRIBUTES_COUNT}",
                self.attr_names.len()
            )));
        }
        Ok(())
    }
}

pub fn create_schema<S: AsRef<str>>(
    name: &str,
    version: &str,
    issuer_id: IssuerId,
    attr_names: &[S],
) -> Result<Schema> {
    tracing::trace!(name, version, %issuer_id, "create_schema");
    if name.is_empty() || version.is_empty() {
        return Err(Error::invalid("schema name and version must be non-empty"));
    }
    let canonical = attr_names
        .iter()
        .map(|n| canonical_attr_name(n.as_ref()))
        .collect::<Vec<_>>();
    if canonical.iter().any(String::is_empty) {
        return Err(Error::InvalidSchema("empty attribute name".into()));
    }
    let attr_names = canonical.iter().collect::<AttributeNames>();
    if attr_names.len() != canonical.len() {
        return Err(Error::InvalidSchema(
            "attribute names are not unique after canonicalization".into(),
        ));
    }

    let schema = Schema {
        issuer_id,
        name: name.to_owned(),
        version: version.to_owned(),
        attr_names,
    };
    schema.validate()?;
    // The derived id must itself be valid.
    schema.id()?;
    Ok(schema)
}
