//! Post-migration existence checks.

use keel_db::Driver;
use serde::Serialize;

use crate::error::{MigrateError, MigrateResult};

/// Existence of one relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationCheck {
    pub name: String,
    pub exists: bool,
}

/// Result of [`verify_relations`], in the order the names were given
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub checks: Vec<RelationCheck>,
}

impl VerifyReport {
    pub fn all_present(&self) -> bool {
        self.checks.iter().all(|c| c.exists)
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .filter(|c| !c.exists)
            .map(|c| c.name.as_str())
    }
}

/// Look up each of `names` as a table or view.
///
/// A missing relation is reported, not an error; only a failing lookup is.
pub async fn verify_relations(driver: &dyn Driver, names: &[String]) -> MigrateResult<VerifyReport> {
    let mut checks = Vec::with_capacity(names.len());
    for name in names {
        let exists = driver
            .relation_exists(name)
            .await
            .map_err(MigrateError::Verify)?;
        if !exists {
            log::debug!("Relation {name} not found");
        }
        checks.push(RelationCheck {
            name: name.clone(),
            exists,
        });
    }
    Ok(VerifyReport { checks })
}
