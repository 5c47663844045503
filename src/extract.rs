use crate::config::{FieldSpec, FieldSpecs};
use crate::driver::{Driver, Node};
use crate::Result;
use std::collections::BTreeMap;
use tracing::trace;

/// Field name to extracted text. Every configured field is present.
pub type Record = BTreeMap<String, String>;

/// Reads named fields through the locator table, recording the sentinel for
/// fields that match nothing.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    sentinel: &'a str,
}

impl<'a> Extractor<'a> {
    pub fn new(sentinel: &'a str) -> Self {
        Self { sentinel }
    }

    /// Read one field, resolved inside `scope` when given.
    pub async fn field<D: Driver>(
        &self,
        driver: &D,
        scope: Option<&Node>,
        spec: &FieldSpec,
    ) -> Result<String> {
        let node = match scope {
            Some(scope) => scope.child(&spec.locator, spec.pick.into()),
            None => Node::at(&spec.locator, spec.pick.into()),
        };
        match driver.read(&node, spec.attribute.as_deref()).await? {
            Some(text) => Ok(text.trim().to_string()),
            None => {
                trace!("{} absent, recording sentinel", node);
                Ok(self.sentinel.to_string())
            }
        }
    }

    /// Read every field in `specs`.
    pub async fn extract<D: Driver>(
        &self,
        driver: &D,
        scope: Option<&Node>,
        specs: &FieldSpecs,
    ) -> Result<Record> {
        let mut record = Record::new();
        for (name, spec) in specs {
            let value = self.field(driver, scope, spec).await?;
            record.insert(name.clone(), value);
        }
        Ok(record)
    }
}
