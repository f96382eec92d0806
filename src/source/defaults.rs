//! Static default values.

use crate::value::Table;

use super::{Source, SourceError};

/// Fixed table registered in code, usually the lowest layer.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    values: Table,
}

impl Defaults {
    pub fn new(values: Table) -> Self {
        Self { values }
    }
}

impl Source for Defaults {
    fn name(&self) -> String {
        "defaults".to_string()
    }

    fn load(&self) -> Result<Table, SourceError> {
        Ok(self.values.clone())
    }
}
