//! Command-line flags parsed by clap.
//!
//! Only arguments the user actually passed contribute; defaults declared on
//! the clap command never shadow lower layers.

use clap::parser::ValueSource;
use clap::ArgMatches;

use crate::value::{Table, Value};

use super::{Source, SourceError};

/// Wraps parsed matches. Argument ids are used as keys.
#[derive(Debug, Clone)]
pub struct FlagSource {
    matches: ArgMatches,
}

impl FlagSource {
    pub fn new(matches: ArgMatches) -> Self {
        Self { matches }
    }
}

impl Source for FlagSource {
    fn name(&self) -> String {
        "flags".to_string()
    }

    fn load(&self) -> Result<Table, SourceError> {
        let mut out = Table::new();
        for id in self.matches.ids() {
            let id = id.as_str();
            if self.matches.value_source(id) != Some(ValueSource::CommandLine) {
                continue;
            }
            let Ok(Some(raw)) = self.matches.try_get_raw(id) else {
                continue;
            };
            let mut values: Vec<String> = raw.map(|v| v.to_string_lossy().into_owned()).collect();
            let value = match values.len() {
                0 => continue,
                1 => Value::String(values.remove(0)),
                _ => Value::StringList(values),
            };
            out.insert(id.to_string(), value);
        }
        Ok(out)
    }
}
