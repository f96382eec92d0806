//! Source registration and the layered merge.

use std::path::{Path, PathBuf};

use clap::ArgMatches;

use crate::config::store::Config;
use crate::source::{
    DotEnvSource, Defaults, EnvSource, FileSource, FlagSource, Source, SourceError,
};
use crate::value::{flatten, FlatMap, Table};

/// Collects sources in precedence order: every call ranks above the previous ones.
#[derive(Default)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn Source>>,
    watch_path: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static defaults, normally registered first.
    pub fn with_defaults(self, values: Table) -> Self {
        self.with_source(Defaults::new(values))
    }

    /// YAML, JSON or TOML file by extension. Also becomes the watch target.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.watch_path = Some(path.as_ref().to_path_buf());
        self.with_source(FileSource::new(path))
    }

    /// Environment variables starting with `<prefix>_`.
    pub fn with_env_prefix(self, prefix: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix))
    }

    pub fn with_dotenv(self, path: impl AsRef<Path>) -> Self {
        self.with_source(DotEnvSource::new(path))
    }

    /// Flags explicitly passed on the command line.
    pub fn with_flags(self, matches: ArgMatches) -> Self {
        self.with_source(FlagSource::new(matches))
    }

    pub fn with_source(mut self, source: impl Source + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Build an empty store. Call [`Config::reload`] to populate it.
    pub fn build(self) -> Config {
        Config::from_parts(self.sources, self.watch_path)
    }
}

/// Load every source in order and fold the flattened results.
///
/// Later sources overwrite earlier ones key by key regardless of value kind.
/// The first failing source aborts the whole merge.
pub fn merge_sources(sources: &[Box<dyn Source>]) -> Result<FlatMap, SourceError> {
    let mut merged = FlatMap::new();
    for source in sources {
        let tree = source.load()?;
        let flat = flatten(&tree);
        tracing::trace!(source = %source.name(), keys = flat.len(), "Source merged");
        merged.extend(flat);
    }
    Ok(merged)
}
