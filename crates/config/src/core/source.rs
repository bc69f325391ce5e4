//! A provider paired with the parser that decodes its bytes

use super::{ConfigMap, ConfigResult, Parser, Provider, SourceMetadata};
use std::sync::Arc;

/// One entry of the ordered source list
///
/// Byte providers need a parser; map providers are used without one. Later
/// sources override earlier ones when the results are merged.
#[derive(Clone)]
pub struct Source {
    provider: Arc<dyn Provider>,
    parser: Option<Arc<dyn Parser>>,
}

impl Source {
    /// Pair a provider with an optional parser
    pub fn new(provider: Arc<dyn Provider>, parser: Option<Arc<dyn Parser>>) -> Self {
        Self { provider, parser }
    }

    /// A byte provider decoded by `parser`
    ///
    /// The caller keeps its own `Arc` to the provider, e.g. to drive a
    /// [`MemoryProvider`](crate::providers::MemoryProvider).
    pub fn bytes<P, F>(provider: Arc<P>, parser: F) -> Self
    where
        P: Provider + 'static,
        F: Parser + 'static,
    {
        Self::new(provider, Some(Arc::new(parser) as Arc<dyn Parser>))
    }

    /// A provider producing a mapping directly
    pub fn map<P>(provider: Arc<P>) -> Self
    where
        P: Provider + 'static,
    {
        Self::new(provider, None)
    }

    /// Provider name
    pub fn name(&self) -> String {
        self.provider.name()
    }

    /// The underlying provider
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// The parser, if any
    pub fn parser(&self) -> Option<&Arc<dyn Parser>> {
        self.parser.as_ref()
    }

    /// Read and decode this source
    pub(crate) async fn fetch(&self, index: usize) -> ConfigResult<(ConfigMap, SourceMetadata)> {
        let provider = self.provider.name();

        let (map, format, size, substituted) = match &self.parser {
            Some(parser) => {
                let bytes = self.provider.read_bytes().await?;
                let map = parser.decode(&bytes)?;
                (
                    map,
                    Some(parser.name().to_string()),
                    Some(bytes.len()),
                    parser.substitutes(),
                )
            }
            None => (self.provider.read_map().await?, None, None, false),
        };

        strata_log::trace!(
            provider = %provider,
            index,
            keys = map.len(),
            "source fetched"
        );

        let metadata = SourceMetadata {
            index,
            provider,
            format,
            size,
            keys: map.len(),
            substituted,
        };
        Ok((map, metadata))
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("provider", &self.provider.name())
            .field("parser", &self.parser.as_ref().map(|p| p.name()))
            .finish()
    }
}
