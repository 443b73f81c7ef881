//! Backend registry keyed by language tag

use crate::config::SdkLang;
use crate::error::GenerationError;
use crate::generator::Generator;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps a language tag to the backend that generates it.
///
/// Selection happens once per invocation; the controller only ever sees the
/// selected `Arc<dyn Generator>`.
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    generators: BTreeMap<SdkLang, Arc<dyn Generator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one for the same tag.
    pub fn register(&mut self, lang: impl Into<SdkLang>, generator: Arc<dyn Generator>) -> &mut Self {
        self.generators.insert(lang.into(), generator);
        self
    }

    pub fn select(&self, lang: &SdkLang) -> Result<Arc<dyn Generator>, GenerationError> {
        self.generators
            .get(lang)
            .cloned()
            .ok_or_else(|| GenerationError::UnknownLanguage(lang.to_string()))
    }

    pub fn contains(&self, lang: &SdkLang) -> bool {
        self.generators.contains_key(lang)
    }

    /// Registered tags, sorted.
    pub fn languages(&self) -> Vec<&SdkLang> {
        self.generators.keys().collect()
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}
