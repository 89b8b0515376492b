//! Converter lookup by acquisition mode.
//!
//! A generic driver picks a converter by the scan's acquisition mode name. The
//! registry starts with the EPI converter registered under `"EPI"`; callers may add
//! their own factories. Mode names are matched case-insensitively.

use crate::config::ConverterConfig;
use crate::converter::{EpiConverter, SequenceConverter};
use crate::error::{ConvertError, ConvertResult};
use std::collections::HashMap;

type ConverterFactory =
    Box<dyn Fn(&ConverterConfig) -> Result<Box<dyn SequenceConverter>, anyhow::Error> + Send + Sync>;

/// Factories for [`SequenceConverter`]s keyed by acquisition mode.
pub struct ConverterRegistry {
    factories: HashMap<String, ConverterFactory>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Creates a registry with the EPI converter registered.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register(EpiConverter::MODE, |config| {
            config.validate()?;
            Ok(Box::new(EpiConverter::new(config.clone())))
        });

        registry
    }

    /// Registers (or replaces) the factory for `mode`.
    pub fn register<F>(&mut self, mode: &str, factory: F)
    where
        F: Fn(&ConverterConfig) -> Result<Box<dyn SequenceConverter>, anyhow::Error>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(mode.to_ascii_uppercase(), Box::new(factory));
    }

    /// Creates the converter registered for `mode`.
    pub fn create(
        &self,
        mode: &str,
        config: &ConverterConfig,
    ) -> ConvertResult<Box<dyn SequenceConverter>> {
        let factory = self
            .factories
            .get(&mode.to_ascii_uppercase())
            .ok_or_else(|| ConvertError::UnknownConverter(mode.to_string()))?;
        factory(config).map_err(|e| ConvertError::Configuration(format!("{e:#}")))
    }

    /// Whether a factory is registered for `mode`.
    pub fn contains(&self, mode: &str) -> bool {
        self.factories.contains_key(&mode.to_ascii_uppercase())
    }

    /// Registered mode names, sorted.
    pub fn modes(&self) -> Vec<&str> {
        let mut modes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        modes.sort_unstable();
        modes
    }
}
