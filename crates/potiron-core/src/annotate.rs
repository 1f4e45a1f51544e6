//! Human-readable labels for stored values.

use crate::error::Result;
use crate::key::{description_key, reverse_translation_key, translation_key};
use crate::store::ScoreStore;

/// Annotation appended to a member in exported rows.
pub trait FieldAnnotator {
    fn annotate(&self, member: &str) -> Result<String>;
}

/// Leaves members unannotated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotation;

impl FieldAnnotator for NoAnnotation {
    fn annotate(&self, _member: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Translation between stored values and the labels shown to people.
pub trait KeyTranslator {
    /// Label for the stored value `key` of `field`, or `key` itself.
    fn to_human(&self, field: &str, key: &str) -> Result<String>;

    /// Stored value for the label `label` of `field`, or `label` itself.
    fn to_store(&self, field: &str, label: &str) -> Result<String>;

    /// Description of `field`, empty when none is recorded.
    fn description(&self, field: &str) -> Result<String>;
}

/// Translator backed by the `TR:`, `RT:` and `DS:` keys of the store.
#[derive(Clone, Copy)]
pub struct StoreTranslator<'a> {
    store: &'a dyn ScoreStore,
}

impl<'a> StoreTranslator<'a> {
    pub fn new(store: &'a dyn ScoreStore) -> Self {
        Self { store }
    }
}

impl KeyTranslator for StoreTranslator<'_> {
    fn to_human(&self, field: &str, key: &str) -> Result<String> {
        Ok(self
            .store
            .hash_field(&translation_key(field), key)?
            .unwrap_or_else(|| key.to_string()))
    }

    fn to_store(&self, field: &str, label: &str) -> Result<String> {
        Ok(self
            .store
            .hash_field(&reverse_translation_key(field), label)?
            .unwrap_or_else(|| label.to_string()))
    }

    fn description(&self, field: &str) -> Result<String> {
        Ok(self
            .store
            .string(&description_key(field))?
            .unwrap_or_default())
    }
}

/// Annotates members of one field with their translated label, as
/// `" (label)"`, when a label different from the member exists.
pub struct TranslationAnnotator<'a> {
    translator: &'a dyn KeyTranslator,
    field: &'a str,
}

impl<'a> TranslationAnnotator<'a> {
    pub fn new(translator: &'a dyn KeyTranslator, field: &'a str) -> Self {
        Self { translator, field }
    }
}

impl FieldAnnotator for TranslationAnnotator<'_> {
    fn annotate(&self, member: &str) -> Result<String> {
        let label = self.translator.to_human(self.field, member)?;
        if label == member {
            Ok(String::new())
        } else {
            Ok(format!(" ({label})"))
        }
    }
}
