use {serde::Deserialize, thiserror::Error};

/// Configuration for a heap.
///
/// Every field has a default, so configurations
/// can be deserialized from partial documents.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HeapConfig
{
    /// Number of bytes of fresh blocks after which
    /// a mutator automatically collects garbage.
    pub collection_threshold: usize,

    /// Whether mutators collect garbage automatically.
    ///
    /// When disabled, garbage is only collected
    /// on calls to [`Mutator::collect_garbage`].
    ///
    /// [`Mutator::collect_garbage`]: `super::Mutator::collect_garbage`
    pub automatic_collection: bool,
}

/// Returned when a heap configuration is invalid.
#[derive(Debug, Eq, Error, PartialEq)]
pub enum HeapConfigError
{
    /// Automatic collection after zero bytes would collect on every block.
    #[error("Collection threshold must be non-zero")]
    ZeroCollectionThreshold,
}

impl HeapConfig
{
    /// Check that the configuration makes sense.
    pub fn validate(&self) -> Result<(), HeapConfigError>
    {
        if self.automatic_collection && self.collection_threshold == 0 {
            return Err(HeapConfigError::ZeroCollectionThreshold);
        }
        Ok(())
    }
}

impl Default for HeapConfig
{
    fn default() -> Self
    {
        Self{
            collection_threshold: 8 * 1024 * 1024,
            automatic_collection: true,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn default_is_valid()
    {
        assert_eq!(HeapConfig::default().validate(), Ok(()));
    }

    #[test]
    fn deserialize_partial()
    {
        let json = r#"{"collection_threshold": 4096}"#;
        let config: HeapConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.collection_threshold, 4096);
        assert!(config.automatic_collection);
    }

    #[test]
    fn deserialize_rejects_unknown_fields()
    {
        let json = r#"{"colection_threshold": 4096}"#;
        assert!(serde_json::from_str::<HeapConfig>(json).is_err());
    }

    #[test]
    fn zero_threshold_is_fine_without_automatic_collection()
    {
        let config = HeapConfig{
            collection_threshold: 0,
            automatic_collection: false,
        };
        assert_eq!(config.validate(), Ok(()));
    }
}
