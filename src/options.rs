//! Tuning knobs for [`crate::ResourceManager`].

use serde::Deserialize;

/// Default bound on reference hops and parent-chain hops.
pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 20;

/// Manager behavior options.
///
/// ```rust
/// use resindex::ManagerOptions;
///
/// let options: ManagerOptions = serde_json::from_str(r#"{"max_reference_depth": 8}"#)?;
/// assert!(options.locale_prefilter);
/// assert_eq!(options, ManagerOptions::new().with_max_reference_depth(8));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    /// Skip decoding records of directories whose locale cannot match the
    /// runtime locale.
    pub locale_prefilter: bool,
    pub max_reference_depth: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            locale_prefilter: true,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }
}

impl ManagerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale_prefilter(mut self, locale_prefilter: bool) -> Self {
        self.locale_prefilter = locale_prefilter;
        self
    }

    pub fn with_max_reference_depth(mut self, max_reference_depth: usize) -> Self {
        self.max_reference_depth = max_reference_depth;
        self
    }
}
