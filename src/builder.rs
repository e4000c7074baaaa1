use std::sync::Arc;

use crate::{
    locale::{LocaleComparator, LocaleMatcher},
    manager::ResourceManager,
    options::ManagerOptions,
    plural_rules::{CldrPluralRules, PluralRuleProvider},
    qualifier::QualifierDescriptor,
    reader::FsArchiveReader,
    traits::ArchiveReader,
};

/// Builder for a [`ResourceManager`] with a fluent interface.
///
/// Every capability has a default: archives are read from the filesystem,
/// locales are compared with [`LocaleMatcher`] and plural rules come from the
/// built-in CLDR table.
///
/// # Example
///
/// ```rust,no_run
/// use resindex::{ManagerOptions, QualifierDescriptor, ResourceManager};
/// use resindex::reader::ZipReader;
///
/// let manager = ResourceManager::builder()
///     .reader(ZipReader)
///     .options(ManagerOptions::new().with_max_reference_depth(8))
///     .configuration(QualifierDescriptor::new().with_locale_tag("fr")?)
///     .build();
/// manager.add_archive("entry.hap", &[])?;
/// # Ok::<(), resindex::Error>(())
/// ```
pub struct ManagerBuilder {
    reader: Arc<dyn ArchiveReader>,
    locales: Arc<dyn LocaleComparator>,
    plurals: Arc<dyn PluralRuleProvider>,
    options: ManagerOptions,
    runtime: QualifierDescriptor,
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerBuilder {
    pub fn new() -> Self {
        Self {
            reader: Arc::new(FsArchiveReader),
            locales: Arc::new(LocaleMatcher),
            plurals: Arc::new(CldrPluralRules),
            options: ManagerOptions::default(),
            runtime: QualifierDescriptor::default(),
        }
    }

    /// Sets how archive members are read.
    pub fn reader<R: ArchiveReader + 'static>(mut self, reader: R) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    /// Shares an existing reader.
    pub fn shared_reader(mut self, reader: Arc<dyn ArchiveReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn locale_comparator<L: LocaleComparator + 'static>(mut self, locales: L) -> Self {
        self.locales = Arc::new(locales);
        self
    }

    pub fn plural_rules<P: PluralRuleProvider + 'static>(mut self, plurals: P) -> Self {
        self.plurals = Arc::new(plurals);
        self
    }

    pub fn options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the initial runtime configuration.
    pub fn configuration(mut self, runtime: QualifierDescriptor) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn build(self) -> ResourceManager {
        ResourceManager::from_parts(
            self.reader,
            self.locales,
            self.plurals,
            self.options,
            self.runtime,
        )
    }
}
