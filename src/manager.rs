//! The resource manager: loaded archives, runtime configuration and lookups.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{info, warn};
use parking_lot::Mutex;

use crate::{
    archive::{QualifiedVariant, ResourceArchive},
    builder::ManagerBuilder,
    error::{Error, Result},
    locale::LocaleComparator,
    options::ManagerOptions,
    plural_rules::{PluralCache, PluralCategory, PluralRuleProvider},
    qualifier::{QualifierDescriptor, ScreenDensity},
    resolve::{self, Resolver},
    traits::{ArchiveReader, RawFileDescriptor},
    types::ResType,
};

/// Picks the variant to serve among `candidates`, which must be ordered newest
/// archive first.
///
/// Normal and overlay variants compete separately, and a later candidate only
/// replaces the current leader when it is strictly more suitable. An overlay
/// winner displaces the normal winner only when that winner comes from a
/// system archive and the overlay is more suitable. Overlay variants alone
/// never produce a match.
pub fn best_match<'a>(
    candidates: impl IntoIterator<Item = QualifiedVariant<'a>>,
    runtime: &QualifierDescriptor,
    hint: Option<u32>,
    locales: &dyn LocaleComparator,
) -> Option<QualifiedVariant<'a>> {
    let mut best_normal: Option<QualifiedVariant<'a>> = None;
    let mut best_overlay: Option<QualifiedVariant<'a>> = None;

    for candidate in candidates {
        if !candidate.descriptor.matches(runtime, locales) {
            continue;
        }
        let best = if candidate.is_overlay {
            &mut best_overlay
        } else {
            &mut best_normal
        };
        let better = best.as_ref().is_none_or(|current| {
            candidate
                .descriptor
                .is_more_suitable(current.descriptor, runtime, hint, locales)
        });
        if better {
            *best = Some(candidate);
        }
    }

    match (best_normal, best_overlay) {
        (Some(normal), Some(overlay))
            if normal.is_system
                && overlay
                    .descriptor
                    .is_more_suitable(normal.descriptor, runtime, hint, locales) =>
        {
            Some(overlay)
        }
        (normal, _) => normal,
    }
}

/// Where the manager is in a configuration update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Reloading,
    /// The last reload failed and the previous archives stayed live.
    Failed,
}

/// A registered archive path, replayed on every reload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    path: PathBuf,
    overlays: Vec<PathBuf>,
    is_system: bool,
}

struct ManagerState {
    archives: Vec<ResourceArchive>,
    registry: Vec<Registration>,
    runtime: QualifierDescriptor,
    plural_cache: PluralCache,
    reload: ReloadState,
}

/// Identifies a resource either by id or by name.
#[derive(Clone, Copy)]
enum Key<'k> {
    Id(u32),
    Name(&'k str),
}

/// Loads resource archives and serves the variant that best fits the runtime
/// configuration.
///
/// All state sits behind one lock; every method is a synchronous critical
/// section, so a manager can be shared across threads.
///
/// # Example
///
/// ```rust,no_run
/// use resindex::{QualifierDescriptor, ResourceManager};
///
/// let runtime = QualifierDescriptor::new().with_locale_tag("es-ES")?;
/// let manager = ResourceManager::new(runtime);
/// manager.add_archive("entry.hap", &[])?;
/// let name = manager.get_string_by_name("app_name")?;
/// # Ok::<(), resindex::Error>(())
/// ```
pub struct ResourceManager {
    reader: Arc<dyn ArchiveReader>,
    locales: Arc<dyn LocaleComparator>,
    plurals: Arc<dyn PluralRuleProvider>,
    options: ManagerOptions,
    state: Mutex<ManagerState>,
}

impl ResourceManager {
    /// A manager reading archives from the filesystem with default options.
    pub fn new(runtime: QualifierDescriptor) -> Self {
        Self::builder().configuration(runtime).build()
    }

    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        reader: Arc<dyn ArchiveReader>,
        locales: Arc<dyn LocaleComparator>,
        plurals: Arc<dyn PluralRuleProvider>,
        options: ManagerOptions,
        runtime: QualifierDescriptor,
    ) -> Self {
        Self {
            reader,
            locales,
            plurals,
            options,
            state: Mutex::new(ManagerState {
                archives: Vec::new(),
                registry: Vec::new(),
                runtime,
                plural_cache: PluralCache::new(),
                reload: ReloadState::Idle,
            }),
        }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// The live runtime configuration.
    pub fn configuration(&self) -> QualifierDescriptor {
        self.state.lock().runtime.clone()
    }

    pub fn reload_state(&self) -> ReloadState {
        self.state.lock().reload
    }

    /// Paths of the loaded archives in load order, overlays included.
    pub fn archive_paths(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .archives
            .iter()
            .map(|a| a.path().to_path_buf())
            .collect()
    }

    fn pin<'r>(&self, runtime: &'r QualifierDescriptor) -> Option<&'r QualifierDescriptor> {
        self.options.locale_prefilter.then_some(runtime)
    }

    /// Decodes one registration: its target followed by its overlays.
    fn load_group(
        &self,
        registration: &Registration,
        runtime: &QualifierDescriptor,
    ) -> std::result::Result<Vec<ResourceArchive>, (PathBuf, Error)> {
        // Overlay remapping needs the target's full name index, so a group
        // with overlays is decoded without the locale pre-filter.
        let pin = if registration.overlays.is_empty() {
            self.pin(runtime)
        } else {
            None
        };
        let load = |path: &Path| {
            ResourceArchive::load(self.reader.as_ref(), path, pin, self.locales.as_ref())
                .map_err(|err| (path.to_path_buf(), err))
        };

        let target = load(registration.path.as_path())?.with_system(registration.is_system);
        let mut group = Vec::with_capacity(registration.overlays.len() + 1);
        for overlay in &registration.overlays {
            group.push(load(overlay.as_path())?.into_overlay_of(&target));
        }
        group.insert(0, target);
        Ok(group)
    }

    fn register(&self, registration: Registration) -> Result<bool> {
        let mut state = self.state.lock();
        if state.registry.iter().any(|r| r.path == registration.path) {
            info!("{} is already loaded", registration.path.display());
            return Ok(false);
        }

        let group = self
            .load_group(&registration, &state.runtime)
            .map_err(|(path, err)| {
                if err.is_rollback() {
                    warn!("{} is corrupt, nothing was loaded: {}", path.display(), err);
                } else {
                    warn!("failed to load {}: {}", path.display(), err);
                }
                err
            })?;
        state.archives.extend(group);
        state.registry.push(registration);
        Ok(true)
    }

    /// Loads an archive and its overlays. Returns `false` when the archive was
    /// already registered.
    pub fn add_archive<P: AsRef<Path>>(&self, path: P, overlays: &[PathBuf]) -> Result<bool> {
        self.register(Registration {
            path: path.as_ref().to_path_buf(),
            overlays: overlays.to_vec(),
            is_system: false,
        })
    }

    /// Loads a system archive. Overlays only displace values of system archives.
    pub fn add_system_archive<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        self.add_system_archive_with_overlays(path, &[])
    }

    pub fn add_system_archive_with_overlays<P: AsRef<Path>>(
        &self,
        path: P,
        overlays: &[PathBuf],
    ) -> Result<bool> {
        self.register(Registration {
            path: path.as_ref().to_path_buf(),
            overlays: overlays.to_vec(),
            is_system: true,
        })
    }

    /// Unloads an archive and the overlays registered with it.
    pub fn remove_archive<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        let mut state = self.state.lock();
        let Some(position) = state.registry.iter().position(|r| r.path == path) else {
            return false;
        };
        let registration = state.registry.remove(position);
        state.archives.retain(|a| {
            a.path() != registration.path && !registration.overlays.iter().any(|o| o == a.path())
        });
        info!("removed {}", path.display());
        true
    }

    /// Switches the runtime configuration and reloads every registered archive.
    ///
    /// The reload is atomic: if any archive fails to decode, the previous
    /// archives and configuration stay live and [`Error::ReloadFailed`] names
    /// the failing paths.
    pub fn update_configuration(&self, runtime: QualifierDescriptor) -> Result<()> {
        let mut state = self.state.lock();
        state.reload = ReloadState::Reloading;

        let mut archives = Vec::new();
        let mut failed = Vec::new();
        for registration in &state.registry {
            match self.load_group(registration, &runtime) {
                Ok(group) => archives.extend(group),
                Err((path, err)) => {
                    warn!("reload of {} failed: {}", path.display(), err);
                    failed.push(path);
                }
            }
        }

        if !failed.is_empty() {
            state.reload = ReloadState::Failed;
            return Err(Error::ReloadFailed { paths: failed });
        }

        info!(
            "configuration {} applied, {} archives loaded",
            runtime,
            archives.len()
        );
        state.archives = archives;
        state.runtime = runtime;
        state.reload = ReloadState::Idle;
        Ok(())
    }

    /// Runs `f` on the best variant of `key`, which must have type `expected`.
    fn with_variant<T>(
        &self,
        key: Key<'_>,
        expected: ResType,
        hint: Option<u32>,
        f: impl FnOnce(&Resolver<'_>, QualifiedVariant<'_>) -> Result<T>,
    ) -> Result<T> {
        let state = self.state.lock();
        let resolver = Resolver::new(
            &state.archives,
            &state.runtime,
            self.locales.as_ref(),
            self.options.max_reference_depth,
        );
        let variant = match key {
            Key::Id(id) => resolver.find_by_id(id, hint)?,
            Key::Name(name) => resolver.find_by_name(expected, name, hint)?,
        };
        if variant.record.res_type != expected {
            return Err(Error::TypeMismatch {
                expected,
                found: variant.record.res_type,
            });
        }
        f(&resolver, variant)
    }

    fn scalar(&self, key: Key<'_>, expected: ResType) -> Result<String> {
        self.with_variant(key, expected, None, |resolver, variant| {
            resolver.resolve_reference(variant.record.text())
        })
    }

    fn array(&self, key: Key<'_>, expected: ResType) -> Result<Vec<String>> {
        self.with_variant(key, expected, None, |resolver, variant| {
            resolver.resolve_values(variant.record)
        })
    }

    fn composite(&self, key: Key<'_>, expected: ResType) -> Result<BTreeMap<String, String>> {
        self.with_variant(key, expected, None, |resolver, variant| {
            resolver.resolve_parent_chain(variant.record)
        })
    }

    pub fn get_resource_id(&self, res_type: ResType, name: &str) -> Result<u32> {
        self.with_variant(Key::Name(name), res_type, None, |_, variant| {
            Ok(variant.record.id)
        })
    }

    pub fn get_string(&self, id: u32) -> Result<String> {
        self.scalar(Key::Id(id), ResType::String)
    }

    pub fn get_string_by_name(&self, name: &str) -> Result<String> {
        self.scalar(Key::Name(name), ResType::String)
    }

    pub fn get_string_array(&self, id: u32) -> Result<Vec<String>> {
        self.array(Key::Id(id), ResType::StringArray)
    }

    pub fn get_string_array_by_name(&self, name: &str) -> Result<Vec<String>> {
        self.array(Key::Name(name), ResType::StringArray)
    }

    pub fn get_boolean(&self, id: u32) -> Result<bool> {
        resolve::parse_boolean(&self.scalar(Key::Id(id), ResType::Boolean)?)
    }

    pub fn get_boolean_by_name(&self, name: &str) -> Result<bool> {
        resolve::parse_boolean(&self.scalar(Key::Name(name), ResType::Boolean)?)
    }

    pub fn get_integer(&self, id: u32) -> Result<i32> {
        resolve::parse_integer(&self.scalar(Key::Id(id), ResType::Integer)?)
    }

    pub fn get_integer_by_name(&self, name: &str) -> Result<i32> {
        resolve::parse_integer(&self.scalar(Key::Name(name), ResType::Integer)?)
    }

    fn float(&self, key: Key<'_>) -> Result<f32> {
        self.with_variant(key, ResType::Float, None, |resolver, variant| {
            let text = resolver.resolve_reference(variant.record.text())?;
            let (value, unit) = resolve::parse_float(&text)?;
            Ok(resolve::recalculate(value, &unit, resolver.runtime().density))
        })
    }

    /// A float with `vp`/`fp` values scaled to the runtime density.
    pub fn get_float(&self, id: u32) -> Result<f32> {
        self.float(Key::Id(id))
    }

    pub fn get_float_by_name(&self, name: &str) -> Result<f32> {
        self.float(Key::Name(name))
    }

    /// A float as written, with its unit.
    pub fn get_float_with_unit(&self, id: u32) -> Result<(f32, String)> {
        resolve::parse_float(&self.scalar(Key::Id(id), ResType::Float)?)
    }

    pub fn get_color(&self, id: u32) -> Result<u32> {
        resolve::parse_color(&self.scalar(Key::Id(id), ResType::Color)?)
    }

    pub fn get_color_by_name(&self, name: &str) -> Result<u32> {
        resolve::parse_color(&self.scalar(Key::Name(name), ResType::Color)?)
    }

    pub fn get_int_array(&self, id: u32) -> Result<Vec<i32>> {
        self.array(Key::Id(id), ResType::IntArray)?
            .iter()
            .map(|v| resolve::parse_integer(v))
            .collect()
    }

    pub fn get_int_array_by_name(&self, name: &str) -> Result<Vec<i32>> {
        self.array(Key::Name(name), ResType::IntArray)?
            .iter()
            .map(|v| resolve::parse_integer(v))
            .collect()
    }

    pub fn get_pattern(&self, id: u32) -> Result<BTreeMap<String, String>> {
        self.composite(Key::Id(id), ResType::Pattern)
    }

    pub fn get_pattern_by_name(&self, name: &str) -> Result<BTreeMap<String, String>> {
        self.composite(Key::Name(name), ResType::Pattern)
    }

    pub fn get_theme(&self, id: u32) -> Result<BTreeMap<String, String>> {
        self.composite(Key::Id(id), ResType::Theme)
    }

    pub fn get_theme_by_name(&self, name: &str) -> Result<BTreeMap<String, String>> {
        self.composite(Key::Name(name), ResType::Theme)
    }

    /// The plural category of `quantity` in `language`, through the rules cache.
    pub fn select_plural_category(&self, language: &str, quantity: i64) -> Result<PluralCategory> {
        self.state
            .lock()
            .plural_cache
            .select(language, quantity, self.plurals.as_ref())
    }

    /// Languages whose plural rules are cached, oldest first.
    pub fn cached_plural_languages(&self) -> Vec<String> {
        self.state
            .lock()
            .plural_cache
            .languages()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn plural(&self, key: Key<'_>, quantity: i64) -> Result<String> {
        let mut state = self.state.lock();
        let ManagerState {
            archives,
            runtime,
            plural_cache,
            ..
        } = &mut *state;
        let resolver = Resolver::new(
            archives.as_slice(),
            runtime,
            self.locales.as_ref(),
            self.options.max_reference_depth,
        );
        let variant = match key {
            Key::Id(id) => resolver.find_by_id(id, None)?,
            Key::Name(name) => resolver.find_by_name(ResType::Plurals, name, None)?,
        };
        let record = variant.record;
        if record.res_type != ResType::Plurals {
            return Err(Error::TypeMismatch {
                expected: ResType::Plurals,
                found: record.res_type,
            });
        }

        let language = runtime
            .locale
            .as_ref()
            .map(|l| l.language.as_str())
            .unwrap_or_default();
        let category = plural_cache.select(language, quantity, self.plurals.as_ref())?;
        let forms = record.plural_forms();
        let text = forms
            .get(category.as_str())
            .or_else(|| forms.get(PluralCategory::Other.as_str()))
            .ok_or_else(|| {
                Error::NotFound(format!("{} form of plural:{}", category, record.name))
            })?;
        resolver.resolve_reference(text)
    }

    pub fn get_plural_string(&self, id: u32, quantity: i64) -> Result<String> {
        self.plural(Key::Id(id), quantity)
    }

    pub fn get_plural_string_by_name(&self, name: &str, quantity: i64) -> Result<String> {
        self.plural(Key::Name(name), quantity)
    }

    /// Archive path and member name of the best media variant.
    fn media_member(&self, key: Key<'_>, density: Option<u32>) -> Result<(PathBuf, String)> {
        let hint = ScreenDensity::validate_hint(density)?;
        self.with_variant(key, ResType::Media, hint, |resolver, variant| {
            let value = resolver.resolve_reference(variant.record.text())?;
            Ok((
                variant.archive.path().to_path_buf(),
                variant.archive.layout().payload_member(&value),
            ))
        })
    }

    /// Member path of a media resource inside its archive.
    ///
    /// `density` is a dpi bucket to prefer over the runtime density; `None` or
    /// `Some(0)` means no preference.
    pub fn get_media_path(&self, id: u32, density: Option<u32>) -> Result<String> {
        Ok(self.media_member(Key::Id(id), density)?.1)
    }

    pub fn get_media_path_by_name(&self, name: &str, density: Option<u32>) -> Result<String> {
        Ok(self.media_member(Key::Name(name), density)?.1)
    }

    pub fn get_media_content(&self, id: u32, density: Option<u32>) -> Result<Vec<u8>> {
        let (archive, member) = self.media_member(Key::Id(id), density)?;
        self.reader.read(&archive, &member)
    }

    pub fn get_profile_content(&self, id: u32) -> Result<Vec<u8>> {
        let (archive, member) =
            self.with_variant(Key::Id(id), ResType::Profile, None, |resolver, variant| {
                let value = resolver.resolve_reference(variant.record.text())?;
                Ok((
                    variant.archive.path().to_path_buf(),
                    variant.archive.layout().payload_member(&value),
                ))
            })?;
        self.reader.read(&archive, &member)
    }

    /// Archive and member of a raw file, searching the newest archive first.
    fn raw_file_member(&self, name: &str) -> Result<(PathBuf, String)> {
        let state = self.state.lock();
        state
            .archives
            .iter()
            .rev()
            .map(|a| (a.path().to_path_buf(), a.layout().rawfile_member(name)))
            .find(|(archive, member)| self.reader.contains(archive, member))
            .ok_or_else(|| Error::NotFound(format!("rawfile `{}`", name)))
    }

    pub fn get_raw_file_content(&self, name: &str) -> Result<Vec<u8>> {
        let (archive, member) = self.raw_file_member(name)?;
        self.reader.read(&archive, &member)
    }

    /// Opens a raw file for in-place reading; the member must be stored uncompressed.
    pub fn open_raw_file(&self, name: &str) -> Result<RawFileDescriptor> {
        let (archive, member) = self.raw_file_member(name)?;
        self.reader.open_raw(&archive, &member)
    }
}
