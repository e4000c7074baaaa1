//! One decoded resource package.
//!
//! A [`ResourceArchive`] owns its qualifiers and records in flat arenas and
//! addresses them by index; variant sets and the name index hold handles only.

pub mod layout;

pub use layout::ManifestLayout;

use std::{
    collections::{HashMap, hash_map::Entry},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    error::{Error, Result},
    index::{self, DecodedIndex},
    locale::LocaleComparator,
    qualifier::QualifierDescriptor,
    traits::ArchiveReader,
    types::{ResType, ResourceRecord},
};

/// A qualifier directory of an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Qualifier {
    pub descriptor: QualifierDescriptor,
    pub folder: String,
}

/// Arena handles of one variant: its qualifier and its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantRef {
    pub qualifier: usize,
    pub record: usize,
}

/// All variants of one id inside one archive.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    pub id: u32,
    pub variants: Vec<VariantRef>,
}

/// A candidate for selection, borrowed from its owning archive.
#[derive(Debug, Clone, Copy)]
pub struct QualifiedVariant<'a> {
    pub descriptor: &'a QualifierDescriptor,
    pub folder: &'a str,
    pub record: &'a ResourceRecord,
    pub archive: &'a ResourceArchive,
    pub is_overlay: bool,
    pub is_system: bool,
}

#[derive(Debug, Clone)]
pub struct ResourceArchive {
    path: PathBuf,
    layout: ManifestLayout,
    version: String,
    qualifiers: Vec<Qualifier>,
    records: Vec<ResourceRecord>,
    by_id: HashMap<u32, VariantSet>,
    by_name: HashMap<(ResType, String), u32>,
    is_system: bool,
    is_overlay: bool,
}

impl ResourceArchive {
    /// Probes the layout, reads the index and decodes it.
    pub fn load(
        reader: &dyn ArchiveReader,
        path: &Path,
        pin: Option<&QualifierDescriptor>,
        locales: &dyn LocaleComparator,
    ) -> Result<Self> {
        let layout = ManifestLayout::probe(reader, path)?;
        let bytes = reader.read(path, &layout.index_member())?;
        let decoded = index::decode(&bytes, pin, locales)?;
        let archive = Self::from_index(path, layout, decoded)?;
        info!(
            "loaded {} ({} qualifiers, {} records)",
            path.display(),
            archive.qualifiers.len(),
            archive.records.len()
        );
        Ok(archive)
    }

    pub fn from_index(path: &Path, layout: ManifestLayout, index: DecodedIndex) -> Result<Self> {
        let mut archive = Self {
            path: path.to_path_buf(),
            layout,
            version: index.version,
            qualifiers: Vec::with_capacity(index.nodes.len()),
            records: Vec::new(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            is_system: false,
            is_overlay: false,
        };

        for node in index.nodes {
            let qualifier = archive.qualifiers.len();
            archive.qualifiers.push(Qualifier {
                descriptor: node.descriptor,
                folder: node.folder,
            });
            for record in node.records {
                archive.insert(qualifier, record)?;
            }
        }
        Ok(archive)
    }

    fn insert(&mut self, qualifier: usize, record: ResourceRecord) -> Result<()> {
        match self.by_name.entry((record.res_type, record.name.clone())) {
            Entry::Occupied(known) if *known.get() != record.id => {
                return Err(Error::decode(format!(
                    "{}:{} has ids {} and {}",
                    record.res_type,
                    record.name,
                    known.get(),
                    record.id
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(record.id);
            }
        }

        let handle = VariantRef {
            qualifier,
            record: self.records.len(),
        };
        self.by_id
            .entry(record.id)
            .or_insert_with(|| VariantSet {
                id: record.id,
                variants: Vec::new(),
            })
            .variants
            .push(handle);
        self.records.push(record);
        Ok(())
    }

    pub fn with_system(mut self, is_system: bool) -> Self {
        self.is_system = is_system;
        self
    }

    /// Marks this archive as an overlay of `target` and rewrites its ids to the
    /// target's ids wherever `(type, name)` matches.
    ///
    /// Records without a counterpart are left out of both lookup maps: their
    /// own ids belong to the overlay's id space, not the target's.
    pub fn into_overlay_of(mut self, target: &ResourceArchive) -> Self {
        let mut remap = HashMap::new();
        self.by_name.retain(|(res_type, name), id| match target.id_by_name(*res_type, name) {
            Some(target_id) => {
                remap.insert(*id, target_id);
                *id = target_id;
                true
            }
            None => {
                warn!(
                    "overlay {} defines {}:{} which {} does not have",
                    self.path.display(),
                    res_type,
                    name,
                    target.path.display()
                );
                false
            }
        });

        for record in &mut self.records {
            if let Some(&id) = remap.get(&record.id) {
                record.id = id;
            }
        }
        self.by_id = self
            .by_id
            .drain()
            .filter_map(|(id, mut set)| {
                let target_id = *remap.get(&id)?;
                set.id = target_id;
                Some((target_id, set))
            })
            .collect();
        self.is_overlay = true;
        debug!(
            "overlay {} remapped {} ids onto {}",
            self.path.display(),
            remap.len(),
            target.path.display()
        );
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &ManifestLayout {
        &self.layout
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    pub fn is_overlay(&self) -> bool {
        self.is_overlay
    }

    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn variant_set(&self, id: u32) -> Option<&VariantSet> {
        self.by_id.get(&id)
    }

    pub fn id_by_name(&self, res_type: ResType, name: &str) -> Option<u32> {
        self.by_name.get(&(res_type, name.to_string())).copied()
    }

    /// Every variant of `id` in this archive, in directory order.
    pub fn variants(&self, id: u32) -> impl Iterator<Item = QualifiedVariant<'_>> {
        self.by_id
            .get(&id)
            .into_iter()
            .flat_map(|set| set.variants.iter())
            .map(move |handle| {
                let qualifier = &self.qualifiers[handle.qualifier];
                QualifiedVariant {
                    descriptor: &qualifier.descriptor,
                    folder: &qualifier.folder,
                    record: &self.records[handle.record],
                    archive: self,
                    is_overlay: self.is_overlay,
                    is_system: self.is_system,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, decode};
    use crate::locale::LocaleMatcher;

    fn archive(path: &str, folders: &[(&str, Vec<ResourceRecord>)]) -> ResourceArchive {
        let mut builder = IndexBuilder::new("test");
        for (folder, records) in folders {
            builder.add_folder(folder, records.clone()).unwrap();
        }
        let index = decode(&builder.build().unwrap(), None, &LocaleMatcher).unwrap();
        ResourceArchive::from_index(
            Path::new(path),
            ManifestLayout::V2 { module: "entry".into() },
            index,
        )
        .unwrap()
    }

    #[test]
    fn test_variant_sets_span_directories() {
        let a = archive(
            "base",
            &[
                ("default", vec![ResourceRecord::scalar(1, "app_name", ResType::String, "App")]),
                ("es", vec![ResourceRecord::scalar(1, "app_name", ResType::String, "Aplicación")]),
            ],
        );
        let folders: Vec<_> = a.variants(1).map(|v| v.folder).collect();
        assert_eq!(folders, vec!["default", "es"]);
        assert_eq!(a.id_by_name(ResType::String, "app_name"), Some(1));
        assert_eq!(a.id_by_name(ResType::Integer, "app_name"), None);
        assert_eq!(a.variants(2).count(), 0);
    }

    #[test]
    fn test_conflicting_ids_for_one_name() {
        let mut builder = IndexBuilder::new("test");
        builder
            .add_folder("default", vec![ResourceRecord::scalar(1, "x", ResType::String, "a")])
            .unwrap()
            .add_folder("es", vec![ResourceRecord::scalar(2, "x", ResType::String, "b")])
            .unwrap();
        let index = decode(&builder.build().unwrap(), None, &LocaleMatcher).unwrap();
        let result = ResourceArchive::from_index(
            Path::new("p"),
            ManifestLayout::V2 { module: "entry".into() },
            index,
        );
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_overlay_takes_target_ids() {
        let target = archive(
            "base",
            &[("default", vec![ResourceRecord::scalar(10, "title", ResType::String, "Base")])],
        );
        let overlay = archive(
            "overlay",
            &[(
                "default",
                vec![
                    ResourceRecord::scalar(3, "title", ResType::String, "Vendor"),
                    ResourceRecord::scalar(4, "extra", ResType::String, "Only here"),
                ],
            )],
        )
        .into_overlay_of(&target);

        assert!(overlay.is_overlay());
        let variant = overlay.variants(10).next().unwrap();
        assert_eq!(variant.record.text(), "Vendor");
        assert_eq!(variant.record.id, 10);
        assert!(variant.is_overlay);
        assert_eq!(overlay.variants(3).count(), 0);
        assert_eq!(overlay.id_by_name(ResType::String, "title"), Some(10));
        assert_eq!(overlay.variants(4).count(), 0);
        assert_eq!(overlay.id_by_name(ResType::String, "extra"), None);
    }

    #[test]
    fn test_unmatched_overlay_id_does_not_join_target_resource() {
        let target = archive(
            "base",
            &[("default", vec![ResourceRecord::scalar(5, "foo", ResType::String, "Foo")])],
        );
        let overlay = archive(
            "overlay",
            &[("en", vec![ResourceRecord::scalar(5, "bar", ResType::String, "Bar")])],
        )
        .into_overlay_of(&target);

        assert_eq!(overlay.variants(5).count(), 0);
        assert!(overlay.variant_set(5).is_none());
        assert_eq!(overlay.id_by_name(ResType::String, "bar"), None);
    }
}
