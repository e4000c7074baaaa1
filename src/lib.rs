//! Resource archive decoder and qualifier-resolution engine.
//!
//! Decodes the binary resource index of packaged application archives and
//! serves, for a runtime configuration (locale, screen density, device class,
//! color mode, direction, input device, mobile network), the variant of each
//! resource that fits best. Overlay archives can patch values of a system
//! archive, references (`$string:42`) and theme parent chains are followed,
//! and plural strings are selected with CLDR cardinal rules.
//!
//! Everything goes through a [`ResourceManager`]; see its documentation for
//! an example.

#![forbid(unsafe_code)]

pub mod archive;
pub mod builder;
pub mod error;
pub mod index;
pub mod locale;
pub mod manager;
pub mod options;
pub mod plural_rules;
pub mod qualifier;
pub mod reader;
pub mod resolve;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    archive::{ManifestLayout, ResourceArchive},
    builder::ManagerBuilder,
    error::{Error, Result},
    locale::{LocaleComparator, LocaleMatcher, ResLocale},
    manager::{ReloadState, ResourceManager},
    options::ManagerOptions,
    plural_rules::{PluralCategory, PluralRuleProvider},
    qualifier::{ColorMode, DeviceClass, Direction, InputDevice, QualifierDescriptor, ScreenDensity},
    reader::FsArchiveReader,
    traits::{ArchiveReader, RawFileDescriptor},
    types::{ResType, ResourceRecord},
};
