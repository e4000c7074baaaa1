//! Reference chains, parent-chain merging and typed value extraction.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use crate::{
    archive::{QualifiedVariant, ResourceArchive},
    error::{Error, Result},
    locale::LocaleComparator,
    manager::best_match,
    qualifier::QualifierDescriptor,
    types::{ResType, ResourceRecord},
};

lazy_static! {
    static ref REFERENCE: Regex = Regex::new(
        r"^\$(?:ohos:)?(boolean|color|float|integer|intarray|media|pattern|plural|profile|string|strarray|symbol|theme):(\d+)$"
    )
    .unwrap();
}

/// Parses a `$type:id` back-reference.
///
/// Text that does not follow the grammar, or whose id does not fit a `u32`,
/// is a literal value.
pub fn parse_reference(text: &str) -> Option<(ResType, u32)> {
    let caps = REFERENCE.captures(text)?;
    let res_type = caps[1].parse().ok()?;
    let id = caps[2].parse().ok()?;
    Some((res_type, id))
}

pub fn parse_boolean(text: &str) -> Result<bool> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid_value(ResType::Boolean, text)),
    }
}

pub fn parse_integer(text: &str) -> Result<i32> {
    text.trim()
        .parse()
        .map_err(|_| Error::invalid_value(ResType::Integer, text))
}

/// Splits a float resource into its number and unit (`""`, `px`, `vp` or `fp`).
pub fn parse_float(text: &str) -> Result<(f32, String)> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    if !matches!(unit, "" | "px" | "vp" | "fp") {
        return Err(Error::invalid_value(ResType::Float, text));
    }
    let value: f32 = number
        .parse()
        .map_err(|_| Error::invalid_value(ResType::Float, text))?;
    Ok((value, unit.to_string()))
}

/// Scales density-independent units (`vp`, `fp`) by the display density ratio.
pub fn recalculate(value: f32, unit: &str, density: f32) -> f32 {
    match unit {
        "vp" | "fp" if density > 0.0 => value * density,
        _ => value,
    }
}

/// Parses `#RGB`, `#ARGB`, `#RRGGBB` or `#AARRGGBB` into `0xAARRGGBB`.
pub fn parse_color(text: &str) -> Result<u32> {
    let invalid = || Error::invalid_value(ResType::Color, text);
    let hex = text.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let expanded = match hex.len() {
        3 | 4 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 | 8 => hex.to_string(),
        _ => return Err(invalid()),
    };
    let value = u32::from_str_radix(&expanded, 16).map_err(|_| invalid())?;
    Ok(if expanded.len() == 6 {
        0xFF00_0000 | value
    } else {
        value
    })
}

/// Resolves values against a fixed archive list and runtime descriptor.
pub struct Resolver<'a> {
    archives: &'a [ResourceArchive],
    runtime: &'a QualifierDescriptor,
    locales: &'a dyn LocaleComparator,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    /// `archives` are in load order; later archives take precedence.
    pub fn new(
        archives: &'a [ResourceArchive],
        runtime: &'a QualifierDescriptor,
        locales: &'a dyn LocaleComparator,
        max_depth: usize,
    ) -> Self {
        Self {
            archives,
            runtime,
            locales,
            max_depth,
        }
    }

    pub fn runtime(&self) -> &'a QualifierDescriptor {
        self.runtime
    }

    pub fn find_by_id(&self, id: u32, hint: Option<u32>) -> Result<QualifiedVariant<'a>> {
        let candidates = self.archives.iter().rev().flat_map(|a| a.variants(id));
        best_match(candidates, self.runtime, hint, self.locales)
            .ok_or_else(|| Error::id_not_found(id))
    }

    pub fn find_by_name(
        &self,
        res_type: ResType,
        name: &str,
        hint: Option<u32>,
    ) -> Result<QualifiedVariant<'a>> {
        let candidates = self
            .archives
            .iter()
            .rev()
            .filter_map(|a| a.id_by_name(res_type, name).map(|id| a.variants(id)))
            .flatten();
        best_match(candidates, self.runtime, hint, self.locales)
            .ok_or_else(|| Error::name_not_found(res_type, name))
    }

    /// Follows `$type:id` hops until a literal value is reached.
    pub fn resolve_reference(&self, raw: &str) -> Result<String> {
        let mut value = raw.to_string();
        let mut hops = 0;
        while let Some((declared, id)) = parse_reference(&value) {
            hops += 1;
            if hops > self.max_depth {
                return Err(Error::ReferenceCycle {
                    depth: self.max_depth,
                });
            }
            let record = self.find_by_id(id, None)?.record;
            if record.res_type != declared {
                return Err(Error::TypeMismatch {
                    expected: declared,
                    found: record.res_type,
                });
            }
            trace!("{} -> {}", value, record.name);
            value = record.text().to_string();
        }
        Ok(value)
    }

    /// Every slot of an array record, each reference-resolved.
    pub fn resolve_values(&self, record: &ResourceRecord) -> Result<Vec<String>> {
        record
            .values()
            .iter()
            .map(|value| self.resolve_reference(value))
            .collect()
    }

    /// Merges a THEME or PATTERN record with its ancestors; keys closer to
    /// `record` win.
    pub fn resolve_parent_chain(&self, record: &ResourceRecord) -> Result<BTreeMap<String, String>> {
        if !record.res_type.is_composite() {
            return Err(Error::TypeMismatch {
                expected: ResType::Theme,
                found: record.res_type,
            });
        }

        let mut merged = BTreeMap::new();
        let mut current = record;
        let mut hops = 0;
        loop {
            for (key, value) in current.pairs() {
                if !merged.contains_key(key) {
                    merged.insert(key.to_string(), self.resolve_reference(value)?);
                }
            }

            let Some(parent) = current.parent_reference() else {
                break;
            };
            hops += 1;
            if hops > self.max_depth {
                return Err(Error::ReferenceCycle {
                    depth: self.max_depth,
                });
            }
            let (declared, id) =
                parse_reference(parent).ok_or_else(|| Error::invalid_value(record.res_type, parent))?;
            if declared != record.res_type {
                return Err(Error::TypeMismatch {
                    expected: record.res_type,
                    found: declared,
                });
            }
            let found = self.find_by_id(id, None)?.record;
            if found.res_type != declared {
                return Err(Error::TypeMismatch {
                    expected: declared,
                    found: found.res_type,
                });
            }
            current = found;
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ManifestLayout;
    use crate::index::{IndexBuilder, decode};
    use crate::locale::LocaleMatcher;
    use std::path::Path;

    fn archive(records: Vec<ResourceRecord>) -> ResourceArchive {
        let mut builder = IndexBuilder::new("test");
        builder.add_folder("default", records).unwrap();
        let index = decode(&builder.build().unwrap(), None, &LocaleMatcher).unwrap();
        ResourceArchive::from_index(
            Path::new("base"),
            ManifestLayout::V2 { module: "entry".into() },
            index,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse_reference("$string:42"), Some((ResType::String, 42)));
        assert_eq!(parse_reference("$ohos:color:7"), Some((ResType::Color, 7)));
        assert_eq!(parse_reference("$layout:1"), None);
        assert_eq!(parse_reference("$string:"), None);
        assert_eq!(parse_reference("$string:99999999999"), None);
        assert_eq!(parse_reference("price: $string:1"), None);
    }

    #[test]
    fn test_parse_scalars() {
        assert!(parse_boolean("true").unwrap());
        assert!(parse_boolean("yes").is_err());
        assert_eq!(parse_integer("-12").unwrap(), -12);
        assert!(matches!(
            parse_integer("1.5"),
            Err(Error::InvalidValue { expected: ResType::Integer, .. })
        ));
        assert_eq!(parse_float("16vp").unwrap(), (16.0, "vp".to_string()));
        assert_eq!(parse_float("0.5").unwrap(), (0.5, String::new()));
        assert!(parse_float("3em").is_err());
        assert_eq!(recalculate(16.0, "vp", 2.0), 32.0);
        assert_eq!(recalculate(16.0, "px", 2.0), 16.0);
        assert_eq!(recalculate(16.0, "fp", 0.0), 16.0);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#F00").unwrap(), 0xFFFF_0000);
        assert_eq!(parse_color("#8F00").unwrap(), 0x88FF_0000);
        assert_eq!(parse_color("#00ff00").unwrap(), 0xFF00_FF00);
        assert_eq!(parse_color("#80123456").unwrap(), 0x8012_3456);
        assert!(parse_color("123456").is_err());
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#GG0000").is_err());
    }

    #[test]
    fn test_reference_chain() {
        let archives = [archive(vec![
            ResourceRecord::scalar(42, "target", ResType::String, "Hello"),
            ResourceRecord::scalar(43, "alias", ResType::String, "$string:42"),
            ResourceRecord::scalar(44, "count", ResType::Integer, "3"),
        ])];
        let runtime = QualifierDescriptor::new();
        let resolver = Resolver::new(&archives, &runtime, &LocaleMatcher, 20);

        assert_eq!(resolver.resolve_reference("$string:43").unwrap(), "Hello");
        assert_eq!(resolver.resolve_reference("plain").unwrap(), "plain");
        assert!(matches!(
            resolver.resolve_reference("$string:44"),
            Err(Error::TypeMismatch { expected: ResType::String, found: ResType::Integer })
        ));
        assert!(matches!(
            resolver.resolve_reference("$string:7"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_reference_depth_bound() {
        let archives = [archive(vec![
            ResourceRecord::scalar(1, "a", ResType::String, "$string:2"),
            ResourceRecord::scalar(2, "b", ResType::String, "$string:1"),
            ResourceRecord::scalar(3, "c", ResType::String, "$string:4"),
            ResourceRecord::scalar(4, "d", ResType::String, "end"),
        ])];
        let runtime = QualifierDescriptor::new();
        let resolver = Resolver::new(&archives, &runtime, &LocaleMatcher, 2);

        assert!(matches!(
            resolver.resolve_reference("$string:1"),
            Err(Error::ReferenceCycle { depth: 2 })
        ));
        assert_eq!(resolver.resolve_reference("$string:3").unwrap(), "end");
    }

    #[test]
    fn test_parent_chain_merge() {
        let archives = [archive(vec![
            ResourceRecord::array(6, "base", ResType::Theme, &["a", "1", "b", "2"]),
            ResourceRecord::array(7, "child", ResType::Theme, &["$theme:6", "b", "3", "c", "$string:8"]),
            ResourceRecord::scalar(8, "four", ResType::String, "4"),
            ResourceRecord::array(9, "loop", ResType::Pattern, &["$pattern:9", "x", "1"]),
            ResourceRecord::array(10, "wrong", ResType::Theme, &["$pattern:9", "x", "1"]),
        ])];
        let runtime = QualifierDescriptor::new();
        let resolver = Resolver::new(&archives, &runtime, &LocaleMatcher, 20);
        let child = resolver.find_by_id(7, None).unwrap().record;

        let merged = resolver.resolve_parent_chain(child).unwrap();
        let expected: BTreeMap<String, String> = [("a", "1"), ("b", "3"), ("c", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(merged, expected);

        let looping = resolver.find_by_id(9, None).unwrap().record;
        assert!(matches!(
            resolver.resolve_parent_chain(looping),
            Err(Error::ReferenceCycle { .. })
        ));

        let wrong = resolver.find_by_id(10, None).unwrap().record;
        assert!(matches!(
            resolver.resolve_parent_chain(wrong),
            Err(Error::TypeMismatch { .. })
        ));

        let scalar = resolver.find_by_id(8, None).unwrap().record;
        assert!(resolver.resolve_parent_chain(scalar).is_err());
    }
}
