//! Core, format-agnostic types for resindex.
//! The index decoder produces these; the manager and resolver consume them.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Resource types as tagged in the binary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResType {
    Values,
    Animation,
    Boolean,
    Color,
    Float,
    Id,
    Integer,
    String,
    StringArray,
    IntArray,
    Layout,
    Plurals,
    Graphic,
    Media,
    Profile,
    Pattern,
    Theme,
    RawFile,
    Symbol,
}

impl ResType {
    /// Returns the resource type for a wire tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        let res_type = match tag {
            0 => ResType::Values,
            1 => ResType::Animation,
            3 => ResType::Boolean,
            4 => ResType::Color,
            5 => ResType::Float,
            6 => ResType::Id,
            8 => ResType::Integer,
            9 => ResType::String,
            10 => ResType::StringArray,
            11 => ResType::IntArray,
            12 => ResType::Layout,
            13 => ResType::Plurals,
            16 => ResType::Graphic,
            17 => ResType::Media,
            18 => ResType::Profile,
            19 => ResType::Pattern,
            20 => ResType::Theme,
            22 => ResType::RawFile,
            23 => ResType::Symbol,
            _ => return None,
        };
        Some(res_type)
    }

    pub fn tag(self) -> u32 {
        match self {
            ResType::Values => 0,
            ResType::Animation => 1,
            ResType::Boolean => 3,
            ResType::Color => 4,
            ResType::Float => 5,
            ResType::Id => 6,
            ResType::Integer => 8,
            ResType::String => 9,
            ResType::StringArray => 10,
            ResType::IntArray => 11,
            ResType::Layout => 12,
            ResType::Plurals => 13,
            ResType::Graphic => 16,
            ResType::Media => 17,
            ResType::Profile => 18,
            ResType::Pattern => 19,
            ResType::Theme => 20,
            ResType::RawFile => 22,
            ResType::Symbol => 23,
        }
    }

    /// Whether records of this type carry a string sequence instead of one string.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            ResType::StringArray
                | ResType::IntArray
                | ResType::Plurals
                | ResType::Pattern
                | ResType::Theme
        )
    }

    /// Whether records of this type may declare a parent in slot 0.
    pub fn is_composite(self) -> bool {
        matches!(self, ResType::Pattern | ResType::Theme)
    }

    /// The name used in `$type:id` references and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ResType::Values => "values",
            ResType::Animation => "animation",
            ResType::Boolean => "boolean",
            ResType::Color => "color",
            ResType::Float => "float",
            ResType::Id => "id",
            ResType::Integer => "integer",
            ResType::String => "string",
            ResType::StringArray => "strarray",
            ResType::IntArray => "intarray",
            ResType::Layout => "layout",
            ResType::Plurals => "plural",
            ResType::Graphic => "graphic",
            ResType::Media => "media",
            ResType::Profile => "profile",
            ResType::Pattern => "pattern",
            ResType::Theme => "theme",
            ResType::RawFile => "rawfile",
            ResType::Symbol => "symbol",
        }
    }
}

impl Display for ResType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let res_type = match s {
            "values" => ResType::Values,
            "animation" => ResType::Animation,
            "boolean" => ResType::Boolean,
            "color" => ResType::Color,
            "float" => ResType::Float,
            "id" => ResType::Id,
            "integer" => ResType::Integer,
            "string" => ResType::String,
            "strarray" => ResType::StringArray,
            "intarray" => ResType::IntArray,
            "layout" => ResType::Layout,
            "plural" => ResType::Plurals,
            "graphic" => ResType::Graphic,
            "media" => ResType::Media,
            "profile" => ResType::Profile,
            "pattern" => ResType::Pattern,
            "theme" => ResType::Theme,
            "rawfile" => ResType::RawFile,
            "symbol" => ResType::Symbol,
            _ => return Err(Error::NotFound(format!("resource type `{}`", s))),
        };
        Ok(res_type)
    }
}

/// Qualifier dimensions as tagged in a `KEYS` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Language,
    Region,
    ScreenDensity,
    Direction,
    DeviceClass,
    Script,
    ColorMode,
    Mcc,
    Mnc,
    InputDevice,
}

impl KeyType {
    pub fn from_tag(tag: u32) -> Option<Self> {
        let key_type = match tag {
            0 => KeyType::Language,
            1 => KeyType::Region,
            2 => KeyType::ScreenDensity,
            3 => KeyType::Direction,
            4 => KeyType::DeviceClass,
            5 => KeyType::Script,
            6 => KeyType::ColorMode,
            7 => KeyType::Mcc,
            8 => KeyType::Mnc,
            10 => KeyType::InputDevice,
            _ => return None,
        };
        Some(key_type)
    }

    pub fn tag(self) -> u32 {
        match self {
            KeyType::Language => 0,
            KeyType::Region => 1,
            KeyType::ScreenDensity => 2,
            KeyType::Direction => 3,
            KeyType::DeviceClass => 4,
            KeyType::Script => 5,
            KeyType::ColorMode => 6,
            KeyType::Mcc => 7,
            KeyType::Mnc => 8,
            KeyType::InputDevice => 10,
        }
    }

    /// Whether the value is ASCII text packed into the u32.
    pub fn is_packed_text(self) -> bool {
        matches!(self, KeyType::Language | KeyType::Region | KeyType::Script)
    }
}

/// One qualifier dimension of a qualifier directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyParam {
    pub key_type: KeyType,
    pub value: u32,
    /// Folder-name token derived from `value` at decode time.
    pub text: String,
}

impl KeyParam {
    /// Builds a param from its wire form, deriving the folder token.
    pub fn new(key_type: KeyType, value: u32) -> Result<Self, Error> {
        let text = crate::qualifier::param_text(key_type, value)?;
        Ok(Self {
            key_type,
            value,
            text,
        })
    }

    /// Builds a language, region or script param from its text.
    pub fn text(key_type: KeyType, text: &str) -> Result<Self, Error> {
        if !key_type.is_packed_text() || text.is_empty() || text.len() > 4 || !text.is_ascii() {
            return Err(Error::decode(format!(
                "`{}` is not a valid {:?} subtag",
                text, key_type
            )));
        }
        Self::new(key_type, pack_ascii(text))
    }
}

/// Packs up to four ASCII bytes big-endian into a u32 (`"zh"` → `0x7A68`).
pub fn pack_ascii(text: &str) -> u32 {
    text.bytes().fold(0u32, |acc, b| (acc << 8) | u32::from(b))
}

/// Reverses [`pack_ascii`], skipping zero bytes.
pub fn unpack_ascii(value: u32) -> String {
    value
        .to_be_bytes()
        .iter()
        .filter(|b| **b != 0)
        .map(|b| char::from(*b))
        .collect()
}

/// Payload of one resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Scalar(String),
    Array(Vec<String>),
}

/// One concrete definition of a resource inside one qualifier directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: u32,
    pub name: String,
    pub res_type: ResType,
    pub value: RecordValue,
}

impl ResourceRecord {
    pub fn scalar(id: u32, name: &str, res_type: ResType, value: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            res_type,
            value: RecordValue::Scalar(value.to_string()),
        }
    }

    pub fn array(id: u32, name: &str, res_type: ResType, values: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            res_type,
            value: RecordValue::Array(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    /// The scalar payload; for arrays, the first slot.
    pub fn text(&self) -> &str {
        match &self.value {
            RecordValue::Scalar(value) => value,
            RecordValue::Array(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// The ordered payload slots; a scalar is one slot.
    pub fn values(&self) -> &[String] {
        match &self.value {
            RecordValue::Scalar(value) => std::slice::from_ref(value),
            RecordValue::Array(values) => values,
        }
    }

    /// THEME/PATTERN records with an odd slot count carry a parent reference in slot 0.
    pub fn has_parent(&self) -> bool {
        self.res_type.is_composite() && self.values().len() % 2 == 1
    }

    pub fn parent_reference(&self) -> Option<&str> {
        if self.has_parent() {
            self.values().first().map(String::as_str)
        } else {
            None
        }
    }

    /// Key/value pairs of a composite or plural record, skipping the parent slot.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        let skip = usize::from(self.has_parent());
        self.values()[skip..]
            .chunks_exact(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
    }

    /// Plural category → text for a PLURALS record.
    pub fn plural_forms(&self) -> BTreeMap<&str, &str> {
        self.pairs().collect()
    }
}

impl Display for ResourceRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ResourceRecord {{ id: {:#010x}, name: {}, type: {}, value: {} }}",
            self.id,
            self.name,
            self.res_type,
            self.values().join("|")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_res_type_tags_round_trip() {
        for tag in 0..32 {
            if let Some(res_type) = ResType::from_tag(tag) {
                assert_eq!(res_type.tag(), tag);
                assert_eq!(res_type.as_str().parse::<ResType>().unwrap(), res_type);
            }
        }
        assert!(ResType::from_tag(2).is_none());
        assert!(ResType::from_tag(99).is_none());
    }

    #[test]
    fn test_array_types() {
        assert!(ResType::StringArray.is_array());
        assert!(ResType::Theme.is_array());
        assert!(ResType::Plurals.is_array());
        assert!(!ResType::String.is_array());
        assert!(!ResType::Media.is_array());
    }

    #[test]
    fn test_pack_ascii() {
        assert_eq!(pack_ascii("zh"), 0x7A68);
        assert_eq!(unpack_ascii(0x7A68), "zh");
        assert_eq!(unpack_ascii(pack_ascii("Hans")), "Hans");
    }

    #[test]
    fn test_key_param_text_rejects_bad_subtags() {
        assert!(KeyParam::text(KeyType::Language, "").is_err());
        assert!(KeyParam::text(KeyType::Language, "toolong").is_err());
        assert!(KeyParam::text(KeyType::Mcc, "460").is_err());
        assert_eq!(KeyParam::text(KeyType::Region, "CN").unwrap().text, "CN");
    }

    #[test]
    fn test_theme_parent_slot_is_skipped() {
        let record = ResourceRecord::array(
            1,
            "child",
            ResType::Theme,
            &["$theme:2", "b", "3", "c", "4"],
        );
        assert!(record.has_parent());
        assert_eq!(record.parent_reference(), Some("$theme:2"));
        let pairs: Vec<_> = record.pairs().collect();
        assert_eq!(pairs, vec![("b", "3"), ("c", "4")]);
    }

    #[test]
    fn test_theme_without_parent() {
        let record = ResourceRecord::array(2, "base", ResType::Theme, &["a", "1", "b", "2"]);
        assert!(!record.has_parent());
        assert_eq!(record.pairs().count(), 2);
    }

    #[test]
    fn test_string_array_never_has_parent() {
        let record = ResourceRecord::array(3, "list", ResType::StringArray, &["x", "y", "z"]);
        assert!(!record.has_parent());
    }

    #[test]
    fn test_plural_forms() {
        let record = ResourceRecord::array(
            4,
            "apples",
            ResType::Plurals,
            &["one", "%d apple", "other", "%d apples"],
        );
        let forms = record.plural_forms();
        assert_eq!(forms.get("one"), Some(&"%d apple"));
        assert_eq!(forms.get("other"), Some(&"%d apples"));
    }
}
