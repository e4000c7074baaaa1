//! Qualifier descriptors: the runtime environment and the conditions of one
//! qualifier directory share this shape.
//!
//! A variant descriptor is matched against the runtime descriptor with
//! [`QualifierDescriptor::matches`], and matching variants are ordered with
//! [`QualifierDescriptor::compare_suitability`]. The folder-path codec turns a
//! `KEYS` node's params into a directory name such as `mcc460_mnc01-zh_Hans_CN-dark`.

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    locale::{LocaleComparator, ResLocale},
    types::{KeyParam, KeyType, pack_ascii, unpack_ascii},
};

/// Baseline dpi of a density ratio of 1.0.
pub const BASELINE_DPI: f32 = 160.0;

/// Folder name of the qualifier directory with no params.
pub const DEFAULT_FOLDER: &str = "default";

/// Text direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Unset,
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Unset,
    Phone,
    Tablet,
    Car,
    Pc,
    Tv,
    Wearable,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Unset => "",
            DeviceClass::Phone => "phone",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Car => "car",
            DeviceClass::Pc => "pc",
            DeviceClass::Tv => "tv",
            DeviceClass::Wearable => "wearable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Unset,
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDevice {
    #[default]
    Unset,
    PointingDevice,
}

/// Screen density buckets, valued in dpi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenDensity {
    #[default]
    NotSet,
    Sdpi,
    Mdpi,
    Ldpi,
    Xldpi,
    Xxldpi,
    Xxxldpi,
}

impl ScreenDensity {
    pub const BUCKETS: [ScreenDensity; 6] = [
        ScreenDensity::Sdpi,
        ScreenDensity::Mdpi,
        ScreenDensity::Ldpi,
        ScreenDensity::Xldpi,
        ScreenDensity::Xxldpi,
        ScreenDensity::Xxxldpi,
    ];

    pub fn dpi(self) -> u32 {
        match self {
            ScreenDensity::NotSet => 0,
            ScreenDensity::Sdpi => 120,
            ScreenDensity::Mdpi => 160,
            ScreenDensity::Ldpi => 240,
            ScreenDensity::Xldpi => 320,
            ScreenDensity::Xxldpi => 480,
            ScreenDensity::Xxxldpi => 640,
        }
    }

    /// The bucket whose dpi is exactly `dpi`.
    pub fn from_dpi(dpi: u32) -> Option<Self> {
        Self::BUCKETS.into_iter().find(|bucket| bucket.dpi() == dpi)
    }

    /// Quantizes a dpi value: the first bucket at or above it, capped at xxxldpi.
    pub fn quantize(dpi: f32) -> Self {
        if dpi.is_nan() || dpi <= 0.0 {
            return ScreenDensity::NotSet;
        }
        Self::BUCKETS
            .into_iter()
            .find(|bucket| dpi <= bucket.dpi() as f32)
            .unwrap_or(ScreenDensity::Xxxldpi)
    }

    /// Validates a caller-supplied density hint; `0` means no hint.
    pub fn validate_hint(hint: Option<u32>) -> Result<Option<u32>> {
        match hint {
            None | Some(0) => Ok(None),
            Some(dpi) if Self::from_dpi(dpi).is_some() => Ok(Some(dpi)),
            Some(dpi) => Err(Error::InvalidDensity(dpi)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScreenDensity::NotSet => "",
            ScreenDensity::Sdpi => "sdpi",
            ScreenDensity::Mdpi => "mdpi",
            ScreenDensity::Ldpi => "ldpi",
            ScreenDensity::Xldpi => "xldpi",
            ScreenDensity::Xxldpi => "xxldpi",
            ScreenDensity::Xxxldpi => "xxxldpi",
        }
    }
}

trait Dimension: Copy + PartialEq + Default {
    fn is_set(self) -> bool {
        self != Self::default()
    }
}

impl Dimension for Direction {}
impl Dimension for DeviceClass {}
impl Dimension for ColorMode {}
impl Dimension for InputDevice {}
impl Dimension for ScreenDensity {}

fn dimension_matches<D: Dimension>(variant: D, request: D) -> bool {
    !variant.is_set() || !request.is_set() || variant == request
}

/// The side equal to a set request value wins.
fn prefer_request<D: Dimension>(a: D, b: D, request: D) -> Ordering {
    if a == b || !request.is_set() {
        return Ordering::Equal;
    }
    (a == request).cmp(&(b == request))
}

fn prefer_set<D: Dimension>(a: D, b: D) -> Ordering {
    a.is_set().cmp(&b.is_set())
}

/// Closest bucket to an explicit hint wins; at equal distance the bucket above wins.
fn compare_density_to_hint(a: u32, b: u32, hint: u32) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (a, b, hint) = (i64::from(a), i64::from(b), i64::from(hint));
    let (da, db) = ((a - hint).abs(), (b - hint).abs());
    db.cmp(&da).then_with(|| a.cmp(&b))
}

/// Buckets at or above the request beat those below; the nearest on each side wins.
fn compare_density_to_request(a: u32, b: u32, request: u32) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (da, db) = (
        i64::from(a) - i64::from(request),
        i64::from(b) - i64::from(request),
    );
    match (da >= 0, db >= 0) {
        (true, true) => db.cmp(&da),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => da.cmp(&db),
    }
}

/// Environment conditions of a request or a qualifier directory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualifierDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<ResLocale>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub device_class: DeviceClass,
    #[serde(default)]
    pub color_mode: ColorMode,
    #[serde(default)]
    pub input_device: InputDevice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnc: Option<u32>,
    /// Display scale ratio; the dpi bucket is derived from it.
    #[serde(default)]
    pub density: f32,
}

impl QualifierDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a runtime descriptor from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the locale, completing its script from likely subtags.
    pub fn with_locale(mut self, locale: ResLocale) -> Self {
        self.locale = Some(locale.normalized());
        self
    }

    /// Parses and sets a BCP 47 locale tag.
    pub fn with_locale_tag(self, tag: &str) -> Result<Self> {
        Ok(self.with_locale(ResLocale::parse(tag)?))
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_device_class(mut self, device_class: DeviceClass) -> Self {
        self.device_class = device_class;
        self
    }

    pub fn with_color_mode(mut self, color_mode: ColorMode) -> Self {
        self.color_mode = color_mode;
        self
    }

    pub fn with_input_device(mut self, input_device: InputDevice) -> Self {
        self.input_device = input_device;
        self
    }

    pub fn with_mcc_mnc(mut self, mcc: Option<u32>, mnc: Option<u32>) -> Self {
        self.mcc = mcc;
        self.mnc = mnc;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Sets the density to exactly the given bucket.
    pub fn with_density_bucket(mut self, bucket: ScreenDensity) -> Self {
        self.density = bucket.dpi() as f32 / BASELINE_DPI;
        self
    }

    pub fn density_bucket(&self) -> ScreenDensity {
        ScreenDensity::quantize(self.density * BASELINE_DPI)
    }

    /// Whether this variant can serve `request`.
    pub fn matches(&self, request: &Self, locales: &dyn LocaleComparator) -> bool {
        self.mcc_mnc_matches(request)
            && locales.matches(self.locale.as_ref(), request.locale.as_ref())
            && dimension_matches(self.direction, request.direction)
            && dimension_matches(self.device_class, request.device_class)
            && dimension_matches(self.color_mode, request.color_mode)
            && (!self.input_device.is_set() || self.input_device == request.input_device)
    }

    fn mcc_mnc_matches(&self, request: &Self) -> bool {
        match (self.mcc, self.mnc) {
            // Each field the request sets must agree, so a request carrying
            // only an mcc is still checked against the variant's mcc.
            (Some(mcc), Some(mnc)) => {
                request.mcc.is_none_or(|m| m == mcc) && request.mnc.is_none_or(|n| n == mnc)
            }
            (Some(mcc), None) => request.mcc.is_none_or(|m| m == mcc),
            _ => true,
        }
    }

    /// Orders two matching variants by suitability for `request`.
    ///
    /// `hint` is an explicit dpi the caller wants; without it the request's own
    /// density bucket is used. When nothing relative to the request tells the
    /// two apart, [`compare_specificity`](Self::compare_specificity) decides.
    pub fn compare_suitability(
        &self,
        other: &Self,
        request: &Self,
        hint: Option<u32>,
        locales: &dyn LocaleComparator,
    ) -> Ordering {
        self.compare_mcc_mnc(other, request)
            .then_with(|| {
                locales.compare_suitability(
                    self.locale.as_ref(),
                    other.locale.as_ref(),
                    request.locale.as_ref(),
                )
            })
            .then_with(|| prefer_request(self.direction, other.direction, request.direction))
            .then_with(|| {
                prefer_request(self.device_class, other.device_class, request.device_class)
            })
            .then_with(|| prefer_request(self.color_mode, other.color_mode, request.color_mode))
            .then_with(|| {
                prefer_request(self.input_device, other.input_device, request.input_device)
            })
            .then_with(|| self.compare_density(other, request, hint))
            .then_with(|| self.compare_specificity(other, hint, locales))
    }

    pub fn is_more_suitable(
        &self,
        other: &Self,
        request: &Self,
        hint: Option<u32>,
        locales: &dyn LocaleComparator,
    ) -> bool {
        self.compare_suitability(other, request, hint, locales) == Ordering::Greater
    }

    fn compare_mcc_mnc(&self, other: &Self, request: &Self) -> Ordering {
        if request.mcc.is_some() && self.mcc != other.mcc {
            return self.mcc.is_some().cmp(&other.mcc.is_some());
        }
        if request.mnc.is_some() && self.mnc != other.mnc {
            return self.mnc.is_some().cmp(&other.mnc.is_some());
        }
        Ordering::Equal
    }

    fn compare_density(&self, other: &Self, request: &Self, hint: Option<u32>) -> Ordering {
        let (a, b) = (self.density_bucket(), other.density_bucket());
        if a == b || !a.is_set() || !b.is_set() {
            return Ordering::Equal;
        }
        match hint {
            Some(hint) => compare_density_to_hint(a.dpi(), b.dpi(), hint),
            None => {
                let requested = request.density_bucket();
                if requested.is_set() {
                    compare_density_to_request(a.dpi(), b.dpi(), requested.dpi())
                } else {
                    Ordering::Equal
                }
            }
        }
    }

    /// Orders two variants by how much they state, independent of any request.
    pub fn compare_specificity(
        &self,
        other: &Self,
        hint: Option<u32>,
        locales: &dyn LocaleComparator,
    ) -> Ordering {
        self.mcc
            .is_some()
            .cmp(&other.mcc.is_some())
            .then_with(|| self.mnc.is_some().cmp(&other.mnc.is_some()))
            .then_with(|| locales.compare_specificity(self.locale.as_ref(), other.locale.as_ref()))
            .then_with(|| prefer_set(self.direction, other.direction))
            .then_with(|| prefer_set(self.device_class, other.device_class))
            .then_with(|| prefer_set(self.color_mode, other.color_mode))
            .then_with(|| prefer_set(self.input_device, other.input_device))
            .then_with(|| {
                let (a, b) = (self.density_bucket(), other.density_bucket());
                prefer_set(a, b).then_with(|| match hint {
                    Some(hint) => compare_density_to_hint(a.dpi(), b.dpi(), hint),
                    None => a.dpi().cmp(&b.dpi()),
                })
            })
    }

    pub fn is_more_specific(
        &self,
        other: &Self,
        hint: Option<u32>,
        locales: &dyn LocaleComparator,
    ) -> bool {
        self.compare_specificity(other, hint, locales) == Ordering::Greater
    }

    /// The key params describing this descriptor, in wire tag order.
    pub fn to_params(&self) -> Vec<KeyParam> {
        let mut params = Vec::new();
        let mut push = |key_type: KeyType, value: u32| {
            if let Ok(param) = KeyParam::new(key_type, value) {
                params.push(param);
            }
        };
        if let Some(locale) = &self.locale {
            push(KeyType::Language, pack_ascii(&locale.language));
            if let Some(region) = &locale.region {
                push(KeyType::Region, pack_ascii(region));
            }
        }
        if self.density_bucket().is_set() {
            push(KeyType::ScreenDensity, self.density_bucket().dpi());
        }
        if let Some(tag) = direction_tag(self.direction) {
            push(KeyType::Direction, tag);
        }
        if let Some(tag) = device_tag(self.device_class) {
            push(KeyType::DeviceClass, tag);
        }
        if let Some(script) = self.locale.as_ref().and_then(ResLocale::explicit_script) {
            push(KeyType::Script, pack_ascii(script));
        }
        if let Some(tag) = color_tag(self.color_mode) {
            push(KeyType::ColorMode, tag);
        }
        if let Some(mcc) = self.mcc {
            push(KeyType::Mcc, mcc);
        }
        if let Some(mnc) = self.mnc {
            push(KeyType::Mnc, mnc);
        }
        if self.input_device == InputDevice::PointingDevice {
            push(KeyType::InputDevice, 0);
        }
        params
    }

    /// Canonical directory name of this descriptor.
    pub fn folder_name(&self) -> String {
        encode_folder_path(&self.to_params())
    }

    /// Parses a directory name produced by [`folder_name`](Self::folder_name).
    pub fn from_folder_name(name: &str) -> Result<Self> {
        let mut params = Vec::new();
        if name == DEFAULT_FOLDER {
            return decode_for_match(&params);
        }
        for group in name.split('-') {
            if group.starts_with("mcc") {
                for part in group.split('_') {
                    let (key_type, digits) = if let Some(d) = part.strip_prefix("mcc") {
                        (KeyType::Mcc, d)
                    } else if let Some(d) = part.strip_prefix("mnc") {
                        (KeyType::Mnc, d)
                    } else {
                        return Err(bad_folder(name));
                    };
                    let value = digits.parse().map_err(|_| bad_folder(name))?;
                    params.push(KeyParam::new(key_type, value)?);
                }
            } else if let Some(param) = token_param(group)? {
                params.push(param);
            } else {
                let mut parts = group.split('_');
                let language = parts.next().ok_or_else(|| bad_folder(name))?;
                params.push(KeyParam::text(KeyType::Language, language)?);
                for part in parts {
                    let key_type = if part.len() == 4 {
                        KeyType::Script
                    } else {
                        KeyType::Region
                    };
                    params.push(KeyParam::text(key_type, part)?);
                }
            }
        }
        decode_for_match(&params)
    }
}

impl Display for QualifierDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.folder_name())
    }
}

fn bad_folder(name: &str) -> Error {
    Error::decode(format!("`{}` is not a qualifier directory name", name))
}

fn direction_tag(direction: Direction) -> Option<u32> {
    match direction {
        Direction::Unset => None,
        Direction::Ltr => Some(0),
        Direction::Rtl => Some(1),
    }
}

fn device_tag(device: DeviceClass) -> Option<u32> {
    match device {
        DeviceClass::Unset => None,
        DeviceClass::Phone => Some(0),
        DeviceClass::Tablet => Some(1),
        DeviceClass::Car => Some(2),
        DeviceClass::Pc => Some(3),
        DeviceClass::Tv => Some(4),
        DeviceClass::Wearable => Some(6),
    }
}

fn color_tag(color: ColorMode) -> Option<u32> {
    match color {
        ColorMode::Unset => None,
        ColorMode::Dark => Some(0),
        ColorMode::Light => Some(1),
    }
}

fn direction_from_tag(tag: u32) -> Option<Direction> {
    [Direction::Ltr, Direction::Rtl]
        .into_iter()
        .find(|d| direction_tag(*d) == Some(tag))
}

fn device_from_tag(tag: u32) -> Option<DeviceClass> {
    [
        DeviceClass::Phone,
        DeviceClass::Tablet,
        DeviceClass::Car,
        DeviceClass::Pc,
        DeviceClass::Tv,
        DeviceClass::Wearable,
    ]
    .into_iter()
    .find(|d| device_tag(*d) == Some(tag))
}

fn color_from_tag(tag: u32) -> Option<ColorMode> {
    [ColorMode::Dark, ColorMode::Light]
        .into_iter()
        .find(|c| color_tag(*c) == Some(tag))
}

/// Maps a single folder token (`rtl`, `tablet`, `dark`, `xldpi`, ...) back to its param.
fn token_param(token: &str) -> Result<Option<KeyParam>> {
    let (key_type, value) = match token {
        "ltr" => (KeyType::Direction, 0),
        "rtl" => (KeyType::Direction, 1),
        "phone" => (KeyType::DeviceClass, 0),
        "tablet" => (KeyType::DeviceClass, 1),
        "car" => (KeyType::DeviceClass, 2),
        "pc" => (KeyType::DeviceClass, 3),
        "tv" => (KeyType::DeviceClass, 4),
        "wearable" => (KeyType::DeviceClass, 6),
        "dark" => (KeyType::ColorMode, 0),
        "light" => (KeyType::ColorMode, 1),
        "pointingdevice" => (KeyType::InputDevice, 0),
        _ => match ScreenDensity::BUCKETS.into_iter().find(|b| b.as_str() == token) {
            Some(bucket) => (KeyType::ScreenDensity, bucket.dpi()),
            None => return Ok(None),
        },
    };
    KeyParam::new(key_type, value).map(Some)
}

/// Derives the folder token of one param from its wire value.
pub(crate) fn param_text(key_type: KeyType, value: u32) -> Result<String> {
    let invalid = || Error::decode(format!("invalid {:?} value {}", key_type, value));
    let text = match key_type {
        KeyType::Language | KeyType::Region | KeyType::Script => {
            let text = unpack_ascii(value);
            if text.is_empty() || !text.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(invalid());
            }
            text
        }
        KeyType::Mcc => format!("mcc{:03}", value),
        KeyType::Mnc => format!("mnc{:02}", value),
        KeyType::Direction => match direction_from_tag(value) {
            Some(Direction::Ltr) => "ltr".to_string(),
            Some(Direction::Rtl) => "rtl".to_string(),
            _ => return Err(invalid()),
        },
        KeyType::DeviceClass => device_from_tag(value)
            .ok_or_else(invalid)?
            .as_str()
            .to_string(),
        KeyType::ColorMode => match color_from_tag(value) {
            Some(ColorMode::Dark) => "dark".to_string(),
            Some(ColorMode::Light) => "light".to_string(),
            _ => return Err(invalid()),
        },
        KeyType::InputDevice if value == 0 => "pointingdevice".to_string(),
        KeyType::InputDevice => return Err(invalid()),
        KeyType::ScreenDensity => ScreenDensity::from_dpi(value)
            .ok_or_else(invalid)?
            .as_str()
            .to_string(),
    };
    Ok(text)
}

/// Builds the canonical directory name for an ordered param list.
///
/// Groups are `mcc[_mnc]`, `language[_script][_region]`, direction, device
/// class, color mode, input device and density, joined with `-`.
pub fn encode_folder_path(params: &[KeyParam]) -> String {
    let find = |key_type: KeyType| {
        params
            .iter()
            .find(|p| p.key_type == key_type)
            .map(|p| p.text.as_str())
    };
    let join = |parts: &[Option<&str>]| {
        parts
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join("_")
    };

    let groups = [
        join(&[find(KeyType::Mcc), find(KeyType::Mnc)]),
        join(&[
            find(KeyType::Language),
            find(KeyType::Script),
            find(KeyType::Region),
        ]),
        find(KeyType::Direction).unwrap_or_default().to_string(),
        find(KeyType::DeviceClass).unwrap_or_default().to_string(),
        find(KeyType::ColorMode).unwrap_or_default().to_string(),
        find(KeyType::InputDevice).unwrap_or_default().to_string(),
        find(KeyType::ScreenDensity).unwrap_or_default().to_string(),
    ];

    let path = groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if path.is_empty() {
        DEFAULT_FOLDER.to_string()
    } else {
        path
    }
}

/// Builds the matchable descriptor of a qualifier directory from its params.
pub fn decode_for_match(params: &[KeyParam]) -> Result<QualifierDescriptor> {
    let mut descriptor = QualifierDescriptor::default();
    let mut language = None;
    let mut script = None;
    let mut region = None;

    for param in params {
        let value = param.value;
        let invalid = || Error::decode(format!("invalid {:?} value {}", param.key_type, value));
        match param.key_type {
            KeyType::Language => language = Some(unpack_ascii(value)),
            KeyType::Script => script = Some(unpack_ascii(value)),
            KeyType::Region => region = Some(unpack_ascii(value)),
            KeyType::Mcc => descriptor.mcc = Some(value),
            KeyType::Mnc => descriptor.mnc = Some(value),
            KeyType::Direction => {
                descriptor.direction = direction_from_tag(value).ok_or_else(invalid)?
            }
            KeyType::DeviceClass => {
                descriptor.device_class = device_from_tag(value).ok_or_else(invalid)?
            }
            KeyType::ColorMode => {
                descriptor.color_mode = color_from_tag(value).ok_or_else(invalid)?
            }
            KeyType::InputDevice if value == 0 => {
                descriptor.input_device = InputDevice::PointingDevice
            }
            KeyType::InputDevice => return Err(invalid()),
            KeyType::ScreenDensity => {
                let bucket = ScreenDensity::from_dpi(value).ok_or_else(invalid)?;
                descriptor = descriptor.with_density_bucket(bucket);
            }
        }
    }

    match language {
        Some(language) => {
            descriptor.locale = Some(ResLocale::new(
                &language,
                script.as_deref(),
                region.as_deref(),
            ));
        }
        None if script.is_some() || region.is_some() => {
            return Err(Error::decode("script or region without a language"));
        }
        None => {}
    }
    Ok(descriptor)
}
