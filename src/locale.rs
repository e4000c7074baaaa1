//! Locale values and the comparator used for locale matching and ranking.
//!
//! The engine treats locale comparison as an external capability: every
//! decision goes through [`LocaleComparator`]. [`LocaleMatcher`] is the default
//! implementation, backed by a curated likely-script table.

use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt::{Display, Formatter},
};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::error::Error;

lazy_static! {
    /// Likely script for a base language subtag (CLDR likely subtags, common locales).
    static ref LIKELY_SCRIPT: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        for code in [
            "en","de","nl","sv","da","nb","nn","no","is","fi","et","it","es","pt","fr","ro",
            "pl","cs","sk","sl","hr","bs","lt","lv","ga","eu","gl","af","sw","tr","id","ms",
            "fil","tl","vi","hu","ca","sq","mt","cy","uz","az",
        ] {
            m.insert(code, "Latn");
        }
        for code in ["ru","uk","be","bg","mk","sr","kk","ky","mn","tg"] {
            m.insert(code, "Cyrl");
        }
        for code in ["ar","fa","ur","ug","ps"] {
            m.insert(code, "Arab");
        }
        m.insert("zh", "Hans");
        m.insert("yue", "Hant");
        m.insert("ja", "Jpan");
        m.insert("ko", "Kore");
        m.insert("he", "Hebr");
        m.insert("iw", "Hebr");
        m.insert("el", "Grek");
        m.insert("hy", "Armn");
        m.insert("ka", "Geor");
        m.insert("th", "Thai");
        m.insert("km", "Khmr");
        m.insert("lo", "Laoo");
        m.insert("my", "Mymr");
        m.insert("hi", "Deva");
        m.insert("mr", "Deva");
        m.insert("ne", "Deva");
        m.insert("bn", "Beng");
        m.insert("gu", "Gujr");
        m.insert("ta", "Taml");
        m.insert("te", "Telu");
        m.insert("kn", "Knda");
        m.insert("ml", "Mlym");
        m.insert("bo", "Tibt");
        m
    };

    /// Region overrides of the likely script, keyed by `language-REGION`.
    static ref LIKELY_SCRIPT_BY_REGION: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("zh-TW", "Hant");
        m.insert("zh-HK", "Hant");
        m.insert("zh-MO", "Hant");
        m.insert("sr-ME", "Latn");
        m.insert("uz-AF", "Arab");
        m.insert("pa-PK", "Arab");
        m
    };
}

/// Returns the likely script for a language (and optional region), if known.
pub fn likely_script(language: &str, region: Option<&str>) -> Option<&'static str> {
    if let Some(region) = region {
        let key = format!("{}-{}", language, region);
        if let Some(script) = LIKELY_SCRIPT_BY_REGION.get(key.as_str()) {
            return Some(script);
        }
    }
    LIKELY_SCRIPT.get(language).copied()
}

/// Language, script and region of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResLocale {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// `true` when `script` was completed from likely subtags rather than stated.
    #[serde(default)]
    pub script_is_normalized: bool,
}

impl ResLocale {
    /// Builds a locale from subtags, normalizing case.
    pub fn new(language: &str, script: Option<&str>, region: Option<&str>) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            script: script.map(title_case),
            region: region.map(str::to_ascii_uppercase),
            script_is_normalized: false,
        }
    }

    /// Parses a BCP 47 tag (`_` separators accepted).
    pub fn parse(tag: &str) -> Result<Self, Error> {
        let normalized = tag.replace('_', "-");
        let lang_id: LanguageIdentifier = normalized
            .parse()
            .map_err(|_| Error::invalid_locale(tag))?;
        let language = lang_id.language.as_str();
        if language == "und" {
            return Err(Error::invalid_locale(tag));
        }
        let script = lang_id.script.map(|s| s.as_str().to_string());
        let region = lang_id.region.map(|r| r.as_str().to_string());
        Ok(Self::new(language, script.as_deref(), region.as_deref()))
    }

    /// Completes a missing script from likely subtags, marking it normalized.
    pub fn normalized(mut self) -> Self {
        if self.script.is_none() {
            if let Some(script) = likely_script(&self.language, self.region.as_deref()) {
                self.script = Some(script.to_string());
                self.script_is_normalized = true;
            }
        }
        self
    }

    /// The stated script, or the likely one when unstated.
    pub fn effective_script(&self) -> Option<&str> {
        self.script
            .as_deref()
            .or_else(|| likely_script(&self.language, self.region.as_deref()))
    }

    /// The script only if it was stated, not completed.
    pub fn explicit_script(&self) -> Option<&str> {
        if self.script_is_normalized {
            None
        } else {
            self.script.as_deref()
        }
    }
}

impl Display for ResLocale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.language)?;
        if let Some(script) = self.explicit_script() {
            write!(f, "-{}", script)?;
        }
        if let Some(region) = &self.region {
            write!(f, "-{}", region)?;
        }
        Ok(())
    }
}

fn title_case(script: &str) -> String {
    let mut chars = script.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Locale comparison capability consumed by matching, ranking and decoding.
pub trait LocaleComparator: Send + Sync {
    /// Whether a variant locale can serve a request locale.
    fn matches(&self, variant: Option<&ResLocale>, request: Option<&ResLocale>) -> bool;

    /// Orders two matching variant locales by closeness to the request.
    fn compare_suitability(
        &self,
        a: Option<&ResLocale>,
        b: Option<&ResLocale>,
        request: Option<&ResLocale>,
    ) -> Ordering;

    /// Orders two variant locales by how many subtags they state.
    fn compare_specificity(&self, a: Option<&ResLocale>, b: Option<&ResLocale>) -> Ordering;

    /// Whether a variant locale should be retained when decoding against a pin.
    fn is_compatible(&self, variant: Option<&ResLocale>, pin: Option<&ResLocale>) -> bool {
        match (variant, pin) {
            (Some(variant), Some(pin)) => variant.language == pin.language,
            _ => true,
        }
    }
}

/// Default [`LocaleComparator`]: language equality, likely-script compatibility,
/// exact region when the variant states one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocaleMatcher;

impl LocaleComparator for LocaleMatcher {
    fn matches(&self, variant: Option<&ResLocale>, request: Option<&ResLocale>) -> bool {
        let Some(variant) = variant else {
            return true;
        };
        let Some(request) = request else {
            return false;
        };
        if variant.language != request.language {
            return false;
        }
        if let (Some(v), Some(r)) = (variant.effective_script(), request.effective_script()) {
            if v != r {
                return false;
            }
        }
        match &variant.region {
            Some(region) => request.region.as_ref() == Some(region),
            None => true,
        }
    }

    fn compare_suitability(
        &self,
        a: Option<&ResLocale>,
        b: Option<&ResLocale>,
        request: Option<&ResLocale>,
    ) -> Ordering {
        let Some(request) = request else {
            return Ordering::Equal;
        };
        match (a, b) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (Some(a), Some(b)) => {
                let region_hit = |l: &ResLocale| {
                    request.region.is_some() && l.region == request.region
                };
                let script_hit = |l: &ResLocale| {
                    l.explicit_script().is_some() && l.explicit_script() == request.effective_script()
                };
                region_hit(a)
                    .cmp(&region_hit(b))
                    .then_with(|| script_hit(a).cmp(&script_hit(b)))
            }
        }
    }

    fn compare_specificity(&self, a: Option<&ResLocale>, b: Option<&ResLocale>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (Some(a), Some(b)) => a
                .region
                .is_some()
                .cmp(&b.region.is_some())
                .then_with(|| {
                    a.explicit_script()
                        .is_some()
                        .cmp(&b.explicit_script().is_some())
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(tag: &str) -> ResLocale {
        ResLocale::parse(tag).unwrap()
    }

    #[test]
    fn test_parse_normalizes_case_and_separators() {
        let locale = loc("zh_hant_tw");
        assert_eq!(locale.language, "zh");
        assert_eq!(locale.script.as_deref(), Some("Hant"));
        assert_eq!(locale.region.as_deref(), Some("TW"));
        assert!(!locale.script_is_normalized);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ResLocale::parse("12-!!").is_err());
        assert!(ResLocale::parse("und").is_err());
    }

    #[test]
    fn test_normalized_completes_script() {
        let locale = loc("zh-TW").normalized();
        assert_eq!(locale.script.as_deref(), Some("Hant"));
        assert!(locale.script_is_normalized);
        assert_eq!(locale.explicit_script(), None);
        assert_eq!(locale.to_string(), "zh-TW");
    }

    #[test]
    fn test_language_must_match() {
        let m = LocaleMatcher;
        assert!(m.matches(Some(&loc("es")), Some(&loc("es-MX"))));
        assert!(!m.matches(Some(&loc("es")), Some(&loc("fr"))));
        assert!(m.matches(None, Some(&loc("fr"))));
        assert!(!m.matches(Some(&loc("fr")), None));
    }

    #[test]
    fn test_script_completion_blocks_mismatched_scripts() {
        let m = LocaleMatcher;
        // zh (likely Hans) must not serve zh-TW (likely Hant).
        assert!(!m.matches(Some(&loc("zh")), Some(&loc("zh-TW"))));
        assert!(m.matches(Some(&loc("zh-Hant")), Some(&loc("zh-TW"))));
        assert!(m.matches(Some(&loc("zh")), Some(&loc("zh-CN"))));
    }

    #[test]
    fn test_region_must_match_when_stated() {
        let m = LocaleMatcher;
        assert!(!m.matches(Some(&loc("en-GB")), Some(&loc("en-US"))));
        assert!(!m.matches(Some(&loc("en-GB")), Some(&loc("en"))));
    }

    #[test]
    fn test_suitability_prefers_region_hit() {
        let m = LocaleMatcher;
        let request = loc("en-GB");
        assert_eq!(
            m.compare_suitability(Some(&loc("en-GB")), Some(&loc("en")), Some(&request)),
            Ordering::Greater
        );
        assert_eq!(
            m.compare_suitability(None, Some(&loc("en")), Some(&request)),
            Ordering::Less
        );
        assert_eq!(
            m.compare_suitability(Some(&loc("en")), Some(&loc("en")), Some(&request)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_pin_compatibility() {
        let m = LocaleMatcher;
        assert!(m.is_compatible(None, Some(&loc("en"))));
        assert!(m.is_compatible(Some(&loc("en-GB")), Some(&loc("en"))));
        assert!(!m.is_compatible(Some(&loc("de")), Some(&loc("en"))));
        assert!(m.is_compatible(Some(&loc("de")), None));
    }
}
