//! Cardinal plural selection and the per-manager rules cache.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt::{Display, Formatter},
    str::FromStr,
    sync::Arc,
};

use lazy_static::lazy_static;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of languages whose rules are kept at once.
pub const PLURAL_CACHE_CAPACITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }
}

impl Display for PluralCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluralCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" => Ok(PluralCategory::Zero),
            "one" => Ok(PluralCategory::One),
            "two" => Ok(PluralCategory::Two),
            "few" => Ok(PluralCategory::Few),
            "many" => Ok(PluralCategory::Many),
            "other" => Ok(PluralCategory::Other),
            _ => Err(Error::NotFound(format!("plural category `{}`", s))),
        }
    }
}

/// Integer cardinal rule families (CLDR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFamily {
    OneOther,
    /// 0 and 1 are singular.
    ZeroOne,
    OtherOnly,
    EastSlavic,
    SerboCroatian,
    Polish,
    CzechSlovak,
    Slovenian,
    Lithuanian,
    Latvian,
    Irish,
    Romanian,
    Arabic,
    Hebrew,
}

lazy_static! {
    /// Base language subtag → rule family.
    static ref FAMILY_TABLE: BTreeMap<&'static str, RuleFamily> = {
        use RuleFamily::*;
        let mut m = BTreeMap::new();

        for code in [
            "en","de","nl","sv","da","nb","nn","no","is","fi","et","fa","hi","bn","gu",
            "ta","te","kn","ml","mr","it","es","mk","el","eu","gl","af","sw","ur",
            "fil","tl","tr","ms","bg","ca","hu","az","ka","kk","uz"
        ] {
            m.insert(code, OneOther);
        }
        for code in ["fr", "pt", "hy", "kab"] {
            m.insert(code, ZeroOne);
        }
        for code in ["ja","zh","ko","th","vi","km","lo","my","yue","id"] {
            m.insert(code, OtherOnly);
        }
        for code in ["ru", "uk", "be"] {
            m.insert(code, EastSlavic);
        }
        for code in ["sr", "hr", "bs", "sh"] {
            m.insert(code, SerboCroatian);
        }
        m.insert("pl", Polish);
        for code in ["cs", "sk"] {
            m.insert(code, CzechSlovak);
        }
        m.insert("sl", Slovenian);
        m.insert("lt", Lithuanian);
        m.insert("lv", Latvian);
        m.insert("ga", Irish);
        m.insert("ro", Romanian);
        m.insert("ar", Arabic);
        for code in ["he", "iw"] {
            m.insert(code, Hebrew);
        }
        m
    };
}

impl RuleFamily {
    /// Family for a language code; unknown languages only have `other`.
    pub fn for_language(language: &str) -> Self {
        let base = language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        FAMILY_TABLE
            .get(base.as_str())
            .copied()
            .unwrap_or(RuleFamily::OtherOnly)
    }

    pub fn select(self, quantity: i64) -> PluralCategory {
        use PluralCategory::*;

        let n = quantity.unsigned_abs();
        let (n10, n100) = (n % 10, n % 100);
        match self {
            RuleFamily::OneOther => {
                if n == 1 { One } else { Other }
            }
            RuleFamily::ZeroOne => {
                if n <= 1 { One } else { Other }
            }
            RuleFamily::OtherOnly => Other,
            RuleFamily::EastSlavic | RuleFamily::Polish => {
                let one = if self == RuleFamily::Polish {
                    n == 1
                } else {
                    n10 == 1 && n100 != 11
                };
                if one {
                    One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    Few
                } else {
                    Many
                }
            }
            RuleFamily::SerboCroatian => {
                if n10 == 1 && n100 != 11 {
                    One
                } else if (2..=4).contains(&n10) && !(12..=14).contains(&n100) {
                    Few
                } else {
                    Other
                }
            }
            RuleFamily::CzechSlovak => match n {
                1 => One,
                2..=4 => Few,
                _ => Other,
            },
            RuleFamily::Slovenian => match n100 {
                1 => One,
                2 => Two,
                3 | 4 => Few,
                _ => Other,
            },
            RuleFamily::Lithuanian => {
                if (11..=19).contains(&n100) {
                    Other
                } else if n10 == 1 {
                    One
                } else if n10 >= 2 {
                    Few
                } else {
                    Other
                }
            }
            RuleFamily::Latvian => {
                if n10 == 0 || (11..=19).contains(&n100) {
                    Zero
                } else if n10 == 1 {
                    One
                } else {
                    Other
                }
            }
            RuleFamily::Irish => match n {
                1 => One,
                2 => Two,
                3..=6 => Few,
                7..=10 => Many,
                _ => Other,
            },
            RuleFamily::Romanian => {
                if n == 1 {
                    One
                } else if n == 0 || (2..=19).contains(&n100) {
                    Few
                } else {
                    Other
                }
            }
            RuleFamily::Arabic => match (n, n100) {
                (0, _) => Zero,
                (1, _) => One,
                (2, _) => Two,
                (_, 3..=10) => Few,
                (_, 11..=99) => Many,
                _ => Other,
            },
            RuleFamily::Hebrew => match n {
                1 => One,
                2 => Two,
                n if n > 10 && n10 == 0 => Many,
                _ => Other,
            },
        }
    }

    /// Categories an integer quantity can select in this family.
    pub fn categories(self) -> BTreeSet<PluralCategory> {
        use PluralCategory::*;
        let items: &[PluralCategory] = match self {
            RuleFamily::OneOther | RuleFamily::ZeroOne => &[One, Other],
            RuleFamily::OtherOnly => &[Other],
            RuleFamily::EastSlavic | RuleFamily::Polish => &[One, Few, Many],
            RuleFamily::SerboCroatian | RuleFamily::CzechSlovak | RuleFamily::Lithuanian => {
                &[One, Few, Other]
            }
            RuleFamily::Romanian => &[One, Few, Other],
            RuleFamily::Slovenian => &[One, Two, Few, Other],
            RuleFamily::Latvian => &[Zero, One, Other],
            RuleFamily::Irish => &[One, Two, Few, Many, Other],
            RuleFamily::Arabic => &[Zero, One, Two, Few, Many, Other],
            RuleFamily::Hebrew => &[One, Two, Many, Other],
        };
        items.iter().copied().collect()
    }
}

/// Selects a plural category for a quantity in one language.
pub trait PluralSelector: Send + Sync {
    fn select(&self, quantity: i64) -> PluralCategory;
}

/// Builds plural rules for a language.
pub trait PluralRuleProvider: Send + Sync {
    fn rules_for(&self, language: &str) -> Result<Arc<dyn PluralSelector>>;
}

/// Rules of one language from the built-in table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralRules {
    pub language: String,
    pub family: RuleFamily,
}

impl PluralRules {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            family: RuleFamily::for_language(language),
        }
    }
}

impl PluralSelector for PluralRules {
    fn select(&self, quantity: i64) -> PluralCategory {
        self.family.select(quantity)
    }
}

/// Default provider backed by the built-in CLDR table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CldrPluralRules;

impl PluralRuleProvider for CldrPluralRules {
    fn rules_for(&self, language: &str) -> Result<Arc<dyn PluralSelector>> {
        Ok(Arc::new(PluralRules::new(language)))
    }
}

/// Rules of recently used languages, evicted first-in first-out.
pub struct PluralCache {
    capacity: usize,
    entries: VecDeque<(String, Arc<dyn PluralSelector>)>,
}

impl Default for PluralCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluralCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluralCache")
            .field("capacity", &self.capacity)
            .field("languages", &self.languages())
            .finish()
    }
}

impl PluralCache {
    pub fn new() -> Self {
        Self::with_capacity(PLURAL_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached languages, oldest first.
    pub fn languages(&self) -> Vec<&str> {
        self.entries.iter().map(|(l, _)| l.as_str()).collect()
    }

    /// Selects the category of `quantity` in `language`, building and caching
    /// the language's rules on a miss.
    pub fn select(
        &mut self,
        language: &str,
        quantity: i64,
        provider: &dyn PluralRuleProvider,
    ) -> Result<PluralCategory> {
        if let Some((_, rules)) = self.entries.iter().find(|(l, _)| l == language) {
            return Ok(rules.select(quantity));
        }

        let rules = provider.rules_for(language)?;
        if self.entries.len() == self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                trace!("plural cache evicts {}", evicted);
            }
        }
        let category = rules.select(quantity);
        self.entries.push_back((language.to_string(), rules));
        Ok(category)
    }
}
