//! Lemma resolution and difficulty tiers
//!
//! Maps a surface word to its dictionary form using per-language rule
//! tables: an irregular-form lookup first, then ordered suffix rules.
//! Results are cached process-wide keyed by `(surface, language)`; lemma
//! mappings are static per language, so the cache is never invalidated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// CEFR-like difficulty tier, ordered easiest to hardest.
/// `Unknown` sorts above every configured level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
    Unknown,
}

impl Tier {
    pub fn parse(s: &str) -> Option<Tier> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A1" => Some(Tier::A1),
            "A2" => Some(Tier::A2),
            "B1" => Some(Tier::B1),
            "B2" => Some(Tier::B2),
            "C1" => Some(Tier::C1),
            "C2" => Some(Tier::C2),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::A1 => "A1",
            Tier::A2 => "A2",
            Tier::B1 => "B1",
            Tier::B2 => "B2",
            Tier::C1 => "C1",
            Tier::C2 => "C2",
            Tier::Unknown => "unknown",
        }
    }
}

/// Per-language lemmatization rules
struct LanguageRules {
    /// Irregular surface -> lemma overrides
    irregular: HashMap<&'static str, &'static str>,
    /// Ordered (suffix, replacement) pairs, first match wins
    suffixes: Vec<(&'static str, &'static str)>,
    /// Minimum stem length a suffix rule may leave behind
    min_stem: usize,
}

fn german_rules() -> LanguageRules {
    let irregular = HashMap::from([
        ("ging", "gehen"),
        ("gingen", "gehen"),
        ("war", "sein"),
        ("waren", "sein"),
        ("bin", "sein"),
        ("bist", "sein"),
        ("ist", "sein"),
        ("sind", "sein"),
        ("seid", "sein"),
        ("hat", "haben"),
        ("hast", "haben"),
        ("habe", "haben"),
        ("hatte", "haben"),
        ("hatten", "haben"),
        ("kam", "kommen"),
        ("kamen", "kommen"),
        ("sah", "sehen"),
        ("sahen", "sehen"),
        ("wird", "werden"),
        ("wurde", "werden"),
        ("wurden", "werden"),
    ]);
    // Verb inflection first (longer suffixes before shorter)
    let suffixes = vec![
        ("eten", "en"),
        ("test", "en"),
        ("ten", "en"),
        ("est", "en"),
        ("te", "en"),
        ("st", "en"),
        ("et", "en"),
        ("e", "en"),
        ("t", "en"),
    ];
    LanguageRules {
        irregular,
        suffixes,
        min_stem: 2,
    }
}

fn english_rules() -> LanguageRules {
    let irregular = HashMap::from([
        ("went", "go"),
        ("gone", "go"),
        ("goes", "go"),
        ("was", "be"),
        ("were", "be"),
        ("is", "be"),
        ("are", "be"),
        ("am", "be"),
        ("been", "be"),
        ("has", "have"),
        ("had", "have"),
        ("did", "do"),
        ("does", "do"),
        ("said", "say"),
        ("saw", "see"),
        ("seen", "see"),
    ]);
    let suffixes = vec![
        ("ies", "y"),
        ("ing", ""),
        ("ied", "y"),
        ("ed", ""),
        ("es", ""),
        ("s", ""),
    ];
    LanguageRules {
        irregular,
        suffixes,
        min_stem: 3,
    }
}

fn spanish_rules() -> LanguageRules {
    let irregular = HashMap::from([
        ("fue", "ser"),
        ("era", "ser"),
        ("es", "ser"),
        ("son", "ser"),
        ("soy", "ser"),
        ("voy", "ir"),
        ("va", "ir"),
        ("van", "ir"),
        ("tiene", "tener"),
        ("tengo", "tener"),
    ]);
    let suffixes = vec![
        ("amos", "ar"),
        ("emos", "er"),
        ("imos", "ir"),
        ("aron", "ar"),
        ("ieron", "er"),
        ("ando", "ar"),
        ("iendo", "er"),
        ("as", "ar"),
        ("an", "ar"),
        ("a", "ar"),
        ("o", "ar"),
        ("e", "er"),
        ("en", "er"),
    ];
    LanguageRules {
        irregular,
        suffixes,
        min_stem: 2,
    }
}

/// Lemma classifier with a process-wide `(surface, language)` cache
pub struct LemmaClassifier {
    rules: HashMap<&'static str, LanguageRules>,
    cache: Mutex<HashMap<(String, String), String>>,
}

impl LemmaClassifier {
    pub fn new() -> Self {
        let rules = HashMap::from([
            ("de", german_rules()),
            ("en", english_rules()),
            ("es", spanish_rules()),
        ]);
        Self {
            rules,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the dictionary form of a surface word.
    ///
    /// Pure from the caller's perspective; the cache is an optimization.
    /// Unsupported languages fall back to the case-folded surface form.
    pub fn lemmatize(&self, surface: &str, language: &str) -> String {
        let folded = surface.to_lowercase();
        let key = (folded.clone(), language.to_string());

        if let Some(hit) = self.cache.lock().expect("lemma cache poisoned").get(&key) {
            return hit.clone();
        }

        let lemma = match self.rules.get(language) {
            Some(rules) => apply_rules(&folded, rules),
            None => folded.clone(),
        };

        self.cache
            .lock()
            .expect("lemma cache poisoned")
            .insert(key, lemma.clone());
        lemma
    }

    /// Number of cached lemma lookups (for diagnostics)
    pub fn cache_len(&self) -> usize {
        self.cache.lock().expect("lemma cache poisoned").len()
    }
}

impl Default for LemmaClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_rules(folded: &str, rules: &LanguageRules) -> String {
    if let Some(lemma) = rules.irregular.get(folded) {
        return (*lemma).to_string();
    }
    for (suffix, replacement) in &rules.suffixes {
        if let Some(stem) = folded.strip_suffix(suffix) {
            if stem.chars().count() >= rules.min_stem {
                return format!("{}{}", stem, replacement);
            }
        }
    }
    folded.to_string()
}
