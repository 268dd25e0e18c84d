//! Stemming algorithms for reducing words to their root forms.
//!
//! Repositories record which stemmer they were built with; queries must be
//! normalised with the same one or terms will not line up with the
//! vocabulary. [`KrovetzStemmer`] is the default for new repositories.

use std::sync::Arc;

use ahash::AHashMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Trait for stemming algorithms.
pub trait Stemmer: Send + Sync {
    /// Stem a word to its root form.
    fn stem(&self, word: &str) -> String;

    /// Get the name of this stemmer.
    fn name(&self) -> &'static str;
}

/// The stemmer a repository was built with, as named in its manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    Krovetz,
    Porter,
}

impl StemmerKind {
    /// Instantiate the stemmer.
    pub fn build(self) -> Arc<dyn Stemmer> {
        match self {
            StemmerKind::Krovetz => Arc::new(KrovetzStemmer::new()),
            StemmerKind::Porter => Arc::new(PorterStemmer::new()),
        }
    }
}

/// Stem a single term with the Krovetz stemmer.
pub fn stem(term: &str) -> String {
    KrovetzStemmer::new().stem(term)
}

/// Porter stemming algorithm implementation.
///
/// Operates on ASCII words; anything containing other characters is only
/// lower-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct PorterStemmer;

impl PorterStemmer {
    /// Create a new Porter stemmer.
    pub fn new() -> Self {
        PorterStemmer
    }

    /// Check if the byte at `pos` is a consonant in Porter's sense.
    fn is_consonant(word: &[u8], pos: usize) -> bool {
        match word[pos] {
            b'a' | b'e' | b'i' | b'o' | b'u' => false,
            b'y' => pos == 0 || !Self::is_consonant(word, pos - 1),
            _ => true,
        }
    }

    /// Calculate the measure of a word (number of VC sequences).
    fn measure(word: &[u8]) -> usize {
        let n = word.len();
        let mut m = 0;
        let mut i = 0;

        while i < n && Self::is_consonant(word, i) {
            i += 1;
        }

        loop {
            while i < n && !Self::is_consonant(word, i) {
                i += 1;
            }
            if i >= n {
                break;
            }
            while i < n && Self::is_consonant(word, i) {
                i += 1;
            }
            m += 1;
        }

        m
    }

    fn contains_vowel(word: &[u8]) -> bool {
        (0..word.len()).any(|i| !Self::is_consonant(word, i))
    }

    fn ends_double_consonant(word: &[u8]) -> bool {
        let n = word.len();
        n >= 2 && word[n - 1] == word[n - 2] && Self::is_consonant(word, n - 1)
    }

    /// Consonant-vowel-consonant ending, where the last consonant is not w, x or y.
    fn ends_cvc(word: &[u8]) -> bool {
        let n = word.len();
        n >= 3
            && Self::is_consonant(word, n - 3)
            && !Self::is_consonant(word, n - 2)
            && Self::is_consonant(word, n - 1)
            && !matches!(word[n - 1], b'w' | b'x' | b'y')
    }

    fn step1a(word: &mut Vec<u8>) {
        if word.ends_with(b"sses") || word.ends_with(b"ies") {
            word.truncate(word.len() - 2);
        } else if word.ends_with(b"s") && !word.ends_with(b"ss") {
            word.pop();
        }
    }

    fn step1b(word: &mut Vec<u8>) {
        if word.ends_with(b"eed") {
            if Self::measure(&word[..word.len() - 3]) > 0 {
                word.pop();
            }
            return;
        }

        let suffix_len = if word.ends_with(b"ed") {
            2
        } else if word.ends_with(b"ing") {
            3
        } else {
            return;
        };

        if !Self::contains_vowel(&word[..word.len() - suffix_len]) {
            return;
        }
        word.truncate(word.len() - suffix_len);

        if word.ends_with(b"at") || word.ends_with(b"bl") || word.ends_with(b"iz") {
            word.push(b'e');
        } else if Self::ends_double_consonant(word)
            && !matches!(word[word.len() - 1], b'l' | b's' | b'z')
        {
            word.pop();
        } else if Self::measure(word) == 1 && Self::ends_cvc(word) {
            word.push(b'e');
        }
    }

    fn step1c(word: &mut [u8]) {
        let n = word.len();
        if n > 1 && word[n - 1] == b'y' && Self::contains_vowel(&word[..n - 1]) {
            word[n - 1] = b'i';
        }
    }

    /// Replace the first matching suffix when the remaining stem has a
    /// measure above `min_measure`. Only the first match is considered.
    fn replace_suffix(word: &mut Vec<u8>, rules: &[(&str, &str)], min_measure: usize) {
        for (old_suffix, new_suffix) in rules {
            if word.ends_with(old_suffix.as_bytes()) {
                let stem_len = word.len() - old_suffix.len();
                if Self::measure(&word[..stem_len]) > min_measure {
                    word.truncate(stem_len);
                    word.extend_from_slice(new_suffix.as_bytes());
                }
                return;
            }
        }
    }

    fn step2(word: &mut Vec<u8>) {
        const RULES: [(&str, &str); 20] = [
            ("ational", "ate"),
            ("tional", "tion"),
            ("enci", "ence"),
            ("anci", "ance"),
            ("izer", "ize"),
            ("abli", "able"),
            ("alli", "al"),
            ("entli", "ent"),
            ("eli", "e"),
            ("ousli", "ous"),
            ("ization", "ize"),
            ("ation", "ate"),
            ("ator", "ate"),
            ("alism", "al"),
            ("iveness", "ive"),
            ("fulness", "ful"),
            ("ousness", "ous"),
            ("aliti", "al"),
            ("iviti", "ive"),
            ("biliti", "ble"),
        ];
        Self::replace_suffix(word, &RULES, 0);
    }

    fn step3(word: &mut Vec<u8>) {
        const RULES: [(&str, &str); 7] = [
            ("icate", "ic"),
            ("ative", ""),
            ("alize", "al"),
            ("iciti", "ic"),
            ("ical", "ic"),
            ("ful", ""),
            ("ness", ""),
        ];
        Self::replace_suffix(word, &RULES, 0);
    }

    fn step4(word: &mut Vec<u8>) {
        const SUFFIXES: [&str; 19] = [
            "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ion",
            "ou", "ism", "ate", "iti", "ous", "ive", "ize",
        ];

        for suffix in SUFFIXES {
            if !word.ends_with(suffix.as_bytes()) {
                continue;
            }
            let stem_len = word.len() - suffix.len();
            if suffix == "ion" && !matches!(word[..stem_len].last(), Some(b's') | Some(b't')) {
                // "ion" only counts after s or t; "ou" is the only other o-suffix.
                continue;
            }
            if Self::measure(&word[..stem_len]) > 1 {
                word.truncate(stem_len);
            }
            return;
        }
    }

    fn step5(word: &mut Vec<u8>) {
        if word.ends_with(b"e") {
            let stem = &word[..word.len() - 1];
            let m = Self::measure(stem);
            if m > 1 || (m == 1 && !Self::ends_cvc(stem)) {
                word.pop();
            }
        }

        if word.ends_with(b"ll") && Self::measure(word) > 1 {
            word.pop();
        }
    }
}

impl Stemmer for PorterStemmer {
    fn stem(&self, word: &str) -> String {
        let lowered = word.to_lowercase();
        if lowered.len() <= 2 || !lowered.is_ascii() {
            return lowered;
        }

        let mut bytes = lowered.into_bytes();
        Self::step1a(&mut bytes);
        Self::step1b(&mut bytes);
        Self::step1c(&mut bytes);
        Self::step2(&mut bytes);
        Self::step3(&mut bytes);
        Self::step4(&mut bytes);
        Self::step5(&mut bytes);

        // Only ASCII bytes were ever pushed.
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn name(&self) -> &'static str {
        "porter"
    }
}

lazy_static! {
    /// Irregular forms and proper-noun conflations the suffix rules get wrong.
    static ref KROVETZ_EXCEPTIONS: AHashMap<&'static str, &'static str> = {
        let mut m = AHashMap::new();
        for (variant, root) in [
            ("children", "child"),
            ("men", "man"),
            ("women", "woman"),
            ("feet", "foot"),
            ("teeth", "tooth"),
            ("mice", "mouse"),
            ("geese", "goose"),
            ("people", "person"),
            ("data", "datum"),
            ("indices", "index"),
            ("matrices", "matrix"),
            ("analyses", "analysis"),
            ("crises", "crisis"),
            ("theses", "thesis"),
            ("greek", "greece"),
            ("greeks", "greece"),
            ("went", "go"),
            ("gone", "go"),
            ("was", "was"),
            ("has", "has"),
            ("his", "his"),
            ("this", "this"),
            ("is", "is"),
            ("its", "its"),
            ("thus", "thus"),
            ("news", "news"),
            ("series", "series"),
            ("species", "species"),
            ("lens", "lens"),
        ] {
            m.insert(variant, root);
        }
        m
    };
}

/// Inflectional stemmer in the manner of Krovetz's KSTEM.
///
/// KSTEM proper validates every candidate against a large English lexicon.
/// This variant keeps its conservative behaviour without the lexicon: it
/// only undoes plural and `-ied` inflections, leaves derivational suffixes
/// (`-ing`, `-ment`, `-ion`) alone and consults a small exception table
/// for irregular forms.
#[derive(Debug, Clone, Copy, Default)]
pub struct KrovetzStemmer;

impl KrovetzStemmer {
    pub fn new() -> Self {
        KrovetzStemmer
    }

    fn plural(word: &str) -> String {
        if word.ends_with("ies") && word.len() > 4 {
            return format!("{}y", &word[..word.len() - 3]);
        }

        if word.ends_with("es") && word.len() > 3 {
            let stem = &word[..word.len() - 2];
            if stem.ends_with("ss")
                || stem.ends_with('x')
                || stem.ends_with('z')
                || stem.ends_with("ch")
                || stem.ends_with("sh")
            {
                return stem.to_string();
            }
            return word[..word.len() - 1].to_string();
        }

        if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
            return word.to_string();
        }

        if word.ends_with('s') && word.len() > 3 {
            return word[..word.len() - 1].to_string();
        }

        word.to_string()
    }

    fn past_tense(word: &str) -> String {
        if word.ends_with("ied") && word.len() > 4 {
            return format!("{}y", &word[..word.len() - 3]);
        }
        word.to_string()
    }
}

impl Stemmer for KrovetzStemmer {
    fn stem(&self, word: &str) -> String {
        let lowered = word.to_lowercase();
        if let Some(root) = KROVETZ_EXCEPTIONS.get(lowered.as_str()) {
            return (*root).to_string();
        }
        if lowered.len() <= 3 || !lowered.chars().all(|c| c.is_ascii_alphabetic()) {
            return lowered;
        }

        let stemmed = Self::plural(&lowered);
        Self::past_tense(&stemmed)
    }

    fn name(&self) -> &'static str {
        "krovetz"
    }
}

/// A stemmer that returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStemmer;

impl IdentityStemmer {
    pub fn new() -> Self {
        IdentityStemmer
    }
}

impl Stemmer for IdentityStemmer {
    fn stem(&self, word: &str) -> String {
        word.to_string()
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_porter_stemmer() {
        let stemmer = PorterStemmer::new();

        assert_eq!(stemmer.stem("running"), "run");
        assert_eq!(stemmer.stem("flies"), "fli");
        assert_eq!(stemmer.stem("died"), "di");
        assert_eq!(stemmer.stem("agreed"), "agre");
        assert_eq!(stemmer.stem("disabled"), "disabl");
        assert_eq!(stemmer.stem("measuring"), "measur");
        assert_eq!(stemmer.stem("itemization"), "item");
        assert_eq!(stemmer.stem("sensational"), "sensat");
        assert_eq!(stemmer.stem("traditional"), "tradit");
    }

    #[test]
    fn test_porter_step1() {
        let stemmer = PorterStemmer::new();

        assert_eq!(stemmer.stem("caresses"), "caress");
        assert_eq!(stemmer.stem("ponies"), "poni");
        assert_eq!(stemmer.stem("cats"), "cat");
        assert_eq!(stemmer.stem("feed"), "feed");
        assert_eq!(stemmer.stem("hopping"), "hop");
        assert_eq!(stemmer.stem("filing"), "file");
        assert_eq!(stemmer.stem("happy"), "happi");
        assert_eq!(stemmer.stem("relational"), "relat");
    }

    #[test]
    fn test_porter_non_ascii_passthrough() {
        let stemmer = PorterStemmer::new();
        assert_eq!(stemmer.stem("Café"), "café");
        assert_eq!(stemmer.stem("Is"), "is");
    }

    #[test]
    fn test_porter_measure() {
        assert_eq!(PorterStemmer::measure(b"tree"), 0);
        assert_eq!(PorterStemmer::measure(b"trees"), 1);
        assert_eq!(PorterStemmer::measure(b"trouble"), 1);
        assert_eq!(PorterStemmer::measure(b"troubles"), 2);
    }

    #[test]
    fn test_porter_consonant_detection() {
        let word = b"trouble";

        assert!(PorterStemmer::is_consonant(word, 0)); // t
        assert!(PorterStemmer::is_consonant(word, 1)); // r
        assert!(!PorterStemmer::is_consonant(word, 2)); // o
        assert!(!PorterStemmer::is_consonant(word, 3)); // u
        assert!(PorterStemmer::is_consonant(word, 4)); // b
        assert!(PorterStemmer::is_consonant(word, 5)); // l
        assert!(!PorterStemmer::is_consonant(word, 6)); // e
        assert!(!PorterStemmer::is_consonant(b"syzygy", 1)); // y after consonant
    }

    #[test]
    fn test_krovetz_stemmer() {
        assert_eq!(stem("predictions"), "prediction");
        assert_eq!(stem("marketing"), "marketing");
        assert_eq!(stem("strategies"), "strategy");
        assert_eq!(stem("boxes"), "box");
        assert_eq!(stem("churches"), "church");
        assert_eq!(stem("houses"), "house");
        assert_eq!(stem("studied"), "study");
        assert_eq!(stem("glass"), "glass");
        assert_eq!(stem("HELLO"), "hello");
        assert_eq!(stem("Greek"), "greece");
        assert_eq!(stem("his"), "his");
    }

    #[test]
    fn test_identity_stemmer() {
        let stemmer = IdentityStemmer::new();

        assert_eq!(stemmer.stem("running"), "running");
        assert_eq!(stemmer.stem("flies"), "flies");
        assert_eq!(stemmer.name(), "identity");
    }

    #[test]
    fn test_stemmer_kind_from_manifest_name() {
        let kind: StemmerKind = serde_json::from_str("\"porter\"").unwrap();
        assert_eq!(kind, StemmerKind::Porter);
        assert_eq!(kind.build().name(), "porter");
        assert_eq!(StemmerKind::Krovetz.build().stem("cats"), "cat");
    }
}
