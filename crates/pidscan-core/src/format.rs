//! Format-template text correction
//!
//! A format template is a literal example of the expected text, like
//! `"FI-12345"` or `"XX-99-YY"`. The corrector reshapes OCR output toward that
//! letter/digit/delimiter grammar, fixing the usual `1/I` and `0/O`
//! confusions. It is lenient: input is never rejected.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Registry key of the format applied when no class-specific one exists
pub const GLOBAL_FORMAT_KEY: &str = "__global__";

const TAG_PATTERN: &str = r"^([A-Z0-9]+?)([-_\s]?)(\d.*)$";

/// One run of a parsed format template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Letters(usize),
    Digits(usize),
    Delimiter(char),
}

impl Section {
    /// Parse an example string into sections; letters are compared uppercased
    pub fn parse(template: &str) -> Vec<Section> {
        let mut sections: Vec<Section> = Vec::new();
        for c in template.to_uppercase().chars() {
            let next = if c.is_alphabetic() {
                Section::Letters(1)
            } else if c.is_ascii_digit() {
                Section::Digits(1)
            } else {
                Section::Delimiter(c)
            };
            match (sections.last_mut(), next) {
                (Some(Section::Letters(n)), Section::Letters(_)) => *n += 1,
                (Some(Section::Digits(n)), Section::Digits(_)) => *n += 1,
                _ => sections.push(next),
            }
        }
        sections
    }
}

/// How far a section may stretch past its template count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionAllowance {
    /// Extra characters for a leading letters section, or one after a delimiter
    pub extra_letters: usize,
    /// Extra characters for a digits section
    pub extra_digits: usize,
    /// Extra characters for a letters section that ends the template
    pub trailing_letters: usize,
}

impl Default for CorrectionAllowance {
    fn default() -> Self {
        Self {
            extra_letters: 2,
            extra_digits: 1,
            trailing_letters: 1,
        }
    }
}

fn as_letter(c: char) -> char {
    match c {
        '1' => 'I',
        '0' => 'O',
        other => other,
    }
}

fn as_digit(c: char) -> char {
    match c {
        'I' => '1',
        'O' => '0',
        other => other,
    }
}

/// Correct `raw` against `template` with the default allowances
pub fn correct(raw: &str, template: &str) -> String {
    correct_with(raw, template, CorrectionAllowance::default())
}

/// Correct `raw` against `template`
///
/// Returns `raw` unchanged when either input is empty.
pub fn correct_with(raw: &str, template: &str, allowance: CorrectionAllowance) -> String {
    if raw.is_empty() || template.is_empty() {
        return raw.to_string();
    }

    let sections = Section::parse(template);
    let text: Vec<char> = raw.to_uppercase().chars().collect();
    let mut out = String::with_capacity(text.len() + 2);
    let mut pos = 0;

    for (idx, section) in sections.iter().enumerate() {
        let is_last = idx + 1 == sections.len();
        let after_delimiter = idx > 0 && matches!(sections[idx - 1], Section::Delimiter(_));

        match *section {
            Section::Delimiter(d) => {
                if let Some(&c) = text.get(pos) {
                    // a missing delimiter is skipped
                    if c == d || !c.is_alphanumeric() {
                        out.push(c);
                        pos += 1;
                    }
                }
            }
            Section::Letters(n) => {
                let max = if idx == 0 || after_delimiter {
                    n + allowance.extra_letters
                } else if is_last {
                    n + allowance.trailing_letters
                } else {
                    n
                };
                let mut consumed = 0;
                while consumed < max {
                    let Some(&c) = text.get(pos) else { break };
                    if !c.is_alphanumeric() {
                        break;
                    }
                    if c.is_ascii_digit() && (consumed >= n || !matches!(c, '1' | '0')) {
                        break;
                    }
                    out.push(as_letter(c));
                    consumed += 1;
                    pos += 1;
                }
                if n >= 2 && consumed == 1 {
                    // OCR commonly drops a short ascender
                    out.push('I');
                }
            }
            Section::Digits(n) => {
                let max = n + allowance.extra_digits;
                let mut consumed = 0;
                while consumed < max {
                    let Some(&c) = text.get(pos) else { break };
                    if !c.is_alphanumeric() {
                        break;
                    }
                    if c.is_alphabetic() && (consumed >= n || !matches!(c, 'I' | 'O')) {
                        break;
                    }
                    out.push(as_digit(c));
                    consumed += 1;
                    pos += 1;
                }
            }
        }
    }

    for &c in &text[pos.min(text.len())..] {
        if c.is_alphabetic() || c == '1' || c == '0' {
            out.push(as_letter(c));
        } else {
            out.push(c);
        }
    }

    if out != raw {
        debug!("format '{}': '{}' -> '{}'", template, raw, out);
    }
    out
}

/// Template-less correction for `LETTERS[-]NUMBER` style tags
#[derive(Debug, Clone)]
pub struct TagNormalizer {
    pattern: Regex,
}

impl TagNormalizer {
    pub fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(TAG_PATTERN)?,
        })
    }

    /// Unmatched text comes back uppercased
    pub fn normalize(&self, text: &str) -> String {
        let upper = text.to_uppercase();
        match self.pattern.captures(&upper) {
            Some(caps) => {
                let letters: String = caps[1].chars().map(as_letter).collect();
                let digits: String = caps[3].chars().map(as_digit).collect();
                format!("{}{}{}", letters, &caps[2], digits)
            }
            None => upper,
        }
    }
}

/// Per-class format templates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatRegistry {
    formats: BTreeMap<String, String>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a single global format
    pub fn global(template: impl Into<String>) -> Self {
        let mut registry = Self::new();
        registry.insert(GLOBAL_FORMAT_KEY, template);
        registry
    }

    pub fn insert(&mut self, class: impl Into<String>, template: impl Into<String>) {
        self.formats.insert(class.into(), template.into());
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Format for a detection
    ///
    /// Tried in order: class name from the model id (prefix before the first
    /// `_`), the detection label, the global entry, then the only entry when
    /// exactly one is registered.
    pub fn lookup(&self, model_id: &str, label: &str) -> Option<&str> {
        let class = model_id.split('_').next().unwrap_or(model_id);
        if !class.is_empty() {
            if let Some(f) = self.formats.get(class) {
                return Some(f);
            }
        }
        if let Some(f) = self.formats.get(label) {
            return Some(f);
        }
        if let Some(f) = self.formats.get(GLOBAL_FORMAT_KEY) {
            return Some(f);
        }
        if self.formats.len() == 1 {
            return self.formats.values().next().map(String::as_str);
        }
        None
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormatRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            formats: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        assert_eq!(
            Section::parse("xx-99-yy"),
            vec![
                Section::Letters(2),
                Section::Delimiter('-'),
                Section::Digits(2),
                Section::Delimiter('-'),
                Section::Letters(2),
            ]
        );
        assert_eq!(
            Section::parse("A1 B"),
            vec![
                Section::Letters(1),
                Section::Digits(1),
                Section::Delimiter(' '),
                Section::Letters(1),
            ]
        );
    }

    #[test]
    fn test_fixes_confusables_on_both_sides() {
        assert_eq!(correct("F1-I2345", "FI-12345"), "FI-12345");
        assert_eq!(correct("fi-1234o", "FI-12345"), "FI-12340");
    }

    #[test]
    fn test_empty_inputs_pass_through() {
        assert_eq!(correct("", "FI-12345"), "");
        assert_eq!(correct("f1-100", ""), "f1-100");
    }

    #[test]
    fn test_missing_delimiter_is_not_inserted() {
        assert_eq!(correct("FII2345", "FI-12345"), "FII2345");
        assert_eq!(correct("FIO2345", "FI-12345"), "FIO2345");
    }

    #[test]
    fn test_well_formed_is_unchanged() {
        assert_eq!(correct("AB-123", "AB-123"), "AB-123");
        assert_eq!(correct("TT-0042-B", "XX-9999-Y"), "TT-0042-B");
    }

    #[test]
    fn test_substituted_delimiter_is_kept() {
        assert_eq!(correct("FI_1O1", "FI-123"), "FI_101");
    }

    #[test]
    fn test_single_letter_gets_synthetic_i() {
        // "F" then a real digit: the letters section stops after one char
        assert_eq!(correct("F-1234", "FI-1234"), "FI-1234");
    }

    #[test]
    fn test_trailing_text_is_normalized_as_letters() {
        // digits section takes at most 4 chars, leftovers become letters
        assert_eq!(correct("PT-1001X0", "PT-100"), "PT-1001XO");
    }

    #[test]
    fn test_normalize_tag() -> std::result::Result<(), regex::Error> {
        let tags = TagNormalizer::new()?;
        assert_eq!(tags.normalize("fi-1O1"), "FI-101");
        assert_eq!(tags.normalize("TI 1OI"), "TI 101");
        // the number part starts at the first digit
        assert_eq!(tags.normalize("F1-1O1"), "F1-101");
        assert_eq!(tags.normalize("pump"), "PUMP");
        assert_eq!(tags.normalize(""), "");
        Ok(())
    }

    #[test]
    fn test_registry_lookup_chain() {
        let registry: FormatRegistry = [("flow", "FI-12345"), ("PT", "PT-100"), (GLOBAL_FORMAT_KEY, "XX-99")]
            .into_iter()
            .collect();
        assert_eq!(registry.lookup("flow_2024", "FI"), Some("FI-12345"));
        assert_eq!(registry.lookup("pressure_1", "PT"), Some("PT-100"));
        assert_eq!(registry.lookup("level_1", "LT"), Some("XX-99"));

        let single = FormatRegistry::from_iter([("anything", "AB-12")]);
        assert_eq!(single.lookup("x_1", "y"), Some("AB-12"));

        let two = FormatRegistry::from_iter([("a", "A-1"), ("b", "B-2")]);
        assert_eq!(two.lookup("c_1", "d"), None);
    }

    #[test]
    fn test_registry_deserializes_as_map() {
        let registry: FormatRegistry = serde_json::from_str(r#"{"__global__":"FI-12345"}"#).unwrap();
        assert_eq!(registry, FormatRegistry::global("FI-12345"));
    }
}
