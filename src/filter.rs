//! Object filtering: id/type allow-lists, name globs, and removal of
//! deprecated or revoked content.

use crate::decoders::Decoder;
use crate::types::StixObject;
use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;

/// Chainable object filter. An empty allow-list means "allow everything".
#[derive(Debug, Clone, Default)]
pub struct ObjectFilter {
    ids: FxHashSet<String>,
    types: FxHashSet<String>,
    names: Vec<NamePattern>,
    include_deprecated: bool,
    include_revoked: bool,
}

impl ObjectFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Add case-insensitive shell-style patterns matched against names and aliases.
    pub fn with_names<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names
            .extend(patterns.into_iter().map(|p| NamePattern::new(p.as_ref())));
        self
    }

    pub fn include_deprecated(mut self, include: bool) -> Self {
        self.include_deprecated = include;
        self
    }

    pub fn include_revoked(mut self, include: bool) -> Self {
        self.include_revoked = include;
        self
    }

    /// True if the object survives every configured criterion.
    pub fn matches(&self, o: &StixObject, decoders: &[Decoder]) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(o.id()) {
            return false;
        }

        if !self.types.is_empty() && !self.types.contains(o.stix_type()) {
            return false;
        }

        if !self.names.is_empty() {
            let names: FxHashSet<String> = decoders.iter().flat_map(|d| d.names(o)).collect();
            let matched = names
                .iter()
                .any(|name| self.names.iter().any(|p| p.is_match(name)));
            if !matched {
                return false;
            }
        }

        if !self.include_deprecated && is_deprecated(o, decoders) {
            return false;
        }

        if !self.include_revoked && is_revoked(o, decoders) {
            return false;
        }

        true
    }

    pub fn apply(&self, objects: Vec<StixObject>, decoders: &[Decoder]) -> Vec<StixObject> {
        let before = objects.len();
        let kept: Vec<StixObject> = objects
            .into_iter()
            .filter(|o| self.matches(o, decoders))
            .collect();
        tracing::debug!("Filter kept {} of {} objects", kept.len(), before);
        kept
    }
}

/// Deprecated according to any of the decoders.
pub fn is_deprecated(o: &StixObject, decoders: &[Decoder]) -> bool {
    decoders.iter().any(|d| d.is_deprecated(o))
}

/// Revoked according to any of the decoders.
pub fn is_revoked(o: &StixObject, decoders: &[Decoder]) -> bool {
    decoders.iter().any(|d| d.is_revoked(o))
}

/// A case-insensitive fnmatch-style pattern (`*`, `?`, `[seq]`, `[!seq]`).
#[derive(Debug, Clone)]
pub struct NamePattern {
    raw: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(Regex),
    /// Patterns whose character classes do not compile match literally.
    Literal(String),
}

impl NamePattern {
    pub fn new(pattern: &str) -> Self {
        let matcher = match RegexBuilder::new(&translate_glob(pattern))
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Matcher::Glob(regex),
            Err(e) => {
                tracing::warn!("Treating {:?} as a literal name: {}", pattern, e);
                Matcher::Literal(pattern.to_lowercase())
            }
        };
        Self { raw: pattern.to_string(), matcher }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        match &self.matcher {
            Matcher::Glob(regex) => regex.is_match(candidate),
            Matcher::Literal(literal) => candidate.to_lowercase() == *literal,
        }
    }
}

/// True if any string matches any pattern, ignoring case.
pub fn any_string_matches_any_pattern<S: AsRef<str>>(strings: &[S], patterns: &[NamePattern]) -> bool {
    strings
        .iter()
        .any(|s| patterns.iter().any(|p| p.is_match(s.as_ref())))
}

/// Translate a shell glob into an anchored regular expression.
fn translate_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // Find the closing bracket; a ']' right after '[' or '[!' is literal.
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str("\\[");
                    continue;
                }

                let mut body = &chars[i..j];
                i = j + 1;
                out.push('[');
                if body.first() == Some(&'!') {
                    out.push('^');
                    body = &body[1..];
                } else if body.first() == Some(&'^') {
                    out.push_str("\\^");
                    body = &body[1..];
                }
                for &member in body {
                    // Characters with set-operation meaning inside a regex class.
                    if matches!(member, '\\' | '[' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(member);
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}
