//! Dotted module names and entry-point specifiers.
//!
//! [`ModuleName`] is a semantic wrapper over the segments of a dotted Python
//! module path. It supports the structural operations the resolver needs:
//! walking up the package hierarchy and joining relative-import tails.

use crate::error::{ForgeError, Result};
use std::fmt;

/// A non-empty dotted module name such as `app.main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleName(Vec<String>);

impl ModuleName {
    /// Parse a dotted name.
    ///
    /// Returns `None` for the empty string or names with empty segments
    /// (`a..b`, leading or trailing dots).
    #[must_use]
    pub fn parse(dotted: &str) -> Option<Self> {
        if dotted.is_empty() {
            return None;
        }
        let segments: Vec<String> = dotted.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self(segments))
    }

    /// Build a name from pre-split segments.
    ///
    /// Returns `None` if `segments` is empty or contains an empty segment.
    #[must_use]
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Option<Self> {
        if segments.is_empty() || segments.iter().any(|s| s.as_ref().is_empty()) {
            return None;
        }
        Some(Self(segments.iter().map(|s| s.as_ref().to_owned()).collect()))
    }

    /// The segments of the name.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The dotted representation.
    #[must_use]
    pub fn as_dotted(&self) -> String {
        self.0.join(".")
    }

    /// The first segment.
    #[must_use]
    pub fn head(&self) -> &str {
        // Invariant: segments are non-empty.
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// The last segment.
    #[must_use]
    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; module names have at least one segment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The containing package, or `None` for a top-level name.
    #[must_use]
    pub fn parent(&self) -> Option<ModuleName> {
        self.strip_last(1)
    }

    /// Remove `n` segments from the end.
    ///
    /// This is a structural operation: it walks upward in the module
    /// hierarchy. Returns `None` if removing `n` segments would erase the
    /// name entirely.
    #[must_use]
    pub fn strip_last(&self, n: usize) -> Option<ModuleName> {
        if n >= self.0.len() {
            return None;
        }
        Some(ModuleName(self.0[..self.0.len() - n].to_vec()))
    }

    /// Append segments (used when resolving relative imports).
    #[must_use]
    pub fn join<I>(&self, tail: I) -> ModuleName
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut segments = self.0.clone();
        segments.extend(tail.into_iter().map(|s| s.as_ref().to_owned()));
        ModuleName(segments)
    }

    /// Iterate from the immediate parent up to the top-level name.
    ///
    /// `a.b.c` yields `a.b` then `a`.
    pub fn ancestors(&self) -> impl Iterator<Item = ModuleName> + '_ {
        (1..self.0.len()).filter_map(move |n| self.strip_last(n))
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_dotted())
    }
}

/// A parsed entry-point specifier, `"<dotted.module.path>:<function>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// The module to import.
    pub module: ModuleName,
    /// The function to invoke within that module.
    pub function: String,
}

impl EntryPoint {
    /// Parse an entry-point specifier, splitting on the first colon.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::InvalidEntryPoint`] when the colon is missing,
    /// the module path is not a valid dotted name, or the function name is
    /// empty.
    pub fn parse(spec: &str) -> Result<Self> {
        let Some((module_part, function)) = spec.split_once(':') else {
            return Err(ForgeError::InvalidEntryPoint {
                spec: spec.to_owned(),
                reason: "expected <dotted.module.path>:<function>".to_owned(),
            });
        };
        let module =
            ModuleName::parse(module_part).ok_or_else(|| ForgeError::InvalidEntryPoint {
                spec: spec.to_owned(),
                reason: format!("{module_part:?} is not a dotted module path"),
            })?;
        if function.is_empty() {
            return Err(ForgeError::InvalidEntryPoint {
                spec: spec.to_owned(),
                reason: "function name is empty".to_owned(),
            });
        }
        Ok(Self {
            module,
            function: function.to_owned(),
        })
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::single("sys", 1)]
    #[case::dotted("app.main", 2)]
    #[case::deep("a.b.c.d", 4)]
    fn parse_accepts_valid_names(#[case] dotted: &str, #[case] segments: usize) {
        let name = ModuleName::parse(dotted).expect("valid name");
        assert_eq!(name.len(), segments);
        assert_eq!(name.as_dotted(), dotted);
    }

    #[rstest]
    #[case::empty("")]
    #[case::leading_dot(".app")]
    #[case::trailing_dot("app.")]
    #[case::double_dot("a..b")]
    fn parse_rejects_malformed_names(#[case] dotted: &str) {
        assert!(ModuleName::parse(dotted).is_none());
    }

    #[test]
    fn ancestors_walk_upward() {
        let name = ModuleName::parse("a.b.c").expect("valid name");
        let ancestors: Vec<String> = name.ancestors().map(|m| m.as_dotted()).collect();
        assert_eq!(ancestors, vec!["a.b".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn strip_last_refuses_to_erase_the_name() {
        let name = ModuleName::parse("a.b").expect("valid name");
        assert_eq!(name.strip_last(1), ModuleName::parse("a"));
        assert!(name.strip_last(2).is_none());
    }

    #[test]
    fn join_appends_segments() {
        let base = ModuleName::parse("pkg").expect("valid name");
        assert_eq!(base.join(["sub", "mod"]).as_dotted(), "pkg.sub.mod");
    }

    #[test]
    fn entry_point_splits_on_first_colon() {
        let entry = EntryPoint::parse("app.main:run").expect("valid entry");
        assert_eq!(entry.module.as_dotted(), "app.main");
        assert_eq!(entry.function, "run");
    }

    #[test]
    fn entry_point_keeps_later_colons_in_function() {
        let entry = EntryPoint::parse("app:run:extra").expect("valid entry");
        assert_eq!(entry.function, "run:extra");
    }

    #[rstest]
    #[case::no_colon("app.main")]
    #[case::empty_function("app.main:")]
    #[case::empty_module(":run")]
    #[case::bad_module("app..main:run")]
    fn entry_point_rejects_malformed_specs(#[case] spec: &str) {
        assert!(matches!(
            EntryPoint::parse(spec),
            Err(ForgeError::InvalidEntryPoint { .. })
        ));
    }
}
