//! `${NAME}` / `${NAME:default}` placeholder expansion
//!
//! Runs on raw bytes before a document is decoded, so placeholders may sit
//! anywhere in the text: inside strings, as bare scalars, or in keys.
//!
//! Resolution order for each placeholder:
//! 1. the variable's value if it is set, even when empty;
//! 2. the inline default if one is given and non-empty;
//! 3. otherwise the name is recorded as unresolved.
//!
//! Every unresolved name is collected before failing, so one error lists
//! all of them.

use crate::core::{ConfigError, ConfigResult};
use regex::bytes::{Captures, Regex};
use std::borrow::Cow;
use std::ffi::OsString;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("placeholder pattern is valid")
});

/// Expand placeholders using the process environment
///
/// Values are spliced in as raw bytes; on unix a non-UTF-8 value passes
/// through unchanged.
pub fn substitute(input: &[u8]) -> ConfigResult<Cow<'_, [u8]>> {
    expand_with(input, |name| std::env::var_os(name).map(os_bytes))
}

/// Expand placeholders with a custom variable lookup
///
/// Input without any placeholder is returned borrowed.
pub fn substitute_with<F>(input: &[u8], lookup: F) -> ConfigResult<Cow<'_, [u8]>>
where
    F: Fn(&str) -> Option<String>,
{
    expand_with(input, |name| lookup(name).map(String::into_bytes))
}

#[cfg(unix)]
fn os_bytes(value: OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    value.into_vec()
}

#[cfg(not(unix))]
fn os_bytes(value: OsString) -> Vec<u8> {
    value.to_string_lossy().into_owned().into_bytes()
}

fn expand_with<F>(input: &[u8], lookup: F) -> ConfigResult<Cow<'_, [u8]>>
where
    F: Fn(&str) -> Option<Vec<u8>>,
{
    let mut unresolved: Vec<String> = Vec::new();

    let output = PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| {
        let name = String::from_utf8_lossy(&caps[1]);

        if let Some(value) = lookup(&name) {
            return value;
        }

        if let Some(default) = caps.get(2).filter(|d| !d.as_bytes().is_empty()) {
            return default.as_bytes().to_vec();
        }

        if !unresolved.iter().any(|n| *n == name) {
            unresolved.push(name.into_owned());
        }
        caps[0].to_vec()
    });

    if unresolved.is_empty() {
        Ok(output)
    } else {
        Err(ConfigError::unresolved(unresolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn expand(input: &str, pairs: &[(&str, &str)]) -> ConfigResult<String> {
        substitute_with(input.as_bytes(), env(pairs))
            .map(|out| String::from_utf8(out.into_owned()).unwrap())
    }

    #[rstest]
    #[case::set_variable("port: ${PORT}", &[("PORT", "8080")], "port: 8080")]
    #[case::set_beats_default("port: ${PORT:80}", &[("PORT", "8080")], "port: 8080")]
    #[case::empty_value_beats_default("v: '${V:fallback}'", &[("V", "")], "v: ''")]
    #[case::default_used("port: ${PORT:80}", &[], "port: 80")]
    #[case::default_with_colons("url: ${URL:http://localhost:80}", &[], "url: http://localhost:80")]
    #[case::several_in_one_line("${A}-${B:b}-${A}", &[("A", "a")], "a-b-a")]
    #[case::placeholder_as_key("${KEY:name}: 1", &[], "name: 1")]
    #[case::no_placeholders("plain: text", &[], "plain: text")]
    #[case::dollar_without_brace("cost: $5", &[], "cost: $5")]
    fn expands(#[case] input: &str, #[case] vars: &[(&str, &str)], #[case] expected: &str) {
        assert_eq!(expand(input, vars).unwrap(), expected);
    }

    #[test]
    fn collects_every_unresolved_name() {
        let err = expand("a: ${A}\nb: ${B}\nc: ${C:ok}\nd: ${A}", &[]).unwrap_err();
        assert_eq!(err, ConfigError::unresolved(vec!["A".into(), "B".into()]));
    }

    #[test]
    fn empty_default_counts_as_missing() {
        let err = expand("a: ${A:}", &[]).unwrap_err();
        assert_eq!(err, ConfigError::unresolved(vec!["A".into()]));
    }

    #[test]
    fn untouched_input_is_borrowed() {
        let input = b"{\"a\": 1}";
        let out = substitute_with(input, |_| None).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn raw_bytes_are_spliced_verbatim() {
        let out = expand_with(b"v: ${X}", |_| Some(vec![0xff, b'a'])).unwrap();
        assert_eq!(out.as_ref(), b"v: \xffa");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_os_values_keep_their_bytes() {
        use std::os::unix::ffi::OsStringExt;
        assert_eq!(os_bytes(OsString::from_vec(vec![b'x', 0xfe])), vec![b'x', 0xfe]);
    }

    #[test]
    fn process_environment_lookup() {
        // PATH is set in every test environment we run in.
        let out = substitute(b"${PATH}").unwrap();
        assert!(!out.is_empty());
        assert_ne!(out.as_ref(), b"${PATH}");
    }
}
