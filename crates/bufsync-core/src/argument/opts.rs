//! `++name=value` options, as accepted by the host's `:edit`.

use super::flags::parse_flags;
use crate::{BufsyncError, Result};
use regex::Regex;
use std::sync::LazyLock;

static OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\+\+([a-zA-Z0-9-]+)(?:=(.*))?").expect("option regex must compile")
});

/// Parsed `++` options in first-seen order. A repeated option keeps the last
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Opts {
    entries: Vec<(String, String)>,
}

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split `args` into `++` options and everything else.
///
/// Stops at a literal `--` like [`parse_flags`].
pub fn parse_opts<S: AsRef<str>>(args: &[S]) -> (Opts, Vec<String>) {
    let mut opts = Opts::new();
    let mut residue = Vec::new();

    for (i, arg) in args.iter().enumerate() {
        let arg = arg.as_ref();
        if arg == "--" {
            residue.extend(args[i..].iter().map(|a| a.as_ref().to_string()));
            break;
        }
        match OPTION.captures(arg) {
            Some(captures) => {
                let value = captures.get(2).map_or("", |m| m.as_str());
                opts.insert(&captures[1], value);
            }
            None => residue.push(arg.to_string()),
        }
    }

    (opts, residue)
}

/// Fail with `UnknownOption` for the first option not in `known`.
pub fn validate_opts(opts: &Opts, known: &[&str]) -> Result<()> {
    match opts.iter().find(|(key, _)| !known.contains(key)) {
        Some((key, _)) => Err(BufsyncError::UnknownOption {
            option: format!("++{}", key),
        }),
        None => Ok(()),
    }
}

/// Token for one option. An empty value renders the bare option.
pub fn format_opt(key: &str, value: &str) -> String {
    if value.is_empty() {
        format!("++{}", key)
    } else {
        format!("++{}={}", key, value)
    }
}

/// Tokens for `opts`, optionally only those named in `includes`.
pub fn format_opts(opts: &Opts, includes: Option<&[&str]>) -> Vec<String> {
    opts.iter()
        .filter(|(key, _)| includes.map_or(true, |inc| inc.contains(key)))
        .map(|(key, value)| format_opt(key, value))
        .collect()
}

/// Split `args` into options, flags and the remaining arguments.
pub fn parse<S: AsRef<str>>(args: &[S]) -> (Opts, super::Flags, Vec<String>) {
    let (opts, intermediate) = parse_opts(args);
    let (flags, residue) = parse_flags(&intermediate);
    (opts, flags, residue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_opts_last_value_wins() {
        let (opts, residue) = parse_opts(&["++enc=sjis", "++bin", "file", "++enc=euc-jp"]);
        assert_eq!(opts.get("enc"), Some("euc-jp"));
        assert_eq!(opts.get("bin"), Some(""));
        assert_eq!(residue, vec!["file"]);
    }

    #[test]
    fn test_parse_opts_reads_name_prefix() {
        let (opts, residue) = parse_opts(&["++bin!", "++enc=cp932!", "+cmd"]);
        assert_eq!(opts.get("bin"), Some(""));
        assert_eq!(opts.get("enc"), Some("cp932!"));
        assert_eq!(residue, vec!["+cmd"]);
    }

    #[test]
    fn test_validate_opts() {
        let (opts, _) = parse_opts(&["++enc=sjis", "++foo"]);
        let err = validate_opts(&opts, &["enc", "ff"]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown option '++foo' is specified.");
    }

    #[test]
    fn test_format_opts() {
        let (opts, _) = parse_opts(&["++enc=sjis", "++bin"]);
        assert_eq!(format_opts(&opts, None), vec!["++enc=sjis", "++bin"]);
        assert_eq!(format_opts(&opts, Some(&["bin"])), vec!["++bin"]);
    }

    #[test]
    fn test_parse_splits_all_three() {
        let (opts, flags, residue) =
            parse(&["++ff=dos", "-v", "--name=x", "a.txt", "--", "++enc=sjis"]);
        assert_eq!(opts.get("ff"), Some("dos"));
        assert!(flags.contains_key("v"));
        assert_eq!(flags.get("name").unwrap().last(), "x");
        assert_eq!(residue, vec!["a.txt", "--", "++enc=sjis"]);
    }
}
