//! `-x` / `--name` flags.

use crate::{BufsyncError, Result};
use regex::Regex;
use std::sync::LazyLock;

static LONG_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^--([a-zA-Z0-9-]+)(?:=(.*))?").expect("long flag regex must compile")
});

static SHORT_FLAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^-([a-zA-Z0-9])(.*)").expect("short flag regex must compile")
});

/// Value of a flag: one occurrence or several, in argument order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FlagValue {
    /// Every value given for the flag.
    pub fn values(&self) -> &[String] {
        match self {
            FlagValue::Single(value) => std::slice::from_ref(value),
            FlagValue::Multiple(values) => values,
        }
    }

    /// The last value given, which is what a plain lookup usually wants.
    pub fn last(&self) -> &str {
        self.values().last().map(String::as_str).unwrap_or("")
    }

    fn push(&mut self, value: String) {
        match self {
            FlagValue::Single(first) => {
                *self = FlagValue::Multiple(vec![std::mem::take(first), value]);
            }
            FlagValue::Multiple(values) => values.push(value),
        }
    }
}

/// Parsed flags, keyed by name without dashes, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    entries: Vec<(String, FlagValue)>,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `key`, accumulating repeated flags.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((key, FlagValue::Single(value))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FlagValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split `args` into flags and everything else.
///
/// A literal `--` stops parsing; it and every argument after it are returned
/// untouched. Tokens that are not flags are kept in order. A token is a flag
/// when it starts with one; `--name!` is the bare flag `name`.
pub fn parse_flags<S: AsRef<str>>(args: &[S]) -> (Flags, Vec<String>) {
    let mut flags = Flags::new();
    let mut residue = Vec::new();

    for (i, arg) in args.iter().enumerate() {
        let arg = arg.as_ref();
        if arg == "--" {
            residue.extend(args[i..].iter().map(|a| a.as_ref().to_string()));
            break;
        }
        match parse_flag(arg) {
            Some((key, value)) => flags.insert(key, value),
            None => residue.push(arg.to_string()),
        }
    }

    (flags, residue)
}

fn parse_flag(arg: &str) -> Option<(&str, &str)> {
    [&*LONG_FLAG, &*SHORT_FLAG].into_iter().find_map(|pattern| {
        let captures = pattern.captures(arg)?;
        let key = captures.get(1)?.as_str();
        let value = captures.get(2).map_or("", |m| m.as_str());
        Some((key, value))
    })
}

/// Render a flag name the way it was written: `-x` or `--name`.
fn flag_token(key: &str) -> String {
    if key.chars().count() == 1 {
        format!("-{}", key)
    } else {
        format!("--{}", key)
    }
}

/// Fail with `UnknownFlag` for the first flag not in `known`.
pub fn validate_flags(flags: &Flags, known: &[&str]) -> Result<()> {
    match flags.keys().find(|key| !known.contains(key)) {
        Some(key) => Err(BufsyncError::UnknownFlag {
            flag: flag_token(key),
        }),
        None => Ok(()),
    }
}

/// Tokens for one flag. An empty value renders the bare flag.
pub fn format_flag(key: &str, value: &FlagValue) -> Vec<String> {
    let token = flag_token(key);
    let short = key.chars().count() == 1;
    value
        .values()
        .iter()
        .map(|v| match (v.is_empty(), short) {
            (true, _) => token.clone(),
            (false, true) => format!("{}{}", token, v),
            (false, false) => format!("{}={}", token, v),
        })
        .collect()
}

/// Tokens for `flags`, optionally only those named in `includes`.
pub fn format_flags(flags: &Flags, includes: Option<&[&str]>) -> Vec<String> {
    flags
        .iter()
        .filter(|(key, _)| includes.map_or(true, |inc| inc.contains(key)))
        .flat_map(|(key, value)| format_flag(key, value))
        .collect()
}
