//! Named variables and `{{ name }}` substitution.
//!
//! Variables flow into a run from three places, lowest priority first:
//!
//! | Source                    | Example                          |
//! |---------------------------|----------------------------------|
//! | Plan `[variables]` table  | `app_name = "demo"`              |
//! | Answers recorded in a run | prompt answers, gate decisions   |
//! | Command line              | `--var model_name=account`       |
//!
//! Rendering is deliberately minimal: placeholders are replaced verbatim,
//! there are no filters, loops or conditionals.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainError;

/// An ordered `name -> value` map used to render steps and resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables(BTreeMap<String, String>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Read a variable as a boolean flag.
    ///
    /// Accepts `true/false`, `yes/no`, `y/n`, `1/0` and `on/off`
    /// (case-insensitive). Anything else is `None`.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(parse_flag)
    }

    /// Layer `other` on top of `self`; entries in `other` win.
    pub fn merged(&self, other: &Variables) -> Variables {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.set(k, v);
        }
        out
    }

    /// Replace every `{{ name }}` placeholder in `text`.
    ///
    /// # Errors
    /// - `UnresolvedVariable` when a placeholder names an unknown variable
    /// - `MalformedTemplate` on an unterminated `{{` or an empty name
    pub fn render(&self, text: &str) -> Result<String, DomainError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or_else(|| DomainError::MalformedTemplate {
                    reason: format!("unterminated placeholder near '{}'", preview(&rest[start..])),
                })?;

            let name = after_open[..end].trim();
            if name.is_empty() {
                return Err(DomainError::MalformedTemplate {
                    reason: "empty placeholder {{}}".into(),
                });
            }

            let value = self
                .get(name)
                .ok_or_else(|| DomainError::UnresolvedVariable { name: name.into() })?;
            out.push_str(value);
            rest = &after_open[end + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

impl FromIterator<(String, String)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{}", pairs.join(" "))
    }
}

/// A single `key=value` assignment, as passed with `--var`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

impl FromStr for Assignment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s.split_once('=').ok_or_else(|| DomainError::InvalidAssignment {
            input: s.into(),
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidAssignment { input: s.into() });
        }
        Ok(Self {
            name: name.into(),
            value: value.into(),
        })
    }
}

pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn preview(s: &str) -> String {
    s.chars().take(24).collect()
}
