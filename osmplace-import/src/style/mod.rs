//! Rule-driven tag classification ("style").
//!
//! A style file is a JSON list of entries, each cross-multiplying a set
//! of tag keys with a map of values to flag expressions. Rules are
//! matched in declaration order; the first hit wins regardless of the
//! matcher kind. The resulting flag set decides how a tag contributes to
//! the output row: as a class-defining main tag, a name, an address
//! component, extra metadata, or not at all.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use log::info;
use serde::Deserialize;
use thiserror::Error;

mod classify;

pub use classify::{ClassifiedPlace, MainTag, ObjectRow};

/// Largest representable administrative level; out-of-range input
/// collapses to this.
pub const MAX_ADMIN_LEVEL: i32 = 15;

bitflags! {
    /// Per-tag classification flags computed by the style rules.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StyleFlags: u16 {
        const MAIN = 1 << 0;
        const MAIN_NAMED = 1 << 1;
        const MAIN_NAMED_KEY = 1 << 2;
        const MAIN_FALLBACK = 1 << 3;
        const MAIN_OPERATOR = 1 << 4;
        const NAME = 1 << 5;
        const REF = 1 << 6;
        const ADDRESS = 1 << 7;
        const ADDRESS_POINT = 1 << 8;
        const POSTCODE = 1 << 9;
        const COUNTRY = 1 << 10;
        const EXTRA = 1 << 11;
        const INTERPOLATION = 1 << 12;
        const BOUNDARY = 1 << 13;
    }
}

/// Errors raised while loading a style file. All of them abort the
/// import before any data is processed.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("failed to read style file at {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse style file at {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown style flag {token:?}")]
    UnknownFlag { token: String },
    #[error("style flag expression for value {value:?} must be a string")]
    FlagExprNotString { value: String },
    #[error("ambiguous style key \"*\"")]
    AmbiguousKey,
    #[error("prefix and suffix style keys require an empty value (key {key:?})")]
    PatternWithValue { key: String },
    #[error("style rules for OSM metadata attributes must have an empty value ({key:?})")]
    MetadataWithValue { key: String },
    #[error("style rules for OSM metadata attributes must carry exactly the \"extra\" flag ({key:?})")]
    MetadataBadFlags { key: String },
}

/// One entry of the JSON style document.
#[derive(Debug, Clone, Deserialize)]
pub struct StyleEntry {
    pub keys: Vec<String>,
    /// Tag value (or "" for any) to comma-separated flag expression.
    pub values: serde_json::Map<String, serde_json::Value>,
}

/// OSM attributes the style wants echoed into the extra column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataFields {
    pub version: bool,
    pub timestamp: bool,
    pub changeset: bool,
    pub uid: bool,
    pub user: bool,
}

impl MetadataFields {
    pub fn none(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Full { key: String, value: String },
    Key(String),
    Value(String),
    KeyPrefix(String),
    KeySuffix(String),
}

impl Matcher {
    fn matches(&self, k: &str, v: &str) -> bool {
        match self {
            Matcher::Full { key, value } => key == k && value == v,
            Matcher::Key(key) => key == k,
            Matcher::Value(value) => value == v,
            // Prefix and suffix matches are strict: a pattern covering
            // the whole key is the job of a plain key rule.
            Matcher::KeyPrefix(prefix) => prefix.len() < k.len() && k.starts_with(prefix.as_str()),
            Matcher::KeySuffix(suffix) => suffix.len() < k.len() && k.ends_with(suffix.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
struct StyleRule {
    matcher: Matcher,
    flags: StyleFlags,
}

/// The loaded, immutable rule set.
#[derive(Debug, Clone)]
pub struct GazetteerStyle {
    rules: Vec<StyleRule>,
    default_flags: StyleFlags,
    any_operator: bool,
    metadata: MetadataFields,
}

impl Default for GazetteerStyle {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_flags: StyleFlags::empty(),
            any_operator: false,
            metadata: MetadataFields::default(),
        }
    }
}

impl GazetteerStyle {
    /// Load and compile a style file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StyleError> {
        let path = path.as_ref();
        info!("parsing gazetteer style file {}", path.display());
        let data = fs::read_to_string(path).map_err(|source| StyleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<StyleEntry> =
            serde_json::from_str(&data).map_err(|source| StyleError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_entries(&entries)
    }

    /// Compile a style from already-parsed entries.
    pub fn from_entries(entries: &[StyleEntry]) -> Result<Self, StyleError> {
        let mut style = Self::default();
        for entry in entries {
            for key in &entry.keys {
                for (value, expr) in &entry.values {
                    let expr = expr.as_str().ok_or_else(|| StyleError::FlagExprNotString {
                        value: value.clone(),
                    })?;
                    let flags = parse_flags(expr)?;
                    style.add_entry(key, value, flags)?;
                }
            }
        }
        Ok(style)
    }

    pub fn metadata(&self) -> MetadataFields {
        self.metadata
    }

    pub(crate) fn any_operator(&self) -> bool {
        self.any_operator
    }

    /// Flags for a tag: first matching rule in declaration order, or the
    /// default flag set when nothing matches.
    pub fn find_flag(&self, key: &str, value: &str) -> StyleFlags {
        for rule in &self.rules {
            if rule.matcher.matches(key, value) {
                return rule.flags;
            }
        }
        self.default_flags
    }

    fn add_entry(&mut self, key: &str, value: &str, mut flags: StyleFlags) -> Result<(), StyleError> {
        if flags.contains(StyleFlags::MAIN_OPERATOR) {
            self.any_operator = true;
        }

        if key.is_empty() {
            if value.is_empty() {
                self.default_flags = flags;
            } else {
                self.rules.push(StyleRule {
                    matcher: Matcher::Value(value.to_owned()),
                    flags,
                });
            }
            return Ok(());
        }

        if key.ends_with('*') {
            if key.len() == 1 {
                return Err(StyleError::AmbiguousKey);
            }
            if !value.is_empty() {
                return Err(StyleError::PatternWithValue {
                    key: key.to_owned(),
                });
            }
            self.rules.push(StyleRule {
                matcher: Matcher::KeyPrefix(key[..key.len() - 1].to_owned()),
                flags,
            });
            return Ok(());
        }

        if let Some(suffix) = key.strip_prefix('*') {
            if !value.is_empty() {
                return Err(StyleError::PatternWithValue {
                    key: key.to_owned(),
                });
            }
            self.rules.push(StyleRule {
                matcher: Matcher::KeySuffix(suffix.to_owned()),
                flags,
            });
            return Ok(());
        }

        if key == "boundary" && (value.is_empty() || value == "administrative") {
            flags |= StyleFlags::BOUNDARY;
        }

        if is_metadata_key(key) {
            if !value.is_empty() {
                return Err(StyleError::MetadataWithValue {
                    key: key.to_owned(),
                });
            }
            if flags != StyleFlags::EXTRA {
                return Err(StyleError::MetadataBadFlags {
                    key: key.to_owned(),
                });
            }
            self.enable_metadata(key);
            return Ok(());
        }

        let matcher = if value.is_empty() {
            Matcher::Key(key.to_owned())
        } else {
            Matcher::Full {
                key: key.to_owned(),
                value: value.to_owned(),
            }
        };
        self.rules.push(StyleRule { matcher, flags });
        Ok(())
    }

    fn enable_metadata(&mut self, key: &str) {
        match key {
            "osm_version" => self.metadata.version = true,
            "osm_timestamp" => self.metadata.timestamp = true,
            "osm_changeset" => self.metadata.changeset = true,
            "osm_uid" => self.metadata.uid = true,
            "osm_user" => self.metadata.user = true,
            _ => unreachable!("checked by is_metadata_key"),
        }
    }
}

fn is_metadata_key(key: &str) -> bool {
    matches!(
        key,
        "osm_version" | "osm_timestamp" | "osm_changeset" | "osm_uid" | "osm_user"
    )
}

/// Parse a comma-separated flag expression. `skip` wins over everything
/// else in the same expression.
fn parse_flags(expr: &str) -> Result<StyleFlags, StyleError> {
    let mut out = StyleFlags::empty();
    for token in expr.split(',') {
        match token {
            "skip" => return Ok(StyleFlags::empty()),
            "main" => out |= StyleFlags::MAIN,
            "with_name_key" => out |= StyleFlags::MAIN_NAMED_KEY,
            "with_name" => out |= StyleFlags::MAIN_NAMED,
            "fallback" => out |= StyleFlags::MAIN_FALLBACK,
            "operator" => out |= StyleFlags::MAIN_OPERATOR,
            "name" => out |= StyleFlags::NAME,
            "ref" => out |= StyleFlags::REF,
            "address" => out |= StyleFlags::ADDRESS,
            "house" => out |= StyleFlags::ADDRESS_POINT,
            "postcode" => out |= StyleFlags::POSTCODE,
            "country" => out |= StyleFlags::COUNTRY,
            "extra" => out |= StyleFlags::EXTRA,
            "interpolation" => out |= StyleFlags::INTERPOLATION,
            _ => {
                return Err(StyleError::UnknownFlag {
                    token: token.to_owned(),
                })
            }
        }
    }
    Ok(out)
}
