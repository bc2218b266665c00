//! Per-object tag classification and row emission.
//!
//! [`ClassifiedPlace`] is a scratch buffer: cleared before each object,
//! filled by one left-to-right pass over its tags, then consumed by
//! `copy_out`. Allocations are retained across objects.

use std::io;

use chrono::DateTime;

use osmplace_core::{ObjectMeta, ObjectType, OsmId, Tag, TagList};

use crate::output::{CopyWriter, SinkError, TableTarget};

use super::{GazetteerStyle, StyleFlags, MAX_ADMIN_LEVEL};

/// A class/type pair that will become one output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainTag {
    pub class: String,
    /// Becomes the row's `type` column.
    pub value: String,
    pub flags: StyleFlags,
}

impl MainTag {
    fn new(class: impl Into<String>, value: impl Into<String>, flags: StyleFlags) -> Self {
        Self {
            class: class.into(),
            value: value.into(),
            flags,
        }
    }
}

/// Borrowed view of the OSM object a row is emitted for.
#[derive(Debug, Clone, Copy)]
pub struct ObjectRow<'a> {
    pub otype: ObjectType,
    pub id: OsmId,
    pub tags: &'a TagList,
    pub meta: &'a ObjectMeta,
}

/// Scratch result of classifying one object's tags.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedPlace {
    main_tags: Vec<MainTag>,
    names: Vec<(String, String)>,
    address: Vec<(String, String)>,
    extra: Vec<(String, String)>,
    operator: Option<String>,
    admin_level: i32,
    is_named: bool,
}

impl ClassifiedPlace {
    pub fn new() -> Self {
        Self {
            admin_level: MAX_ADMIN_LEVEL,
            ..Self::default()
        }
    }

    fn clear(&mut self) {
        self.main_tags.clear();
        self.names.clear();
        self.address.clear();
        self.extra.clear();
        self.operator = None;
        self.admin_level = MAX_ADMIN_LEVEL;
        self.is_named = false;
    }

    pub fn main_tags(&self) -> &[MainTag] {
        &self.main_tags
    }

    pub fn names(&self) -> &[(String, String)] {
        &self.names
    }

    pub fn address(&self) -> &[(String, String)] {
        &self.address
    }

    pub fn extra(&self) -> &[(String, String)] {
        &self.extra
    }

    pub fn admin_level(&self) -> i32 {
        self.admin_level
    }

    pub fn is_named(&self) -> bool {
        self.is_named
    }

    /// True when some main tag carries the given class, honouring the
    /// with-name requirement of the matching rule.
    pub fn has_place(&self, class: &str) -> bool {
        self.main_tags.iter().any(|main| {
            main.class == class
                && (!main.flags.contains(StyleFlags::MAIN_NAMED) || !self.names.is_empty())
        })
    }

    /// Emit one row per main tag. Non-fallback entries dominate: if any
    /// of them produced a row, no fallback is tried; otherwise the first
    /// fallback that succeeds wins.
    pub fn copy_out<W: io::Write>(
        &self,
        style: &GazetteerStyle,
        row: ObjectRow<'_>,
        wkb: &[u8],
        table: &TableTarget,
        writer: &mut CopyWriter<W>,
    ) -> Result<bool, SinkError> {
        let mut any = false;
        for main in &self.main_tags {
            if !main.flags.contains(StyleFlags::MAIN_FALLBACK) {
                any |= self.copy_out_maintag(style, main, row, wkb, table, writer)?;
            }
        }
        if any {
            return Ok(true);
        }

        for main in &self.main_tags {
            if main.flags.contains(StyleFlags::MAIN_FALLBACK)
                && self.copy_out_maintag(style, main, row, wkb, table, writer)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn copy_out_maintag<W: io::Write>(
        &self,
        style: &GazetteerStyle,
        main: &MainTag,
        row: ObjectRow<'_>,
        wkb: &[u8],
        table: &TableTarget,
        writer: &mut CopyWriter<W>,
    ) -> Result<bool, SinkError> {
        let domain = if main.flags.contains(StyleFlags::MAIN_NAMED_KEY) {
            let domain = domain_names(&main.class, row.tags);
            if domain.is_empty() {
                return Ok(false);
            }
            domain
        } else {
            Vec::new()
        };

        if main.flags.contains(StyleFlags::MAIN_NAMED) && domain.is_empty() && !self.is_named {
            return Ok(false);
        }

        writer.new_line(table);
        writer.add_column_num(row.id);
        writer.add_column_char(row.otype.as_char());
        writer.add_column_str(&main.class);
        writer.add_column_str(&main.value);

        if !domain.is_empty() {
            // Domain names shed their class prefix: `artwork:name:de`
            // becomes `name:de` in the row.
            let prefix_len = main.class.len() + 1;
            writer.new_hash();
            for tag in &domain {
                writer.add_hash_elem(&tag.key[prefix_len..], &tag.value);
            }
            writer.finish_hash();
        } else {
            let mut first = true;
            if main.flags.contains(StyleFlags::MAIN_OPERATOR) {
                if let Some(operator) = &self.operator {
                    writer.new_hash();
                    writer.add_hash_elem("operator", operator);
                    first = false;
                }
            }
            for (key, value) in &self.names {
                if first {
                    writer.new_hash();
                    first = false;
                }
                writer.add_hash_elem(key, value);
            }
            if first {
                writer.add_null_column();
            } else {
                writer.finish_hash();
            }
        }

        writer.add_column_num(i64::from(self.admin_level));

        if self.address.is_empty() {
            writer.add_null_column();
        } else {
            writer.new_hash();
            for (key, value) in &self.address {
                if key == "tiger:county" {
                    let county = value.split(',').next().unwrap_or(value);
                    writer.add_hash_elem(key, &format!("{county} county"));
                } else {
                    writer.add_hash_elem(key, value);
                }
            }
            writer.finish_hash();
        }

        let fields = style.metadata();
        if self.extra.is_empty() && fields.none() {
            writer.add_null_column();
        } else {
            writer.new_hash();
            for (key, value) in &self.extra {
                writer.add_hash_elem(key, value);
            }
            if fields.version {
                if let Some(version) = row.meta.version {
                    writer.add_hash_num("osm_version", i64::from(version));
                }
            }
            if fields.uid {
                if let Some(uid) = row.meta.uid {
                    writer.add_hash_num("osm_uid", uid);
                }
            }
            if fields.user {
                if let Some(user) = row.meta.user.as_deref() {
                    if !user.is_empty() {
                        writer.add_hash_elem("osm_user", user);
                    }
                }
            }
            if fields.changeset {
                if let Some(changeset) = row.meta.changeset {
                    writer.add_hash_num("osm_changeset", changeset);
                }
            }
            if fields.timestamp {
                if let Some(iso) = row.meta.timestamp.and_then(format_iso) {
                    writer.add_hash_elem_raw("osm_timestamp", &iso);
                }
            }
            writer.finish_hash();
        }

        writer.add_hex_geom(wkb);
        writer.finish_line()?;
        Ok(true)
    }
}

impl GazetteerStyle {
    /// Classify one object's tags into `place` with a single pass and the
    /// documented post-pass reconciliation.
    pub fn process_tags(&self, tags: &TagList, place: &mut ClassifiedPlace) {
        place.clear();

        let mut postcode: Option<&str> = None;
        let mut country: Option<&str> = None;
        let mut place_tag: Option<(&str, StyleFlags)> = None;
        let mut address_point = false;
        let mut interpolation = false;
        let mut admin_boundary = false;
        let mut postcode_fallback = false;

        for tag in tags {
            let k = tag.key.as_str();
            let v = tag.value.as_str();

            if k == "admin_level" {
                place.admin_level = v
                    .parse()
                    .ok()
                    .filter(|level| (1..=MAX_ADMIN_LEVEL).contains(level))
                    .unwrap_or(MAX_ADMIN_LEVEL);
                continue;
            }

            if self.any_operator() && k == "operator" {
                place.operator = Some(v.to_owned());
            }

            let flag = self.find_flag(k, v);
            if flag.is_empty() {
                continue;
            }

            if flag.contains(StyleFlags::MAIN) {
                if k == "place" {
                    // Resolved after the pass; boundary and interpolation
                    // tags seen later can still demote it.
                    place_tag = Some((v, flag));
                } else {
                    place.main_tags.push(MainTag::new(k, v, flag));
                    if flag.contains(StyleFlags::BOUNDARY) && v == "administrative" {
                        admin_boundary = true;
                    }
                }
            }

            if flag.intersects(StyleFlags::NAME | StyleFlags::REF) {
                place.names.push((k.to_owned(), v.to_owned()));
                if flag.contains(StyleFlags::NAME) {
                    place.is_named = true;
                }
            }

            if flag.contains(StyleFlags::ADDRESS) {
                let addr_key = k
                    .strip_prefix("addr:")
                    .or_else(|| k.strip_prefix("is_in:"))
                    .unwrap_or(k);
                if addr_key == "postcode" {
                    if postcode.is_none() {
                        postcode = Some(v);
                    }
                } else if addr_key == "country" {
                    if country.is_none() && v.len() == 2 {
                        country = Some(v);
                    }
                } else if !place.address.iter().any(|(key, _)| key == addr_key) {
                    place.address.push((addr_key.to_owned(), v.to_owned()));
                }
            }

            if flag.contains(StyleFlags::ADDRESS_POINT) {
                address_point = true;
                place.is_named = true;
            }

            if flag.contains(StyleFlags::POSTCODE) && postcode.is_none() {
                postcode = Some(v);
                if flag.contains(StyleFlags::MAIN_FALLBACK) {
                    postcode_fallback = true;
                }
            }

            if flag.contains(StyleFlags::COUNTRY) && country.is_none() && v.len() == 2 {
                country = Some(v);
            }

            if flag.contains(StyleFlags::EXTRA) {
                place.extra.push((k.to_owned(), v.to_owned()));
            }

            if flag.contains(StyleFlags::INTERPOLATION) {
                place
                    .main_tags
                    .push(MainTag::new("place", "houses", StyleFlags::MAIN));
                interpolation = true;
            }
        }

        if let Some(postcode) = postcode {
            place.address.push(("postcode".to_owned(), postcode.to_owned()));
        }
        if let Some(country) = country {
            place.address.push(("country".to_owned(), country.to_owned()));
        }
        if let Some((value, flag)) = place_tag {
            // Islands and islets stay places even inside an
            // administrative boundary.
            if interpolation || (admin_boundary && !value.starts_with("isl")) {
                place.extra.push(("place".to_owned(), value.to_owned()));
            } else {
                place.main_tags.push(MainTag::new("place", value, flag));
            }
        }
        if address_point {
            place.main_tags.push(MainTag::new(
                "place",
                "house",
                StyleFlags::MAIN | StyleFlags::MAIN_FALLBACK,
            ));
        } else if postcode_fallback && postcode.is_some() {
            place.main_tags.push(MainTag::new(
                "place",
                "postcode",
                StyleFlags::MAIN | StyleFlags::MAIN_FALLBACK,
            ));
        }
    }
}

/// Name tags scoped to a class: `<class>:name` or `<class>:name:<lang>`.
fn domain_names<'a>(class: &str, tags: &'a TagList) -> Vec<&'a Tag> {
    let prefix = format!("{class}:name");
    tags.iter()
        .filter(|tag| {
            tag.key.starts_with(&prefix)
                && (tag.key.len() == prefix.len() || tag.key.as_bytes()[prefix.len()] == b':')
        })
        .collect()
}

fn format_iso(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}
