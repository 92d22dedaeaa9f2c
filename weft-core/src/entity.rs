//! Final cleanup: numeric character entities in prose are turned back
//! into literal characters. Runs as the last pipeline stage, and only
//! over text regions, so entities deliberately planted inside code
//! blocks stay encoded.

use crate::context::Context;
use crate::filter::{BlockKind, Filter, KindSet};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(\d+);").expect("valid regex"));

pub struct EntityUnmapFilter;

impl Filter for EntityUnmapFilter {
    fn kinds(&self) -> KindSet {
        KindSet::TEXT
    }

    fn filter(
        &self,
        prefix: &str,
        body: &mut String,
        suffix: &str,
        _kind: BlockKind,
        _ctx: &mut Context,
    ) {
        let unmapped = NUMERIC_ENTITY.replace_all(body, |caps: &Captures| {
            // Only printable ASCII; anything else stays encoded.
            match caps[1].parse::<u32>() {
                Ok(code) if (32..=126).contains(&code) => {
                    char::from_u32(code).map(String::from).unwrap_or_else(|| caps[0].to_string())
                }
                _ => caps[0].to_string(),
            }
        });
        *body = format!("{prefix}{unmapped}{suffix}");
    }
}
