//! Band slug derivation and collision suffixing

use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// URL slug base for a display name.
///
/// Decomposes accented letters to their ASCII base (`ó` → `o`), lower-cases,
/// drops everything except ASCII alphanumerics, whitespace and `-`, then
/// collapses whitespace/dash runs into one `-` and trims the ends. The result
/// only ever contains `[a-z0-9-]`.
pub fn slug_base(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.nfkd().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug
}

/// Slug base for a band, falling back to `artist-<first 8 hex of mbid>`
/// when the name yields nothing
pub fn band_slug_base(name: Option<&str>, mbid: &Uuid) -> String {
    let base = name.map(slug_base).unwrap_or_default();
    if base.is_empty() {
        let hex = mbid.simple().to_string();
        format!("artist-{}", &hex[..8])
    } else {
        base
    }
}

/// Hands out unique slugs for one batch.
///
/// Seeded with the slugs already stored for the batch's slug families, plus
/// the slug of every band in the batch that already exists.
#[derive(Debug, Default)]
pub struct SlugAssigner {
    taken: HashSet<String>,
    existing: HashMap<Uuid, String>,
}

impl SlugAssigner {
    pub fn new(stored: impl IntoIterator<Item = (String, Option<Uuid>)>) -> Self {
        let mut assigner = Self::default();
        for (slug, mbid) in stored {
            if let Some(mbid) = mbid {
                assigner.existing.insert(mbid, slug.clone());
            }
            assigner.taken.insert(slug);
        }
        assigner
    }

    /// Slug for band `mbid` with slug base `base`.
    ///
    /// An existing band keeps its slug. Otherwise the base itself, or the
    /// first free `base-N` for N = 2, 3, ...
    pub fn assign(&mut self, mbid: Uuid, base: &str) -> String {
        if let Some(slug) = self.existing.get(&mbid) {
            return slug.clone();
        }

        let slug = if self.taken.contains(base) {
            (2u32..)
                .map(|n| format!("{}-{}", base, n))
                .find(|candidate| !self.taken.contains(candidate))
                .unwrap_or_else(|| format!("{}-{}", base, mbid.simple()))
        } else {
            base.to_string()
        };

        self.taken.insert(slug.clone());
        self.existing.insert(mbid, slug.clone());
        slug
    }
}
