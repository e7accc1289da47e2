//! Upstream archive declarations
//!
//! Each archive lists the member files needed from it and the local filename
//! each member is stored under. Local filenames match staging table names;
//! the mapping is declared here rather than inferred from member names.

use std::path::Path;

/// One member file to extract from an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Path inside the archive
    pub path: &'static str,
    /// Filename in the working directory
    pub local_name: &'static str,
}

impl ArchiveMember {
    pub const fn new(path: &'static str, local_name: &'static str) -> Self {
        Self { path, local_name }
    }

    /// Filename the member has right after extraction (leading directories stripped)
    pub fn extracted_name(&self) -> &'static str {
        self.path.rsplit('/').next().unwrap_or(self.path)
    }

    /// Number of leading directories in the member path
    pub fn depth(&self) -> usize {
        Path::new(self.path).components().count().saturating_sub(1)
    }
}

/// A compressed tarball published per snapshot
#[derive(Debug, Clone, Copy)]
pub struct ArchiveSpec {
    /// Archive filename, both upstream and in the working directory
    pub file_name: &'static str,
    pub members: &'static [ArchiveMember],
}

impl ArchiveSpec {
    /// `--strip-components` value for tar; members of one archive share a depth
    pub fn strip_components(&self) -> usize {
        self.members.first().map(|m| m.depth()).unwrap_or(0)
    }
}

const fn member(path: &'static str, local_name: &'static str) -> ArchiveMember {
    ArchiveMember::new(path, local_name)
}

/// Archives fetched for every run, in processing order
pub const ARCHIVES: &[ArchiveSpec] = &[
    ArchiveSpec {
        file_name: "mbdump.tar.bz2",
        members: &[
            member("mbdump/area", "area"),
            member("mbdump/iso_3166_1", "iso_3166_1"),
            member("mbdump/artist", "artist"),
            member("mbdump/artist_type", "artist_type"),
            member("mbdump/artist_alias", "artist_alias"),
            member("mbdump/artist_credit", "artist_credit"),
            member("mbdump/artist_credit_name", "artist_credit_name"),
            member("mbdump/recording", "recording"),
            member("mbdump/isrc", "isrc"),
            member("mbdump/release_group", "release_group"),
            member("mbdump/release_group_primary_type", "release_group_primary_type"),
            member("mbdump/release_group_secondary_type", "release_group_secondary_type"),
            member("mbdump/release_group_secondary_type_join", "release_group_secondary_type_join"),
            member("mbdump/release", "release"),
            member("mbdump/release_country", "release_country"),
            member("mbdump/release_unknown_country", "release_unknown_country"),
            member("mbdump/medium", "medium"),
            member("mbdump/track", "track"),
        ],
    },
    ArchiveSpec {
        file_name: "mbdump-derived.tar.bz2",
        members: &[
            member("mbdump/tag", "tag"),
            member("mbdump/artist_tag", "artist_tag"),
        ],
    },
    ArchiveSpec {
        file_name: "mbdump-cover-art-archive.tar.bz2",
        members: &[member("mbdump/cover_art_archive.cover_art", "cover_art")],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_local_names_are_unique() {
        let mut seen = HashSet::new();
        for archive in ARCHIVES {
            for m in archive.members {
                assert!(seen.insert(m.local_name), "duplicate local name {}", m.local_name);
            }
        }
    }

    #[test]
    fn test_only_cover_art_is_renamed() {
        let renamed: Vec<_> = ARCHIVES
            .iter()
            .flat_map(|a| a.members.iter())
            .filter(|m| m.extracted_name() != m.local_name)
            .collect();

        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed[0].extracted_name(), "cover_art_archive.cover_art");
        assert_eq!(renamed[0].local_name, "cover_art");
    }

    #[test]
    fn test_members_share_depth_per_archive() {
        for archive in ARCHIVES {
            assert_eq!(archive.strip_components(), 1);
            assert!(archive.members.iter().all(|m| m.depth() == 1));
        }
    }
}
