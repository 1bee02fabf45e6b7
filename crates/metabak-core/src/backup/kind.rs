//! Segment kinds of a binary metadata backup.

use std::fmt;

/// Kind of metadata held by a segment.
///
/// Each kind appears at most once in a container. The one-byte tag is
/// written into every segment record; the name is used in the footer index
/// and in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    /// Volume format (settings).
    Format,
    /// Global counters.
    Counter,
    /// Sustained (open but unlinked) inodes.
    Sustained,
    /// Files pending deletion.
    DelFile,
    /// Slice reference counts.
    SliceRef,
    /// Access control lists.
    Acl,
    /// Extended attributes.
    Xattr,
    /// Directory quotas.
    Quota,
    /// Directory usage statistics.
    Stat,
    /// Inode attributes.
    Node,
    /// File chunks.
    Chunk,
    /// Directory entries.
    Edge,
    /// Hard link parents.
    Parent,
    /// Symlink targets.
    Symlink,
}

impl SegmentKind {
    /// Every kind, in tag order.
    pub const ALL: [Self; 14] = [
        Self::Format,
        Self::Counter,
        Self::Sustained,
        Self::DelFile,
        Self::SliceRef,
        Self::Acl,
        Self::Xattr,
        Self::Quota,
        Self::Stat,
        Self::Node,
        Self::Chunk,
        Self::Edge,
        Self::Parent,
        Self::Symlink,
    ];

    /// Returns the on-disk tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Format => 1,
            Self::Counter => 2,
            Self::Sustained => 3,
            Self::DelFile => 4,
            Self::SliceRef => 5,
            Self::Acl => 6,
            Self::Xattr => 7,
            Self::Quota => 8,
            Self::Stat => 9,
            Self::Node => 10,
            Self::Chunk => 11,
            Self::Edge => 12,
            Self::Parent => 13,
            Self::Symlink => 14,
        }
    }

    /// Looks a kind up by tag.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Returns the segment name used in the footer index.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Counter => "counter",
            Self::Sustained => "sustained",
            Self::DelFile => "delFile",
            Self::SliceRef => "sliceRef",
            Self::Acl => "acl",
            Self::Xattr => "xattr",
            Self::Quota => "quota",
            Self::Stat => "stat",
            Self::Node => "node",
            Self::Chunk => "chunk",
            Self::Edge => "edge",
            Self::Parent => "parent",
            Self::Symlink => "symlink",
        }
    }

    /// Looks a kind up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
