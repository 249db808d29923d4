use crate::Filetype;

/// A point in time or a duration split into seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timespec {
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl Timespec {
    pub const fn new(seconds: i64, nanoseconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    pub fn from_nanoseconds(nanoseconds: i64) -> Self {
        Self {
            seconds: nanoseconds.div_euclid(1_000_000_000),
            nanoseconds: nanoseconds.rem_euclid(1_000_000_000),
        }
    }

    pub fn as_nanoseconds(&self) -> i64 {
        self.seconds
            .saturating_mul(1_000_000_000)
            .saturating_add(self.nanoseconds)
    }
}

/// File attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Filestat {
    /// Device ID of device containing the file.
    pub device_id: u64,
    /// File serial number.
    pub inode: u64,
    /// Permission bits, without the type bits.
    pub mode: u32,
    pub file_type: Filetype,
    /// Number of hard links to the file.
    pub links: u64,
    pub uid: u64,
    pub gid: u64,
    /// Device ID, if the file is a special file.
    pub rdev: u64,
    /// For regular files, the file size in bytes. For symbolic links, the
    /// length in bytes of the pathname contained in the symbolic link.
    pub size: u64,
    pub block_size: u64,
    pub blocks: u64,
    pub access_time: Timespec,
    pub modification_time: Timespec,
    pub change_time: Timespec,
}
