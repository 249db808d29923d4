use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

bitflags! {
    /// Flags of `open(2)`, numbered as on Linux.
    ///
    /// The access mode occupies the two low bits and is read with
    /// [`OpenFileFlags::access_mode`].
    #[derive(Default)]
    #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct OpenFileFlags: u32 {
        const O_RDONLY = 0;
        const O_WRONLY = 0o1;
        const O_RDWR = 0o2;
        const O_ACCMODE = 0o3;
        const O_CREAT = 0o100;
        const O_EXCL = 0o200;
        const O_NOCTTY = 0o400;
        const O_TRUNC = 0o1000;
        const O_APPEND = 0o2000;
        const O_NONBLOCK = 0o4000;
        const O_DSYNC = 0o10000;
        const O_ASYNC = 0o20000;
        const O_DIRECT = 0o40000;
        const O_LARGEFILE = 0o100000;
        const O_DIRECTORY = 0o200000;
        const O_NOFOLLOW = 0o400000;
        const O_NOATIME = 0o1000000;
        const O_CLOEXEC = 0o2000000;
        const O_SYNC = 0o4010000;
        const O_PATH = 0o10000000;
        const O_TMPFILE = 0o20200000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

impl OpenFileFlags {
    /// Access mode bits. The invalid value `3` is read as read-write.
    pub fn access_mode(&self) -> AccessMode {
        match self.bits & Self::O_ACCMODE.bits {
            0 => AccessMode::ReadOnly,
            1 => AccessMode::WriteOnly,
            _ => AccessMode::ReadWrite,
        }
    }

    pub fn is_create(&self) -> bool {
        self.contains(Self::O_CREAT)
    }

    pub fn is_directory(&self) -> bool {
        self.contains(Self::O_DIRECTORY)
    }

    pub fn is_nofollow(&self) -> bool {
        self.contains(Self::O_NOFOLLOW)
    }
}

bitflags! {
    /// File descriptor flags.
    #[derive(Default)]
    #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Fdflags: u16 {
        /// Append mode: Data written to the file is always appended to the file's end.
        const APPEND = 1 << 0;
        /// Write according to synchronized I/O data integrity completion.
        const DSYNC = 1 << 1;
        /// Non-blocking mode.
        const NONBLOCK = 1 << 2;
        /// Synchronized read I/O operations.
        const RSYNC = 1 << 3;
        /// Write according to synchronized I/O file integrity completion.
        const SYNC = 1 << 4;
    }
}

impl Fdflags {
    /// Flags that can be changed on an open descriptor.
    pub const CHANGEABLE: Fdflags = Fdflags::from_bits_truncate(Fdflags::APPEND.bits | Fdflags::NONBLOCK.bits);
}

bitflags! {
    /// File permission bits.
    #[derive(Default)]
    #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FileMode: u32 {
        const S_ISUID = 0o4000;
        const S_ISGID = 0o2000;
        const S_ISVTX = 0o1000;
        const S_IRUSR = 0o400;
        const S_IWUSR = 0o200;
        const S_IXUSR = 0o100;
        const S_IRWXU = 0o700;
        const S_IRGRP = 0o40;
        const S_IWGRP = 0o20;
        const S_IXGRP = 0o10;
        const S_IRWXG = 0o70;
        const S_IROTH = 0o4;
        const S_IWOTH = 0o2;
        const S_IXOTH = 0o1;
        const S_IRWXO = 0o7;
    }
}

impl FileMode {
    /// Mode of files created without an explicit mode.
    pub const DEFAULT_FILE: FileMode = FileMode::from_bits_truncate(0o640);

    /// Mode of directories created without an explicit mode.
    pub const DEFAULT_DIRECTORY: FileMode = FileMode::from_bits_truncate(0o750);
}

bitflags! {
    /// Checks performed by `faccessat(2)`. An empty set checks existence only.
    #[derive(Default)]
    #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct FileAccessibilityCheck: u32 {
        const EXECUTABLE = 1;
        const WRITABLE = 2;
        const READABLE = 4;
    }
}

/// The position relative to which to set the offset of the file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Whence {
    /// Seek relative to start-of-file.
    Set = 0,
    /// Seek relative to current position.
    Cur = 1,
    /// Seek relative to end-of-file.
    End = 2,
}

/// File or memory access pattern advisory information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Advice {
    Normal = 0,
    Sequential = 1,
    Random = 2,
    Willneed = 3,
    Dontneed = 4,
    Noreuse = 5,
}
