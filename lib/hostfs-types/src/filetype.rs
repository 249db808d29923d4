use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The type of a file descriptor or file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Filetype {
    /// The type of the file descriptor or file is unknown or is different
    /// from any of the other types specified.
    Unknown = 0,
    /// The file descriptor or file refers to a block device inode.
    BlockDevice = 1,
    /// The file descriptor or file refers to a character device inode.
    CharacterDevice = 2,
    /// The file descriptor or file refers to a directory inode.
    Directory = 3,
    /// The file descriptor or file refers to a regular file inode.
    RegularFile = 4,
    /// The file descriptor or file refers to a datagram socket.
    SocketDgram = 5,
    /// The file descriptor or file refers to a byte-stream socket.
    SocketStream = 6,
    /// The file refers to a symbolic link inode.
    SymbolicLink = 7,
}

impl Default for Filetype {
    fn default() -> Self {
        Filetype::Unknown
    }
}

impl Filetype {
    pub fn is_directory(self) -> bool {
        self == Filetype::Directory
    }

    pub fn is_symlink(self) -> bool {
        self == Filetype::SymbolicLink
    }

    /// Type encoded in the `S_IFMT` bits of a `st_mode` value.
    pub fn from_mode(mode: u32) -> Filetype {
        match mode & 0o170000 {
            0o040000 => Filetype::Directory,
            0o100000 => Filetype::RegularFile,
            0o120000 => Filetype::SymbolicLink,
            0o020000 => Filetype::CharacterDevice,
            0o060000 => Filetype::BlockDevice,
            0o140000 => Filetype::SocketStream,
            _ => Filetype::Unknown,
        }
    }
}
