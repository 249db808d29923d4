use bitflags::bitflags;

bitflags! {
    /// File descriptor rights, determining which actions may be performed.
    #[derive(Default)]
    #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Rights: u64 {
        /// The right to invoke `fd_datasync`.
        const FD_DATASYNC = 1 << 0;
        /// The right to invoke `fd_read` and `sock_recv`.
        const FD_READ = 1 << 1;
        /// The right to invoke `fd_seek`. Implies `FD_TELL`.
        const FD_SEEK = 1 << 2;
        /// The right to invoke `fd_fdstat_set_flags`.
        const FD_FDSTAT_SET_FLAGS = 1 << 3;
        /// The right to invoke `fd_sync`.
        const FD_SYNC = 1 << 4;
        /// The right to invoke `fd_seek` in such a way that the file offset
        /// remains unaltered, and `fd_tell`.
        const FD_TELL = 1 << 5;
        /// The right to invoke `fd_write` and `sock_send`.
        const FD_WRITE = 1 << 6;
        /// The right to invoke `fd_advise`.
        const FD_ADVISE = 1 << 7;
        /// The right to invoke `fd_allocate`.
        const FD_ALLOCATE = 1 << 8;
        /// The right to invoke `path_create_directory`.
        const PATH_CREATE_DIRECTORY = 1 << 9;
        /// If `PATH_OPEN` is set, the right to invoke `path_open` with `O_CREAT`.
        const PATH_CREATE_FILE = 1 << 10;
        /// The right to invoke `path_link` with the file descriptor as the
        /// source directory.
        const PATH_LINK_SOURCE = 1 << 11;
        /// The right to invoke `path_link` with the file descriptor as the
        /// target directory.
        const PATH_LINK_TARGET = 1 << 12;
        /// The right to invoke `path_open`.
        const PATH_OPEN = 1 << 13;
        /// The right to invoke `fd_readdir`.
        const FD_READDIR = 1 << 14;
        /// The right to invoke `path_readlink`.
        const PATH_READLINK = 1 << 15;
        /// The right to invoke `path_rename` with the file descriptor as the
        /// source directory.
        const PATH_RENAME_SOURCE = 1 << 16;
        /// The right to invoke `path_rename` with the file descriptor as the
        /// target directory.
        const PATH_RENAME_TARGET = 1 << 17;
        /// The right to invoke `path_filestat_get`.
        const PATH_FILESTAT_GET = 1 << 18;
        /// The right to change a file's size.
        const PATH_FILESTAT_SET_SIZE = 1 << 19;
        /// The right to invoke `path_filestat_set_times`.
        const PATH_FILESTAT_SET_TIMES = 1 << 20;
        /// The right to invoke `fd_filestat_get`.
        const FD_FILESTAT_GET = 1 << 21;
        /// The right to invoke `fd_filestat_set_size`.
        const FD_FILESTAT_SET_SIZE = 1 << 22;
        /// The right to invoke `fd_filestat_set_times`.
        const FD_FILESTAT_SET_TIMES = 1 << 23;
        /// The right to invoke `path_symlink`.
        const PATH_SYMLINK = 1 << 24;
        /// The right to invoke `path_remove_directory`.
        const PATH_REMOVE_DIRECTORY = 1 << 25;
        /// The right to invoke `path_unlink_file`.
        const PATH_UNLINK_FILE = 1 << 26;
        /// If `FD_READ` is set, includes the right to invoke `poll_oneoff` to
        /// subscribe to `eventtype::fd_read`. If `FD_WRITE` is set, includes
        /// the right to subscribe to `eventtype::fd_write`.
        const POLL_FD_READWRITE = 1 << 27;
        /// The right to invoke `sock_shutdown`.
        const SOCK_SHUTDOWN = 1 << 28;
        /// The right to invoke `sock_accept`.
        const SOCK_ACCEPT = 1 << 29;

        /// Rights a regular file handle can ever hold.
        const FILE_BASE = Self::FD_DATASYNC.bits
            | Self::FD_READ.bits
            | Self::FD_SEEK.bits
            | Self::FD_FDSTAT_SET_FLAGS.bits
            | Self::FD_SYNC.bits
            | Self::FD_TELL.bits
            | Self::FD_WRITE.bits
            | Self::FD_ADVISE.bits
            | Self::FD_ALLOCATE.bits
            | Self::FD_FILESTAT_GET.bits
            | Self::FD_FILESTAT_SET_SIZE.bits
            | Self::FD_FILESTAT_SET_TIMES.bits
            | Self::POLL_FD_READWRITE.bits;

        /// Rights a directory handle can ever hold.
        const DIRECTORY_BASE = Self::PATH_CREATE_DIRECTORY.bits
            | Self::PATH_CREATE_FILE.bits
            | Self::PATH_LINK_SOURCE.bits
            | Self::PATH_LINK_TARGET.bits
            | Self::PATH_OPEN.bits
            | Self::FD_READDIR.bits
            | Self::PATH_READLINK.bits
            | Self::PATH_RENAME_SOURCE.bits
            | Self::PATH_RENAME_TARGET.bits
            | Self::PATH_SYMLINK.bits
            | Self::PATH_REMOVE_DIRECTORY.bits
            | Self::PATH_UNLINK_FILE.bits
            | Self::PATH_FILESTAT_GET.bits
            | Self::PATH_FILESTAT_SET_TIMES.bits
            | Self::FD_FILESTAT_GET.bits
            | Self::FD_FILESTAT_SET_TIMES.bits;

        /// Rights a directory handle may pass on to its children.
        const DIRECTORY_INHERITING = Self::DIRECTORY_BASE.bits | Self::FILE_BASE.bits;

        /// Rights of the standard stream handles.
        const STDIO = Self::FD_DATASYNC.bits
            | Self::FD_READ.bits
            | Self::FD_SYNC.bits
            | Self::FD_WRITE.bits;
    }
}

/// Rights held by a handle together with the rights its children may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FdRightsBlock {
    pub rights: Rights,
    pub rights_inheriting: Rights,
}

impl FdRightsBlock {
    pub const ALL: FdRightsBlock = FdRightsBlock {
        rights: Rights::all(),
        rights_inheriting: Rights::all(),
    };

    pub const NONE: FdRightsBlock = FdRightsBlock {
        rights: Rights::empty(),
        rights_inheriting: Rights::empty(),
    };

    pub const FILE: FdRightsBlock = FdRightsBlock {
        rights: Rights::FILE_BASE,
        rights_inheriting: Rights::FILE_BASE,
    };

    pub const DIRECTORY: FdRightsBlock = FdRightsBlock {
        rights: Rights::DIRECTORY_BASE,
        rights_inheriting: Rights::DIRECTORY_INHERITING,
    };

    pub const STDIO: FdRightsBlock = FdRightsBlock {
        rights: Rights::STDIO,
        rights_inheriting: Rights::empty(),
    };

    pub const fn new(rights: Rights, rights_inheriting: Rights) -> Self {
        Self {
            rights,
            rights_inheriting,
        }
    }

    /// Effective rights of a regular file opened beneath `self`.
    ///
    /// The result never exceeds `self.rights_inheriting`, the requested block
    /// or the file base mask.
    pub fn child_file_rights(&self, requested: &FdRightsBlock) -> FdRightsBlock {
        FdRightsBlock {
            rights: self.rights_inheriting & requested.rights & Rights::FILE_BASE,
            rights_inheriting: self.rights_inheriting
                & requested.rights_inheriting
                & Rights::FILE_BASE,
        }
    }

    /// Effective rights of a directory opened beneath `self`.
    pub fn child_directory_rights(&self, requested: &FdRightsBlock) -> FdRightsBlock {
        FdRightsBlock {
            rights: self.rights_inheriting & requested.rights & Rights::DIRECTORY_BASE,
            rights_inheriting: self.rights_inheriting
                & requested.rights_inheriting
                & Rights::DIRECTORY_INHERITING,
        }
    }

    pub fn has(&self, rights: Rights) -> bool {
        self.rights.contains(rights)
    }
}
