use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Portable error codes, numbered as in WASI preview1.
///
/// Only the codes the host filesystem can produce are listed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum Errno {
    /// No error occurred. System call completed successfully.
    Success = 0,
    /// Argument list too long.
    Toobig = 1,
    /// Permission denied.
    Access = 2,
    /// Address in use.
    Addrinuse = 3,
    /// Address not available.
    Addrnotavail = 4,
    /// Address family not supported.
    Afnosupport = 5,
    /// Resource unavailable, or operation would block.
    Again = 6,
    /// Connection already in progress.
    Already = 7,
    /// Bad file descriptor.
    Badf = 8,
    /// Bad message.
    Badmsg = 9,
    /// Device or resource busy.
    Busy = 10,
    /// Operation canceled.
    Canceled = 11,
    /// Reserved.
    Dquot = 19,
    /// File exists.
    Exist = 20,
    /// File too large.
    Fbig = 22,
    /// Interrupted function.
    Intr = 27,
    /// Invalid argument.
    Inval = 28,
    /// I/O error.
    Io = 29,
    /// Is a directory.
    Isdir = 31,
    /// Too many levels of symbolic links.
    Loop = 32,
    /// File descriptor value too large.
    Mfile = 33,
    /// Too many links.
    Mlink = 34,
    /// Filename too long.
    Nametoolong = 37,
    /// Too many files open in system.
    Nfile = 41,
    /// No buffer space available.
    Nobufs = 42,
    /// No such file or directory.
    Noent = 44,
    /// No locks available.
    Nolck = 46,
    /// No space left on device.
    Nospc = 51,
    /// Function not supported.
    Nosys = 52,
    /// Not a directory or a symbolic link to a directory.
    Notdir = 54,
    /// Directory not empty.
    Notempty = 55,
    /// Not supported, or operation not supported on socket.
    Notsup = 58,
    /// Inappropriate I/O control operation.
    Notty = 59,
    /// No such device or address.
    Nxio = 60,
    /// Value too large to be stored in data type.
    Overflow = 61,
    /// Operation not permitted.
    Perm = 63,
    /// Broken pipe.
    Pipe = 64,
    /// Read-only file system.
    Rofs = 69,
    /// Text file busy.
    Txtbsy = 74,
    /// Extension: Capabilities insufficient.
    Notcapable = 76,
}

impl Errno {
    /// The raw preview1 code.
    pub fn code(self) -> u16 {
        self.into()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Errno::Success => "SUCCESS",
            Errno::Toobig => "TOOBIG",
            Errno::Access => "ACCES",
            Errno::Addrinuse => "ADDRINUSE",
            Errno::Addrnotavail => "ADDRNOTAVAIL",
            Errno::Afnosupport => "AFNOSUPPORT",
            Errno::Again => "AGAIN",
            Errno::Already => "ALREADY",
            Errno::Badf => "BADF",
            Errno::Badmsg => "BADMSG",
            Errno::Busy => "BUSY",
            Errno::Canceled => "CANCELED",
            Errno::Dquot => "DQUOT",
            Errno::Exist => "EXIST",
            Errno::Fbig => "FBIG",
            Errno::Intr => "INTR",
            Errno::Inval => "INVAL",
            Errno::Io => "IO",
            Errno::Isdir => "ISDIR",
            Errno::Loop => "LOOP",
            Errno::Mfile => "MFILE",
            Errno::Mlink => "MLINK",
            Errno::Nametoolong => "NAMETOOLONG",
            Errno::Nfile => "NFILE",
            Errno::Nobufs => "NOBUFS",
            Errno::Noent => "NOENT",
            Errno::Nolck => "NOLCK",
            Errno::Nospc => "NOSPC",
            Errno::Nosys => "NOSYS",
            Errno::Notdir => "NOTDIR",
            Errno::Notempty => "NOTEMPTY",
            Errno::Notsup => "NOTSUP",
            Errno::Notty => "NOTTY",
            Errno::Nxio => "NXIO",
            Errno::Overflow => "OVERFLOW",
            Errno::Perm => "PERM",
            Errno::Pipe => "PIPE",
            Errno::Rofs => "ROFS",
            Errno::Txtbsy => "TXTBSY",
            Errno::Notcapable => "NOTCAPABLE",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Errno::Success => "No error occurred. System call completed successfully.",
            Errno::Toobig => "Argument list too long.",
            Errno::Access => "Permission denied.",
            Errno::Addrinuse => "Address in use.",
            Errno::Addrnotavail => "Address not available.",
            Errno::Afnosupport => "Address family not supported.",
            Errno::Again => "Resource unavailable, or operation would block.",
            Errno::Already => "Connection already in progress.",
            Errno::Badf => "Bad file descriptor.",
            Errno::Badmsg => "Bad message.",
            Errno::Busy => "Device or resource busy.",
            Errno::Canceled => "Operation canceled.",
            Errno::Dquot => "Disk quota exceeded.",
            Errno::Exist => "File exists.",
            Errno::Fbig => "File too large.",
            Errno::Intr => "Interrupted function.",
            Errno::Inval => "Invalid argument.",
            Errno::Io => "I/O error.",
            Errno::Isdir => "Is a directory.",
            Errno::Loop => "Too many levels of symbolic links.",
            Errno::Mfile => "File descriptor value too large.",
            Errno::Mlink => "Too many links.",
            Errno::Nametoolong => "Filename too long.",
            Errno::Nfile => "Too many files open in system.",
            Errno::Nobufs => "No buffer space available.",
            Errno::Noent => "No such file or directory.",
            Errno::Nolck => "No locks available.",
            Errno::Nospc => "No space left on device.",
            Errno::Nosys => "Function not supported.",
            Errno::Notdir => "Not a directory or a symbolic link to a directory.",
            Errno::Notempty => "Directory not empty.",
            Errno::Notsup => "Not supported, or operation not supported on socket.",
            Errno::Notty => "Inappropriate I/O control operation.",
            Errno::Nxio => "No such device or address.",
            Errno::Overflow => "Value too large to be stored in data type.",
            Errno::Perm => "Operation not permitted.",
            Errno::Pipe => "Broken pipe.",
            Errno::Rofs => "Read-only file system.",
            Errno::Txtbsy => "Text file busy.",
            Errno::Notcapable => "Extension: Capabilities insufficient.",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Errno::{} (error {})", self.name(), self.code())
    }
}

impl std::error::Error for Errno {}
