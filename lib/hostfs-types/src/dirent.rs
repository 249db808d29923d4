use crate::Filetype;

/// Size of the fixed part of a preview1 `dirent` record.
pub const DIRENT_HEADER_SIZE: u64 = 24;

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dirent {
    /// The name of the directory entry.
    pub name: String,
    /// The type of the file referred to by this directory entry.
    pub file_type: Filetype,
    /// The serial number of the file referred to by this directory entry.
    pub inode: u64,
    /// The offset of the next directory entry stored in this directory.
    pub cookie: u64,
}

impl Dirent {
    /// Number of bytes the entry takes once encoded for the guest.
    pub fn record_size(&self) -> u64 {
        DIRENT_HEADER_SIZE + self.name.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_size_counts_the_name() {
        let entry = Dirent {
            name: "file.txt".to_string(),
            file_type: Filetype::RegularFile,
            inode: 7,
            cookie: 3,
        };
        assert_eq!(entry.record_size(), 32);
    }
}
