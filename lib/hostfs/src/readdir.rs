//! Directory iteration with host assigned cookies.
//!
//! Native directory cursors are not stable across reopened streams or
//! platforms, so entries are numbered by the host instead: the n-th entry of
//! a fresh stream (counting `.` and `..`) always gets cookie `n`. Resuming
//! from cookie `k` reopens the stream and skips the first `k` entries.

use std::collections::VecDeque;
use std::fmt;

use wasi_hostfs_types::{Dirent, Filetype};

use crate::error::{CloseError, ErrorKind, FileSystemOperationError, ReadDirError};

/// An entry as reported by the platform, before numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirEntry {
    pub name: String,
    pub file_type: Filetype,
    pub inode: u64,
}

/// A lazy, single pass, forward-only platform directory stream.
pub trait DirectoryStream: Send {
    fn next_entry(&mut self) -> Option<Result<RawDirEntry, ReadDirError>>;

    /// `false` when the platform omits `.` and `..`; they are then taken
    /// from [`DirectoryStream::dot_entries`] and yielded first.
    fn yields_dot_entries(&self) -> bool;

    /// Looks up the `.` and `..` entries of the directory.
    fn dot_entries(&mut self) -> Result<[RawDirEntry; 2], ReadDirError>;

    fn close(&mut self) -> Result<(), CloseError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Open,
    Exhausted,
    Failed(ErrorKind, String),
    Closed,
}

/// Directory entries stamped with cookies starting at `1 + start_offset`.
///
/// Once the stream ends the sequence stays exhausted. After a failure every
/// read fails the same way. Reading after [`DirEntrySequence::close`] is a
/// bug and panics.
pub struct DirEntrySequence {
    stream: Box<dyn DirectoryStream>,
    start_offset: u64,
    counter: u64,
    pending_dots: Option<VecDeque<RawDirEntry>>,
    state: State,
}

impl DirEntrySequence {
    pub fn new(stream: Box<dyn DirectoryStream>, start_offset: u64) -> Self {
        Self {
            stream,
            start_offset,
            counter: 0,
            pending_dots: None,
            state: State::Open,
        }
    }

    /// Releases the native stream. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), CloseError> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        self.stream.close()
    }

    fn next_raw(&mut self) -> Option<Result<RawDirEntry, ReadDirError>> {
        if self.pending_dots.is_none() {
            let dots = if self.stream.yields_dot_entries() {
                VecDeque::new()
            } else {
                match self.stream.dot_entries() {
                    Ok(dots) => VecDeque::from(dots),
                    Err(err) => return Some(Err(err)),
                }
            };
            self.pending_dots = Some(dots);
        }
        if let Some(dot) = self.pending_dots.as_mut().and_then(VecDeque::pop_front) {
            return Some(Ok(dot));
        }
        self.stream.next_entry()
    }
}

impl Iterator for DirEntrySequence {
    type Item = Result<Dirent, ReadDirError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &self.state {
            State::Open => {}
            State::Exhausted => return None,
            State::Failed(kind, message) => {
                return Some(Err(ReadDirError::from_kind(*kind, message.clone())));
            }
            State::Closed => panic!("read from a closed directory sequence"),
        }

        loop {
            let entry = match self.next_raw() {
                None => {
                    self.state = State::Exhausted;
                    return None;
                }
                Some(Err(err)) => {
                    self.state = State::Failed(err.kind(), err.message().to_string());
                    return Some(Err(err));
                }
                Some(Ok(entry)) => entry,
            };
            self.counter += 1;
            if self.counter <= self.start_offset {
                continue;
            }
            return Some(Ok(Dirent {
                name: entry.name,
                file_type: entry.file_type,
                inode: entry.inode,
                cookie: self.counter,
            }));
        }
    }
}

impl Drop for DirEntrySequence {
    fn drop(&mut self) {
        if self.state != State::Closed {
            if let Err(err) = self.close() {
                tracing::debug!(error = %err, "failed to close directory stream");
            }
        }
    }
}

impl fmt::Debug for DirEntrySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntrySequence")
            .field("start_offset", &self.start_offset)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream {
        entries: VecDeque<Result<RawDirEntry, ReadDirError>>,
        with_dots: bool,
        closed: bool,
    }

    fn entry(name: &str, file_type: Filetype) -> RawDirEntry {
        RawDirEntry {
            name: name.to_string(),
            file_type,
            inode: name.len() as u64,
        }
    }

    impl TestStream {
        fn native(names: &[&str]) -> Self {
            Self {
                entries: names
                    .iter()
                    .map(|name| Ok(entry(name, Filetype::Directory)))
                    .collect(),
                with_dots: true,
                closed: false,
            }
        }
    }

    impl DirectoryStream for TestStream {
        fn next_entry(&mut self) -> Option<Result<RawDirEntry, ReadDirError>> {
            assert!(!self.closed);
            self.entries.pop_front()
        }

        fn yields_dot_entries(&self) -> bool {
            self.with_dots
        }

        fn dot_entries(&mut self) -> Result<[RawDirEntry; 2], ReadDirError> {
            Ok([entry(".", Filetype::Directory), entry("..", Filetype::Directory)])
        }

        fn close(&mut self) -> Result<(), CloseError> {
            self.closed = true;
            Ok(())
        }
    }

    fn names_and_cookies(sequence: DirEntrySequence) -> Vec<(String, u64)> {
        sequence
            .map(|entry| entry.expect("entry"))
            .map(|entry| (entry.name, entry.cookie))
            .collect()
    }

    #[test]
    fn cookies_start_at_one() {
        let sequence =
            DirEntrySequence::new(Box::new(TestStream::native(&[".", "..", "testdir"])), 0);
        assert_eq!(
            names_and_cookies(sequence),
            vec![
                (".".to_string(), 1),
                ("..".to_string(), 2),
                ("testdir".to_string(), 3)
            ]
        );
    }

    #[test]
    fn start_offset_skips_entries() {
        let names = ["dir1", "dir2", "dir3"];
        let expected: [Vec<(String, u64)>; 5] = [
            vec![
                ("dir1".to_string(), 1),
                ("dir2".to_string(), 2),
                ("dir3".to_string(), 3),
            ],
            vec![("dir2".to_string(), 2), ("dir3".to_string(), 3)],
            vec![("dir3".to_string(), 3)],
            vec![],
            vec![],
        ];
        for (offset, expected) in expected.into_iter().enumerate() {
            let sequence =
                DirEntrySequence::new(Box::new(TestStream::native(&names)), offset as u64);
            assert_eq!(names_and_cookies(sequence), expected, "offset {offset}");
        }
    }

    #[test]
    fn empty_stream_is_empty_for_any_offset() {
        for offset in [0, 1, 5] {
            let sequence = DirEntrySequence::new(Box::new(TestStream::native(&[])), offset);
            assert!(names_and_cookies(sequence).is_empty());
        }
    }

    #[test]
    fn synthesizes_dot_entries_first() {
        let mut stream = TestStream::native(&["a", "b"]);
        stream.with_dots = false;
        let sequence = DirEntrySequence::new(Box::new(stream), 0);
        assert_eq!(
            names_and_cookies(sequence),
            vec![
                (".".to_string(), 1),
                ("..".to_string(), 2),
                ("a".to_string(), 3),
                ("b".to_string(), 4)
            ]
        );
    }

    #[test]
    fn resuming_yields_the_tail_of_a_full_scan() {
        let names = [".", "..", "a", "b", "c", "d"];
        let full = names_and_cookies(DirEntrySequence::new(Box::new(TestStream::native(&names)), 0));
        for window in full.windows(2) {
            assert!(window[0].1 < window[1].1);
        }
        for cookie in full.iter().map(|(_, cookie)| *cookie) {
            let resumed = names_and_cookies(DirEntrySequence::new(
                Box::new(TestStream::native(&names)),
                cookie,
            ));
            let expected: Vec<_> = full.iter().filter(|(_, c)| *c > cookie).cloned().collect();
            assert_eq!(resumed, expected);
        }
    }

    #[test]
    fn stays_exhausted() {
        let mut sequence = DirEntrySequence::new(Box::new(TestStream::native(&["a"])), 0);
        assert!(sequence.next().is_some());
        assert!(sequence.next().is_none());
        assert!(sequence.next().is_none());
    }

    #[test]
    fn fails_again_after_error() {
        let mut stream = TestStream::native(&[]);
        stream
            .entries
            .push_back(Err(ReadDirError::IoError("disk gone".to_string())));
        stream.entries.push_back(Ok(entry("late", Filetype::RegularFile)));
        let mut sequence = DirEntrySequence::new(Box::new(stream), 0);
        assert_eq!(
            sequence.next(),
            Some(Err(ReadDirError::IoError("disk gone".to_string())))
        );
        assert_eq!(
            sequence.next(),
            Some(Err(ReadDirError::IoError("disk gone".to_string())))
        );
    }

    #[test]
    #[should_panic(expected = "closed directory sequence")]
    fn read_after_close_panics() {
        let mut sequence = DirEntrySequence::new(Box::new(TestStream::native(&["a"])), 0);
        sequence.close().unwrap();
        sequence.close().unwrap();
        let _ = sequence.next();
    }
}
