//! Handles 0, 1 and 2.
//!
//! The embedder supplies the streams; by default they forward to the host
//! process's own standard streams.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use wasi_hostfs_types::{
    Errno, Eventtype, Fd, FdRightsBlock, Fdflags, Filestat, Filetype, STDERR_FD, STDIN_FD,
    STDOUT_FD, Whence,
};

use crate::backend::{Family, io_error};
use crate::error::{
    CloseError, ErrorKind, FdAttributesError, ReadError, SeekError, StatError, SyncError,
    WriteError, operation_error,
};
use crate::resource::{FdAttributes, FdResource, MAX_READ_LEN, Readiness, ReadWriteStrategy};

/// Input side of handle 0.
pub trait StdioSource: Send + fmt::Debug {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Bytes that can be read without blocking; `None` when a read would
    /// block. The default reports the stream as always ready.
    fn poll_readable(&mut self) -> io::Result<Option<u64>> {
        Ok(Some(0))
    }
}

/// Output side of handles 1 and 2.
pub trait StdioSink: Send + fmt::Debug {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&mut self) -> io::Result<()>;
}

macro_rules! impl_source {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl StdioSource for $ty {
                fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                    Read::read(self, buf)
                }
            }
        )+
    };
}

macro_rules! impl_sink {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl StdioSink for $ty {
                fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                    Write::write(self, buf)
                }

                fn flush(&mut self) -> io::Result<()> {
                    Write::flush(self)
                }
            }
        )+
    };
}

impl_source!(io::Stdin, io::Empty, io::Cursor<Vec<u8>>);
impl_sink!(io::Stdout, io::Stderr, io::Sink, Vec<u8>);

/// A sink that can be inspected while the filesystem owns it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }
}

impl StdioSink for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The three standard streams of a filesystem.
#[derive(Debug)]
pub struct StandardInputOutput {
    pub stdin: Box<dyn StdioSource>,
    pub stdout: Box<dyn StdioSink>,
    pub stderr: Box<dyn StdioSink>,
}

impl StandardInputOutput {
    pub fn new(
        stdin: impl StdioSource + 'static,
        stdout: impl StdioSink + 'static,
        stderr: impl StdioSink + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// Forwards to the standard streams of the host process.
    pub fn inherit() -> Self {
        Self::new(io::stdin(), io::stdout(), io::stderr())
    }

    pub(crate) fn into_resources(self) -> [(Fd, Arc<dyn FdResource>); 3] {
        [
            (STDIN_FD, Arc::new(StdinResource::new(self.stdin))),
            (STDOUT_FD, Arc::new(StdoutResource::new("stdout", self.stdout))),
            (STDERR_FD, Arc::new(StdoutResource::new("stderr", self.stderr))),
        ]
    }
}

impl Default for StandardInputOutput {
    fn default() -> Self {
        Self::inherit()
    }
}

fn stream_attributes() -> FdAttributes {
    FdAttributes {
        file_type: Filetype::CharacterDevice,
        flags: Fdflags::empty(),
        rights: FdRightsBlock::STDIO,
    }
}

fn stream_stat() -> Filestat {
    Filestat {
        file_type: Filetype::CharacterDevice,
        links: 1,
        ..Filestat::default()
    }
}

#[derive(Debug)]
struct StdinResource {
    source: Mutex<Option<Box<dyn StdioSource>>>,
}

impl StdinResource {
    fn new(source: Box<dyn StdioSource>) -> Self {
        Self {
            source: Mutex::new(Some(source)),
        }
    }
}

impl FdResource for StdinResource {
    fn rights(&self) -> FdRightsBlock {
        FdRightsBlock::STDIO
    }

    fn fd_attributes(&self) -> Result<FdAttributes, FdAttributesError> {
        match self.source.lock().as_ref() {
            Some(_) => Ok(stream_attributes()),
            None => Err(operation_error(ErrorKind::BadFileDescriptor, "stdin is closed")),
        }
    }

    fn stat(&self) -> Result<Filestat, StatError> {
        match self.source.lock().as_ref() {
            Some(_) => Ok(stream_stat()),
            None => Err(operation_error(ErrorKind::BadFileDescriptor, "stdin is closed")),
        }
    }

    fn close(&self) -> Result<(), CloseError> {
        if self.source.lock().take().is_none() {
            panic!("stdin closed twice");
        }
        Ok(())
    }

    fn seek(&self, _offset: i64, _whence: Whence) -> Result<u64, SeekError> {
        Err(operation_error(ErrorKind::Pipe, "stdin is not seekable"))
    }

    fn read(&self, len: usize, strategy: ReadWriteStrategy) -> Result<Vec<u8>, ReadError> {
        if let ReadWriteStrategy::Position(_) = strategy {
            return Err(operation_error(
                ErrorKind::InvalidArgument,
                "stdin does not support positional reads",
            ));
        }
        let mut guard = self.source.lock();
        let Some(source) = guard.as_mut() else {
            return Err(operation_error(ErrorKind::BadFileDescriptor, "stdin is closed"));
        };
        let mut buf = vec![0u8; len.min(MAX_READ_LEN)];
        let count = source
            .read(&mut buf)
            .map_err(|err| io_error::<ReadError>(Family::ReadWrite, "read(stdin)", err))?;
        buf.truncate(count);
        Ok(buf)
    }

    fn sync(&self, _sync_metadata: bool) -> Result<(), SyncError> {
        Ok(())
    }

    fn poll_readiness(&self, event: Eventtype) -> Readiness {
        if event != Eventtype::FdRead {
            return Readiness::Failed(Errno::Badf);
        }
        let mut guard = self.source.lock();
        let Some(source) = guard.as_mut() else {
            return Readiness::Failed(Errno::Badf);
        };
        match source.poll_readable() {
            Ok(Some(bytes_available)) => Readiness::Ready { bytes_available },
            Ok(None) => Readiness::NotReady,
            Err(err) => {
                tracing::debug!(error = %err, "polling stdin failed");
                Readiness::Failed(Errno::Io)
            }
        }
    }
}

#[derive(Debug)]
struct StdoutResource {
    name: &'static str,
    sink: Mutex<Option<Box<dyn StdioSink>>>,
}

impl StdoutResource {
    fn new(name: &'static str, sink: Box<dyn StdioSink>) -> Self {
        Self {
            name,
            sink: Mutex::new(Some(sink)),
        }
    }

    fn closed<E: crate::error::FileSystemOperationError>(&self) -> E {
        operation_error(ErrorKind::BadFileDescriptor, format!("{} is closed", self.name))
    }
}

impl FdResource for StdoutResource {
    fn rights(&self) -> FdRightsBlock {
        FdRightsBlock::STDIO
    }

    fn fd_attributes(&self) -> Result<FdAttributes, FdAttributesError> {
        match self.sink.lock().as_ref() {
            Some(_) => Ok(stream_attributes()),
            None => Err(self.closed()),
        }
    }

    fn stat(&self) -> Result<Filestat, StatError> {
        match self.sink.lock().as_ref() {
            Some(_) => Ok(stream_stat()),
            None => Err(self.closed()),
        }
    }

    fn close(&self) -> Result<(), CloseError> {
        let Some(mut sink) = self.sink.lock().take() else {
            panic!("{} closed twice", self.name);
        };
        sink.flush().map_err(|err| {
            io_error(Family::Close, format_args!("flush({})", self.name), err)
        })
    }

    fn seek(&self, _offset: i64, _whence: Whence) -> Result<u64, SeekError> {
        Err(operation_error(
            ErrorKind::Pipe,
            format!("{} is not seekable", self.name),
        ))
    }

    fn write(&self, buffers: &[Vec<u8>], strategy: ReadWriteStrategy) -> Result<u64, WriteError> {
        if let ReadWriteStrategy::Position(_) = strategy {
            return Err(operation_error(
                ErrorKind::Pipe,
                format!("{} does not support positional writes", self.name),
            ));
        }
        let mut guard = self.sink.lock();
        let Some(sink) = guard.as_mut() else {
            return Err(self.closed());
        };
        let mut written = 0u64;
        for buffer in buffers {
            let mut rest = buffer.as_slice();
            while !rest.is_empty() {
                let count = sink.write(rest).map_err(|err| {
                    io_error::<WriteError>(
                        Family::ReadWrite,
                        format_args!("write({})", self.name),
                        err,
                    )
                })?;
                if count == 0 {
                    return Ok(written);
                }
                written += count as u64;
                rest = &rest[count..];
            }
        }
        Ok(written)
    }

    fn sync(&self, _sync_metadata: bool) -> Result<(), SyncError> {
        let mut guard = self.sink.lock();
        let Some(sink) = guard.as_mut() else {
            return Err(self.closed());
        };
        sink.flush()
            .map_err(|err| io_error(Family::Sync, format_args!("flush({})", self.name), err))
    }

    fn poll_readiness(&self, event: Eventtype) -> Readiness {
        match (event, self.sink.lock().is_some()) {
            (Eventtype::FdWrite, true) => Readiness::Ready { bytes_available: 0 },
            _ => Readiness::Failed(Errno::Badf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NeverReady;

    impl StdioSource for NeverReady {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn poll_readable(&mut self) -> io::Result<Option<u64>> {
            Ok(None)
        }
    }

    #[test]
    fn stdout_collects_all_buffers() {
        let buffer = SharedBuffer::new();
        let stdout = StdoutResource::new("stdout", Box::new(buffer.clone()));
        let written = stdout
            .write(
                &[b"hello, ".to_vec(), b"world".to_vec()],
                ReadWriteStrategy::CurrentPosition,
            )
            .unwrap();
        assert_eq!(written, 12);
        assert_eq!(buffer.contents(), b"hello, world".to_vec());
    }

    #[test]
    fn oversized_stdin_reads_are_short() {
        let stdin = StdinResource::new(Box::new(io::Cursor::new(b"abc".to_vec())));
        assert_eq!(
            stdin.read(usize::MAX, ReadWriteStrategy::CurrentPosition),
            Ok(b"abc".to_vec())
        );
    }

    #[test]
    fn stdin_reads_from_source() {
        let stdin = StdinResource::new(Box::new(io::Cursor::new(b"input".to_vec())));
        assert_eq!(
            stdin.read(3, ReadWriteStrategy::CurrentPosition),
            Ok(b"inp".to_vec())
        );
        assert_eq!(
            stdin.poll_readiness(Eventtype::FdRead),
            Readiness::Ready { bytes_available: 0 }
        );
    }

    #[test]
    fn readiness_comes_from_the_source() {
        let stdin = StdinResource::new(Box::new(NeverReady));
        assert_eq!(stdin.poll_readiness(Eventtype::FdRead), Readiness::NotReady);
    }

    #[test]
    fn closed_stream_is_bad_file_descriptor() {
        let stdout = StdoutResource::new("stdout", Box::new(io::sink()));
        stdout.close().unwrap();
        assert_eq!(
            stdout.write(&[b"x".to_vec()], ReadWriteStrategy::CurrentPosition),
            Err(WriteError::BadFileDescriptor("stdout is closed".to_string()))
        );
    }

    #[test]
    #[should_panic(expected = "closed twice")]
    fn double_close_panics() {
        let stdin = StdinResource::new(Box::new(io::empty()));
        stdin.close().unwrap();
        let _ = stdin.close();
    }
}
