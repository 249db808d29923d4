//! The filesystem facade handed to the WASI binding layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::BackendKind;
use crate::op::{FileSystemOperation, OperationTag};
use crate::pipeline::Pipeline;

mod handlers;
mod poll;
mod state;

pub(crate) use handlers::executor;
pub(crate) use state::FileSystemState;

/// A sandboxed view of the host filesystem.
///
/// Built with [`FileSystemBuilder`](crate::FileSystemBuilder). Every
/// operation goes through the configured interceptors before reaching its
/// handler.
#[derive(Debug)]
pub struct HostFileSystem {
    pipeline: Pipeline,
    state: Arc<FileSystemState>,
    closed: AtomicBool,
}

impl HostFileSystem {
    pub(crate) fn new(pipeline: Pipeline, state: Arc<FileSystemState>) -> Self {
        Self {
            pipeline,
            state,
            closed: AtomicBool::new(false),
        }
    }

    /// Runs operation `Op`.
    ///
    /// ```no_run
    /// # use wasi_hostfs::{FileSystemBuilder, op::{Mkdir, MkdirInput}, BaseDirectory, VirtualPath};
    /// # use wasi_hostfs_types::{FileMode, FIRST_PREOPEN_FD};
    /// let fs = FileSystemBuilder::new().preopen("/srv/data", "/data").build()?;
    /// fs.execute::<Mkdir>(MkdirInput {
    ///     path: VirtualPath::create("reports")?,
    ///     base_directory: BaseDirectory::DirectoryFd(FIRST_PREOPEN_FD),
    ///     mode: FileMode::DEFAULT_DIRECTORY,
    ///     fail_if_exists: false,
    /// })?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn execute<Op: FileSystemOperation>(
        &self,
        input: Op::Input,
    ) -> Result<Op::Output, Op::Error> {
        self.pipeline.execute::<Op>(input)
    }

    pub fn is_operation_supported(&self, tag: OperationTag) -> bool {
        self.pipeline.is_operation_supported(tag)
    }

    pub fn backend(&self) -> BackendKind {
        self.state.backend.kind()
    }

    /// Closes every open handle, preopens and standard streams included.
    ///
    /// Failures are logged and otherwise ignored. Calling it again does
    /// nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for resource in self.state.fds.drain() {
            if let Err(err) = resource.close() {
                tracing::warn!(resource = ?resource, error = %err, "failed to close resource");
            }
        }
    }
}

impl Drop for HostFileSystem {
    fn drop(&mut self) {
        self.close();
    }
}
