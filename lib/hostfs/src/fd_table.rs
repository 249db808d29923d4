//! Small-integer handle table.

use parking_lot::Mutex;
use wasi_hostfs_types::{Fd, MAX_FD, MIN_ALLOCATED_FD};

use crate::error::{ErrorKind, FileSystemError};

/// Maps guest handles to open resources.
///
/// Handles are indices into an arena of slots. A single mutex guards both
/// mutation and lookup.
#[derive(Debug)]
pub struct FileDescriptorTable<R> {
    slots: Mutex<Vec<Option<R>>>,
}

impl<R: Clone> FileDescriptorTable<R> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Places resources at fixed handles, e.g. the standard streams.
    pub fn with_entries(entries: impl IntoIterator<Item = (Fd, R)>) -> Self {
        let table = Self::new();
        for (fd, resource) in entries {
            table.insert_at(fd, resource);
        }
        table
    }

    /// Stores `resource` under the lowest free handle of the dynamic range.
    ///
    /// The factory receives the chosen handle and runs under the table lock.
    pub fn allocate<T, E>(
        &self,
        factory: impl FnOnce(Fd) -> Result<(R, T), E>,
    ) -> Result<(Fd, T), AllocateError<E>> {
        let mut slots = self.slots.lock();
        let fd = (MIN_ALLOCATED_FD..MAX_FD)
            .find(|fd| slots.get(*fd as usize).is_none_or(Option::is_none))
            .ok_or(AllocateError::Mfile)?;
        let (resource, extra) = factory(fd).map_err(AllocateError::Factory)?;
        put(&mut slots, fd, resource);
        Ok((fd, extra))
    }

    /// Stores `resource` under `fd`, returning the previous occupant.
    pub fn insert_at(&self, fd: Fd, resource: R) -> Option<R> {
        let mut slots = self.slots.lock();
        put(&mut slots, fd, resource)
    }

    pub fn get(&self, fd: Fd) -> Option<R> {
        self.slots.lock().get(fd as usize).and_then(Clone::clone)
    }

    pub fn release(&self, fd: Fd) -> Result<R, FileSystemError> {
        self.slots
            .lock()
            .get_mut(fd as usize)
            .and_then(Option::take)
            .ok_or_else(|| {
                FileSystemError::new(
                    ErrorKind::BadFileDescriptor,
                    format!("File descriptor {fd} is not open"),
                )
            })
    }

    /// Moves the resource of `from` to `to`, returning the resource that
    /// occupied `to` so the caller can close it.
    pub fn renumber(&self, from: Fd, to: Fd) -> Result<R, FileSystemError> {
        let mut slots = self.slots.lock();
        let is_open = |slots: &Vec<Option<R>>, fd: Fd| {
            slots.get(fd as usize).is_some_and(Option::is_some)
        };
        if !is_open(&slots, from) {
            return Err(FileSystemError::new(
                ErrorKind::BadFileDescriptor,
                format!("File descriptor {from} is not open"),
            ));
        }
        if !is_open(&slots, to) {
            return Err(FileSystemError::new(
                ErrorKind::BadFileDescriptor,
                format!("File descriptor {to} is not open"),
            ));
        }
        let Some(moved) = slots[from as usize].take() else {
            unreachable!("checked above");
        };
        let replaced = slots[to as usize].replace(moved);
        replaced.ok_or_else(|| {
            FileSystemError::new(ErrorKind::BadFileDescriptor, "renumber target vanished")
        })
    }

    /// Empties the table and returns every live resource.
    pub fn drain(&self) -> Vec<R> {
        let mut slots = self.slots.lock();
        std::mem::take(&mut *slots).into_iter().flatten().collect()
    }


    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Clone> Default for FileDescriptorTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn put<R>(slots: &mut Vec<Option<R>>, fd: Fd, resource: R) -> Option<R> {
    let index = fd as usize;
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }
    slots[index].replace(resource)
}

/// Failure of [`FileDescriptorTable::allocate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocateError<E> {
    /// Every handle of the dynamic range is taken.
    #[error("too many open files")]
    Mfile,
    #[error(transparent)]
    Factory(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::FileSystemOperationError;

    fn allocate(table: &FileDescriptorTable<&'static str>, value: &'static str) -> Fd {
        table
            .allocate(|_| Ok::<_, ()>((value, ())))
            .map(|(fd, ())| fd)
            .expect("allocation failed")
    }

    #[test]
    fn allocates_lowest_free_handle() {
        let table = FileDescriptorTable::with_entries([(0, "stdin"), (1, "stdout"), (2, "stderr")]);
        assert_eq!(allocate(&table, "a"), MIN_ALLOCATED_FD);
        assert_eq!(allocate(&table, "b"), MIN_ALLOCATED_FD + 1);
        assert_eq!(allocate(&table, "c"), MIN_ALLOCATED_FD + 2);

        assert_eq!(table.release(MIN_ALLOCATED_FD + 1), Ok("b"));
        assert_eq!(allocate(&table, "d"), MIN_ALLOCATED_FD + 1);
        assert_eq!(table.get(MIN_ALLOCATED_FD + 1), Some("d"));
    }

    #[test]
    fn skips_handles_taken_by_preopens() {
        let table = FileDescriptorTable::with_entries((3..8).map(|fd| (fd, "preopen")));
        assert_eq!(allocate(&table, "file"), 8);
    }

    #[test]
    fn handles_are_unique_until_released() {
        let table = FileDescriptorTable::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(allocate(&table, "x")));
        }
    }

    #[test]
    fn exhaustion_reports_mfile() {
        let table = FileDescriptorTable::new();
        for _ in MIN_ALLOCATED_FD..MAX_FD {
            allocate(&table, "x");
        }
        let result = table.allocate(|_| Ok::<_, ()>(("y", ())));
        assert_eq!(result, Err(AllocateError::Mfile));
    }

    #[test]
    fn factory_failure_leaves_slot_free() {
        let table: FileDescriptorTable<&str> = FileDescriptorTable::new();
        let result = table.allocate(|_| Err::<(&str, ()), _>("denied"));
        assert_eq!(result, Err(AllocateError::Factory("denied")));
        assert_eq!(allocate(&table, "ok"), MIN_ALLOCATED_FD);
    }

    #[test]
    fn double_release_is_bad_file_descriptor() {
        let table = FileDescriptorTable::new();
        let fd = allocate(&table, "x");
        assert!(table.release(fd).is_ok());
        let err = table.release(fd).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
        assert_eq!(
            table.release(42).unwrap_err().kind(),
            ErrorKind::BadFileDescriptor
        );
    }

    #[test]
    fn drain_twice_is_empty_the_second_time() {
        let table = FileDescriptorTable::with_entries([(0, "stdin")]);
        allocate(&table, "a");
        allocate(&table, "b");
        let mut drained = table.drain();
        drained.sort();
        assert_eq!(drained, vec!["a", "b", "stdin"]);
        assert!(table.drain().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn renumber_moves_and_returns_replaced() {
        let table = FileDescriptorTable::new();
        let a = allocate(&table, "a");
        let b = allocate(&table, "b");
        assert_eq!(table.renumber(a, b), Ok("b"));
        assert_eq!(table.get(a), None);
        assert_eq!(table.get(b), Some("a"));
        assert_eq!(
            table.renumber(a, b).unwrap_err().kind(),
            ErrorKind::BadFileDescriptor
        );
    }
}
