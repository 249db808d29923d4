//! End-to-end behaviour of the operations over every backend.

mod common;

use common::{Fixture, ROOT, ROOT_ALIAS, backends, quiet_stdio, vpath};
use pretty_assertions::assert_eq;
use wasi_hostfs::error::{
    CloseError, FileSystemOperationError, MkdirError, OpenError, PrestatError, SetFdFlagsError,
    UnlinkDirectoryError, UnlinkError, WriteError,
};
use wasi_hostfs::op::*;
use wasi_hostfs::{
    BaseDirectory, ErrorKind, ReadWriteStrategy, SharedBuffer, StandardInputOutput,
};
use wasi_hostfs_types::{
    DIRENT_HEADER_SIZE, Fd, FdRightsBlock, Fdflags, FileAccessibilityCheck, FileMode, Filetype,
    OpenFileFlags, Rights, STDOUT_FD, Timespec, Whence,
};

fn mkdir(fixture: &Fixture, path: &str, fail_if_exists: bool) -> Result<(), MkdirError> {
    fixture.fs.execute::<Mkdir>(MkdirInput {
        path: vpath(path),
        base_directory: BaseDirectory::DirectoryFd(ROOT),
        mode: FileMode::DEFAULT_DIRECTORY,
        fail_if_exists,
    })
}

fn write(fixture: &Fixture, fd: Fd, data: &[u8]) -> Result<u64, WriteError> {
    fixture.fs.execute::<WriteFd>(WriteInput {
        fd,
        buffers: vec![data.to_vec()],
        strategy: ReadWriteStrategy::CurrentPosition,
    })
}

fn read(fixture: &Fixture, fd: Fd, len: usize, strategy: ReadWriteStrategy) -> Vec<u8> {
    fixture
        .fs
        .execute::<ReadFd>(ReadInput { fd, len, strategy })
        .expect("read")
}

fn seek(fixture: &Fixture, fd: Fd, offset: i64, whence: Whence) -> u64 {
    fixture
        .fs
        .execute::<SeekFd>(SeekInput { fd, offset, whence })
        .expect("seek")
}

fn list(fixture: &Fixture, fd: Fd, start_cookie: u64) -> Vec<(String, u64)> {
    fixture
        .fs
        .execute::<ReadDirFd>(ReadDirInput { fd, start_cookie })
        .expect("readdir")
        .map(|entry| entry.expect("entry"))
        .map(|entry| (entry.name, entry.cookie))
        .collect()
}

fn close(fixture: &Fixture, fd: Fd) -> Result<(), CloseError> {
    fixture.fs.execute::<Close>(CloseInput { fd })
}

#[test_log::test]
fn mkdir_tolerates_existing_directory_on_request() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.mkdir("existing");

        assert_eq!(mkdir(&fixture, "existing", false), Ok(()), "{backend:?}");

        let err = mkdir(&fixture, "existing", true).unwrap_err();
        assert!(matches!(err, MkdirError::Exists(_)), "{backend:?}: {err:?}");
        assert_eq!(err.errno(), wasi_hostfs_types::Errno::Exist);

        mkdir(&fixture, "fresh", true).unwrap();
        assert!(fixture.path("fresh").is_dir());
    }
}

#[test_log::test]
fn directory_can_not_be_opened_for_reading_and_writing() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.mkdir("dir1");

        let rights = FdRightsBlock::new(Rights::FD_READ | Rights::FD_WRITE, Rights::empty());
        let err = fixture
            .open_with_rights("dir1", OpenFileFlags::O_RDONLY, rights)
            .unwrap_err();
        assert!(matches!(err, OpenError::PathIsDirectory(_)), "{backend:?}: {err:?}");

        let err = fixture.open("dir1", OpenFileFlags::O_RDWR).unwrap_err();
        assert!(matches!(err, OpenError::PathIsDirectory(_)), "{backend:?}: {err:?}");

        let fd = fixture.open("dir1", OpenFileFlags::O_RDONLY).unwrap();
        let attributes = fixture
            .fs
            .execute::<GetFdAttributes>(FdAttributesInput { fd })
            .unwrap();
        assert_eq!(attributes.file_type, Filetype::Directory);
        assert_eq!(attributes.rights, FdRightsBlock::DIRECTORY);
    }
}

#[test_log::test]
fn open_rejects_create_with_directory_flag() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        let err = fixture
            .open("new", OpenFileFlags::O_CREAT | OpenFileFlags::O_DIRECTORY)
            .unwrap_err();
        assert!(matches!(err, OpenError::InvalidArgument(_)), "{backend:?}: {err:?}");
        assert!(!fixture.exists("new"));
    }
}

#[test_log::test]
fn open_directory_flag_on_a_file_is_not_directory() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("file.txt", b"x");
        let err = fixture
            .open("file.txt", OpenFileFlags::O_RDONLY | OpenFileFlags::O_DIRECTORY)
            .unwrap_err();
        assert!(matches!(err, OpenError::NotDirectory(_)), "{backend:?}: {err:?}");
    }
}

#[test_log::test]
fn readdir_resumes_after_a_cookie() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.mkdir("dir/testdir");
        let fd = fixture.open("dir", OpenFileFlags::O_RDONLY).unwrap();

        let full = list(&fixture, fd, 0);
        let mut names: Vec<&str> = full.iter().map(|(name, _)| name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec![".", "..", "testdir"], "{backend:?}");
        assert_eq!(
            full.iter().map(|(_, cookie)| *cookie).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let resumed = list(&fixture, fd, 1);
        assert_eq!(resumed, full[1..].to_vec(), "{backend:?}");
        assert_eq!(
            resumed.iter().map(|(_, cookie)| *cookie).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(list(&fixture, fd, 3).is_empty());
    }
}

#[test_log::test]
fn readdir_lists_every_entry_once() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        for name in ["a", "b", "c", "d", "e"] {
            fixture.write(name, name.as_bytes());
        }
        let full = list(&fixture, ROOT, 0);
        let mut names: Vec<String> = full.iter().map(|(name, _)| name.clone()).collect();
        names.sort();
        assert_eq!(names, vec![".", "..", "a", "b", "c", "d", "e"], "{backend:?}");
        for window in full.windows(2) {
            assert!(window[0].1 < window[1].1);
        }

        let sizes: Vec<u64> = fixture
            .fs
            .execute::<ReadDirFd>(ReadDirInput {
                fd: ROOT,
                start_cookie: 0,
            })
            .expect("readdir")
            .map(|entry| entry.expect("entry"))
            .filter(|entry| entry.name == "a")
            .map(|entry| entry.record_size())
            .collect();
        assert_eq!(sizes, vec![DIRENT_HEADER_SIZE + 1], "{backend:?}");
    }
}

#[test_log::test]
fn unlink_directory_checks_the_target() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.mkdir("full");
        fixture.write("full/file.txt", b"x");
        fixture.write("regular", b"x");
        fixture.mkdir("empty");

        let unlink = |path: &str| {
            fixture.fs.execute::<UnlinkDirectory>(UnlinkDirectoryInput {
                path: vpath(path),
                base_directory: BaseDirectory::DirectoryFd(ROOT),
            })
        };

        let err = unlink("full").unwrap_err();
        assert!(
            matches!(err, UnlinkDirectoryError::DirectoryNotEmpty(_)),
            "{backend:?}: {err:?}"
        );
        let err = unlink("regular").unwrap_err();
        assert!(
            matches!(err, UnlinkDirectoryError::NotDirectory(_)),
            "{backend:?}: {err:?}"
        );
        unlink("empty").unwrap();
        assert!(!fixture.exists("empty"));
    }
}

#[test_log::test]
fn unlink_file_refuses_directories() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.mkdir("dir");
        fixture.write("file", b"x");

        let unlink = |path: &str| {
            fixture.fs.execute::<UnlinkFile>(UnlinkFileInput {
                path: vpath(path),
                base_directory: BaseDirectory::DirectoryFd(ROOT),
            })
        };
        let err = unlink("dir").unwrap_err();
        assert!(matches!(err, UnlinkError::PathIsDirectory(_)), "{backend:?}: {err:?}");
        unlink("file").unwrap();
        assert!(!fixture.exists("file"));
        assert_eq!(unlink("file").unwrap_err().kind(), ErrorKind::NoEntry);
    }
}

#[test_log::test]
fn write_seek_and_read_back() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        let fd = fixture
            .open("file.txt", OpenFileFlags::O_CREAT | OpenFileFlags::O_RDWR)
            .unwrap();

        assert_eq!(write(&fixture, fd, b"hello world"), Ok(11));
        assert_eq!(seek(&fixture, fd, 0, Whence::Set), 0);
        assert_eq!(read(&fixture, fd, 5, ReadWriteStrategy::CurrentPosition), b"hello");
        assert_eq!(read(&fixture, fd, 5, ReadWriteStrategy::Position(6)), b"world");
        assert_eq!(seek(&fixture, fd, 0, Whence::Cur), 5, "{backend:?}");
        assert_eq!(seek(&fixture, fd, -5, Whence::End), 6);

        let stat = fixture.fs.execute::<StatFd>(StatFdInput { fd }).unwrap();
        assert_eq!(stat.size, 11);
        assert_eq!(stat.file_type, Filetype::RegularFile);

        close(&fixture, fd).unwrap();
        assert_eq!(fixture.read("file.txt"), b"hello world");
    }
}

#[test_log::test]
fn oversized_reads_are_short_reads() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("small.txt", b"abc");
        let fd = fixture.open("small.txt", OpenFileFlags::O_RDONLY).unwrap();

        let huge = isize::MAX as usize + 1;
        assert_eq!(
            read(&fixture, fd, huge, ReadWriteStrategy::CurrentPosition),
            b"abc",
            "{backend:?}"
        );
        assert_eq!(read(&fixture, fd, usize::MAX, ReadWriteStrategy::Position(1)), b"bc");
        close(&fixture, fd).unwrap();
    }
}

#[test_log::test]
fn positional_write_keeps_the_position() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("file.txt", b"0123456789");
        let fd = fixture.open("file.txt", OpenFileFlags::O_RDWR).unwrap();

        let written = fixture
            .fs
            .execute::<WriteFd>(WriteInput {
                fd,
                buffers: vec![b"ab".to_vec(), b"cd".to_vec()],
                strategy: ReadWriteStrategy::Position(3),
            })
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(seek(&fixture, fd, 0, Whence::Cur), 0, "{backend:?}");
        close(&fixture, fd).unwrap();
        assert_eq!(fixture.read("file.txt"), b"012abcd789");
    }
}

#[test_log::test]
fn append_writes_go_to_the_end() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("log.txt", b"first\n");
        let fd = fixture
            .open("log.txt", OpenFileFlags::O_WRONLY | OpenFileFlags::O_APPEND)
            .unwrap();
        write(&fixture, fd, b"second\n").unwrap();
        close(&fixture, fd).unwrap();
        assert_eq!(fixture.read("log.txt"), b"first\nsecond\n", "{backend:?}");
    }
}

#[test_log::test]
fn truncate_and_fallocate_change_the_size() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        let fd = fixture
            .open("file.bin", OpenFileFlags::O_CREAT | OpenFileFlags::O_RDWR)
            .unwrap();
        let size = |fixture: &Fixture| {
            fixture
                .fs
                .execute::<StatFd>(StatFdInput { fd })
                .unwrap()
                .size
        };

        fixture
            .fs
            .execute::<Fallocate>(FallocateInput {
                fd,
                offset: 0,
                len: 4096,
            })
            .unwrap();
        assert_eq!(size(&fixture), 4096, "{backend:?}");

        fixture
            .fs
            .execute::<TruncateFd>(TruncateInput { fd, len: 10 })
            .unwrap();
        assert_eq!(size(&fixture), 10, "{backend:?}");

        fixture
            .fs
            .execute::<SyncFd>(SyncInput {
                fd,
                sync_metadata: true,
            })
            .unwrap();
    }
}

#[test_log::test]
fn descriptor_rights_are_enforced() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("file.txt", b"data");
        let read_only = FdRightsBlock::new(Rights::FD_READ, Rights::empty());
        let fd = fixture
            .open_with_rights("file.txt", OpenFileFlags::O_RDONLY, read_only)
            .unwrap();

        let err = write(&fixture, fd, b"x").unwrap_err();
        assert!(matches!(err, WriteError::NotCapable(_)), "{backend:?}: {err:?}");

        let err = fixture
            .fs
            .execute::<SeekFd>(SeekInput {
                fd,
                offset: 1,
                whence: Whence::Set,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotCapable);

        assert_eq!(read(&fixture, fd, 4, ReadWriteStrategy::CurrentPosition), b"data");
        let attributes = fixture
            .fs
            .execute::<GetFdAttributes>(FdAttributesInput { fd })
            .unwrap();
        assert_eq!(attributes.rights, read_only);
    }
}

#[test_log::test]
fn only_append_and_nonblock_can_be_changed() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("file.txt", b"");
        let fd = fixture.open("file.txt", OpenFileFlags::O_RDWR).unwrap();

        fixture
            .fs
            .execute::<SetFdFlags>(SetFdFlagsInput {
                fd,
                flags: Fdflags::APPEND,
            })
            .unwrap();
        let attributes = fixture
            .fs
            .execute::<GetFdAttributes>(FdAttributesInput { fd })
            .unwrap();
        assert!(attributes.flags.contains(Fdflags::APPEND), "{backend:?}");

        let err = fixture
            .fs
            .execute::<SetFdFlags>(SetFdFlagsInput {
                fd,
                flags: Fdflags::DSYNC,
            })
            .unwrap_err();
        assert!(matches!(err, SetFdFlagsError::NotSupported(_)), "{backend:?}: {err:?}");
    }
}

#[test_log::test]
fn close_releases_the_handle() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("file.txt", b"x");
        let fd = fixture.open("file.txt", OpenFileFlags::O_RDONLY).unwrap();
        close(&fixture, fd).unwrap();
        let err = close(&fixture, fd).unwrap_err();
        assert!(matches!(err, CloseError::BadFileDescriptor(_)), "{backend:?}");

        let reused = fixture.open("file.txt", OpenFileFlags::O_RDONLY).unwrap();
        assert_eq!(reused, fd);
    }
}

#[test_log::test]
fn open_handles_are_unique() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("file.txt", b"x");
        let mut seen = std::collections::HashSet::new();
        for _ in 0..32 {
            let fd = fixture.open("file.txt", OpenFileFlags::O_RDONLY).unwrap();
            assert!(fd > ROOT);
            assert!(seen.insert(fd), "{backend:?}: {fd} handed out twice");
        }
    }
}

#[test_log::test]
fn filesystem_close_is_idempotent() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("file.txt", b"x");
        fixture.open("file.txt", OpenFileFlags::O_RDONLY).unwrap();

        fixture.fs.close();
        fixture.fs.close();

        let err = fixture.open("file.txt", OpenFileFlags::O_RDONLY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadFileDescriptor, "{backend:?}");
    }
}

#[test_log::test]
fn prestat_lists_preopens_only() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.mkdir("dir");
        let prestat = fixture.fs.execute::<PrestatFd>(PrestatInput { fd: ROOT }).unwrap();
        assert_eq!(prestat.virtual_path, ROOT_ALIAS);

        let dir = fixture.open("dir", OpenFileFlags::O_RDONLY).unwrap();
        for fd in [STDOUT_FD, dir, ROOT + 1] {
            let err = fixture
                .fs
                .execute::<PrestatFd>(PrestatInput { fd })
                .unwrap_err();
            assert!(matches!(err, PrestatError::BadFileDescriptor(_)), "{backend:?} {fd}");
        }
    }
}

#[test_log::test]
fn renumber_moves_the_resource() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("a.txt", b"from a");
        fixture.write("b.txt", b"from b");
        let a = fixture.open("a.txt", OpenFileFlags::O_RDONLY).unwrap();
        let b = fixture.open("b.txt", OpenFileFlags::O_RDONLY).unwrap();

        fixture
            .fs
            .execute::<Renumber>(RenumberInput { from: a, to: b })
            .unwrap();
        assert_eq!(read(&fixture, b, 16, ReadWriteStrategy::CurrentPosition), b"from a");
        assert_eq!(close(&fixture, a).unwrap_err().kind(), ErrorKind::BadFileDescriptor);
    }
}

#[test_log::test]
fn rename_link_and_timestamps() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("old.txt", b"content");
        let root = BaseDirectory::DirectoryFd(ROOT);

        fixture
            .fs
            .execute::<Rename>(RenameInput {
                old_base_directory: root,
                old_path: vpath("old.txt"),
                new_base_directory: root,
                new_path: vpath("new.txt"),
            })
            .unwrap();
        assert!(!fixture.exists("old.txt"));
        assert_eq!(fixture.read("new.txt"), b"content");

        fixture
            .fs
            .execute::<Hardlink>(HardlinkInput {
                old_base_directory: root,
                old_path: vpath("new.txt"),
                new_base_directory: root,
                new_path: vpath("hard.txt"),
                follow_symlinks: false,
            })
            .unwrap();
        assert_eq!(fixture.read("hard.txt"), b"content", "{backend:?}");

        let mtime = Timespec::new(1_000_000, 0);
        fixture
            .fs
            .execute::<SetTimestamp>(SetTimestampInput {
                path: vpath("new.txt"),
                base_directory: root,
                follow_symlinks: true,
                atime: None,
                mtime: Some(mtime),
            })
            .unwrap();
        let stat = fixture
            .fs
            .execute::<Stat>(StatInput {
                path: vpath("new.txt"),
                base_directory: root,
                follow_symlinks: true,
            })
            .unwrap();
        assert_eq!(stat.modification_time, mtime, "{backend:?}");
    }
}

#[test_log::test]
fn symlink_and_readlink() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.mkdir("dir1");
        fixture.write("dir1/a.txt", b"x");
        let root = BaseDirectory::DirectoryFd(ROOT);

        let created = fixture.fs.execute::<Symlink>(SymlinkInput {
            target: "dir1/a.txt".to_string(),
            new_path: vpath("link"),
            new_base_directory: root,
            allow_absolute_target: false,
        });
        if cfg!(windows) && created.is_err() {
            // Creating symlinks needs a privilege on Windows.
            continue;
        }
        created.unwrap();
        let target = fixture
            .fs
            .execute::<Readlink>(ReadlinkInput {
                path: vpath("link"),
                base_directory: root,
            })
            .unwrap();
        assert_eq!(target, "dir1/a.txt", "{backend:?}");
    }
}

#[test_log::test]
fn check_access_reports_missing_files() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        fixture.write("present", b"x");
        let check = |path: &str| {
            fixture.fs.execute::<CheckAccess>(CheckAccessInput {
                path: vpath(path),
                base_directory: BaseDirectory::DirectoryFd(ROOT),
                mode: FileAccessibilityCheck::empty(),
                follow_symlinks: true,
                use_effective_ids: false,
            })
        };
        assert_eq!(check("present"), Ok(()), "{backend:?}");
        assert_eq!(check("missing").unwrap_err().kind(), ErrorKind::NoEntry);
    }
}

#[test_log::test]
fn current_working_directory_is_a_base() {
    for backend in backends() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("work")).unwrap();
        std::fs::write(root.path().join("work/todo.txt"), b"todo").unwrap();
        let fs = wasi_hostfs::FileSystemBuilder::new()
            .backend(backend)
            .stdio(quiet_stdio())
            .preopen(root.path(), ROOT_ALIAS)
            .current_working_directory(root.path().join("work"))
            .build()
            .unwrap();
        let fixture = Fixture { root, fs };

        let current = fixture
            .fs
            .execute::<GetCurrentWorkingDirectory>(GetCwdInput)
            .unwrap();
        assert_eq!(current, "/sandbox/work", "{backend:?}");

        let fd = fixture
            .fs
            .execute::<Open>(OpenInput::new(
                vpath("todo.txt"),
                BaseDirectory::CurrentWorkingDirectory,
                OpenFileFlags::O_RDONLY,
            ))
            .unwrap();
        assert_eq!(read(&fixture, fd, 16, ReadWriteStrategy::CurrentPosition), b"todo");

        let err = fixture
            .fs
            .execute::<Stat>(StatInput {
                path: vpath("../.."),
                base_directory: BaseDirectory::CurrentWorkingDirectory,
                follow_symlinks: true,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotCapable);
    }
}

#[test_log::test]
fn stdout_is_captured() {
    let buffer = SharedBuffer::new();
    let stdio = StandardInputOutput::new(std::io::empty(), buffer.clone(), std::io::sink());
    let fixture = Fixture::with_builder(wasi_hostfs::BackendKind::Std, |builder| {
        builder.stdio(stdio)
    });
    let written = write(&fixture, STDOUT_FD, b"hello").unwrap();
    assert_eq!(written, 5);
    assert_eq!(buffer.contents(), b"hello");

    let attributes = fixture
        .fs
        .execute::<GetFdAttributes>(FdAttributesInput { fd: STDOUT_FD })
        .unwrap();
    assert_eq!(attributes.file_type, Filetype::CharacterDevice);
    assert_eq!(attributes.rights, FdRightsBlock::STDIO);
}

#[test_log::test]
fn fadvise_support_depends_on_the_backend() {
    for backend in backends() {
        let fixture = Fixture::new(backend);
        let supported = fixture.fs.is_operation_supported(OperationTag::FadviseFd);
        assert_eq!(supported, backend == wasi_hostfs::BackendKind::Posix);
        assert!(fixture.fs.is_operation_supported(OperationTag::Open));
    }
}
