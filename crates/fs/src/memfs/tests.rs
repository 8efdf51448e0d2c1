use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;

fn run(fs: &MemFs, request: FsRequest) -> SysResult<FsReply> {
	fs.execute(request)
}

fn open(fs: &MemFs, path: &str, flags: OpenFlags) -> SysResult<Fd> {
	run(
		fs,
		FsRequest::Open {
			path: path.into(),
			flags,
			mode: 0o644,
		},
	)?
	.into_fd()
}

fn write(fs: &MemFs, fd: Fd, data: &[u8]) -> SysResult<usize> {
	run(fs, FsRequest::Write { fd, data: data.to_vec() })?.into_count()
}

fn read(fs: &MemFs, fd: Fd, len: usize) -> SysResult<Vec<u8>> {
	run(fs, FsRequest::Read { fd, len })?.into_data()
}

fn mkdir(fs: &MemFs, path: &str) -> SysResult<()> {
	run(fs, FsRequest::Mkdir { path: path.into(), mode: 0o755 })?.into_unit()
}

fn stat(fs: &MemFs, path: &str) -> SysResult<FileStat> {
	run(fs, FsRequest::Stat { path: path.into() })?.into_stat()
}

fn rw_create() -> OpenFlags {
	OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE
}

#[test]
fn write_then_read_back() {
	let fs = MemFs::default();
	let fd = open(&fs, "/hello.txt", rw_create()).expect("open");
	assert_eq!(fd, Fd(3));
	assert_eq!(write(&fs, fd, b"Hello World!"), Ok(12));

	run(&fs, FsRequest::Seek { fd, offset: 0, whence: Whence::Start }).expect("seek");
	assert_eq!(read(&fs, fd, 64).expect("read"), b"Hello World!".to_vec());
	assert_eq!(read(&fs, fd, 64).expect("read at eof"), Vec::<u8>::new());
	assert_eq!(stat(&fs, "/hello.txt").expect("stat").size, 12);
}

#[test]
fn descriptors_reuse_lowest_free_number() {
	let fs = MemFs::new(4097);
	let a = open(&fs, "/a", rw_create()).expect("a");
	let b = open(&fs, "/b", rw_create()).expect("b");
	let c = open(&fs, "/c", rw_create()).expect("c");
	assert_eq!((a, b, c), (Fd(4097), Fd(4098), Fd(4099)));

	run(&fs, FsRequest::Close { fd: b }).expect("close");
	assert_eq!(open(&fs, "/b", OpenFlags::READ).expect("reopen"), Fd(4098));
	assert_eq!(fs.open_count(), 3);
}

#[rstest]
#[case(OpenFlags::READ, Errno::ENOENT)]
#[case(OpenFlags::READ | OpenFlags::CREATE | OpenFlags::DIRECTORY, Errno::EINVAL)]
fn open_missing_file_fails(#[case] flags: OpenFlags, #[case] expected: Errno) {
	let fs = MemFs::default();
	assert_eq!(open(&fs, "/missing", flags), Err(expected));
}

#[test]
fn open_respects_create_exclusive_and_kinds() {
	let fs = MemFs::default();
	open(&fs, "/f", rw_create()).expect("create");
	assert_eq!(open(&fs, "/f", rw_create() | OpenFlags::EXCLUSIVE), Err(Errno::EEXIST));
	assert_eq!(open(&fs, "/f", OpenFlags::READ | OpenFlags::DIRECTORY), Err(Errno::ENOTDIR));

	mkdir(&fs, "/d").expect("mkdir");
	assert_eq!(open(&fs, "/d", OpenFlags::WRITE), Err(Errno::EISDIR));
	assert!(open(&fs, "/d", OpenFlags::READ | OpenFlags::DIRECTORY).is_ok());
	assert_eq!(open(&fs, "/nope/f", rw_create()), Err(Errno::ENOENT));
	assert_eq!(open(&fs, "/f/child", rw_create()), Err(Errno::ENOTDIR));
}

#[test]
fn relative_paths_are_rejected() {
	let fs = MemFs::default();
	assert_eq!(open(&fs, "relative", rw_create()), Err(Errno::EINVAL));
}

#[test]
fn dot_segments_are_resolved() {
	let fs = MemFs::default();
	mkdir(&fs, "/d").expect("mkdir");
	open(&fs, "/d/./x/../f", rw_create()).expect("open");
	assert!(fs.exists("/d/f"));
	assert!(fs.exists("//d/../d/./f/"));
}

#[test]
fn truncate_on_open_and_append() {
	let fs = MemFs::default();
	let fd = open(&fs, "/log", rw_create()).expect("open");
	write(&fs, fd, b"abc").expect("write");
	run(&fs, FsRequest::Close { fd }).expect("close");

	let fd = open(&fs, "/log", OpenFlags::WRITE | OpenFlags::APPEND).expect("append");
	write(&fs, fd, b"def").expect("append write");
	assert_eq!(stat(&fs, "/log").expect("stat").size, 6);

	open(&fs, "/log", OpenFlags::WRITE | OpenFlags::TRUNCATE).expect("truncate");
	assert_eq!(stat(&fs, "/log").expect("stat").size, 0);
}

#[test]
fn access_mode_is_enforced_per_descriptor() {
	let fs = MemFs::default();
	open(&fs, "/f", rw_create()).expect("create");
	let ro = open(&fs, "/f", OpenFlags::READ).expect("read only");
	assert_eq!(write(&fs, ro, b"x"), Err(Errno::EBADF));
	let wo = open(&fs, "/f", OpenFlags::WRITE).expect("write only");
	assert_eq!(read(&fs, wo, 1), Err(Errno::EBADF));
	assert_eq!(read(&fs, Fd(99), 1), Err(Errno::EBADF));
}

#[test]
fn positional_io_leaves_offset_alone() {
	let fs = MemFs::default();
	let fd = open(&fs, "/p", rw_create()).expect("open");
	let written = run(&fs, FsRequest::Pwrite { fd, data: b"xyz".to_vec(), offset: 4 })
		.and_then(FsReply::into_count)
		.expect("pwrite");
	assert_eq!(written, 3);

	let data = run(&fs, FsRequest::Pread { fd, len: 16, offset: 0 })
		.and_then(FsReply::into_data)
		.expect("pread");
	assert_eq!(data, b"\0\0\0\0xyz".to_vec());

	let offset = run(&fs, FsRequest::Seek { fd, offset: 0, whence: Whence::Current })
		.and_then(FsReply::into_offset)
		.expect("seek");
	assert_eq!(offset, 0);
}

#[rstest]
#[case(2, Whence::Start, Ok(2))]
#[case(-1, Whence::End, Ok(4))]
#[case(-6, Whence::End, Err(Errno::EINVAL))]
#[case(-1, Whence::Start, Err(Errno::EINVAL))]
fn seek_origins(#[case] offset: i64, #[case] whence: Whence, #[case] expected: SysResult<u64>) {
	let fs = MemFs::default();
	let fd = open(&fs, "/s", rw_create()).expect("open");
	write(&fs, fd, b"hello").expect("write");
	let got = run(&fs, FsRequest::Seek { fd, offset, whence }).and_then(FsReply::into_offset);
	assert_eq!(got, expected);
}

#[test]
fn access_checks_owner_bits() {
	let fs = MemFs::default();
	open(&fs, "/f", rw_create()).expect("open");
	let access = |mode| run(&fs, FsRequest::Access { path: "/f".into(), mode }).and_then(FsReply::into_unit);
	assert_eq!(access(AccessMode::empty()), Ok(()));
	assert_eq!(access(AccessMode::READ | AccessMode::WRITE), Ok(()));
	assert_eq!(access(AccessMode::EXECUTE), Err(Errno::EACCES));

	run(&fs, FsRequest::Chmod { path: "/f".into(), mode: 0o100_755 }).expect("chmod");
	assert_eq!(stat(&fs, "/f").expect("stat").mode, 0o755);
	assert_eq!(access(AccessMode::EXECUTE), Ok(()));
}

#[test]
fn unlinked_file_lives_until_closed() {
	let fs = MemFs::default();
	let fd = open(&fs, "/tmp", rw_create()).expect("open");
	write(&fs, fd, b"data").expect("write");
	run(&fs, FsRequest::Unlink { path: "/tmp".into() }).expect("unlink");

	assert_eq!(stat(&fs, "/tmp"), Err(Errno::ENOENT));
	let st = run(&fs, FsRequest::Fstat { fd }).and_then(FsReply::into_stat).expect("fstat");
	assert_eq!(st.size, 4);
	assert_eq!(st.nlink, 0);
	run(&fs, FsRequest::Close { fd }).expect("close");
}

#[test]
fn directory_lifecycle() {
	let fs = MemFs::default();
	mkdir(&fs, "/d").expect("mkdir");
	assert_eq!(mkdir(&fs, "/d"), Err(Errno::EEXIST));
	assert_eq!(mkdir(&fs, "/missing/d"), Err(Errno::ENOENT));
	open(&fs, "/d/f", rw_create()).expect("child");

	let rmdir = |path: &str| run(&fs, FsRequest::Rmdir { path: path.into() }).and_then(FsReply::into_unit);
	assert_eq!(rmdir("/d"), Err(Errno::ENOTEMPTY));
	assert_eq!(rmdir("/d/f"), Err(Errno::ENOTDIR));
	assert_eq!(rmdir("/"), Err(Errno::EBUSY));
	assert_eq!(
		run(&fs, FsRequest::Unlink { path: "/d".into() }).and_then(FsReply::into_unit),
		Err(Errno::EISDIR)
	);

	run(&fs, FsRequest::Unlink { path: "/d/f".into() }).expect("unlink");
	assert_eq!(rmdir("/d"), Ok(()));
	assert!(!fs.exists("/d"));
}

#[test]
fn readdir_lists_direct_children_sorted() {
	let fs = MemFs::default();
	mkdir(&fs, "/d").expect("mkdir");
	mkdir(&fs, "/d/sub").expect("sub");
	open(&fs, "/d/b", rw_create()).expect("b");
	open(&fs, "/d/a", rw_create()).expect("a");
	open(&fs, "/d/sub/deep", rw_create()).expect("deep");
	open(&fs, "/d b", rw_create()).expect("sibling");

	let dir = open(&fs, "/d", OpenFlags::READ | OpenFlags::DIRECTORY).expect("open dir");
	let entries = run(&fs, FsRequest::Readdir { fd: dir }).and_then(FsReply::into_entries).expect("readdir");
	let names: Vec<(&str, FileKind)> = entries.iter().map(|e| (e.name.as_str(), e.kind)).collect();
	assert_eq!(
		names,
		vec![("a", FileKind::File), ("b", FileKind::File), ("sub", FileKind::Directory)]
	);

	let file = open(&fs, "/d/a", OpenFlags::READ).expect("file");
	assert_eq!(
		run(&fs, FsRequest::Readdir { fd: file }).and_then(FsReply::into_entries),
		Err(Errno::ENOTDIR)
	);
}

#[test]
fn rename_moves_subtree_and_open_paths() {
	let fs = MemFs::default();
	mkdir(&fs, "/a").expect("a");
	mkdir(&fs, "/a/x").expect("x");
	let fd = open(&fs, "/a/x/f", rw_create()).expect("f");
	open(&fs, "/a b", rw_create()).expect("neighbour");

	run(&fs, FsRequest::Rename { from: "/a".into(), to: "/z".into() }).expect("rename");
	assert!(fs.exists("/z/x/f"));
	assert!(!fs.exists("/a/x/f"));
	assert!(fs.exists("/a b"));

	let link = run(&fs, FsRequest::Readlink { path: format!("/proc/self/fd/{}", fd.0) })
		.and_then(FsReply::into_link)
		.expect("readlink");
	assert_eq!(link, "/z/x/f");
}

#[test]
fn rename_conflicts() {
	let fs = MemFs::default();
	mkdir(&fs, "/d").expect("d");
	mkdir(&fs, "/e").expect("e");
	open(&fs, "/e/f", rw_create()).expect("e/f");
	open(&fs, "/f", rw_create()).expect("f");
	let rename = |from: &str, to: &str| {
		run(&fs, FsRequest::Rename { from: from.into(), to: to.into() }).and_then(FsReply::into_unit)
	};

	assert_eq!(rename("/d", "/d/inner"), Err(Errno::EINVAL));
	assert_eq!(rename("/f", "/d"), Err(Errno::EISDIR));
	assert_eq!(rename("/d", "/f"), Err(Errno::ENOTDIR));
	assert_eq!(rename("/d", "/e"), Err(Errno::ENOTEMPTY));
	assert_eq!(rename("/missing", "/g"), Err(Errno::ENOENT));
	assert_eq!(rename("/e/f", "/f"), Ok(()));
	assert!(!fs.exists("/e/f"));
}

#[test]
fn truncate_variants() {
	let fs = MemFs::default();
	let fd = open(&fs, "/t", rw_create()).expect("open");
	write(&fs, fd, b"0123456789").expect("write");
	run(&fs, FsRequest::Truncate { path: "/t".into(), len: 4 }).expect("truncate");
	assert_eq!(stat(&fs, "/t").expect("stat").size, 4);

	run(&fs, FsRequest::Ftruncate { fd, len: 8 }).expect("ftruncate");
	assert_eq!(stat(&fs, "/t").expect("stat").size, 8);

	let ro = open(&fs, "/t", OpenFlags::READ).expect("ro");
	assert_eq!(
		run(&fs, FsRequest::Ftruncate { fd: ro, len: 0 }).and_then(FsReply::into_unit),
		Err(Errno::EINVAL)
	);
	assert_eq!(
		run(&fs, FsRequest::Truncate { path: "/".into(), len: 0 }).and_then(FsReply::into_unit),
		Err(Errno::EISDIR)
	);
}

#[test]
fn readlink_of_plain_nodes() {
	let fs = MemFs::default();
	open(&fs, "/f", rw_create()).expect("open");
	let readlink = |path: &str| run(&fs, FsRequest::Readlink { path: path.into() }).and_then(FsReply::into_link);
	assert_eq!(readlink("/f"), Err(Errno::EINVAL));
	assert_eq!(readlink("/missing"), Err(Errno::ENOENT));
	assert_eq!(readlink("/proc/self/fd/77"), Err(Errno::ENOENT));
}

#[test]
fn utime_sets_explicit_times() {
	let fs = MemFs::default();
	open(&fs, "/f", rw_create()).expect("open");
	let epoch = std::time::UNIX_EPOCH;
	run(
		&fs,
		FsRequest::Utime {
			path: "/f".into(),
			times: Some(FileTimes { atime: epoch, mtime: epoch }),
		},
	)
	.expect("utime");
	let st = stat(&fs, "/f").expect("stat");
	assert_eq!((st.atime, st.mtime), (epoch, epoch));

	run(&fs, FsRequest::Utime { path: "/f".into(), times: None }).expect("touch");
	assert!(stat(&fs, "/f").expect("stat").mtime > epoch);
}

#[test]
fn fallocate_extends_but_never_shrinks() {
	let fs = MemFs::default();
	let fd = open(&fs, "/f", rw_create()).expect("open");
	write(&fs, fd, b"abcdef").expect("write");
	let fallocate =
		|offset, len| run(&fs, FsRequest::Fallocate { fd, offset, len }).and_then(FsReply::into_unit);
	assert_eq!(fallocate(0, 0), Err(Errno::EINVAL));
	assert_eq!(fallocate(0, 2), Ok(()));
	assert_eq!(stat(&fs, "/f").expect("stat").size, 6);
	assert_eq!(fallocate(4, 12), Ok(()));
	assert_eq!(stat(&fs, "/f").expect("stat").size, 16);
}

#[rstest]
#[case::pwrite_far_offset(FsRequest::Pwrite { fd: Fd(3), data: b"x".to_vec(), offset: 1 << 60 })]
#[case::pwrite_past_limit(FsRequest::Pwrite { fd: Fd(3), data: b"x".to_vec(), offset: MAX_FILE_SIZE })]
#[case::pwrite_overflow(FsRequest::Pwrite { fd: Fd(3), data: b"x".to_vec(), offset: u64::MAX })]
#[case::ftruncate(FsRequest::Ftruncate { fd: Fd(3), len: 1 << 50 })]
#[case::truncate(FsRequest::Truncate { path: "/big".into(), len: MAX_FILE_SIZE + 1 })]
#[case::fallocate(FsRequest::Fallocate { fd: Fd(3), offset: 1 << 40, len: 1 << 40 })]
#[case::fallocate_overflow(FsRequest::Fallocate { fd: Fd(3), offset: u64::MAX, len: 1 })]
fn oversized_growth_is_efbig(#[case] request: FsRequest) {
	let fs = MemFs::default();
	let fd = open(&fs, "/big", rw_create()).expect("open");
	assert_eq!(fd, Fd(3));
	write(&fs, fd, b"seed").expect("write");

	assert_eq!(run(&fs, request), Err(Errno::EFBIG));
	assert_eq!(stat(&fs, "/big").expect("stat").size, 4);
}
