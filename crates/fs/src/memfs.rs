//! In-memory filesystem.
//!
//! Inode-based: names map to inode numbers, open descriptors hold inodes, and
//! an inode lives until it has neither names nor open descriptors. Paths must
//! be absolute; `.` and `..` are resolved lexically.

use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::backend::SyncFs;
use crate::errno::{Errno, SysResult};
use crate::request::{FsReply, FsRequest};
use crate::types::{AccessMode, DirEntry, Fd, FileKind, FileStat, FileTimes, OpenFlags, Whence};

const ROOT_INO: u64 = 1;
const FD_LINK_PREFIX: &str = "/proc/self/fd/";

/// Largest file a [`MemFs`] will hold; growing past it fails with `EFBIG`.
pub const MAX_FILE_SIZE: u64 = 1 << 30;

#[derive(Debug)]
enum NodeData {
	File(Vec<u8>),
	Directory,
}

#[derive(Debug)]
struct Inode {
	data: NodeData,
	mode: u32,
	nlink: u32,
	atime: SystemTime,
	mtime: SystemTime,
}

impl Inode {
	fn new(data: NodeData, mode: u32) -> Self {
		let now = SystemTime::now();
		Self {
			data,
			mode: mode & 0o7777,
			nlink: 1,
			atime: now,
			mtime: now,
		}
	}

	fn kind(&self) -> FileKind {
		match self.data {
			NodeData::File(_) => FileKind::File,
			NodeData::Directory => FileKind::Directory,
		}
	}

	fn stat(&self, ino: u64) -> FileStat {
		let size = match &self.data {
			NodeData::File(bytes) => bytes.len() as u64,
			NodeData::Directory => 0,
		};
		FileStat {
			ino,
			kind: self.kind(),
			size,
			mode: self.mode,
			nlink: self.nlink,
			atime: self.atime,
			mtime: self.mtime,
		}
	}

	fn bytes_mut(&mut self) -> SysResult<&mut Vec<u8>> {
		match &mut self.data {
			NodeData::File(bytes) => Ok(bytes),
			NodeData::Directory => Err(Errno::EISDIR),
		}
	}

	fn touch(&mut self) {
		self.mtime = SystemTime::now();
	}
}

#[derive(Debug)]
struct OpenFile {
	ino: u64,
	path: String,
	offset: u64,
	flags: OpenFlags,
}

/// Filesystem state behind [`MemFs`]'s lock.
#[derive(Debug)]
struct MemState {
	names: BTreeMap<String, u64>,
	inodes: HashMap<u64, Inode>,
	open: BTreeMap<Fd, OpenFile>,
	next_ino: u64,
	fd_base: i32,
}

/// Thread-safe in-memory filesystem, usable directly as a [`SyncFs`].
#[derive(Debug)]
pub struct MemFs {
	state: Mutex<MemState>,
}

impl Default for MemFs {
	fn default() -> Self {
		Self::new(3)
	}
}

impl MemFs {
	/// Creates an empty filesystem whose descriptors start at `fd_base`.
	pub fn new(fd_base: i32) -> Self {
		let mut names = BTreeMap::new();
		names.insert("/".to_string(), ROOT_INO);
		let mut inodes = HashMap::new();
		inodes.insert(ROOT_INO, Inode::new(NodeData::Directory, 0o755));
		Self {
			state: Mutex::new(MemState {
				names,
				inodes,
				open: BTreeMap::new(),
				next_ino: ROOT_INO + 1,
				fd_base,
			}),
		}
	}

	/// Number of open descriptors.
	pub fn open_count(&self) -> usize {
		self.state.lock().open.len()
	}

	/// Returns `true` if `path` names an existing node.
	pub fn exists(&self, path: &str) -> bool {
		let state = self.state.lock();
		normalize(path).is_ok_and(|path| state.names.contains_key(&path))
	}
}

impl SyncFs for MemFs {
	fn execute(&self, request: FsRequest) -> SysResult<FsReply> {
		let op = request.name();
		let result = self.state.lock().apply(request);
		if let Err(errno) = &result {
			tracing::trace!(op, %errno, "fs.memfs.error");
		}
		result
	}
}

impl MemState {
	fn apply(&mut self, request: FsRequest) -> SysResult<FsReply> {
		match request {
			FsRequest::Open { path, flags, mode } => self.open(&path, flags, mode).map(FsReply::Fd),
			FsRequest::Close { fd } => self.close(fd).map(|()| FsReply::Unit),
			FsRequest::Read { fd, len } => {
				let file = self.file(fd)?;
				let offset = file.offset;
				let data = self.read_at(fd, len, offset)?;
				self.file_mut(fd)?.offset += data.len() as u64;
				Ok(FsReply::Data(data))
			}
			FsRequest::Write { fd, data } => {
				let file = self.file(fd)?;
				let offset = if file.flags.contains(OpenFlags::APPEND) {
					self.inode(file.ino)?.stat(file.ino).size
				} else {
					file.offset
				};
				let written = self.write_at(fd, &data, offset)?;
				self.file_mut(fd)?.offset = offset + written as u64;
				Ok(FsReply::Count(written))
			}
			FsRequest::Pread { fd, len, offset } => self.read_at(fd, len, offset).map(FsReply::Data),
			FsRequest::Pwrite { fd, data, offset } => self.write_at(fd, &data, offset).map(FsReply::Count),
			FsRequest::Seek { fd, offset, whence } => self.seek(fd, offset, whence).map(FsReply::Offset),
			FsRequest::Fsync { fd } => self.file(fd).map(|_| FsReply::Unit),
			FsRequest::Stat { path } => {
				let ino = self.lookup(&normalize(&path)?)?;
				Ok(FsReply::Stat(self.inode(ino)?.stat(ino)))
			}
			FsRequest::Fstat { fd } => {
				let ino = self.file(fd)?.ino;
				Ok(FsReply::Stat(self.inode(ino)?.stat(ino)))
			}
			FsRequest::Access { path, mode } => self.access(&path, mode).map(|()| FsReply::Unit),
			FsRequest::Unlink { path } => self.unlink(&path).map(|()| FsReply::Unit),
			FsRequest::Mkdir { path, mode } => self.mkdir(&path, mode).map(|()| FsReply::Unit),
			FsRequest::Rmdir { path } => self.rmdir(&path).map(|()| FsReply::Unit),
			FsRequest::Rename { from, to } => self.rename(&from, &to).map(|()| FsReply::Unit),
			FsRequest::Chmod { path, mode } => {
				let ino = self.lookup(&normalize(&path)?)?;
				self.chmod(ino, mode).map(|()| FsReply::Unit)
			}
			FsRequest::Fchmod { fd, mode } => {
				let ino = self.file(fd)?.ino;
				self.chmod(ino, mode).map(|()| FsReply::Unit)
			}
			FsRequest::Truncate { path, len } => {
				let ino = self.lookup(&normalize(&path)?)?;
				self.resize(ino, len).map(|()| FsReply::Unit)
			}
			FsRequest::Ftruncate { fd, len } => {
				let file = self.file(fd)?;
				if !file.flags.contains(OpenFlags::WRITE) {
					return Err(Errno::EINVAL);
				}
				let ino = file.ino;
				self.resize(ino, len).map(|()| FsReply::Unit)
			}
			FsRequest::Readlink { path } => self.readlink(&path).map(FsReply::Link),
			FsRequest::Readdir { fd } => self.readdir(fd).map(FsReply::Entries),
			FsRequest::Utime { path, times } => self.utime(&path, times).map(|()| FsReply::Unit),
			FsRequest::Fallocate { fd, offset, len } => self.fallocate(fd, offset, len).map(|()| FsReply::Unit),
		}
	}

	fn lookup(&self, path: &str) -> SysResult<u64> {
		self.names.get(path).copied().ok_or(Errno::ENOENT)
	}

	fn inode(&self, ino: u64) -> SysResult<&Inode> {
		self.inodes.get(&ino).ok_or(Errno::EIO)
	}

	fn inode_mut(&mut self, ino: u64) -> SysResult<&mut Inode> {
		self.inodes.get_mut(&ino).ok_or(Errno::EIO)
	}

	fn file(&self, fd: Fd) -> SysResult<&OpenFile> {
		self.open.get(&fd).ok_or(Errno::EBADF)
	}

	fn file_mut(&mut self, fd: Fd) -> SysResult<&mut OpenFile> {
		self.open.get_mut(&fd).ok_or(Errno::EBADF)
	}

	/// Checks that the parent of `path` exists and is a directory.
	fn check_parent(&self, path: &str) -> SysResult<()> {
		let ino = self.lookup(parent_of(path))?;
		match self.inode(ino)?.kind() {
			FileKind::Directory => Ok(()),
			FileKind::File => Err(Errno::ENOTDIR),
		}
	}

	fn create(&mut self, path: String, data: NodeData, mode: u32) -> u64 {
		let ino = self.next_ino;
		self.next_ino += 1;
		self.inodes.insert(ino, Inode::new(data, mode));
		self.names.insert(path, ino);
		ino
	}

	fn allocate_fd(&self) -> Fd {
		let mut candidate = self.fd_base;
		for fd in self.open.range(Fd(self.fd_base)..).map(|(fd, _)| fd.0) {
			if fd != candidate {
				break;
			}
			candidate += 1;
		}
		Fd(candidate)
	}

	/// Drops `ino` once nothing refers to it.
	fn reclaim(&mut self, ino: u64) {
		let unlinked = self.inodes.get(&ino).is_some_and(|inode| inode.nlink == 0);
		if unlinked && !self.open.values().any(|file| file.ino == ino) {
			self.inodes.remove(&ino);
		}
	}

	fn children(&self, dir: &str) -> impl Iterator<Item = (&str, u64)> {
		let prefix = if dir == "/" { "/".to_string() } else { format!("{dir}/") };
		self.names
			.range(prefix.clone()..)
			.take_while(move |(name, _)| name.starts_with(&prefix))
			.filter_map(move |(name, ino)| {
				let rest = &name[dir.len().max(1)..];
				let rest = rest.strip_prefix('/').unwrap_or(rest);
				(!rest.is_empty() && !rest.contains('/')).then_some((rest, *ino))
			})
	}

	fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> SysResult<Fd> {
		let path = normalize(path)?;
		let ino = match self.names.get(&path).copied() {
			Some(_) if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) => return Err(Errno::EEXIST),
			Some(ino) => {
				let writable = flags.contains(OpenFlags::WRITE);
				let inode = self.inode_mut(ino)?;
				match inode.kind() {
					FileKind::Directory if writable => return Err(Errno::EISDIR),
					FileKind::File if flags.contains(OpenFlags::DIRECTORY) => return Err(Errno::ENOTDIR),
					FileKind::File if writable && flags.contains(OpenFlags::TRUNCATE) => {
						inode.bytes_mut()?.clear();
						inode.touch();
					}
					_ => {}
				}
				ino
			}
			None if flags.contains(OpenFlags::CREATE) => {
				if flags.contains(OpenFlags::DIRECTORY) {
					return Err(Errno::EINVAL);
				}
				self.check_parent(&path)?;
				self.create(path.clone(), NodeData::File(Vec::new()), mode)
			}
			None => return Err(Errno::ENOENT),
		};

		let fd = self.allocate_fd();
		self.open.insert(fd, OpenFile { ino, path, offset: 0, flags });
		Ok(fd)
	}

	fn close(&mut self, fd: Fd) -> SysResult<()> {
		let file = self.open.remove(&fd).ok_or(Errno::EBADF)?;
		self.reclaim(file.ino);
		Ok(())
	}

	fn read_at(&mut self, fd: Fd, len: usize, offset: u64) -> SysResult<Vec<u8>> {
		let file = self.file(fd)?;
		if !file.flags.contains(OpenFlags::READ) {
			return Err(Errno::EBADF);
		}
		let ino = file.ino;
		let inode = self.inode_mut(ino)?;
		let bytes = inode.bytes_mut()?;
		let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
		let end = start.saturating_add(len).min(bytes.len());
		let data = bytes[start..end].to_vec();
		inode.atime = SystemTime::now();
		Ok(data)
	}

	fn write_at(&mut self, fd: Fd, data: &[u8], offset: u64) -> SysResult<usize> {
		let file = self.file(fd)?;
		if !file.flags.contains(OpenFlags::WRITE) {
			return Err(Errno::EBADF);
		}
		let ino = file.ino;
		let end = file_end(offset, data.len() as u64)?;
		let start = end - data.len();
		let inode = self.inode_mut(ino)?;
		let bytes = inode.bytes_mut()?;
		if bytes.len() < end {
			bytes.resize(end, 0);
		}
		bytes[start..end].copy_from_slice(data);
		inode.touch();
		Ok(data.len())
	}

	fn seek(&mut self, fd: Fd, offset: i64, whence: Whence) -> SysResult<u64> {
		let file = self.file(fd)?;
		let base = match whence {
			Whence::Start => 0,
			Whence::Current => file.offset,
			Whence::End => self.inode(file.ino)?.stat(file.ino).size,
		};
		let target = i128::from(base) + i128::from(offset);
		let target = u64::try_from(target).map_err(|_| Errno::EINVAL)?;
		self.file_mut(fd)?.offset = target;
		Ok(target)
	}

	fn access(&self, path: &str, mode: AccessMode) -> SysResult<()> {
		let ino = self.lookup(&normalize(path)?)?;
		let perms = self.inode(ino)?.mode;
		let denied = [
			(AccessMode::READ, 0o400),
			(AccessMode::WRITE, 0o200),
			(AccessMode::EXECUTE, 0o100),
		]
		.into_iter()
		.any(|(wanted, bit)| mode.contains(wanted) && perms & bit == 0);
		if denied { Err(Errno::EACCES) } else { Ok(()) }
	}

	fn unlink(&mut self, path: &str) -> SysResult<()> {
		let path = normalize(path)?;
		let ino = self.lookup(&path)?;
		let inode = self.inode_mut(ino)?;
		if inode.kind() == FileKind::Directory {
			return Err(Errno::EISDIR);
		}
		inode.nlink -= 1;
		self.names.remove(&path);
		self.reclaim(ino);
		Ok(())
	}

	fn mkdir(&mut self, path: &str, mode: u32) -> SysResult<()> {
		let path = normalize(path)?;
		if self.names.contains_key(&path) {
			return Err(Errno::EEXIST);
		}
		self.check_parent(&path)?;
		self.create(path, NodeData::Directory, mode);
		Ok(())
	}

	fn rmdir(&mut self, path: &str) -> SysResult<()> {
		let path = normalize(path)?;
		let ino = self.lookup(&path)?;
		if ino == ROOT_INO {
			return Err(Errno::EBUSY);
		}
		if self.inode(ino)?.kind() != FileKind::Directory {
			return Err(Errno::ENOTDIR);
		}
		if self.children(&path).next().is_some() {
			return Err(Errno::ENOTEMPTY);
		}
		self.names.remove(&path);
		self.inode_mut(ino)?.nlink = 0;
		self.reclaim(ino);
		Ok(())
	}

	fn rename(&mut self, from: &str, to: &str) -> SysResult<()> {
		let from = normalize(from)?;
		let to = normalize(to)?;
		let ino = self.lookup(&from)?;
		if ino == ROOT_INO {
			return Err(Errno::EBUSY);
		}
		self.check_parent(&to)?;
		if from == to {
			return Ok(());
		}
		let kind = self.inode(ino)?.kind();
		if kind == FileKind::Directory && to.starts_with(&format!("{from}/")) {
			return Err(Errno::EINVAL);
		}

		if let Some(target) = self.names.get(&to).copied() {
			match (kind, self.inode(target)?.kind()) {
				(FileKind::File, FileKind::Directory) => return Err(Errno::EISDIR),
				(FileKind::Directory, FileKind::File) => return Err(Errno::ENOTDIR),
				(FileKind::Directory, FileKind::Directory) if self.children(&to).next().is_some() => {
					return Err(Errno::ENOTEMPTY);
				}
				_ => {}
			}
			self.names.remove(&to);
			let replaced = self.inode_mut(target)?;
			replaced.nlink = replaced.nlink.saturating_sub(1);
			self.reclaim(target);
		}

		let prefix = format!("{from}/");
		let moved: Vec<String> = std::iter::once(from.clone())
			.chain(
				self.names
					.range(prefix.clone()..)
					.take_while(|(name, _)| name.starts_with(&prefix))
					.map(|(name, _)| name.clone()),
			)
			.collect();
		for old in moved {
			if let Some(ino) = self.names.remove(&old) {
				let renamed = format!("{to}{}", &old[from.len()..]);
				self.names.insert(renamed, ino);
			}
		}
		for file in self.open.values_mut() {
			if file.path == from || file.path.starts_with(&prefix) {
				file.path = format!("{to}{}", &file.path[from.len()..]);
			}
		}
		Ok(())
	}

	fn chmod(&mut self, ino: u64, mode: u32) -> SysResult<()> {
		self.inode_mut(ino)?.mode = mode & 0o7777;
		Ok(())
	}

	fn resize(&mut self, ino: u64, len: u64) -> SysResult<()> {
		let len = file_end(0, len)?;
		let inode = self.inode_mut(ino)?;
		inode.bytes_mut()?.resize(len, 0);
		inode.touch();
		Ok(())
	}

	fn readlink(&self, path: &str) -> SysResult<String> {
		let path = normalize(path)?;
		if let Some(raw) = path.strip_prefix(FD_LINK_PREFIX) {
			let fd = raw.parse::<i32>().map_err(|_| Errno::ENOENT)?;
			return self.open.get(&Fd(fd)).map(|file| file.path.clone()).ok_or(Errno::ENOENT);
		}
		self.lookup(&path)?;
		Err(Errno::EINVAL)
	}

	fn readdir(&self, fd: Fd) -> SysResult<Vec<DirEntry>> {
		let file = self.file(fd)?;
		if self.inode(file.ino)?.kind() != FileKind::Directory {
			return Err(Errno::ENOTDIR);
		}
		let dir = file.path.as_str();
		self.children(dir)
			.map(|(name, ino)| -> SysResult<DirEntry> {
				Ok(DirEntry {
					ino,
					name: name.to_string(),
					kind: self.inode(ino)?.kind(),
				})
			})
			.collect()
	}

	fn utime(&mut self, path: &str, times: Option<FileTimes>) -> SysResult<()> {
		let ino = self.lookup(&normalize(path)?)?;
		let inode = self.inode_mut(ino)?;
		let now = SystemTime::now();
		let times = times.unwrap_or(FileTimes { atime: now, mtime: now });
		inode.atime = times.atime;
		inode.mtime = times.mtime;
		Ok(())
	}

	fn fallocate(&mut self, fd: Fd, offset: u64, len: u64) -> SysResult<()> {
		if len == 0 {
			return Err(Errno::EINVAL);
		}
		let file = self.file(fd)?;
		if !file.flags.contains(OpenFlags::WRITE) {
			return Err(Errno::EBADF);
		}
		let ino = file.ino;
		let end = file_end(offset, len)?;
		let bytes = self.inode_mut(ino)?.bytes_mut()?;
		if bytes.len() < end {
			bytes.resize(end, 0);
		}
		Ok(())
	}
}

/// Resolves `path` to a canonical absolute form without a trailing slash.
pub(crate) fn normalize(path: &str) -> SysResult<String> {
	if !path.starts_with('/') {
		return Err(Errno::EINVAL);
	}
	let mut parts: Vec<&str> = Vec::new();
	for part in path.split('/') {
		match part {
			"" | "." => {}
			".." => {
				parts.pop();
			}
			part => parts.push(part),
		}
	}
	Ok(format!("/{}", parts.join("/")))
}

/// End of the byte range `offset..offset + len`, bounded by [`MAX_FILE_SIZE`].
fn file_end(offset: u64, len: u64) -> SysResult<usize> {
	offset
		.checked_add(len)
		.filter(|end| *end <= MAX_FILE_SIZE)
		.and_then(|end| usize::try_from(end).ok())
		.ok_or(Errno::EFBIG)
}

fn parent_of(path: &str) -> &str {
	match path.rfind('/') {
		Some(0) | None => "/",
		Some(idx) => &path[..idx],
	}
}

#[cfg(test)]
mod tests;
