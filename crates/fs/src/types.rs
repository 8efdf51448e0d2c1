//! Value types shared by requests, replies and backends.

use std::fmt;
use std::time::SystemTime;

use bitflags::bitflags;

/// File descriptor number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fd(pub i32);

impl fmt::Display for Fd {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "fd {}", self.0)
	}
}

bitflags! {
	/// Flags accepted by `open`.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct OpenFlags: u32 {
		const READ = 1;
		const WRITE = 1 << 1;
		const CREATE = 1 << 2;
		const TRUNCATE = 1 << 3;
		const APPEND = 1 << 4;
		const EXCLUSIVE = 1 << 5;
		const DIRECTORY = 1 << 6;
	}
}

bitflags! {
	/// Permissions checked by `access`. The empty set only checks existence.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct AccessMode: u32 {
		const EXECUTE = 1;
		const WRITE = 1 << 1;
		const READ = 1 << 2;
	}
}

/// Origin for `seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
	Start,
	Current,
	End,
}

/// Kind of filesystem node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
	File,
	Directory,
}

/// Metadata returned by `stat` and `fstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
	pub ino: u64,
	pub kind: FileKind,
	pub size: u64,
	/// Permission bits only.
	pub mode: u32,
	pub nlink: u32,
	pub atime: SystemTime,
	pub mtime: SystemTime,
}

/// One entry produced by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
	pub ino: u64,
	pub name: String,
	pub kind: FileKind,
}

/// Explicit access and modification times for `utime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
	pub atime: SystemTime,
	pub mtime: SystemTime,
}
