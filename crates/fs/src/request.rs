//! The proxied operation surface.
//!
//! Every blocking filesystem call the proxy accepts is one [`FsRequest`]
//! variant; backends answer with an [`FsReply`]. Requests own their data so
//! they can cross onto the bridge worker.

use crate::errno::{Errno, SysResult};
use crate::types::{AccessMode, DirEntry, Fd, FileStat, FileTimes, OpenFlags, Whence};

/// One filesystem operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsRequest {
	Open { path: String, flags: OpenFlags, mode: u32 },
	Close { fd: Fd },
	Read { fd: Fd, len: usize },
	Write { fd: Fd, data: Vec<u8> },
	Pread { fd: Fd, len: usize, offset: u64 },
	Pwrite { fd: Fd, data: Vec<u8>, offset: u64 },
	Seek { fd: Fd, offset: i64, whence: Whence },
	Fsync { fd: Fd },
	Stat { path: String },
	Fstat { fd: Fd },
	Access { path: String, mode: AccessMode },
	Unlink { path: String },
	Mkdir { path: String, mode: u32 },
	Rmdir { path: String },
	Rename { from: String, to: String },
	Chmod { path: String, mode: u32 },
	Fchmod { fd: Fd, mode: u32 },
	Truncate { path: String, len: u64 },
	Ftruncate { fd: Fd, len: u64 },
	Readlink { path: String },
	Readdir { fd: Fd },
	Utime { path: String, times: Option<FileTimes> },
	Fallocate { fd: Fd, offset: u64, len: u64 },
}

/// What a request is addressed to, for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
	Path(&'a str),
	Descriptor(Fd),
	/// Both ends of a rename.
	Pair { from: &'a str, to: &'a str },
	/// A path that may also be a `/proc/self/fd/N` descriptor link.
	Link(&'a str),
}

impl FsRequest {
	/// Operation name, for logs.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Open { .. } => "open",
			Self::Close { .. } => "close",
			Self::Read { .. } => "read",
			Self::Write { .. } => "write",
			Self::Pread { .. } => "pread",
			Self::Pwrite { .. } => "pwrite",
			Self::Seek { .. } => "seek",
			Self::Fsync { .. } => "fsync",
			Self::Stat { .. } => "stat",
			Self::Fstat { .. } => "fstat",
			Self::Access { .. } => "access",
			Self::Unlink { .. } => "unlink",
			Self::Mkdir { .. } => "mkdir",
			Self::Rmdir { .. } => "rmdir",
			Self::Rename { .. } => "rename",
			Self::Chmod { .. } => "chmod",
			Self::Fchmod { .. } => "fchmod",
			Self::Truncate { .. } => "truncate",
			Self::Ftruncate { .. } => "ftruncate",
			Self::Readlink { .. } => "readlink",
			Self::Readdir { .. } => "readdir",
			Self::Utime { .. } => "utime",
			Self::Fallocate { .. } => "fallocate",
		}
	}

	/// The path(s) or descriptor this request acts on.
	pub fn target(&self) -> Target<'_> {
		match self {
			Self::Open { path, .. }
			| Self::Stat { path }
			| Self::Access { path, .. }
			| Self::Unlink { path }
			| Self::Mkdir { path, .. }
			| Self::Rmdir { path }
			| Self::Chmod { path, .. }
			| Self::Truncate { path, .. }
			| Self::Utime { path, .. } => Target::Path(path),
			Self::Readlink { path } => Target::Link(path),
			Self::Rename { from, to } => Target::Pair { from, to },
			Self::Close { fd }
			| Self::Read { fd, .. }
			| Self::Write { fd, .. }
			| Self::Pread { fd, .. }
			| Self::Pwrite { fd, .. }
			| Self::Seek { fd, .. }
			| Self::Fsync { fd }
			| Self::Fstat { fd }
			| Self::Fchmod { fd, .. }
			| Self::Ftruncate { fd, .. }
			| Self::Readdir { fd }
			| Self::Fallocate { fd, .. } => Target::Descriptor(*fd),
		}
	}
}

/// Result payload of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsReply {
	Unit,
	Fd(Fd),
	Data(Vec<u8>),
	Count(usize),
	Offset(u64),
	Stat(FileStat),
	Link(String),
	Entries(Vec<DirEntry>),
}

macro_rules! reply_accessor {
	($name:ident, $variant:ident, $ty:ty) => {
		#[doc = concat!("Unwraps a [`FsReply::", stringify!($variant), "`]; any other shape is `EIO`.")]
		pub fn $name(self) -> SysResult<$ty> {
			match self {
				Self::$variant(value) => Ok(value),
				other => Err(other.mismatch(stringify!($variant))),
			}
		}
	};
}

impl FsReply {
	reply_accessor!(into_fd, Fd, Fd);
	reply_accessor!(into_data, Data, Vec<u8>);
	reply_accessor!(into_count, Count, usize);
	reply_accessor!(into_offset, Offset, u64);
	reply_accessor!(into_stat, Stat, FileStat);
	reply_accessor!(into_link, Link, String);
	reply_accessor!(into_entries, Entries, Vec<DirEntry>);

	/// Accepts a [`FsReply::Unit`]; any other shape is `EIO`.
	pub fn into_unit(self) -> SysResult<()> {
		match self {
			Self::Unit => Ok(()),
			other => Err(other.mismatch("Unit")),
		}
	}

	fn kind(&self) -> &'static str {
		match self {
			Self::Unit => "Unit",
			Self::Fd(_) => "Fd",
			Self::Data(_) => "Data",
			Self::Count(_) => "Count",
			Self::Offset(_) => "Offset",
			Self::Stat(_) => "Stat",
			Self::Link(_) => "Link",
			Self::Entries(_) => "Entries",
		}
	}

	fn mismatch(&self, expected: &'static str) -> Errno {
		tracing::error!(expected, got = self.kind(), "fs.reply.mismatch");
		Errno::EIO
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn targets_follow_argument_kind() {
		let open = FsRequest::Open {
			path: "/persistent/a".into(),
			flags: OpenFlags::READ,
			mode: 0o644,
		};
		assert_eq!(open.target(), Target::Path("/persistent/a"));
		assert_eq!(FsRequest::Fsync { fd: Fd(4097) }.target(), Target::Descriptor(Fd(4097)));
		let rename = FsRequest::Rename {
			from: "/a".into(),
			to: "/b".into(),
		};
		assert_eq!(rename.target(), Target::Pair { from: "/a", to: "/b" });
		assert_eq!(FsRequest::Readlink { path: "/x".into() }.target(), Target::Link("/x"));
	}

	#[test]
	fn mismatched_reply_is_eio() {
		assert_eq!(FsReply::Unit.into_fd(), Err(Errno::EIO));
		assert_eq!(FsReply::Count(3).into_count(), Ok(3));
		assert_eq!(FsReply::Fd(Fd(1)).into_unit(), Err(Errno::EIO));
	}
}
