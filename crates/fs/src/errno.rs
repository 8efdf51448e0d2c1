//! POSIX-style error numbers reported by filesystem operations.

use thiserror::Error;

/// Error number produced by a filesystem backend.
///
/// The proxy never translates these: whatever the backend reported is what
/// the caller sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("{} (errno {})", errno_name(.0), .0)]
pub struct Errno(pub i32);

/// Result type for filesystem operations.
pub type SysResult<T> = Result<T, Errno>;

impl Errno {
	pub const EACCES: Self = Self(libc::EACCES);
	pub const EBADF: Self = Self(libc::EBADF);
	pub const EBUSY: Self = Self(libc::EBUSY);
	pub const EEXIST: Self = Self(libc::EEXIST);
	pub const EFBIG: Self = Self(libc::EFBIG);
	pub const EINVAL: Self = Self(libc::EINVAL);
	pub const EIO: Self = Self(libc::EIO);
	pub const EISDIR: Self = Self(libc::EISDIR);
	pub const ENOENT: Self = Self(libc::ENOENT);
	pub const ENOTDIR: Self = Self(libc::ENOTDIR);
	pub const ENOTEMPTY: Self = Self(libc::ENOTEMPTY);
	pub const EXDEV: Self = Self(libc::EXDEV);

	/// Raw error number.
	pub const fn raw(self) -> i32 {
		self.0
	}

	/// Negated form, as returned by syscall-style entry points.
	pub const fn as_return_code(self) -> i64 {
		-(self.0 as i64)
	}
}

fn errno_name(code: &i32) -> &'static str {
	match *code {
		libc::EACCES => "EACCES",
		libc::EBADF => "EBADF",
		libc::EBUSY => "EBUSY",
		libc::EEXIST => "EEXIST",
		libc::EFBIG => "EFBIG",
		libc::EINVAL => "EINVAL",
		libc::EIO => "EIO",
		libc::EISDIR => "EISDIR",
		libc::ENOENT => "ENOENT",
		libc::ENOTDIR => "ENOTDIR",
		libc::ENOTEMPTY => "ENOTEMPTY",
		libc::EXDEV => "EXDEV",
		_ => "errno",
	}
}
