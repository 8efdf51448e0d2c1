use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::types::Fd;

/// Descriptors opened through the asynchronous backend.
///
/// Descriptor-based operations go through the bridge exactly when their
/// descriptor is in this table.
#[derive(Debug, Default)]
pub struct DescriptorTable {
	fds: Mutex<BTreeSet<Fd>>,
}

impl DescriptorTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `fd`; returns `false` if it was already present.
	pub fn insert(&self, fd: Fd) -> bool {
		self.fds.lock().insert(fd)
	}

	/// Forgets `fd`; returns `false` if it was not present.
	pub fn remove(&self, fd: Fd) -> bool {
		self.fds.lock().remove(&fd)
	}

	pub fn contains(&self, fd: Fd) -> bool {
		self.fds.lock().contains(&fd)
	}

	pub fn len(&self) -> usize {
		self.fds.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.fds.lock().is_empty()
	}

	/// Sorted snapshot of the table.
	pub fn snapshot(&self) -> Vec<Fd> {
		self.fds.lock().iter().copied().collect()
	}
}
