use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;

#[tokio::test]
async fn complete_resolves_completion() {
	let (handle, completion) = CompletionHandle::pair(7);
	assert!(!handle.is_consumed());
	handle.complete();
	assert!(handle.is_consumed());
	assert_eq!(completion.await, Ok(()));
}

#[tokio::test]
async fn clones_share_consumed_flag() {
	let (handle, completion) = CompletionHandle::pair(1);
	let clone = handle.clone();
	clone.complete();
	assert!(handle.is_consumed());
	assert_eq!(handle.task_id(), 1);
	assert_eq!(completion.await, Ok(()));
}

#[tokio::test]
async fn completion_from_another_thread() {
	let (handle, completion) = CompletionHandle::pair(3);
	std::thread::spawn(move || {
		std::thread::sleep(Duration::from_millis(10));
		handle.complete();
	});
	assert_eq!(completion.await, Ok(()));
}

#[tokio::test]
async fn dropping_every_clone_abandons() {
	let (handle, completion) = CompletionHandle::pair(9);
	let clone = handle.clone();
	drop(handle);
	drop(clone);
	assert_eq!(completion.await, Err(BridgeError::Abandoned { task_id: 9 }));
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "invoked more than once"))]
fn second_complete_is_trapped() {
	let (handle, _completion) = CompletionHandle::pair(5);
	handle.complete();
	handle.complete();
}
