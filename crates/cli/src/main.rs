//! threadfs command-line driver.
//!
//! Builds an in-memory [`FsProxy`] from the configuration and runs one of the
//! demonstration workloads against it.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::Parser;
use threadfs::{Config, DeferredFs, Errno, FsProxy, MemFs, OpenFlags, Whence};
use tracing::info;

mod cli;

use cli::{Cli, Command};

type Proxy = FsProxy<DeferredFs, MemFs>;

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = match &cli.config {
		Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => Config::default(),
	};
	let proxy = FsProxy::in_memory(&config).context("starting proxy")?;
	info!(storage = %config.storage.folder, min_fd = config.storage.min_fd, "threadfs.start");

	match cli.command {
		Command::Demo => demo(&proxy)?,
		Command::Stress { threads, calls } => stress(&proxy, threads, calls)?,
		Command::Load { dir } => load(&proxy, &dir)?,
	}

	proxy.bridge().shutdown()?;
	info!(completed = proxy.bridge().completed(), "threadfs.stop");
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("debug")
		} else {
			EnvFilter::new("info")
		}
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn demo(proxy: &Proxy) -> anyhow::Result<()> {
	let area = proxy.area().folder().to_string();
	let file = format!("/{area}/simple_file.txt");
	let db = format!("/{area}/db");

	let fd = proxy
		.open(&file, OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE, 0o644)
		.with_context(|| format!("opening {file}"))?;
	proxy.write(fd, b"Hello World!")?;
	proxy.seek(fd, 0, Whence::Start)?;
	let mut buf = [0u8; 64];
	let n = proxy.read(fd, &mut buf)?;
	proxy.close(fd)?;
	println!("main thread: {file} ({fd}) contains {:?}", String::from_utf8_lossy(&buf[..n]));

	match proxy.mkdir(&db, 0o755) {
		Ok(()) | Err(Errno::EEXIST) => {}
		Err(errno) => return Err(errno).with_context(|| format!("creating {db}")),
	}
	println!("main thread: {}", describe(proxy, &db));

	std::thread::scope(|scope| {
		scope.spawn(|| {
			println!("spawned thread: {}", describe(proxy, &db));
			println!("spawned thread: {}", describe(proxy, &file));
		});
	});
	Ok(())
}

fn load(proxy: &Proxy, dir: &Path) -> anyhow::Result<()> {
	let installed = proxy
		.load_package(dir)
		.with_context(|| format!("loading package {}", dir.display()))?;
	let root = format!("/{}", proxy.area().folder());
	let listing = proxy.open(&root, OpenFlags::READ | OpenFlags::DIRECTORY, 0)?;
	let entries = proxy.readdir(listing);
	proxy.close(listing)?;
	println!("installed {installed} files from {}", dir.display());
	for entry in entries? {
		println!("  {}", describe(proxy, &format!("{root}/{}", entry.name)));
	}
	Ok(())
}

fn describe(proxy: &Proxy, path: &str) -> String {
	match proxy.stat(path) {
		Ok(st) => format!("{path} is a {:?} of {} bytes, mode {:o}", st.kind, st.size, st.mode),
		Err(errno) => format!("{path}: {errno}"),
	}
}

fn stress(proxy: &Proxy, threads: usize, calls: usize) -> anyhow::Result<()> {
	let folder = proxy.area().folder();
	let before = proxy.bridge().completed();
	let started = Instant::now();

	let failures: usize = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..threads)
			.map(|worker| scope.spawn(move || stress_worker(proxy, folder, worker, calls)))
			.collect();
		handles
			.into_iter()
			.map(|handle| handle.join().unwrap_or(calls))
			.sum()
	});

	let elapsed = started.elapsed();
	let completed = proxy.bridge().completed() - before;
	println!("{threads} threads x {calls} calls: {completed} bridged in {elapsed:?} ({failures} failed)");
	if failures > 0 {
		bail!("{failures} calls failed");
	}
	// Each worker also opens and closes its own file.
	let expected = (threads * (calls + 2)) as u64;
	if completed != expected {
		bail!("expected {expected} bridged calls, saw {completed}");
	}
	Ok(())
}

/// Alternates `stat` and `write` on a private file; returns the failure count.
fn stress_worker(proxy: &Proxy, folder: &str, worker: usize, calls: usize) -> usize {
	let root = format!("/{folder}");
	let path = format!("{root}/stress-{worker}");
	let fd = match proxy.open(&path, OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE, 0o644) {
		Ok(fd) => fd,
		Err(errno) => {
			tracing::error!(%errno, %path, "threadfs.stress.open");
			return calls;
		}
	};
	let failures = (0..calls)
		.filter(|call| {
			let result = if call % 2 == 0 {
				proxy.stat(&root).map(drop)
			} else {
				proxy.write(fd, b"threadfs").map(drop)
			};
			result.is_err()
		})
		.count();
	if let Err(errno) = proxy.close(fd) {
		tracing::error!(%errno, %path, "threadfs.stress.close");
	}
	failures
}
