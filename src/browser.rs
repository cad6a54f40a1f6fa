//! open urls with the default handler of the desktop session

use std::{
	io,
	process::{Command, ExitStatus},
	thread::{self, JoinHandle},
};

use anyhow::{bail, Context, Result};
use url::Url;

#[cfg(target_os = "macos")]
const OPENER: &[&str] = &["open"];
#[cfg(target_os = "windows")]
const OPENER: &[&str] = &["cmd", "/C", "start", ""];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const OPENER: &[&str] = &["xdg-open"];

/// only web urls are handed to the opener
pub fn is_openable(url: &str) -> bool {
	Url::parse(url).map_or(false, |url| matches!(url.scheme(), "http" | "https"))
}

/// Hands `url` to the platform opener without waiting for it.
pub fn open(url: &str) -> Result<()> {
	if !is_openable(url) {
		bail!("refusing to open non web url {url:?}");
	}

	let (program, args) = OPENER.split_first().context("no url opener for this platform")?;

	let mut command = Command::new(program);
	command.args(args).arg(url);
	spawn_reaped(&mut command).with_context(|| format!("failed to spawn {program}"))?;

	tracing::debug!(url, "opened in browser");

	Ok(())
}

/// Spawns `command` and waits for it on a detached thread so the child is
/// reaped once it exits.
fn spawn_reaped(command: &mut Command) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
	let mut child = command.spawn()?;

	thread::Builder::new().name(String::from("opener")).spawn(move || {
		let status = child.wait();
		match &status {
			Ok(status) if !status.success() => tracing::warn!("url opener exited with {}", status),
			Err(err) => tracing::warn!("failed to wait for url opener: {}", err),
			Ok(_) => {}
		}
		status
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_web_urls_are_openable() {
		assert!(is_openable("http://am.example/#/alerts?active=true"));
		assert!(is_openable("https://prometheus.example/graph?g0.expr=up"));
		assert!(!is_openable("file:///etc/passwd"));
		assert!(!is_openable("--help"));
		assert!(!is_openable(""));
	}

	#[test]
	fn refuses_non_web_urls() {
		assert!(open("javascript:alert(1)").is_err());
	}

	#[cfg(unix)]
	#[test]
	fn opener_is_reaped() {
		let reaper = spawn_reaped(Command::new("sh").args(["-c", "exit 3"])).unwrap();
		let status = reaper.join().unwrap().unwrap();
		assert_eq!(status.code(), Some(3));
	}
}
