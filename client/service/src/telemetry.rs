//! Logging setup and the small `std::io::Write` adapters telemetry output is layered over.

use std::io::{self, Write};

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber` global subscriber reading its filter from `RUST_LOG`,
/// falling back to `info` when unset. Safe to call once per process; a second call is a no-op
/// error this function swallows, since integration tests may initialize it more than once.
pub fn init_logging() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Wraps a `Write` sink, prepending `prefix` to every write. Used to tag a node's telemetry
/// lines (e.g. with its identity or role) before they reach a shared log sink such as a
/// multi-node integration test harness's combined output stream.
pub struct PrefixWriter<W> {
	prefix: String,
	inner: W,
}

impl<W: Write> PrefixWriter<W> {
	pub fn new(prefix: impl Into<String>, inner: W) -> Self {
		PrefixWriter { prefix: prefix.into(), inner }
	}
}

impl<W: Write> Write for PrefixWriter<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.inner.write_all(self.prefix.as_bytes())?;
		self.inner.write_all(buf)?;
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		self.inner.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn two_writes_each_carry_the_prefix_and_report_the_unprefixed_byte_count() {
		let mut sink = Vec::new();
		let mut writer = PrefixWriter::new("[node-a] ", &mut sink);

		let n1 = writer.write(b"hello\n").unwrap();
		let n2 = writer.write(b"world\n").unwrap();

		assert_eq!(n1, 6);
		assert_eq!(n2, 6);
		assert_eq!(sink, b"[node-a] hello\n[node-a] world\n");
	}
}
