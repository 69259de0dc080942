//! Best-effort clipboard support for the relay status link.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::{self, IsTerminal, Write};
use tracing::info;

/// OSC 52 escape asking the terminal to place `text` on the system clipboard.
pub fn osc52_sequence(text: &str) -> String {
	format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

/// Copies `text` through the terminal when stdout is one, otherwise prints it
/// so it can be selected by hand.
pub fn copy(text: &str) -> io::Result<()> {
	let mut stdout = io::stdout().lock();
	if stdout.is_terminal() {
		stdout.write_all(osc52_sequence(text).as_bytes())?;
	} else {
		writeln!(stdout, "{}", text)?;
	}
	stdout.flush()?;

	info!("Copied to Clipboard");
	Ok(())
}
