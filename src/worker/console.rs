//! Shared console sink (§4.8 "Shared console"): a single lock around
//! `stdout`/`stderr`, with in-place progress repainting only when the
//! underlying stream is a terminal — checked once per thread via
//! `libc::isatty`, the same primitive the teacher's CLI tooling uses for
//! TTY detection.

use std::cell::Cell;
use std::io::Write;
use std::sync::Mutex;

thread_local! {
    static IS_TTY: Cell<Option<bool>> = Cell::new(None);
}

fn stdout_is_tty() -> bool {
    IS_TTY.with(|cell| {
        if let Some(v) = cell.get() {
            return v;
        }
        let v = unsafe { libc::isatty(libc::STDOUT_FILENO) } != 0;
        cell.set(Some(v));
        v
    })
}

#[derive(Default)]
struct ConsoleState {
    last_line_len: usize,
}

/// A single binary lock shared by every worker (§5 "Console: single binary
/// lock, fair"); `print_line` writes a normal line, `repaint_progress`
/// overwrites the previous progress line in place on a terminal and falls
/// back to a plain newline-terminated line otherwise.
pub struct Console {
    state: Mutex<ConsoleState>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self { state: Mutex::new(ConsoleState::default()) }
    }

    pub fn print_line(&self, line: &str) {
        let mut state = self.state.lock().unwrap();
        state.last_line_len = 0;
        println!("{}", line);
    }

    /// Repaints the "current progress" line. On a non-TTY stdout this is
    /// just a plain line (never rewritten, matching §4.8), since backspace
    /// repaint sequences would corrupt a log file.
    pub fn repaint_progress(&self, line: &str) {
        let mut state = self.state.lock().unwrap();
        if stdout_is_tty() {
            let mut stdout = std::io::stdout();
            if state.last_line_len > 0 {
                let _ = write!(stdout, "{}", "\u{8}".repeat(state.last_line_len));
            }
            let _ = write!(stdout, "{}", line);
            let _ = stdout.flush();
            state.last_line_len = line.chars().count();
        } else {
            println!("{}", line);
            state.last_line_len = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repaint_on_non_tty_never_rewrites() {
        // Test harnesses run with stdout captured (not a TTY), so this
        // exercises the "line-buffered, never rewritten" branch directly.
        let console = Console::new();
        console.repaint_progress("10%");
        console.repaint_progress("20%");
        // No panic, no backspace sequence written (nothing to assert on
        // captured stdout directly, but the branch taken is deterministic
        // under `cargo test`'s captured-output environment).
    }

    #[test]
    fn print_line_resets_progress_tracking() {
        let console = Console::new();
        console.repaint_progress("50%");
        console.print_line("done");
        let state = console.state.lock().unwrap();
        assert_eq!(state.last_line_len, 0);
    }
}
