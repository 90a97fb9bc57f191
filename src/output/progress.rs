//! Terminal progress line

use crate::output::traits::ProgressSink;
use crate::WebdlError;
use std::io::{self, Write};

/// Renders progress on stderr
///
/// In inline mode the line is redrawn in place; otherwise each tick is
/// written on its own line. Failed tasks are always reported, even when
/// ticks are turned off.
#[derive(Debug, Clone, Copy)]
pub struct TerminalProgress {
    inline: bool,
    ticks: bool,
}

impl TerminalProgress {
    pub fn new(inline: bool, ticks: bool) -> Self {
        Self { inline, ticks }
    }

    /// Ends the inline progress line
    pub fn finish(&self) {
        if self.inline && self.ticks {
            eprintln!();
        }
    }
}

/// Formats `completed/total [pct%]`
pub fn format_progress(completed: u64, total: u64) -> String {
    let percent = if total == 0 {
        100
    } else {
        completed.min(total) * 100 / total
    };
    format!("{}/{} [{}%]", completed, total, percent)
}

impl ProgressSink for TerminalProgress {
    fn report(&self, error: Option<&WebdlError>, completed: u64, total: u64) {
        let mut err = io::stderr().lock();
        let line = format_progress(completed, total);

        // Progress output is best effort
        let _ = if !self.ticks {
            match error {
                Some(e) => writeln!(err, "{}", e),
                None => Ok(()),
            }
        } else if self.inline {
            match error {
                Some(e) => write!(err, "\r\x1b[K{}\n{}", e, line),
                None => write!(err, "\r\x1b[K{}", line),
            }
        } else {
            match error {
                Some(e) => writeln!(err, "{}\n{}", e, line),
                None => writeln!(err, "{}", line),
            }
        };
        let _ = err.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0, 0), "0/0 [100%]");
        assert_eq!(format_progress(1, 4), "1/4 [25%]");
        assert_eq!(format_progress(4, 4), "4/4 [100%]");
    }
}
