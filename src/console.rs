//! The trait seams the core depends on for user-visible diagnostics.
//!
//! The core never prints directly: every recoverable surprise goes through
//! a `WarnSink`, and every value dump the executor is asked to produce goes
//! through a `PrintSink`. Callers can route both through [`log`], a
//! terminal, a test collector, or nowhere at all.

/// Suppressible warning sink. Mirrors the original's `Console::warn`, minus
/// the mutable global `suppress_warnings` flag: suppression is now just "use
/// a `WarnSink` that discards."
pub trait WarnSink {
    fn warn(&self, msg: &str);
}

/// Word-wrapping print sink, used for the executor's debug dumps of
/// `Value::to_struct()` results.
pub trait PrintSink {
    fn print(&self, msg: &str, header: &str);
}

/// A `WarnSink` that routes through [`log::warn!`].
#[derive(Default, Clone, Copy)]
pub struct LogWarnSink;
impl WarnSink for LogWarnSink {
    fn warn(&self, msg: &str) {
        log::warn!("{msg}");
    }
}

/// A `WarnSink` that discards everything, for tests that want the rest of
/// the diagnostic pipeline exercised without stdout/log noise.
#[derive(Default, Clone, Copy)]
pub struct NullWarnSink;
impl WarnSink for NullWarnSink {
    fn warn(&self, _msg: &str) {}
}

/// Width-aware word-wrap print sink targeting a fixed terminal width,
/// reproducing the original console's wrapping behaviour.
pub struct TermPrintSink {
    pub width: usize,
}
impl Default for TermPrintSink {
    fn default() -> Self {
        TermPrintSink { width: 80 }
    }
}
impl PrintSink for TermPrintSink {
    fn print(&self, msg: &str, header: &str) {
        for line in wrap(msg, header, self.width) {
            println!("{line}");
        }
    }
}

/// Word-wraps `msg` to `width` columns, indenting continuation lines to
/// align under the first line's header column.
///
/// Open question preserved as-is: the break search computes
/// `breakAt + (breakFound ? 1 : 0)` for the next slice start, which on a
/// message ending in a run of spaces can skip past the final word boundary
/// by one. We keep that behaviour rather than guess at a "fixed" semantics
/// the original never tested.
fn wrap(msg: &str, header: &str, width: usize) -> Vec<String> {
    let indent = " ".repeat(header.len());
    let avail = width.saturating_sub(header.len()).max(1);
    let bytes = msg.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0usize;
    let mut first = true;
    while start < bytes.len() {
        let remaining = bytes.len() - start;
        let take = remaining.min(avail);
        let mut break_at = start + take;
        let mut break_found = false;
        if remaining > avail {
            // Search backward from the hard cutoff for a space to break on.
            let mut i = break_at;
            while i > start {
                if bytes[i - 1] == b' ' {
                    break_at = i - 1;
                    break_found = true;
                    break;
                }
                i -= 1;
            }
            if !break_found {
                break_at = start + take;
            }
        }
        let prefix = if first { header } else { &indent };
        let slice = &msg[start..break_at.min(msg.len())];
        lines.push(format!("{prefix}{slice}"));
        start = break_at + if break_found { 1 } else { 0 };
        first = false;
    }
    if lines.is_empty() {
        lines.push(header.to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_a_single_line() {
        let lines = wrap("hello", "> ", 80);
        assert_eq!(lines, vec!["> hello".to_string()]);
    }

    #[test]
    fn long_message_wraps_on_word_boundaries() {
        let msg = "the quick brown fox jumps over the lazy dog";
        let lines = wrap(msg, "> ", 20);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 20 || !line.contains(' '));
        }
    }
}
