//! Text output sink
//!
//! Destination for the human-readable configuration report. On a board this
//! is typically a UART retargeted for console output. The unit type discards
//! everything, for builds without a console.

use core::fmt::Write as FmtWrite;

use heapless::String;

/// Longest line the crate formats, terminator included.
pub const LINE_CAPACITY: usize = 64;

/// A line-oriented text writer.
pub trait TextSink {
    /// Write one line. `line` already carries its `\r\n` terminator.
    fn write_line(&mut self, line: &str);
}

/// No console attached: output is dropped.
impl TextSink for () {
    fn write_line(&mut self, _line: &str) {}
}

/// Collects output in memory, silently truncating once full.
impl<const N: usize> TextSink for String<N> {
    fn write_line(&mut self, line: &str) {
        for c in line.chars() {
            if self.push(c).is_err() {
                break;
            }
        }
    }
}

impl<S: TextSink + ?Sized> TextSink for &mut S {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }
}

/// Format a line into a stack buffer and hand it to `sink`.
///
/// Lines that do not fit in [`LINE_CAPACITY`] are dropped rather than
/// truncated.
pub fn write_fmt_line<S: TextSink + ?Sized>(sink: &mut S, args: core::fmt::Arguments<'_>) {
    let mut msg: String<LINE_CAPACITY> = String::new();
    if FmtWrite::write_fmt(&mut msg, args).is_ok() && msg.push_str("\r\n").is_ok() {
        sink.write_line(msg.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_crlf_terminated() {
        let mut out: String<128> = String::new();
        write_fmt_line(&mut out, format_args!("FCY: {} Hz", 40_000_000u32));
        write_fmt_line(&mut out, format_args!("done"));
        assert_eq!(out.as_str(), "FCY: 40000000 Hz\r\ndone\r\n");
    }

    #[test]
    fn overlong_lines_are_dropped() {
        let mut out: String<256> = String::new();
        write_fmt_line(&mut out, format_args!("{:>80}", "x"));
        assert!(out.is_empty());
    }

    #[test]
    fn full_buffer_truncates() {
        let mut out: String<4> = String::new();
        out.write_line("abcdef\r\n");
        assert_eq!(out.as_str(), "abcd");
    }

    #[test]
    fn unit_sink_discards() {
        write_fmt_line(&mut (), format_args!("ignored"));
    }
}
