use std::os::unix::io::RawFd;

use crate::io::read_at;

/// Allocation-free line iterator over a file descriptor, backed by a
/// caller-supplied buffer that must hold at least one expected line.
pub struct LineReader<'a> {
    fd: RawFd,
    buf: &'a mut [u8],
    offset: u64,
    bol: usize,
    eol: usize,
    eod: usize,
    primed: bool,
}

impl<'a> LineReader<'a> {
    pub fn new(fd: RawFd, buf: &'a mut [u8]) -> LineReader<'a> {
        LineReader { fd, buf, offset: 0, bol: 0, eol: 0, eod: 0, primed: false }
    }

    /// Returns the next line with its `'\n'` replaced in place by a NUL; the
    /// terminator is included in the slice so a suffix of the line can be
    /// used as a C string without copying. The sequence ends at EOF, at a
    /// line longer than the buffer, and at a final line with no newline.
    pub fn read_line(&mut self) -> Option<&[u8]> {
        if self.primed {
            self.bol = self.eol + 1;
        } else {
            self.primed = true;
        }
        if !self.has_complete_line() {
            // Relocate the incomplete tail to the front and refill after it.
            let tail = self.eod - self.bol;
            self.buf.copy_within(self.bol..self.eod, 0);
            let n = read_at(self.fd, &mut self.buf[tail..], self.offset).ok()?;
            if n == 0 {
                return None;
            }
            self.offset += n as u64;
            self.bol = 0;
            self.eod = tail + n;
        }
        let newline = self.buf[self.bol..self.eod].iter().position(|&b| b == b'\n')?;
        self.eol = self.bol + newline;
        self.buf[self.eol] = 0;
        Some(&self.buf[self.bol..=self.eol])
    }

    fn has_complete_line(&self) -> bool {
        self.buf[self.bol..self.eod].contains(&b'\n')
    }
}
