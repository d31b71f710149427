use std::ffi::CStr;

use crate::elf;
use crate::io::{read_exact_at, ScopedFd};
use crate::line::LineReader;
use crate::text::scan_hex;

/// Outcome of locating the object file behind a program counter. In both
/// cases the object's pathname (possibly empty) has been copied into the
/// caller's name buffer.
#[derive(Debug)]
pub enum Object {
    Opened { fd: ScopedFd, start: u64, base: u64 },
    Unopenable { start: u64, base: u64 },
}

/// Walks `/proc/self/maps` for the executable mapping covering `pc`,
/// computing the module load base from ELF headers read out of
/// `/proc/self/mem`. First matching line wins. Returns None when no mapping
/// covers `pc`, when proc is unavailable, or on a malformed line.
pub fn find_object(pc: u64, name: &mut [u8]) -> Option<Object> {
    let maps = ScopedFd::open(c"/proc/self/maps").ok()?;
    let mem = ScopedFd::open(c"/proc/self/mem").ok()?;

    let mut line_buf = [0u8; 1024];
    let mut reader = LineReader::new(maps.as_raw_fd(), &mut line_buf);
    let mut base = 0u64;

    loop {
        // START-END FLAGS OFFSET DEV INODE PATHNAME
        let line = reader.read_line()?;

        let (start, rest) = scan_hex(line);
        let rest = match rest.split_first() {
            Some((&b'-', rest)) => rest,
            _ => return None,
        };
        let (end, rest) = scan_hex(rest);
        let flags = match rest.split_first() {
            Some((&b' ', rest)) => rest,
            _ => return None,
        };
        let flags_len = flags.iter().position(|&b| b == b' ')?;
        if flags_len < 4 {
            return None;
        }

        // Track the load base of whichever object these lines belong to.
        // Only the segment mapped at file offset 0 carries an ELF header, so
        // later segments of the same object inherit the value computed here.
        if flags[0] == b'r' {
            if let Some(b) = module_base(&mem, start) {
                base = b;
            }
        }

        if pc < start || pc >= end {
            continue;
        }
        if flags[0] != b'r' || flags[2] != b'x' {
            continue;
        }

        let (_file_offset, rest) = scan_hex(&flags[flags_len + 1..]);
        let rest = match rest.split_first() {
            Some((&b' ', rest)) => rest,
            _ => return None,
        };

        // Two more spaces separate the dev and inode fields from the
        // pathname; extra padding before the pathname collapses here too.
        let mut spaces = 0usize;
        let mut i = 0usize;
        while i < rest.len() {
            if rest[i] == b' ' {
                spaces += 1;
            } else if spaces >= 2 {
                break;
            }
            i += 1;
        }
        if i >= rest.len() {
            return None;
        }

        // The line reader NUL-terminated the line, so the pathname suffix is
        // already a C string.
        let path = CStr::from_bytes_until_nul(&rest[i..]).ok()?;
        copy_name(path.to_bytes(), name);

        return Some(match ScopedFd::open(path) {
            Ok(fd) => Object::Opened { fd, start, base },
            Err(_) => Object::Unopenable { start, base },
        });
    }
}

/// Derives the load base of the object mapped at `start` by inspecting its
/// in-memory ELF header: 0 for ET_EXEC; for ET_DYN, `start` minus the
/// virtual address of the PT_LOAD segment at file offset 0 (falling back to
/// `start` when no such segment exists). None leaves the caller's running
/// value untouched.
fn module_base(mem: &ScopedFd, start: u64) -> Option<u64> {
    let mut ehdr_buf = [0u8; elf::EHDR_SIZE];
    read_exact_at(mem.as_raw_fd(), &mut ehdr_buf, start).ok()?;
    let ehdr = elf::Ehdr::parse(&ehdr_buf)?;

    match ehdr.e_type {
        elf::ET_EXEC => Some(0),
        elf::ET_DYN => {
            for i in 0..u64::from(ehdr.e_phnum) {
                let mut phdr_buf = [0u8; elf::PHDR_SIZE];
                let offset = start + ehdr.e_phoff + i * elf::PHDR_SIZE as u64;
                if read_exact_at(mem.as_raw_fd(), &mut phdr_buf, offset).is_err() {
                    continue;
                }
                let phdr = elf::Phdr::parse(&phdr_buf);
                if phdr.p_type == elf::PT_LOAD && phdr.p_offset == 0 {
                    return Some(start.wrapping_sub(phdr.p_vaddr));
                }
            }
            Some(start)
        }
        _ => None,
    }
}

fn copy_name(path: &[u8], name: &mut [u8]) {
    if name.is_empty() {
        return;
    }
    let n = path.len().min(name.len() - 1);
    name[..n].copy_from_slice(&path[..n]);
    name[n] = 0;
}
