use crate::elf;
use crate::maps::{self, Object};
use crate::text;

// Room for the shortest fallback, "+0x0" plus its terminator.
const MIN_OUT_LEN: usize = 5;

/// Linux backend: locate the object behind `pc`, then resolve the symbol
/// from its tables. When the mapping is known but the name is not (deleted
/// binary, stripped object), the buffer is filled with the
/// `<path>+0x<offset>` fallback instead and the call still succeeds.
pub fn symbolize(pc: usize, out: &mut [u8]) -> bool {
    if out.len() < MIN_OUT_LEN {
        return false;
    }
    out[0] = 0;
    let last = out.len() - 1;
    out[last] = 0;

    let pc = pc as u64;
    let ok = match maps::find_object(pc, out) {
        None => false,
        Some(Object::Unopenable { start, base }) => {
            assert!(start <= pc, "located mapping does not cover pc");
            // An anonymous mapping yields an empty name; nothing to report.
            if out[0] == 0 {
                false
            } else {
                text::append_addr_suffix(out, pc, base);
                true
            }
        }
        Some(Object::Opened { fd, start, base }) => {
            assert!(start <= pc, "located mapping does not cover pc");
            match elf::find_symbol(fd.as_raw_fd(), pc, out, base) {
                Ok(true) => true,
                Ok(false) => {
                    // Stripped object: the pathname is still in the buffer,
                    // as the resolver writes only when it finds a match.
                    text::append_addr_suffix(out, pc, base);
                    true
                }
                Err(_) => false,
            }
        }
    };

    out[last] = 0;
    ok
}
