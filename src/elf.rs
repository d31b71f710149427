use std::io;
use std::os::unix::io::RawFd;

use crate::io::{read_at, read_exact_at};

pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;

pub const PT_LOAD: u32 = 1;

pub const SHT_SYMTAB: u32 = 2;
pub const SHT_DYNSYM: u32 = 11;

// Native-width ELF entry sizes; the inspected objects belong to the running
// process, so they match the target word size and endianness.
#[cfg(target_pointer_width = "64")]
pub const EHDR_SIZE: usize = 64;
#[cfg(target_pointer_width = "32")]
pub const EHDR_SIZE: usize = 52;

#[cfg(target_pointer_width = "64")]
pub const PHDR_SIZE: usize = 56;
#[cfg(target_pointer_width = "32")]
pub const PHDR_SIZE: usize = 32;

#[cfg(target_pointer_width = "64")]
pub const SHDR_SIZE: usize = 64;
#[cfg(target_pointer_width = "32")]
pub const SHDR_SIZE: usize = 40;

#[cfg(target_pointer_width = "64")]
pub const SYM_SIZE: usize = 24;
#[cfg(target_pointer_width = "32")]
pub const SYM_SIZE: usize = 16;

// Chunk sizes keep every table-scan frame near 1 KiB of stack.
const SHDR_CHUNK: usize = 16;
#[cfg(target_pointer_width = "64")]
const SYM_CHUNK: usize = 32;
#[cfg(target_pointer_width = "32")]
const SYM_CHUNK: usize = 64;

pub struct Ehdr {
    pub e_type: u16,
    pub e_phoff: u64,
    pub e_phnum: u16,
    pub e_shoff: u64,
    pub e_shnum: u16,
}

pub struct Phdr {
    pub p_type: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
}

pub struct Shdr {
    pub sh_type: u32,
    pub sh_link: u32,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_entsize: u64,
}

pub struct Sym {
    pub st_name: u32,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

// Each structure has one parser per ELF width; `parse` selects the native
// one. Both widths stay compiled in test builds so either layout can be
// checked from any host.

impl Ehdr {
    pub fn parse(b: &[u8]) -> Option<Ehdr> {
        #[cfg(target_pointer_width = "64")]
        {
            Ehdr::parse64(b)
        }
        #[cfg(target_pointer_width = "32")]
        {
            Ehdr::parse32(b)
        }
    }

    #[cfg(any(test, target_pointer_width = "64"))]
    fn parse64(b: &[u8]) -> Option<Ehdr> {
        if b[..4] != ELF_MAGIC {
            return None;
        }
        Some(Ehdr {
            e_type: u16_at(b, 16),
            e_phoff: u64_at(b, 32),
            e_phnum: u16_at(b, 56),
            e_shoff: u64_at(b, 40),
            e_shnum: u16_at(b, 60),
        })
    }

    #[cfg(any(test, target_pointer_width = "32"))]
    fn parse32(b: &[u8]) -> Option<Ehdr> {
        if b[..4] != ELF_MAGIC {
            return None;
        }
        Some(Ehdr {
            e_type: u16_at(b, 16),
            e_phoff: u64::from(u32_at(b, 28)),
            e_phnum: u16_at(b, 44),
            e_shoff: u64::from(u32_at(b, 32)),
            e_shnum: u16_at(b, 48),
        })
    }
}

impl Phdr {
    pub fn parse(b: &[u8]) -> Phdr {
        #[cfg(target_pointer_width = "64")]
        {
            Phdr::parse64(b)
        }
        #[cfg(target_pointer_width = "32")]
        {
            Phdr::parse32(b)
        }
    }

    #[cfg(any(test, target_pointer_width = "64"))]
    fn parse64(b: &[u8]) -> Phdr {
        Phdr { p_type: u32_at(b, 0), p_offset: u64_at(b, 8), p_vaddr: u64_at(b, 16) }
    }

    #[cfg(any(test, target_pointer_width = "32"))]
    fn parse32(b: &[u8]) -> Phdr {
        Phdr {
            p_type: u32_at(b, 0),
            p_offset: u64::from(u32_at(b, 4)),
            p_vaddr: u64::from(u32_at(b, 8)),
        }
    }
}

impl Shdr {
    fn parse(b: &[u8]) -> Shdr {
        #[cfg(target_pointer_width = "64")]
        {
            Shdr::parse64(b)
        }
        #[cfg(target_pointer_width = "32")]
        {
            Shdr::parse32(b)
        }
    }

    #[cfg(any(test, target_pointer_width = "64"))]
    fn parse64(b: &[u8]) -> Shdr {
        Shdr {
            sh_type: u32_at(b, 4),
            sh_link: u32_at(b, 40),
            sh_offset: u64_at(b, 24),
            sh_size: u64_at(b, 32),
            sh_entsize: u64_at(b, 56),
        }
    }

    #[cfg(any(test, target_pointer_width = "32"))]
    fn parse32(b: &[u8]) -> Shdr {
        Shdr {
            sh_type: u32_at(b, 4),
            sh_link: u32_at(b, 24),
            sh_offset: u64::from(u32_at(b, 16)),
            sh_size: u64::from(u32_at(b, 20)),
            sh_entsize: u64::from(u32_at(b, 36)),
        }
    }
}

impl Sym {
    fn parse(b: &[u8]) -> Sym {
        #[cfg(target_pointer_width = "64")]
        {
            Sym::parse64(b)
        }
        #[cfg(target_pointer_width = "32")]
        {
            Sym::parse32(b)
        }
    }

    #[cfg(any(test, target_pointer_width = "64"))]
    fn parse64(b: &[u8]) -> Sym {
        Sym {
            st_name: u32_at(b, 0),
            st_shndx: u16_at(b, 6),
            st_value: u64_at(b, 8),
            st_size: u64_at(b, 16),
        }
    }

    #[cfg(any(test, target_pointer_width = "32"))]
    fn parse32(b: &[u8]) -> Sym {
        Sym {
            st_name: u32_at(b, 0),
            st_shndx: u16_at(b, 14),
            st_value: u64::from(u32_at(b, 4)),
            st_size: u64::from(u32_at(b, 8)),
        }
    }
}

/// Looks up the symbol covering `pc` in the object behind `fd` and writes its
/// name into `out`. `base` is the load base of the object, added to every
/// `st_value` before the range check. The full symbol table is consulted
/// before the dynamic one, since only the former carries local symbols.
///
/// Ok(true): name delivered. Ok(false): the object has no matching symbol
/// (typically stripped). Err: structural read failure, including a name that
/// does not fit `out`.
pub fn find_symbol(fd: RawFd, pc: u64, out: &mut [u8], base: u64) -> io::Result<bool> {
    let mut ehdr_buf = [0u8; EHDR_SIZE];
    read_exact_at(fd, &mut ehdr_buf, 0)?;
    let ehdr = match Ehdr::parse(&ehdr_buf) {
        Some(ehdr) => ehdr,
        None => return Err(io::ErrorKind::InvalidData.into()),
    };

    for sh_type in [SHT_SYMTAB, SHT_DYNSYM] {
        let symtab = match section_by_type(fd, &ehdr, sh_type)? {
            Some(shdr) => shdr,
            None => continue,
        };
        let mut shdr_buf = [0u8; SHDR_SIZE];
        let strtab_off = ehdr.e_shoff + u64::from(symtab.sh_link) * SHDR_SIZE as u64;
        read_exact_at(fd, &mut shdr_buf, strtab_off)?;
        let strtab = Shdr::parse(&shdr_buf);
        if scan_symtab(fd, pc, out, base, &symtab, &strtab)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Finds the first section header of the given type, reading the table in
/// chunks of up to 16 headers.
fn section_by_type(fd: RawFd, ehdr: &Ehdr, sh_type: u32) -> io::Result<Option<Shdr>> {
    let mut buf = [0u8; SHDR_CHUNK * SHDR_SIZE];
    let mut i = 0usize;
    while i < ehdr.e_shnum as usize {
        let wanted = (ehdr.e_shnum as usize - i).min(SHDR_CHUNK) * SHDR_SIZE;
        let offset = ehdr.e_shoff + (i * SHDR_SIZE) as u64;
        let n = read_at(fd, &mut buf[..wanted], offset)?;
        let in_buf = n / SHDR_SIZE;
        if in_buf == 0 {
            break;
        }
        for j in 0..in_buf {
            let shdr = Shdr::parse(&buf[j * SHDR_SIZE..(j + 1) * SHDR_SIZE]);
            if shdr.sh_type == sh_type {
                return Ok(Some(shdr));
            }
        }
        i += in_buf;
    }
    Ok(None)
}

fn scan_symtab(
    fd: RawFd,
    pc: u64,
    out: &mut [u8],
    base: u64,
    symtab: &Shdr,
    strtab: &Shdr,
) -> io::Result<bool> {
    if symtab.sh_entsize as usize != SYM_SIZE {
        return Ok(false);
    }
    let count = (symtab.sh_size / symtab.sh_entsize) as usize;
    let mut buf = [0u8; SYM_CHUNK * SYM_SIZE];
    let mut i = 0usize;
    while i < count {
        let wanted = (count - i).min(SYM_CHUNK) * SYM_SIZE;
        let offset = symtab.sh_offset + (i * SYM_SIZE) as u64;
        let n = read_at(fd, &mut buf[..wanted], offset)?;
        let in_buf = n / SYM_SIZE;
        if in_buf == 0 {
            break;
        }
        for j in 0..in_buf {
            let sym = Sym::parse(&buf[j * SYM_SIZE..(j + 1) * SYM_SIZE]);
            if sym.st_value == 0 || sym.st_shndx == 0 {
                continue;
            }
            let start = sym.st_value.wrapping_add(base);
            let end = start.wrapping_add(sym.st_size);
            if start <= pc && pc < end {
                let got = read_at(fd, out, strtab.sh_offset + u64::from(sym.st_name))?;
                if got == 0 || !out[..got].contains(&0) {
                    // The name did not fit or the string table is truncated.
                    out.fill(0);
                    return Err(io::ErrorKind::InvalidData.into());
                }
                return Ok(true);
            }
        }
        i += in_buf;
    }
    Ok(false)
}

fn u16_at(b: &[u8], off: usize) -> u16 {
    u16::from_ne_bytes(b[off..off + 2].try_into().unwrap())
}

fn u32_at(b: &[u8], off: usize) -> u32 {
    u32::from_ne_bytes(b[off..off + 4].try_into().unwrap())
}

#[cfg(any(test, target_pointer_width = "64"))]
fn u64_at(b: &[u8], off: usize) -> u64 {
    u64::from_ne_bytes(b[off..off + 8].try_into().unwrap())
}
