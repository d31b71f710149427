use std::ffi::CStr;
use std::mem;
use std::os::raw::c_void;

/// macOS backend: a single dynamic-linker query. The reported name is copied
/// bounded into `out`; there is no `<path>+0x<offset>` fallback.
pub fn symbolize(pc: usize, out: &mut [u8]) -> bool {
    if out.is_empty() {
        return false;
    }

    let mut info: libc::Dl_info = unsafe { mem::zeroed() };
    if unsafe { libc::dladdr(pc as *const c_void, &mut info) } == 0 || info.dli_sname.is_null() {
        return false;
    }

    let name = unsafe { CStr::from_ptr(info.dli_sname) }.to_bytes();
    let n = name.len().min(out.len() - 1);
    out[..n].copy_from_slice(&name[..n]);
    out[n] = 0;
    out[out.len() - 1] = 0;
    true
}
