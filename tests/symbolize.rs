// End-to-end scenarios against the live test process: the test binary's own
// functions must resolve to their mangled names, unmapped addresses must
// miss, and unopenable mappings fall back to an address suffix.
#![cfg(target_os = "linux")]

#[inline(never)]
fn probe_alpha() -> u32 {
    std::hint::black_box(0xa1)
}

#[inline(never)]
fn probe_bravo() -> u32 {
    std::hint::black_box(0xb2)
}

#[inline(never)]
fn probe_charlie() -> u32 {
    std::hint::black_box(0xc3)
}

#[inline(never)]
fn probe_delta() -> u32 {
    std::hint::black_box(0xd4)
}

#[inline(never)]
fn probe_echo() -> u32 {
    std::hint::black_box(0xe5)
}

#[inline(never)]
fn probe_foxtrot() -> u32 {
    std::hint::black_box(0xf6)
}

fn sym_str(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end]).unwrap()
}

/// Address range of the vdso, an executable ELF mapping whose "path" cannot
/// be opened. None when the environment maps no vdso.
fn vdso_range() -> Option<(u64, u64)> {
    let maps = std::fs::read_to_string("/proc/self/maps").unwrap();
    let line = maps.lines().find(|l| l.ends_with("[vdso]") && l.contains("r-xp"))?;
    let (range, _) = line.split_once(' ')?;
    let (start, end) = range.split_once('-')?;
    Some((u64::from_str_radix(start, 16).ok()?, u64::from_str_radix(end, 16).ok()?))
}

#[test]
fn resolves_own_function_to_its_mangled_name() {
    let mut buf = [0u8; 256];
    assert!(sigsym::symbolize(probe_alpha as usize, &mut buf));
    let name = sym_str(&buf);
    assert!(name.contains("probe_alpha"), "unexpected symbol: {name}");
}

#[test]
fn resolves_addresses_inside_a_function_body() {
    // A few bytes past the entry point still belong to the same symbol.
    let mut buf = [0u8; 256];
    assert!(sigsym::symbolize(probe_bravo as usize + 2, &mut buf));
    let name = sym_str(&buf);
    assert!(name.contains("probe_bravo"), "unexpected symbol: {name}");
}

#[test]
fn misses_unmapped_addresses() {
    let mut buf = [0u8; 256];
    assert!(!sigsym::symbolize(0x1, &mut buf));
}

#[test]
fn rejects_capacity_below_minimum() {
    let mut buf = [0xAAu8; 4];
    assert!(!sigsym::symbolize(probe_alpha as usize, &mut buf));
    assert_eq!(buf, [0xAA; 4], "rejected calls must not write");
}

#[test]
fn never_writes_past_capacity() {
    let mut arena = [0xAAu8; 300];
    assert!(sigsym::symbolize(probe_charlie as usize, &mut arena[..256]));
    assert_eq!(arena[255], 0);
    assert!(arena[256..].iter().all(|&b| b == 0xAA));
}

#[test]
fn resolves_distinct_nested_frames() {
    let frames = [
        ("probe_alpha", probe_alpha as usize),
        ("probe_bravo", probe_bravo as usize),
        ("probe_charlie", probe_charlie as usize),
        ("probe_delta", probe_delta as usize),
        ("probe_echo", probe_echo as usize),
        ("probe_foxtrot", probe_foxtrot as usize),
    ];
    let mut names = Vec::new();
    for (expected, pc) in frames {
        let mut buf = [0u8; 256];
        assert!(sigsym::symbolize(pc, &mut buf), "failed to symbolize {expected}");
        let name = sym_str(&buf).to_string();
        assert!(name.contains(expected), "expected {expected}, got {name}");
        names.push(name);
    }
    let distinct: std::collections::HashSet<_> = names.iter().collect();
    assert_eq!(distinct.len(), frames.len());
}

#[test]
fn falls_back_for_unopenable_objects() {
    let Some((start, end)) = vdso_range() else {
        return;
    };
    let pc = (start + (end - start) / 2) as usize;

    let mut buf = [0u8; 256];
    assert!(sigsym::symbolize(pc, &mut buf));
    let name = sym_str(&buf);
    assert!(name.starts_with("[vdso]"), "expected the mapping name, got: {name}");
    assert!(name.contains("+0x"), "expected an address suffix, got: {name}");
}

#[test]
fn tiny_capacity_still_terminates_the_fallback() {
    let Some((start, end)) = vdso_range() else {
        return;
    };
    let pc = (start + (end - start) / 2) as usize;

    let mut buf = [0xAAu8; 5];
    assert!(sigsym::symbolize(pc, &mut buf));
    assert_eq!(buf[4], 0);
}

#[test]
fn demangle_is_declared_but_unimplemented() {
    let mut buf = [0u8; 64];
    assert!(!sigsym::demangle(c"_Z6targetv", &mut buf));
}
