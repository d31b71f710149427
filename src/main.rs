use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Symbolize one hex address from this process instead of the demo trace
    #[arg(short, long)]
    address: Option<String>,
}

#[inline(never)]
fn frame_one() -> u32 {
    std::hint::black_box(1)
}

#[inline(never)]
fn frame_two() -> u32 {
    std::hint::black_box(2)
}

#[inline(never)]
fn frame_three() -> u32 {
    std::hint::black_box(3)
}

#[inline(never)]
fn frame_four() -> u32 {
    std::hint::black_box(4)
}

#[inline(never)]
fn frame_five() -> u32 {
    std::hint::black_box(5)
}

#[inline(never)]
fn frame_six() -> u32 {
    std::hint::black_box(6)
}

fn print_frame(index: usize, pc: usize) {
    let mut symbol = [0u8; 256];
    let ok = sigsym::symbolize(pc, &mut symbol);
    let end = symbol.iter().position(|&b| b == 0).unwrap_or(symbol.len());
    let name = String::from_utf8_lossy(&symbol[..end]);
    if ok && !name.is_empty() {
        println!("[{index:02}] 0x{pc:016x} {name}");
    } else {
        println!("[{index:02}] 0x{pc:016x} <unknown>");
    }
}

fn main() {
    let args = Args::parse();

    if let Some(addr) = args.address {
        let trimmed = addr.trim_start_matches("0x");
        match usize::from_str_radix(trimmed, 16) {
            Ok(pc) => print_frame(0, pc),
            Err(e) => eprintln!("invalid address {addr}: {e}"),
        }
        return;
    }

    let frames = [
        frame_six as usize,
        frame_five as usize,
        frame_four as usize,
        frame_three as usize,
        frame_two as usize,
        frame_one as usize,
    ];
    for (i, pc) in frames.iter().enumerate() {
        print_frame(frames.len() - 1 - i, *pc);
    }
}
