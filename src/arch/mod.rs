// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use aarch64::*;
    } else if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use x86_64::*;
    } else {
        compile_error!("Unsupported target architecture");
    }
}

/// A saved continuation: resume address, stack pointer and the callee-saved
/// registers LLVM reserves for itself. The remaining callee-saved registers
/// are spilled into the saving frame by the compiler via the clobber lists in
/// the per-arch code.
///
/// A buffer can be jumped to any number of times: nothing consumes it, and
/// the frame it belongs to is parked above the saved stack pointer where
/// later execution cannot scribble over it. Tail resumes rely on exactly
/// that, re-entering the same return point over and over.
///
/// The field offsets are hardcoded in the per-arch assembly; `reg_sp` also
/// serves as the upper bound of the live byte range when a suspended chain
/// is snapshotted.
#[repr(C)]
#[derive(Debug)]
pub struct JmpBuf {
    /// Stack pointer at the save point.
    pub reg_sp: usize,
    /// Resume address inside the saving assembly block.
    reg_ip: usize,
    /// RBX / X19.
    saved0: usize,
    /// RBP / X29.
    saved1: usize,
}

impl JmpBuf {
    pub const fn new() -> Self {
        Self {
            reg_sp: 0,
            reg_ip: 0,
            saved0: 0,
            saved1: 0,
        }
    }
}
