//! Composite backtraces across stacklet boundaries.
//!
//! Unwinders that rely on stack extents stop at the edge of a stacklet. A
//! full trace is assembled instead by capturing frames up to the boundary of
//! the stacklet we are running on, then yielding to the parent prompt with a
//! function that fills the remainder from the parent's stack and
//! tail-resumes with the count. This is a plain application of the yield
//! protocol and needs no extra machinery from the engine.

use crate::raw;
use crate::utils;
use core::ffi::c_void;
use core::mem::ManuallyDrop;
use core::slice;

/// Fill `buf` with the return addresses of the current call stack, crossing
/// prompt boundaries. Returns the number of frames captured.
pub fn backtrace(buf: &mut [*mut c_void]) -> usize {
    capture(buf)
}

fn capture(buf: &mut [*mut c_void]) -> usize {
    if buf.is_empty() {
        return 0;
    }
    let bounds = raw::current_stack_bounds();
    let mut n = 0;
    backtrace::trace(|frame| {
        let sp = frame.sp() as usize;
        // Stop at the boundary of the stacklet we are running on; the frames
        // beyond it belong to parent prompts and are captured from there.
        if let Some((bottom, top)) = bounds {
            if sp != 0 && !(bottom..top).contains(&sp) {
                return false;
            }
        }
        if n >= buf.len() {
            return false;
        }
        buf[n] = frame.ip();
        n += 1;
        true
    });
    if n >= buf.len() {
        return n;
    }
    let p = raw::prompt_top();
    if p.is_null() {
        return n;
    }
    // More frames live below the current prompt: yield up and capture them
    // from the parent's stack.
    let mut env = YieldEnv {
        buf: buf[n..].as_mut_ptr(),
        len: buf.len() - n,
    };
    // Safety: the current top is an ancestor by definition, and `fill`
    // either tail-resumes (delivering the count) or never runs the answer
    // path at all.
    let m = unsafe {
        raw::prompt_yield(
            raw::ReturnKind::YieldOnce,
            p,
            fill,
            (&raw mut env).cast(),
        )
    };
    // Safety: the tail resume encoded a `usize`.
    n + unsafe { utils::decode_val::<usize>(m) }
}

struct YieldEnv {
    buf: *mut *mut c_void,
    len: usize,
}

/// Runs on the parent's stack: capture the remaining frames, then tail-resume
/// the suspended yielder with the count. Never returns, so the answer slot
/// stays untouched.
unsafe fn fill(r: raw::RawResume, env: *mut u8, _out: *mut u8) {
    // Safety: `env` points at the `YieldEnv` on the parked yielder stack and
    // the buffer it references stays borrowed for the whole yield.
    unsafe {
        let env = env.cast::<YieldEnv>();
        let n = capture(slice::from_raw_parts_mut((*env).buf, (*env).len));
        let mut slot = ManuallyDrop::new(n);
        let encoded = utils::encode_val(&mut slot);
        // Tail resume: constant parent-stack depth however many boundaries
        // the trace crosses. Never returns for a once resumption.
        raw::resume_tail::<()>(r, encoded);
    }
}
