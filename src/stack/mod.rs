//! Growable stacklets for prompts.
//!
//! Each prompt owns one stacklet: a lazily committed stack region with a
//! guard page. The region between [`Stacklet::base`] and [`Stacklet::top`] is
//! reserved at allocation time for the prompt header, so the header is freed
//! together with the stack and needs no allocation of its own. Suspended
//! stacklets can be snapshotted and restored byte-for-byte, which is what
//! makes multi-shot resumption possible.

use std::cell::RefCell;
use std::io;
use std::ptr;
use std::slice;
use std::sync::OnceLock;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod valgrind;
        mod unix;
        use unix::StackMemory;
    } else {
        compile_error!("Unsupported platform");
    }
}

pub(crate) type StackPointer = core::num::NonZeroUsize;

/// Minimum size of a stack, excluding guard pages.
pub const MIN_STACK_SIZE: usize = 4096;

pub use crate::arch::STACK_ALIGNMENT;

const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Global configuration, applied by [`init`](crate::init) before the first
/// prompt is created.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Usable size of each stacklet in bytes (excluding the guard page).
    /// Pages are committed lazily, so a generous size costs address space,
    /// not memory.
    pub stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// One-shot setup; later calls are ignored.
pub(crate) fn init(config: Config) {
    let _ = CONFIG.set(config);
}

fn configured_stack_size() -> usize {
    CONFIG.get().map_or(DEFAULT_STACK_SIZE, |c| c.stack_size)
}

thread_local! {
    /// Stacklets whose release was delayed until after an in-flight unwind.
    static DELAYED: RefCell<Vec<Stacklet>> = const { RefCell::new(Vec::new()) };
}

/// One prompt-owned stack region.
///
/// The descriptor is plain data and lives inside the prompt header, which
/// itself lives inside the mapping it describes; releasing the stacklet
/// therefore requires reading the descriptor out of the header first.
pub(crate) struct Stacklet {
    memory: StackMemory,
    /// Highest usable address: everything in `[base, top)` has been carved
    /// off by [`reserve`](Self::reserve).
    base: StackPointer,
}

impl Stacklet {
    /// Allocate a fresh stacklet of the configured size. Also drains any
    /// releases that were delayed past an unwind.
    pub fn alloc() -> io::Result<Self> {
        DELAYED.with(|d| d.borrow_mut().clear());
        let memory = StackMemory::new(configured_stack_size())?;
        let base = memory.top();
        Ok(Self { memory, base })
    }

    /// Carve `size` bytes off the base of the stacklet, returning a pointer
    /// to the reserved region. The new base stays aligned so the reserved
    /// region can be used for ordinary data and the remainder as a stack.
    pub fn reserve(&mut self, size: usize, align: usize) -> *mut u8 {
        let align = align.max(STACK_ALIGNMENT);
        let addr = (self.base.get() - size) & !(align - 1);
        assert!(
            addr > self.memory.bottom().get() + MIN_STACK_SIZE,
            "reservation does not leave room for a stack"
        );
        self.base = StackPointer::new(addr).unwrap();
        addr as *mut u8
    }

    /// The initial stack pointer for entering this stacklet; everything above
    /// it is reserved.
    pub fn base(&self) -> StackPointer {
        self.base
    }

    /// Highest address of the mapping (end of the reserved region).
    pub fn top(&self) -> StackPointer {
        self.memory.top()
    }

    /// Lowest address of the mapping, including the guard page.
    pub fn bottom(&self) -> StackPointer {
        self.memory.bottom()
    }

    /// Copy the live bytes `[sp, top)` out of a suspended stacklet. The range
    /// includes the reserved region at the base, so restoring brings the
    /// prompt header back along with the stack contents.
    pub unsafe fn snapshot(&self, sp: usize) -> StackSnapshot {
        debug_assert!(sp >= self.bottom().get() && sp <= self.top().get());
        let len = self.top().get() - sp;
        // Safety: the range is within the mapping and nothing is executing on
        // this stacklet while it is suspended.
        let data = unsafe { slice::from_raw_parts(sp as *const u8, len) }
            .to_vec()
            .into_boxed_slice();
        StackSnapshot {
            dest: sp as *mut u8,
            data,
        }
    }

    /// Unmap the stacklet, or park it on the delayed list so the unmap
    /// happens after the current unwind has left the region.
    pub fn release(self, delay: bool) {
        if delay {
            DELAYED.with(|d| d.borrow_mut().push(self));
        }
    }
}

/// A pristine copy of a suspended stacklet's live bytes.
pub(crate) struct StackSnapshot {
    dest: *mut u8,
    data: Box<[u8]>,
}

impl StackSnapshot {
    /// Copy the saved bytes back into place. The bytes are restored verbatim,
    /// prompt header included; refcounts are not adjusted here.
    pub unsafe fn restore(&self) {
        // Safety: `dest` still points into the stacklet the snapshot was
        // taken from, which is suspended and therefore not executing.
        unsafe {
            ptr::copy_nonoverlapping(self.data.as_ptr(), self.dest, self.data.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Stacklet;

    #[test]
    fn snapshot_restore() {
        let mut stacklet = Stacklet::alloc().unwrap();
        let reserved = stacklet.reserve(64, 16);

        // Scribble below the base as if a stack frame lived there.
        let sp = stacklet.base().get() - 256;
        // Safety: the addresses are within the committed part of the mapping.
        unsafe {
            (sp as *mut u64).write(0xdead_beef);
            reserved.cast::<u64>().write(42);

            let snapshot = stacklet.snapshot(sp);
            (sp as *mut u64).write(0);
            reserved.cast::<u64>().write(0);

            snapshot.restore();
            assert_eq!((sp as *const u64).read(), 0xdead_beef);
            assert_eq!(reserved.cast::<u64>().read(), 42);
        }
    }
}
