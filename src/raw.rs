//! The prompt/resumption engine.
//!
//! A prompt marks a point on the stack that code running below it can yield
//! to. Yielding unlinks the sub-chain of stacklets between the yield point
//! and the prompt and packages it as a *resumption*: a first-class value that
//! can be invoked later (once, or many times for multi-shot resumptions) to
//! continue from the yield point.
//!
//! Everything here is `unsafe` and works on raw prompt pointers and
//! `usize`-encoded values; the typed wrappers live at the crate root. The
//! operations come in mirror pairs: [`link`]/[`unlink`] move a prompt in and
//! out of the per-thread chain, and every control transfer is an
//! unlink-then-jump answered by a link-then-jump on the other side.

use crate::arch::{self, JmpBuf};
use crate::stack::{StackSnapshot, Stacklet};
use crate::utils::EncodedValue;
use core::any::Any;
use core::cell::Cell;
use core::mem::MaybeUninit;
use core::ptr;
use std::panic;

/// How control came back to a return point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnKind {
    /// Normal return from the prompt's start function.
    Return,
    /// The start function escaped with a panic.
    Exception,
    /// Yield that can be resumed at most once.
    YieldOnce,
    /// Yield that can be resumed multiple times (or not at all).
    YieldMulti,
}

/// Yield functions run on the receiving side of a yield, on the stack of the
/// prompt's parent. `resume` is the captured resumption, `env` the argument
/// pointer passed to the yield, and the answer must be written to `out`,
/// which points to an uninitialized slot for the prompt's answer type.
///
/// A yield function that never returns (because it tail-resumes) may leave
/// `out` untouched.
pub type YieldFn = unsafe fn(resume: RawResume, env: *mut u8, out: *mut u8);

/// Allocated on the resuming stack for the duration of one resume; the yield
/// or return that ends the resume jumps back here.
///
/// The jump buffer must stay the first field; the engine recovers the parked
/// stack pointer from return points when snapshotting a suspended chain.
#[repr(C)]
pub struct ReturnPoint {
    jmp: JmpBuf,
    kind: ReturnKind,
    /// If yielding, the function to execute.
    fun: Option<YieldFn>,
    /// If yielding, the argument to the function; if returning, the result.
    arg: EncodedValue,
    /// Set when returning with a panic to propagate.
    exn: Option<Box<dyn Any + Send>>,
}

/// Allocated on the yielding stack; a future resume deposits its argument in
/// `result` and jumps to `jmp`.
#[repr(C)]
pub struct ResumePoint {
    jmp: JmpBuf,
    result: EncodedValue,
}

/// Entry shims are monomorphized per start closure and stored type-erased in
/// the prompt header.
pub(crate) type StartFn = unsafe extern "C" fn(env: *mut u8) -> !;

/// Passed to the entry shim through a register; lives on the resuming stack,
/// which stays parked until the shim has read it.
pub(crate) struct EntryEnv {
    pub prompt: *mut RawPrompt,
    pub arg: EncodedValue,
}

/// A prompt: one growable stacklet plus bookkeeping.
///
/// A prompt is in one of two states:
/// - *active*: `top` is null; the prompt is part of the current chain and
///   reachable from [`prompt_top`] by walking `parent`.
/// - *suspended*: `top` points to the deepest prompt of the captured
///   sub-chain (itself, if never entered or captured alone) and `parent` is
///   null.
///
/// The header lives at the base of the stacklet it describes, so freeing the
/// stacklet frees the header too.
pub struct RawPrompt {
    /// When active, the previous prompt down the current chain (towards the
    /// thread's own stack); null when suspended.
    parent: *mut RawPrompt,
    /// When suspended, the head of the captured sub-chain; null when active.
    top: *mut RawPrompt,
    /// Owning references: handles, save entries. Non-atomic; prompts never
    /// cross threads.
    refcount: isize,
    /// The stacklet this prompt owns.
    stack: Stacklet,
    /// While active, the return point on the parent stack.
    return_point: *mut ReturnPoint,
    /// While suspended, the resume point on the yielder stack; null iff the
    /// prompt has never been entered.
    resume_point: *mut ResumePoint,
    /// Entry shim and the reserved bytes holding the start closure; both
    /// cleared on first entry.
    start_fun: Option<StartFn>,
    start_env: *mut u8,
}

//-----------------------------------------------------------------------
// Prompt chain
//-----------------------------------------------------------------------

thread_local! {
    /// The prompt on whose stacklet this thread currently executes.
    static PROMPT_TOP: Cell<*mut RawPrompt> = const { Cell::new(ptr::null_mut()) };
}

/// The top of the prompt chain: the prompt on whose stacklet the thread is
/// currently executing, or null when running on the thread's own stack.
pub fn prompt_top() -> *mut RawPrompt {
    PROMPT_TOP.with(Cell::get)
}

fn set_prompt_top(p: *mut RawPrompt) {
    PROMPT_TOP.with(|top| top.set(p));
}

/// Walk the prompt chain towards the root; with null, the first prompt
/// returned is the current top. Returns null when the chain is exhausted.
pub unsafe fn prompt_parent(p: *mut RawPrompt) -> *mut RawPrompt {
    if p.is_null() {
        prompt_top()
    } else {
        // Safety: ensured by caller
        unsafe { (*p).parent }
    }
}

/// Bounds `(bottom, top)` of the stacklet the thread currently executes on,
/// or `None` on the thread's own stack. Used by the backtrace bridge.
pub fn current_stack_bounds() -> Option<(usize, usize)> {
    let top = prompt_top();
    if top.is_null() {
        None
    } else {
        // Safety: an active prompt header is live for as long as it is
        // reachable from the chain.
        let stack = unsafe { &(*top).stack };
        Some((stack.bottom().get(), stack.top().get()))
    }
}

/// An active prompt is currently part of the stack. Debug-assertion helper.
unsafe fn is_active(p: *mut RawPrompt) -> bool {
    // Safety: ensured by caller
    !p.is_null() && unsafe { (*p).top.is_null() }
}

/// Is `p` an ancestor of the current top? Debug-assertion helper.
unsafe fn is_ancestor(p: *mut RawPrompt) -> bool {
    let mut q = ptr::null_mut();
    loop {
        // Safety: ensured by caller
        q = unsafe { prompt_parent(q) };
        if q.is_null() {
            return false;
        }
        if q == p {
            return true;
        }
    }
}

//-----------------------------------------------------------------------
// Prompt allocation and lifecycle
//-----------------------------------------------------------------------

/// Allocate a fresh suspended prompt with `start_fun` as its entry shim.
///
/// Reserves `env_size`/`env_align` bytes at the base of the new stacklet for
/// the start closure and returns the prompt together with the reserved
/// pointer; the caller writes the closure there before the first resume.
/// Stack exhaustion is fatal.
pub(crate) fn prompt_create(
    start_fun: StartFn,
    env_size: usize,
    env_align: usize,
) -> (*mut RawPrompt, *mut u8) {
    let mut stack = Stacklet::alloc().unwrap_or_else(|err| {
        log::error!("unable to allocate a stack: {err}");
        std::process::abort();
    });
    // Carve the prompt header and the start environment from the base of the
    // new stacklet; no separate allocations.
    let header = stack
        .reserve(size_of::<RawPrompt>(), align_of::<RawPrompt>())
        .cast::<RawPrompt>();
    let env = stack.reserve(env_size, env_align);
    // Safety: `header` is a fresh, aligned, writable reservation.
    unsafe {
        header.write(RawPrompt {
            parent: ptr::null_mut(),
            top: header,
            refcount: 1,
            stack,
            return_point: ptr::null_mut(),
            resume_point: ptr::null_mut(),
            start_fun: Some(start_fun),
            start_env: env,
        });
    }
    (header, env)
}

/// Take the start closure pointer out of a freshly entered prompt, clearing
/// both start slots.
pub(crate) unsafe fn take_start(p: *mut RawPrompt) -> *mut u8 {
    // Safety: ensured by caller
    unsafe {
        debug_assert!((*p).start_fun.is_some() && !(*p).start_env.is_null());
        let env = (*p).start_env;
        (*p).start_env = ptr::null_mut();
        (*p).start_fun = None;
        env
    }
}

/// Free a suspended prompt and the captured chain it carries, walking from
/// the deepest prompt towards `p` itself.
unsafe fn prompt_free(p: *mut RawPrompt, delay: bool) {
    // Safety: ensured by caller
    unsafe {
        debug_assert!(!is_active(p));
        let mut q = (*p).top;
        while !q.is_null() {
            // Interior prompts of a captured chain may still carry the count
            // of the parked resume that entered them.
            debug_assert!((*q).refcount <= 1);
            let parent = (*q).parent;
            // Read the descriptor out of the header before the mapping that
            // holds the header goes away.
            let stack = ptr::read(&raw const (*q).stack);
            stack.release(delay);
            if !parent.is_null() {
                (*parent).refcount -= 1;
            }
            q = parent;
        }
    }
}

unsafe fn prompt_drop_internal(p: *mut RawPrompt, delay: bool) {
    // Safety: ensured by caller
    unsafe {
        let i = (*p).refcount;
        (*p).refcount = i - 1;
        if i <= 1 {
            prompt_free(p, delay);
        }
    }
}

/// Decrement the refcount and free the prompt when it reaches zero.
pub(crate) unsafe fn prompt_drop(p: *mut RawPrompt) {
    // Safety: ensured by caller
    unsafe { prompt_drop_internal(p, false) }
}

unsafe fn prompt_drop_delayed(p: *mut RawPrompt) {
    // Safety: ensured by caller
    unsafe { prompt_drop_internal(p, true) }
}

/// Increment the refcount.
unsafe fn prompt_dup(p: *mut RawPrompt) -> *mut RawPrompt {
    // Safety: ensured by caller
    unsafe { (*p).refcount += 1 };
    p
}

//-----------------------------------------------------------------------
// Link and unlink
//-----------------------------------------------------------------------

/// Link a suspended prompt into the current chain and make its captured
/// sub-chain the new top. With a null `ret` the existing return point is
/// reused (tail resume). Returns the resume point, which is null iff the
/// prompt has never been entered.
unsafe fn link(p: *mut RawPrompt, ret: *mut ReturnPoint) -> *mut ResumePoint {
    // Safety: ensured by caller
    unsafe {
        debug_assert!(!is_active(p));
        (*p).parent = prompt_top();
        set_prompt_top((*p).top);
        (*p).top = ptr::null_mut();
        if !ret.is_null() {
            (*p).return_point = ret;
        } else {
            debug_assert!(!(*p).return_point.is_null());
        }
        debug_assert!(is_active(p));
        (*p).resume_point
    }
}

/// Unlink an active prompt from the current chain, capturing everything from
/// the current top down to `p` as its suspended sub-chain. Returns the return
/// point to jump to.
unsafe fn unlink(p: *mut RawPrompt, res: *mut ResumePoint) -> *mut ReturnPoint {
    // Safety: ensured by caller
    unsafe {
        debug_assert!(is_active(p));
        debug_assert!(is_ancestor(p));
        (*p).top = prompt_top();
        set_prompt_top((*p).parent);
        (*p).parent = ptr::null_mut();
        (*p).resume_point = res;
        // return_point stays as-is so tail resumes can reuse it
        debug_assert!(!is_active(p));
        (*p).return_point
    }
}

//-----------------------------------------------------------------------
// Control transfer
//-----------------------------------------------------------------------

/// Finish a prompt from its own stacklet: unlink, fill the return point with
/// either a normal result or a panic payload, and jump to the parent. Called
/// by the entry shim only; never returns.
pub(crate) unsafe fn prompt_return(
    p: *mut RawPrompt,
    result: Result<EncodedValue, Box<dyn Any + Send>>,
) -> ! {
    // Safety: ensured by caller
    unsafe {
        let ret = unlink(p, ptr::null_mut());
        match result {
            Ok(value) => {
                (*ret).fun = None;
                (*ret).arg = value;
                (*ret).kind = ReturnKind::Return;
            }
            Err(payload) => {
                log::trace!("catching panic to propagate across prompt {p:p}");
                (*ret).fun = None;
                (*ret).exn = Some(payload);
                (*ret).kind = ReturnKind::Exception;
            }
        }
        arch::jump(&raw const (*ret).jmp)
    }
}

/// Dispatch on how control came back to a return point. Runs on the resuming
/// stack, in the frame that owns `ret`, so that tail resumes can keep jumping
/// back into the same frame.
unsafe fn dispatch<A>(ret: *mut ReturnPoint, p: *mut RawPrompt) -> A {
    // Safety: ensured by caller
    unsafe {
        debug_assert!(!is_active(p));
        match (*ret).kind {
            ReturnKind::Return => {
                // Decode before the drop: a wide answer still lives on the
                // stacklet that is about to be freed.
                let value = crate::utils::decode_val::<A>((*ret).arg);
                prompt_drop(p);
                value
            }
            ReturnKind::Exception => {
                log::trace!("rethrowing panic propagated across prompt {p:p}");
                let payload = (*ret).exn.take().expect("exception return without a payload");
                prompt_drop_delayed(p);
                panic::resume_unwind(payload)
            }
            ReturnKind::YieldOnce => {
                let fun = (*ret).fun.expect("yield without a yield function");
                let mut out = MaybeUninit::<A>::uninit();
                fun(resume_once(p), (*ret).arg as *mut u8, out.as_mut_ptr().cast());
                out.assume_init()
            }
            ReturnKind::YieldMulti => {
                let fun = (*ret).fun.expect("yield without a yield function");
                let r = Box::into_raw(Box::new(MResume {
                    refcount: 1,
                    resume_count: 0,
                    prompt: p,
                    save: ptr::null_mut(),
                    tail_return_point: (*p).return_point,
                }));
                let mut out = MaybeUninit::<A>::uninit();
                fun(resume_multi(r), (*ret).arg as *mut u8, out.as_mut_ptr().cast());
                out.assume_init()
            }
        }
    }
}

/// Resume a prompt: the initial entry (PI) onto a fresh stacklet, or the
/// re-entry (PR) to a yield point. Returns the prompt's answer once it
/// returns, panics, or yields.
pub(crate) unsafe fn prompt_resume<A>(p: *mut RawPrompt, arg: EncodedValue) -> A {
    let mut ret = ReturnPoint {
        jmp: JmpBuf::new(),
        kind: ReturnKind::Return,
        fun: None,
        arg: 0,
        exn: None,
    };
    let ret_ptr = &raw mut ret;
    // Safety: ensured by caller
    unsafe {
        debug_assert!((*p).parent.is_null());
        let res = link(p, ret_ptr);
        if !res.is_null() {
            // PR: deposit the resume argument and jump to the yield point.
            (*res).result = arg;
            arch::switch(&raw mut (*ret_ptr).jmp, &raw const (*res).jmp);
        } else {
            // PI: enter the fresh stacklet at the entry shim.
            let entry = (*p).start_fun.expect("resuming a prompt that was never started");
            let mut env = EntryEnv { prompt: p, arg };
            arch::enter(
                (&raw mut env).cast(),
                &raw mut (*ret_ptr).jmp,
                (*p).stack.base().get(),
                entry,
            );
        }
        // Back from a yield (YR) or a return (RET/EXN). This must run in the
        // frame that owns `ret`.
        dispatch::<A>(ret_ptr, p)
    }
}

/// Resume to a yield point reusing an existing return point instead of
/// saving a fresh one. The caller's frame is abandoned; a chain of tail
/// resumes therefore runs in constant parent-stack space.
unsafe fn prompt_resume_tail(p: *mut RawPrompt, arg: EncodedValue, ret: *mut ReturnPoint) -> ! {
    // Safety: ensured by caller
    unsafe {
        debug_assert!((*p).refcount >= 1);
        debug_assert!(!is_active(p));
        debug_assert!(!(*p).resume_point.is_null());
        let res = link(p, ret);
        (*res).result = arg;
        arch::jump(&raw const (*res).jmp)
    }
}

/// Yield to an ancestor prompt `p`, capturing everything between the current
/// point and `p` as a resumption. `fun(resumption, env, out)` runs on the
/// stack of `p`'s parent; the value delivered by a later resume becomes this
/// function's return value.
pub unsafe fn prompt_yield(
    kind: ReturnKind,
    p: *mut RawPrompt,
    fun: YieldFn,
    env: *mut u8,
) -> EncodedValue {
    debug_assert!(matches!(kind, ReturnKind::YieldOnce | ReturnKind::YieldMulti));
    let mut res = ResumePoint {
        jmp: JmpBuf::new(),
        result: 0,
    };
    let res_ptr = &raw mut res;
    // Safety: ensured by caller
    unsafe {
        debug_assert!(is_active(p));
        debug_assert!(is_ancestor(p), "can only yield to an ancestor prompt");
        // YR: suspend the sub-chain rooted at `p`, transfer to its parent.
        let ret = unlink(p, res_ptr);
        (*ret).fun = Some(fun);
        (*ret).arg = env as EncodedValue;
        (*ret).kind = kind;
        arch::switch(&raw mut (*res_ptr).jmp, &raw const (*ret).jmp);
        // Y: a resume delivered a value.
        debug_assert!(is_active(p));
        debug_assert!(is_ancestor(p));
        (*res_ptr).result
    }
}

//-----------------------------------------------------------------------
// Resumption handles
//
// Bit 2 of the handle word (safe under 8-byte alignment) distinguishes the
// two flavors: clear means the word is the suspended prompt itself (a once
// resumption, no allocation), set means the word is a heap-allocated
// multi-shot record.
//-----------------------------------------------------------------------

/// A tag-encoded resumption handle.
pub type RawResume = usize;

const MULTI_TAG: usize = 0b100;

/// A multi-shot resumption: refcounted, and it copies the captured stack
/// chain if (and only if) it is actually resumed more than once.
struct MResume {
    refcount: isize,
    /// Number of resumes performed through this record.
    resume_count: u64,
    prompt: *mut RawPrompt,
    save: *mut PromptSave,
    /// Return point of the resume that created this record; the one in the
    /// prompt may be overwritten by earlier resumes.
    tail_return_point: *mut ReturnPoint,
}

/// Singly-linked list of pristine stacklet copies for a captured chain.
struct PromptSave {
    next: *mut PromptSave,
    prompt: *mut RawPrompt,
    snapshot: StackSnapshot,
}

fn resume_as_once(r: RawResume) -> *mut RawPrompt {
    if r & MULTI_TAG == 0 {
        r as *mut RawPrompt
    } else {
        ptr::null_mut()
    }
}

fn resume_as_multi(r: RawResume) -> *mut MResume {
    if r & MULTI_TAG == 0 {
        ptr::null_mut()
    } else {
        (r ^ MULTI_TAG) as *mut MResume
    }
}

pub(crate) fn resume_once(p: *mut RawPrompt) -> RawResume {
    p as RawResume
}

fn resume_multi(r: *mut MResume) -> RawResume {
    (r as RawResume) | MULTI_TAG
}

/// Resume a resumption, delivering `arg` to the yield point (or to the start
/// function if the prompt was never entered). Consumes the handle.
pub unsafe fn resume<A>(r: RawResume, arg: EncodedValue) -> A {
    let p = resume_as_once(r);
    if p.is_null() {
        // Safety: the tag says this is a multi handle.
        return unsafe { mresume(resume_as_multi(r), arg) };
    }
    // Safety: ensured by caller
    unsafe {
        debug_assert_eq!((*p).refcount, 1);
        debug_assert!(!(*p).resume_point.is_null() || (*p).start_fun.is_some());
        prompt_resume(p, arg)
    }
}

/// Resume in tail position: reuse the return point of the original entry so
/// that a chain of tail resumes keeps constant parent-stack depth. The
/// caller's frame (and everything above the reused return point) is
/// abandoned without running destructors, so the caller must hold no live
/// state.
pub unsafe fn resume_tail<A>(r: RawResume, arg: EncodedValue) -> A {
    let p = resume_as_once(r);
    if p.is_null() {
        // Safety: the tag says this is a multi handle.
        return unsafe { mresume_tail(resume_as_multi(r), arg) };
    }
    // Safety: ensured by caller
    unsafe { prompt_resume_tail(p, arg, (*p).return_point) }
}

/// Drop a resumption without resuming it; the captured chain is freed
/// without ever running again.
pub unsafe fn resume_drop(r: RawResume) {
    let p = resume_as_once(r);
    // Safety: ensured by caller
    unsafe {
        if p.is_null() {
            mresume_drop(resume_as_multi(r));
        } else {
            prompt_drop(p);
        }
    }
}

/// Duplicate a resumption. Once resumptions are not duplicable: this logs an
/// error and returns `None` for them.
pub unsafe fn resume_dup(r: RawResume) -> Option<RawResume> {
    let m = resume_as_multi(r);
    if m.is_null() {
        log::error!("cannot dup once-resumptions; use a multi-shot yield instead");
        None
    } else {
        // Safety: the tag says this is a multi handle.
        unsafe { (*m).refcount += 1 };
        Some(r)
    }
}

/// Number of resumes performed through this handle (always 0 for once
/// resumptions).
pub unsafe fn resume_count(r: RawResume) -> u64 {
    let m = resume_as_multi(r);
    if m.is_null() {
        0
    } else {
        // Safety: ensured by caller
        unsafe { (*m).resume_count }
    }
}

/// True iff this is a multi-shot resumption that is the sole owner of its
/// record and has never been resumed; a higher-level library may want to
/// unwind the captured stack instead of just dropping it.
pub unsafe fn resume_should_unwind(r: RawResume) -> bool {
    let m = resume_as_multi(r);
    // Safety: ensured by caller
    !m.is_null() && unsafe { (*m).refcount == 1 && (*m).resume_count == 0 }
}

//-----------------------------------------------------------------------
// Multi-shot resumptions
//-----------------------------------------------------------------------

unsafe fn mresume_drop(r: *mut MResume) {
    // Safety: ensured by caller
    unsafe {
        let i = (*r).refcount;
        (*r).refcount = i - 1;
        if i <= 1 {
            // Free the saved stacklet copies.
            let mut s = (*r).save;
            while !s.is_null() {
                let save = Box::from_raw(s);
                prompt_drop(save.prompt);
                s = save.next;
            }
            prompt_drop((*r).prompt);
            drop(Box::from_raw(r));
        }
    }
}

/// Snapshot the full chain captured by the suspended prompt `p`, walking from
/// the deepest prompt towards `p`. Every node owns a reference to its prompt.
unsafe fn prompt_save(p: *mut RawPrompt) -> *mut PromptSave {
    // Safety: ensured by caller
    unsafe {
        debug_assert!(!is_active(p));
        let mut head: *mut PromptSave = ptr::null_mut();
        let mut sp = (*(*p).resume_point).jmp.reg_sp;
        let mut q = (*p).top;
        loop {
            head = Box::into_raw(Box::new(PromptSave {
                next: head,
                prompt: prompt_dup(q),
                snapshot: (*q).stack.snapshot(sp),
            }));
            let parent = (*q).parent;
            if parent.is_null() {
                break;
            }
            // The return point of `q` sits on the parent's stacklet, at the
            // position where the parent parked when it entered `q`.
            sp = (*(*q).return_point).jmp.reg_sp;
            q = parent;
        }
        debug_assert_eq!((*head).prompt, p);
        head
    }
}

/// Restore every stacklet of a captured chain from a save list. The bytes
/// come back verbatim, prompt headers included; refcounts are not adjusted
/// here.
unsafe fn prompt_restore(p: *mut RawPrompt, save: *mut PromptSave) {
    // Safety: ensured by caller
    unsafe {
        debug_assert!(!is_active(p));
        debug_assert_eq!((*save).prompt, p);
        let mut s = save;
        while !s.is_null() {
            (*s).snapshot.restore();
            s = (*s).next;
        }
    }
}

/// Obtain a resumable prompt from a multi-shot record: restore pristine
/// stacks if an earlier resume consumed them, snapshot them if another owner
/// could still resume after this one, then transfer the record's prompt
/// reference to the caller.
unsafe fn mresume_get_prompt(r: *mut MResume) -> *mut RawPrompt {
    // Safety: ensured by caller
    unsafe {
        let p = (*r).prompt;
        if !(*r).save.is_null() {
            prompt_restore(p, (*r).save);
        } else if (*r).refcount > 1 || (*p).refcount > 1 {
            (*r).save = prompt_save(p);
        }
        prompt_dup(p);
        mresume_drop(r);
        p
    }
}

unsafe fn mresume<A>(r: *mut MResume, arg: EncodedValue) -> A {
    // Safety: ensured by caller
    unsafe {
        (*r).resume_count += 1;
        let p = mresume_get_prompt(r);
        prompt_resume(p, arg)
    }
}

/// Tail resume through the cached return point of the original entry. Falls
/// back to a regular resume once the cached point has been consumed.
unsafe fn mresume_tail<A>(r: *mut MResume, arg: EncodedValue) -> A {
    // Safety: ensured by caller
    unsafe {
        let ret = (*r).tail_return_point;
        if ret.is_null() {
            mresume(r, arg)
        } else {
            (*r).tail_return_point = ptr::null_mut();
            (*r).resume_count += 1;
            let p = mresume_get_prompt(r);
            prompt_resume_tail(p, arg, ret)
        }
    }
}
