use core::mem::ManuallyDrop;
use core::ptr;

/// Internal type for a value that has been encoded in a `usize`.
pub type EncodedValue = usize;

/// Encodes the given value in a `usize` either directly or as a pointer to the
/// argument. This function logically takes ownership of the value, so it should
/// not be dropped afterwards.
///
/// When the value is encoded as a pointer, the `ManuallyDrop` it points to must
/// stay parked (its frame suspended but intact) until the matching
/// [`decode_val`] has run on the other side of the control transfer.
pub unsafe fn encode_val<T>(val: &mut ManuallyDrop<T>) -> EncodedValue {
    // Safety: ensured by caller
    unsafe {
        if size_of::<T>() <= size_of::<EncodedValue>() {
            let mut out = 0;
            ptr::write_unaligned(ptr::from_mut(&mut out).cast::<T>(), ManuallyDrop::take(val));
            out
        } else {
            ptr::from_ref(val) as EncodedValue
        }
    }
}

// Decodes a value produced by `encode_val` either by converting it directly
// or by treating the `usize` as a pointer and dereferencing it.
pub unsafe fn decode_val<T>(val: EncodedValue) -> T {
    // Safety: ensured by caller
    unsafe {
        if size_of::<T>() <= size_of::<EncodedValue>() {
            ptr::read_unaligned(ptr::from_ref(&val).cast::<T>())
        } else {
            ptr::read(val as *const T)
        }
    }
}
