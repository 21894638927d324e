//! Shared helpers for VST2 FFI interop

/// Convert a fixed-size buffer the plugin wrote a C string into to a Rust String
///
/// Bounded: a plugin that forgets the terminator yields the whole buffer
/// instead of a read past its end. Invalid UTF-8 is replaced, and
/// surrounding whitespace trimmed.
pub(crate) fn c_buffer_to_string(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).trim().to_string()
}

/// Copy `text` into a plugin-supplied buffer of `capacity` bytes, NUL-terminated and truncated
///
/// # Safety
///
/// `dest` must be null or valid for `capacity` bytes of writes.
#[cfg(test)]
pub(crate) unsafe fn write_c_string(dest: *mut u8, capacity: usize, text: &str) {
    if dest.is_null() || capacity == 0 {
        return;
    }
    let len = text.len().min(capacity - 1);
    std::ptr::copy_nonoverlapping(text.as_ptr(), dest, len);
    *dest.add(len) = 0;
}
