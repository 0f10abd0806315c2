use std::ffi::CStr;
use std::io;
use std::mem::MaybeUninit;


/// Binary search a slice sorted by `keyfn`, returning the index of the
/// match (if found) or that of the entry with the next lower key (if
/// any).
///
/// When several consecutive entries share the resulting key, the index
/// of the first of them is reported. This is the floor operation used
/// for nearest-preceding-entry symbol lookups.
pub(crate) fn find_match_or_lower_bound_by_key<T, K, F>(
    slice: &[T],
    key: K,
    mut keyfn: F,
) -> Option<usize>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let idx = slice.partition_point(|e| keyfn(e) < key);
    // `idx` now references the first entry with a key greater or equal
    // to the one searched for, if any.
    if let Some(e) = slice.get(idx) {
        if keyfn(e) == key {
            return Some(idx)
        }
    }

    let mut idx = idx.checked_sub(1)?;
    let found = keyfn(&slice[idx]);
    while idx > 0 && keyfn(&slice[idx - 1]) == found {
        idx -= 1;
    }
    Some(idx)
}

/// Retrieve the release string of the running kernel, as reported by
/// `uname(2)`.
pub(crate) fn uname_release() -> Result<String, io::Error> {
    let mut dst = MaybeUninit::uninit();
    let rc = unsafe { libc::uname(dst.as_mut_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error())
    }

    // SAFETY: The object is initialized on success of `uname`.
    let uname = unsafe { dst.assume_init() };
    // SAFETY: `uname` guarantees a NUL terminated string in
    //         `uname.release` on success.
    let release = unsafe { CStr::from_ptr(uname.release.as_ptr()) };
    Ok(release.to_string_lossy().into_owned())
}
