use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Park the calling thread while `word` still holds `expected`.
///
/// Returns on wake, on timeout, on a signal, or immediately if the word has
/// already moved on. Callers must re-check their condition afterwards.
#[cfg(target_os = "linux")]
pub fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    use std::ptr;
    use std::sync::atomic::Ordering;

    // Skip the syscall when the value already changed
    if word.load(Ordering::Acquire) != expected {
        return;
    }

    let spec = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let spec_ptr = spec
        .as_ref()
        .map_or(ptr::null::<libc::timespec>(), |s| s as *const libc::timespec);

    // SAFETY: `word` is a live AtomicU32 for the duration of the call and the
    // kernel only reads the 32-bit value at that address.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            spec_ptr,
            ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Wake up to `count` threads parked on `word`.
#[cfg(target_os = "linux")]
pub fn futex_wake(word: &AtomicU32, count: i32) {
    // SAFETY: see `futex_wait`.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            count,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    use std::sync::atomic::Ordering;

    // Fallback for non-Linux: short sleep bounded by the timeout
    if word.load(Ordering::Acquire) != expected {
        return;
    }
    match timeout {
        Some(t) => std::thread::sleep(t.min(Duration::from_micros(50))),
        None => std::thread::yield_now(),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_word: &AtomicU32, _count: i32) {
    // Waiters poll on non-Linux
}
