use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::{Mutex, MutexGuard};

/// Serializes `LC_TIME` changes: the locale is process-global state.
static LOCALE_LOCK: Mutex<()> = Mutex::new(());

/// Scoped override of `LC_TIME`.
///
/// The previous value is restored when the guard is dropped, so early
/// returns and unwinding both put the locale back.
pub struct LocaleGuard {
    previous: Option<CString>,
    _lock: MutexGuard<'static, ()>,
}

impl LocaleGuard {
    /// Switch `LC_TIME` to the neutral `C` locale
    pub fn c_time() -> Self {
        let lock = LOCALE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let previous = current_time_locale().and_then(|l| CString::new(l).ok());
        // SAFETY: the argument is a valid NUL-terminated string and the lock
        // keeps other guards from racing on the locale.
        let changed = unsafe { libc::setlocale(libc::LC_TIME, c"C".as_ptr()) };
        if changed.is_null() {
            tracing::warn!("could not switch LC_TIME to C");
        }
        LocaleGuard {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for LocaleGuard {
    fn drop(&mut self) {
        if let Some(previous) = &self.previous {
            // SAFETY: `previous` is a NUL-terminated copy of a name setlocale
            // returned earlier.
            unsafe {
                libc::setlocale(libc::LC_TIME, previous.as_ptr());
            }
        }
    }
}

/// Current `LC_TIME` locale name
pub fn current_time_locale() -> Option<String> {
    // SAFETY: a null locale only queries; the returned pointer is copied
    // before any other setlocale call.
    unsafe {
        let name = libc::setlocale(libc::LC_TIME, ptr::null());
        if name.is_null() {
            None
        } else {
            Some(CStr::from_ptr(name).to_string_lossy().into_owned())
        }
    }
}

/// Run `f` with `LC_TIME` set to `C`
pub fn with_c_time_locale<T>(f: impl FnOnce() -> T) -> T {
    let _guard = LocaleGuard::c_time();
    f()
}
