// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # dserver C bindings
//!
//! C-compatible client API for the dserver test-data server:
//!
//! ```c
//! DS_SESSION *s = dsInit(NULL, 0);            /* localhost:9572 */
//! int addr = dsRegister(s, "Address");
//! char *row = dsGetNext(s, addr);
//! if (row && strcmp(row, "*Exhausted*") != 0) { ... }
//! dsFreeString(row);
//! dsClose(s);
//! ```
//!
//! Getters and stores return the server's reply verbatim, sentinels
//! included, as a heap string owned by the caller.
//!
//! # Safety
//!
//! All public functions are `unsafe` and require the caller to uphold the
//! invariants documented in each function's safety comment. A session must
//! not be used from two threads at the same time.

use dserver_client::{Session, SessionOptions};
use dserver_proto::{ClientKind, Request, Status};
use libc::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

/// Default server port.
pub const DS_PORT: c_int = 9572;

/// Default server host.
pub const DS_HOST: &str = "localhost";

/// Service name.
pub const DS_SERVICE: &str = "dserver";

/// Opaque handle to a server session
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct DS_SESSION {
    _private: [u8; 0],
}

unsafe fn session_mut<'a>(session: *mut DS_SESSION) -> Option<&'a mut Session> {
    session.cast::<Session>().as_mut()
}

unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// Run `f`, turning a panic into `fallback`.
fn guarded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            log::error!("[dserver-c] panic caught at FFI boundary");
            fallback
        }
    }
}

fn valid_field(field: &str) -> bool {
    !field.contains(['|', '\n', '\r'])
}

fn into_c_string(reply: String) -> *mut c_char {
    match CString::new(reply) {
        Ok(s) => s.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Send a request built from a validated handle and return the raw reply.
unsafe fn call(
    session: *mut DS_SESSION,
    handle: c_int,
    build: impl FnOnce(usize) -> Option<Request>,
) -> *mut c_char {
    guarded(ptr::null_mut(), || {
        let Some(session) = session_mut(session) else {
            return ptr::null_mut();
        };
        let Ok(handle) = usize::try_from(handle) else {
            return into_c_string(Status::BadSourceIndex.as_str().to_string());
        };
        let Some(request) = build(handle) else {
            return ptr::null_mut();
        };

        match session.request(&request) {
            Ok(reply) => into_c_string(reply),
            Err(e) => {
                log::warn!("[dserver-c] {} failed: {}", request.command(), e);
                ptr::null_mut()
            }
        }
    })
}

/// Connect to a data server.
///
/// # Safety
/// - `host` must be NULL or a valid null-terminated C string.
/// - The returned handle must be released with `dsClose`.
///
/// # Arguments
/// * `host` - Server host name, NULL for `DS_HOST`
/// * `port` - Server port, `<= 0` for `DS_PORT`
///
/// # Returns
/// Opaque session handle, or NULL on failure
#[no_mangle]
pub unsafe extern "C" fn dsInit(host: *const c_char, port: c_int) -> *mut DS_SESSION {
    // Initialize logger (only once, subsequent calls are no-op)
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::try_init();
    });

    guarded(ptr::null_mut(), || {
        let host = if host.is_null() {
            DS_HOST
        } else {
            match str_arg(host) {
                Some(host) => host,
                None => return ptr::null_mut(),
            }
        };
        let port = if port <= 0 {
            DS_PORT
        } else {
            port
        };
        let Ok(port) = u16::try_from(port) else {
            return ptr::null_mut();
        };

        let options = SessionOptions {
            client: ClientKind::C,
            ..Default::default()
        };
        match Session::connect_with(host, port, &options) {
            Ok(session) => {
                log::debug!("[dserver-c] connected to {}:{}", host, port);
                Box::into_raw(Box::new(session)).cast::<DS_SESSION>()
            }
            Err(e) => {
                log::warn!("[dserver-c] cannot connect to {}:{}: {}", host, port, e);
                ptr::null_mut()
            }
        }
    })
}

/// Look up a data source handle by name.
///
/// # Safety
/// - `session` must be a valid handle from `dsInit`.
/// - `data_source` must be a valid null-terminated C string.
///
/// # Returns
/// The handle (`>= 0`), or -1 if the source is unknown or the call failed
#[no_mangle]
pub unsafe extern "C" fn dsRegister(session: *mut DS_SESSION, data_source: *const c_char) -> c_int {
    guarded(-1, || {
        let (Some(session), Some(name)) = (session_mut(session), str_arg(data_source)) else {
            return -1;
        };
        match session.register(name) {
            Ok(reg) => c_int::try_from(reg.handle).unwrap_or(-1),
            Err(e) => {
                log::debug!("[dserver-c] register {:?}: {}", name, e);
                -1
            }
        }
    })
}

/// Next row or value of a source.
///
/// # Safety
/// - `session` must be a valid handle from `dsInit`.
/// - The result must be released with `dsFreeString`.
#[no_mangle]
pub unsafe extern "C" fn dsGetNext(session: *mut DS_SESSION, handle: c_int) -> *mut c_char {
    call(session, handle, |handle| Some(Request::GetNext { handle }))
}

/// Next row of a group in a keyed source.
///
/// # Safety
/// - `session` must be a valid handle from `dsInit`.
/// - `group` must be a valid null-terminated C string.
/// - The result must be released with `dsFreeString`.
#[no_mangle]
pub unsafe extern "C" fn dsGetKeyed(
    session: *mut DS_SESSION,
    handle: c_int,
    group: *const c_char,
) -> *mut c_char {
    call(session, handle, |handle| {
        str_arg(group).filter(|g| valid_field(g)).map(|group| Request::GetKeyed {
            handle,
            group: group.to_string(),
        })
    })
}

/// Row of an indexed source by its 0-based index, given as a string.
///
/// # Safety
/// - `session` must be a valid handle from `dsInit`.
/// - `group` must be a valid null-terminated C string.
/// - The result must be released with `dsFreeString`.
#[no_mangle]
pub unsafe extern "C" fn dsGetIndexed(
    session: *mut DS_SESSION,
    handle: c_int,
    group: *const c_char,
) -> *mut c_char {
    call(session, handle, |handle| {
        str_arg(group).filter(|g| valid_field(g)).map(|index| Request::GetIndexed {
            handle,
            index: index.to_string(),
        })
    })
}

/// Append a row to a source.
///
/// # Safety
/// - `session` must be a valid handle from `dsInit`.
/// - `data` must be a valid null-terminated C string without line breaks.
/// - The result (`"1"` on success) must be released with `dsFreeString`.
#[no_mangle]
pub unsafe extern "C" fn dsStore(
    session: *mut DS_SESSION,
    handle: c_int,
    data: *const c_char,
) -> *mut c_char {
    call(session, handle, |handle| {
        str_arg(data)
            .filter(|data| !data.contains(['\n', '\r']))
            .map(|data| Request::Store {
                handle,
                data: data.to_string(),
            })
    })
}

/// Append a row to a group of a keyed source.
///
/// # Safety
/// - `session` must be a valid handle from `dsInit`.
/// - `group` and `data` must be valid null-terminated C strings without
///   line breaks; `group` must not contain `|`.
/// - The result (`"1"` on success) must be released with `dsFreeString`.
#[no_mangle]
pub unsafe extern "C" fn dsStoreKeyed(
    session: *mut DS_SESSION,
    handle: c_int,
    group: *const c_char,
    data: *const c_char,
) -> *mut c_char {
    call(session, handle, |handle| {
        let group = str_arg(group).filter(|g| valid_field(g))?;
        let data = str_arg(data).filter(|d| !d.contains(['\n', '\r']))?;
        Some(Request::StoreKeyed {
            handle,
            group: group.to_string(),
            data: data.to_string(),
        })
    })
}

/// Close a session and free its handle.
///
/// # Safety
/// - `session` must be a valid handle from `dsInit`, or NULL (no-op).
/// - Must not be called more than once with the same pointer.
#[no_mangle]
pub unsafe extern "C" fn dsClose(session: *mut DS_SESSION) {
    if session.is_null() {
        return;
    }
    let session = Box::from_raw(session.cast::<Session>());
    if let Err(e) = session.close() {
        log::debug!("[dserver-c] close: {}", e);
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// - `s` must come from a `dsGet*`/`dsStore*` call, or be NULL (no-op).
/// - Must not be called more than once with the same pointer.
#[no_mangle]
pub unsafe extern "C" fn dsFreeString(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
