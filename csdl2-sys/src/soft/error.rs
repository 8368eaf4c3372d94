// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

/// Records `message` as this thread's error string. Always returns -1.
pub(crate) fn set_error(message: impl Into<String>) -> c_int {
    let mut message = message.into();
    message.retain(|c| c != '\0');
    let message = CString::new(message).unwrap_or_default();
    LAST_ERROR.with(|last| *last.borrow_mut() = message);
    -1
}

pub(crate) fn invalid_param(name: &str) -> c_int {
    set_error(format!("Parameter '{name}' is invalid"))
}

pub(crate) fn out_of_memory() -> c_int {
    set_error("Out of memory")
}

pub(super) unsafe extern "C" fn get_error() -> *const c_char {
    // The pointer stays valid until the next error is recorded on this thread.
    LAST_ERROR.with(|last| last.borrow().as_ptr())
}

pub(super) unsafe extern "C" fn clear_error() {
    LAST_ERROR.with(|last| *last.borrow_mut() = CString::default());
}
