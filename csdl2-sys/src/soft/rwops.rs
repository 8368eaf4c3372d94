// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! File and memory backed streams.

use std::ffi::CStr;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use super::error::{invalid_param, set_error};
use super::{track_alloc, track_free};
use crate::consts::*;
use crate::{RWops, RWopsHidden, RWopsMem, RWopsUnknown};

fn new_rwops() -> *mut RWops {
    track_alloc();
    Box::into_raw(Box::new(RWops {
        size: None,
        seek: None,
        read: None,
        write: None,
        close: None,
        type_: SDL_RWOPS_UNKNOWN,
        hidden: RWopsHidden {
            unknown: RWopsUnknown {
                data1: ptr::null_mut(),
                data2: ptr::null_mut(),
            },
        },
    }))
}

pub(super) unsafe extern "C" fn alloc_rw() -> *mut RWops {
    new_rwops()
}

pub(super) unsafe extern "C" fn free_rw(area: *mut RWops) {
    if !area.is_null() {
        drop(unsafe { Box::from_raw(area) });
        track_free();
    }
}

fn open_options(mode: &str) -> Option<OpenOptions> {
    let mut options = OpenOptions::new();
    let update = mode.contains('+');
    match mode.chars().next()? {
        'r' => options.read(true).write(update),
        'w' => options.write(true).create(true).truncate(true).read(update),
        'a' => options.append(true).create(true).read(update),
        _ => return None,
    };
    Some(options)
}

unsafe fn stdio_file<'a>(context: *mut RWops) -> Option<&'a mut File> {
    unsafe { ((*context).hidden.unknown.data1 as *mut File).as_mut() }
}

unsafe extern "C" fn stdio_size(context: *mut RWops) -> i64 {
    match unsafe { stdio_file(context) }.map(|file| file.metadata()) {
        Some(Ok(metadata)) => metadata.len() as i64,
        _ => set_error("Error seeking in datastream") as i64,
    }
}

unsafe extern "C" fn stdio_seek(context: *mut RWops, offset: i64, whence: c_int) -> i64 {
    let Some(file) = (unsafe { stdio_file(context) }) else {
        return set_error("Error seeking in datastream") as i64;
    };
    let target = match whence {
        RW_SEEK_SET if offset >= 0 => SeekFrom::Start(offset as u64),
        RW_SEEK_SET => return set_error("Error seeking in datastream") as i64,
        RW_SEEK_CUR => SeekFrom::Current(offset),
        RW_SEEK_END => SeekFrom::End(offset),
        _ => return set_error("Unknown value for 'whence'") as i64,
    };
    match file.seek(target) {
        Ok(position) => position as i64,
        Err(_) => set_error("Error seeking in datastream") as i64,
    }
}

unsafe extern "C" fn stdio_read(
    context: *mut RWops,
    dst: *mut c_void,
    size: usize,
    maxnum: usize,
) -> usize {
    let Some(file) = (unsafe { stdio_file(context) }) else {
        set_error("Error reading from datastream");
        return 0;
    };
    let Some(total) = size.checked_mul(maxnum).filter(|total| *total > 0) else {
        return 0;
    };
    let buf = unsafe { std::slice::from_raw_parts_mut(dst as *mut u8, total) };
    let mut filled = 0;
    while filled < total {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => {
                set_error("Error reading from datastream");
                return 0;
            }
        }
    }
    filled / size
}

unsafe extern "C" fn stdio_write(
    context: *mut RWops,
    src: *const c_void,
    size: usize,
    num: usize,
) -> usize {
    let Some(file) = (unsafe { stdio_file(context) }) else {
        set_error("Error writing to datastream");
        return 0;
    };
    let Some(total) = size.checked_mul(num).filter(|total| *total > 0) else {
        return 0;
    };
    let buf = unsafe { std::slice::from_raw_parts(src as *const u8, total) };
    match file.write_all(buf) {
        Ok(()) => num,
        Err(_) => {
            set_error("Error writing to datastream");
            0
        }
    }
}

unsafe extern "C" fn stdio_close(context: *mut RWops) -> c_int {
    if context.is_null() {
        return 0;
    }
    let file = unsafe { (*context).hidden.unknown.data1 } as *mut File;
    if !file.is_null() {
        drop(unsafe { Box::from_raw(file) });
    }
    unsafe { free_rw(context) };
    0
}

pub(super) unsafe extern "C" fn rw_from_file(
    file: *const c_char,
    mode: *const c_char,
) -> *mut RWops {
    if file.is_null() || mode.is_null() {
        set_error("SDL_RWFromFile(): No file or no mode specified");
        return ptr::null_mut();
    }
    let path = unsafe { CStr::from_ptr(file) }.to_string_lossy().into_owned();
    let mode = unsafe { CStr::from_ptr(mode) }.to_string_lossy().into_owned();
    let Some(options) = open_options(&mode) else {
        set_error(format!("Unknown file mode '{mode}'"));
        return ptr::null_mut();
    };
    let handle = match options.open(&path) {
        Ok(handle) => handle,
        Err(_) => {
            set_error(format!("Couldn't open {path}"));
            return ptr::null_mut();
        }
    };
    let rwops = new_rwops();
    unsafe {
        let rw = &mut *rwops;
        rw.size = Some(stdio_size);
        rw.seek = Some(stdio_seek);
        rw.read = Some(stdio_read);
        rw.write = Some(stdio_write);
        rw.close = Some(stdio_close);
        rw.type_ = SDL_RWOPS_STDFILE;
        rw.hidden.unknown.data1 = Box::into_raw(Box::new(handle)) as *mut c_void;
    }
    rwops
}

unsafe fn mem_of<'a>(context: *mut RWops) -> &'a mut RWopsMem {
    unsafe { &mut (*context).hidden.mem }
}

unsafe extern "C" fn mem_size(context: *mut RWops) -> i64 {
    let mem = unsafe { mem_of(context) };
    unsafe { mem.stop.offset_from(mem.base) as i64 }
}

unsafe extern "C" fn mem_seek(context: *mut RWops, offset: i64, whence: c_int) -> i64 {
    let mem = unsafe { mem_of(context) };
    let len = unsafe { mem.stop.offset_from(mem.base) } as i64;
    let here = unsafe { mem.here.offset_from(mem.base) } as i64;
    let position = match whence {
        RW_SEEK_SET => offset,
        RW_SEEK_CUR => here.saturating_add(offset),
        RW_SEEK_END => len.saturating_add(offset),
        _ => return set_error("Unknown value for 'whence'") as i64,
    };
    let position = position.clamp(0, len);
    mem.here = unsafe { mem.base.add(position as usize) };
    position
}

unsafe extern "C" fn mem_read(
    context: *mut RWops,
    dst: *mut c_void,
    size: usize,
    maxnum: usize,
) -> usize {
    let mem = unsafe { mem_of(context) };
    let Some(total) = size.checked_mul(maxnum).filter(|total| *total > 0) else {
        return 0;
    };
    let available = unsafe { mem.stop.offset_from(mem.here) } as usize;
    let total = total.min(available);
    unsafe {
        ptr::copy_nonoverlapping(mem.here, dst as *mut u8, total);
        mem.here = mem.here.add(total);
    }
    total / size
}

unsafe extern "C" fn mem_write(
    context: *mut RWops,
    src: *const c_void,
    size: usize,
    num: usize,
) -> usize {
    let mem = unsafe { mem_of(context) };
    if size == 0 {
        return 0;
    }
    let available = unsafe { mem.stop.offset_from(mem.here) } as usize;
    let num = num.min(available / size);
    let total = num * size;
    unsafe {
        ptr::copy_nonoverlapping(src as *const u8, mem.here, total);
        mem.here = mem.here.add(total);
    }
    num
}

unsafe extern "C" fn mem_write_const(
    _context: *mut RWops,
    _src: *const c_void,
    _size: usize,
    _num: usize,
) -> usize {
    set_error("Can't write to read-only memory");
    0
}

unsafe extern "C" fn mem_close(context: *mut RWops) -> c_int {
    unsafe { free_rw(context) };
    0
}

unsafe fn mem_rwops(base: *mut u8, size: c_int, writable: bool) -> *mut RWops {
    let rwops = new_rwops();
    unsafe {
        let rw = &mut *rwops;
        rw.size = Some(mem_size);
        rw.seek = Some(mem_seek);
        rw.read = Some(mem_read);
        rw.write = Some(if writable { mem_write } else { mem_write_const });
        rw.close = Some(mem_close);
        rw.type_ = if writable { SDL_RWOPS_MEMORY } else { SDL_RWOPS_MEMORY_RO };
        rw.hidden.mem = RWopsMem {
            base,
            here: base,
            stop: base.add(size as usize),
        };
    }
    rwops
}

pub(super) unsafe extern "C" fn rw_from_mem(mem: *mut c_void, size: c_int) -> *mut RWops {
    if mem.is_null() {
        invalid_param("mem");
        return ptr::null_mut();
    }
    if size <= 0 {
        invalid_param("size");
        return ptr::null_mut();
    }
    unsafe { mem_rwops(mem as *mut u8, size, true) }
}

pub(super) unsafe extern "C" fn rw_from_const_mem(mem: *const c_void, size: c_int) -> *mut RWops {
    if mem.is_null() {
        invalid_param("mem");
        return ptr::null_mut();
    }
    if size <= 0 {
        invalid_param("size");
        return ptr::null_mut();
    }
    unsafe { mem_rwops(mem as *mut u8, size, false) }
}
