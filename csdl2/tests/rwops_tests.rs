// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for streams.
//!
//! File streams use a unique temporary path per test and remove it on drop.

use std::os::raw::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use csdl2::consts::*;
use csdl2::{BufferView, Csdl2, Error, ExportFlags, RwSlot};
use csdl2_sys::RWops;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// RAII guard for a temporary file path.
struct TempFileGuard {
    path: std::path::PathBuf,
}

impl TempFileGuard {
    fn new(test: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "csdl2_rust_tests_{}_{}.bin",
            test,
            uuid::Uuid::new_v4()
        ));
        Self { path }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn setup_test() -> Csdl2 {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
    Csdl2::soft()
}

#[test]
fn file_stream_writes_then_reads_back() {
    let sdl = setup_test();
    let file = TempFileGuard::new("file_stream");

    let rw = sdl.rw_from_file(&file.path, "w+b").unwrap();
    assert_eq!(rw.type_().unwrap(), SDL_RWOPS_STDFILE);
    let payload = BufferView::new(b"0123456789".to_vec());
    assert_eq!(rw.write(&payload, 2, 5).unwrap(), 5);
    assert_eq!(rw.size().unwrap(), 10);
    assert_eq!(rw.seek(2, RW_SEEK_SET).unwrap(), 2);

    let dst = BufferView::new(vec![0u8; 4]);
    assert_eq!(rw.read(&dst, 4, 1).unwrap(), 1);
    assert_eq!(dst.to_vec().unwrap(), b"2345");
    assert_eq!(rw.tell().unwrap(), 6);
    rw.close().unwrap();

    assert_eq!(std::fs::read(&file.path).unwrap(), b"0123456789");
}

#[test]
fn missing_file_reports_native_error() {
    let sdl = setup_test();
    let file = TempFileGuard::new("missing");
    let error = sdl.rw_from_file(&file.path, "rb").unwrap_err();
    assert!(matches!(error, Error::Native(message) if message.starts_with("Couldn't open")));
    assert!(matches!(
        sdl.rw_from_file(&file.path, "a\0b"),
        Err(Error::NulString(_))
    ));
}

#[test]
fn memory_stream_pins_the_host_buffer() {
    let sdl = setup_test();
    let memory = BufferView::new(vec![0u8; 8]);
    let rw = sdl.rw_from_mem(&memory).unwrap();
    assert_eq!(rw.type_().unwrap(), SDL_RWOPS_MEMORY);
    assert!(matches!(memory.resize(16, 0), Err(Error::Buffer(_))));
    assert!(matches!(memory.detach_ownership(), Err(Error::Buffer(_))));

    let src = BufferView::new(vec![0xAB; 12]);
    // Writes stop at the end of the memory.
    assert_eq!(rw.write(&src, 4, 3).unwrap(), 2);
    assert_eq!(rw.seek(0, RW_SEEK_END).unwrap(), 8);

    let dst = BufferView::new(vec![0u8; 8]);
    assert_eq!(rw.read(&dst, 1, 8).unwrap(), 0);
    rw.seek(0, RW_SEEK_SET).unwrap();
    assert_eq!(rw.read(&dst, 1, 8).unwrap(), 8);
    assert_eq!(dst.to_vec().unwrap(), vec![0xAB; 8]);

    rw.close().unwrap();
    assert_eq!(memory.export_count(), 0);
    assert_eq!(memory.to_vec().unwrap(), vec![0xAB; 8]);
    memory.resize(16, 0).unwrap();
}

#[test]
fn writable_memory_stream_excludes_host_writers() {
    let sdl = setup_test();
    let memory = BufferView::new(vec![3u8; 8]);
    let rw = sdl.rw_from_mem(&memory).unwrap();
    assert!(matches!(
        memory.begin_export(ExportFlags::WRITE),
        Err(Error::Buffer(_))
    ));
    assert!(matches!(memory.set(0, 1), Err(Error::Buffer(_))));
    // Reading the stream into its own memory would alias the native writes.
    assert!(matches!(rw.read(&memory, 1, 4), Err(Error::Buffer(_))));
    assert_eq!(memory.to_vec().unwrap(), vec![3u8; 8]);
    assert_eq!(memory.export_count(), 1);

    let constant = BufferView::new(vec![4u8; 8]);
    let ro = sdl.rw_from_const_mem(&constant).unwrap();
    drop(constant.begin_export(ExportFlags::WRITE).unwrap());

    rw.close().unwrap();
    ro.close().unwrap();
    let mut export = memory.begin_export(ExportFlags::WRITE).unwrap();
    export.as_mut_slice().unwrap()[0] = 1;
    drop(export);
    assert_eq!(memory.get(0).unwrap(), 1);
}

#[test]
fn methods_move_between_streams_of_the_same_kind() {
    let sdl = setup_test();
    let first = BufferView::new(vec![1u8; 4]);
    let second = BufferView::new(vec![2u8; 6]);
    let a = sdl.rw_from_const_mem(&first).unwrap();
    let b = sdl.rw_from_const_mem(&second).unwrap();

    let size = a.method(RwSlot::Size).unwrap();
    assert_eq!(size.slot(), RwSlot::Size);
    // Both memory streams share the same native callback.
    assert_eq!(size.size(&b).unwrap(), 6);

    let blank = sdl.alloc_rw().unwrap();
    assert_eq!(
        size.size(&blank).unwrap_err(),
        Error::InvalidArg("do not mix different SDL_RWops and callback instances".to_string())
    );
    assert!(matches!(blank.method(RwSlot::Read), Err(Error::InvalidArg(_))));
    blank.free().unwrap();

    let close = a.method(RwSlot::Close).unwrap();
    close.close(&a).unwrap();
    assert!(!a.is_valid());
    assert_eq!(first.export_count(), 0);
    assert!(matches!(close.close(&a), Err(Error::InvalidHandle(_))));
    b.close().unwrap();
}

static SLOW_READ_STARTED: AtomicBool = AtomicBool::new(false);
static SLOW_READ_FINISHED: AtomicBool = AtomicBool::new(false);

/// Read callback that pauses before touching the stream and the destination.
unsafe extern "C" fn slow_read(
    context: *mut RWops,
    ptr: *mut c_void,
    size: usize,
    maxnum: usize,
) -> usize {
    SLOW_READ_STARTED.store(true, Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(200));
    std::hint::black_box(unsafe { (*context).type_ });
    unsafe { std::ptr::write_bytes(ptr as *mut u8, 0xAB, size * maxnum) };
    SLOW_READ_FINISHED.store(true, Ordering::SeqCst);
    maxnum
}

#[test]
fn free_waits_for_an_in_flight_read() {
    let sdl = setup_test();
    let rw = sdl.alloc_rw().unwrap();
    unsafe { (*rw.borrow_ptr().unwrap().as_ptr()).read = Some(slow_read) };

    let reader = {
        let rw = rw.clone();
        std::thread::spawn(move || {
            let dst = BufferView::new(vec![0u8; 4]);
            let count = rw.read(&dst, 1, 4);
            (count, dst.to_vec())
        })
    };
    while !SLOW_READ_STARTED.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }

    rw.free().unwrap();
    assert!(SLOW_READ_FINISHED.load(Ordering::SeqCst));
    assert!(!rw.is_valid());

    let (count, bytes) = reader.join().unwrap();
    assert_eq!(count.unwrap(), 4);
    assert_eq!(bytes.unwrap(), vec![0xAB; 4]);
    let dst = BufferView::new(vec![0u8; 4]);
    assert_eq!(rw.read(&dst, 1, 4).unwrap_err(), Error::InvalidHandle("SDL_RWops"));
}
