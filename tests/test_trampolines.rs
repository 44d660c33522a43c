//! End-to-end trampoline tests on the host architecture

#![cfg(all(
    any(target_os = "linux", target_os = "macos"),
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86")
))]

use proptest::prelude::*;
use std::sync::Arc;
use stubjit::last_error;
use stubjit::{
    link_class, Arch, BufferInvoker, CallDescriptor, CallSite, Capabilities, HostType, NativeType, RawValue,
    StrategySelector, StubConfig,
};

struct Library;

fn host() -> Arch {
    Arch::host().expect("supported host")
}

/// Link one site for a library that lives for the rest of the test process
fn link(desc: CallDescriptor, target: usize) -> usize {
    let library = Arc::new(Library);
    let selector = StrategySelector::new(Capabilities::full(host()), StubConfig::default());
    let site = CallSite::new("native", desc, target);
    link_class(&library, &selector, std::slice::from_ref(&site)).expect("link");
    let entry = site.entry_address().expect("compiled stub");
    std::mem::forget(library);
    entry
}

extern "C" fn echo64(a: i64) -> i64 {
    a
}

extern "C" fn weighted(a: i64, b: i64, c: i64, d: i64, e: i64, f: i64) -> i64 {
    a + 2 * b + 3 * c + 4 * d + 5 * e + 6 * f
}

extern "C" fn mixed(a: i32, x: f64, b: i64, y: f32) -> f64 {
    a as f64 + x * 2.0 + b as f64 * 3.0 + y as f64 * 4.0
}

extern "C" fn passthrough(a: i32) -> i32 {
    a
}

extern "C" fn fail_with(code: i32) -> i32 {
    last_error::set_os_error(code);
    -1
}

fn widening(native: NativeType) -> extern "C" fn(usize, usize, i8) -> i64 {
    let desc = CallDescriptor::builder(host())
        .param(native, HostType::Byte)
        .returns(NativeType::SLongLong, HostType::Long)
        .build();
    unsafe { std::mem::transmute(link(desc, echo64 as *const () as usize)) }
}

proptest! {
    #[test]
    fn signed_byte_arrives_sign_extended(b in any::<i8>()) {
        let f = widening(NativeType::SChar);
        prop_assert_eq!(f(1, 2, b), b as i64);
    }

    #[test]
    fn unsigned_byte_arrives_zero_extended(b in any::<i8>()) {
        let f = widening(NativeType::UChar);
        prop_assert_eq!(f(1, 2, b), b as u8 as i64);
    }
}

#[test]
fn test_six_integer_arguments_keep_their_order() {
    let desc = (0..6)
        .fold(CallDescriptor::builder(host()), |b, _| b.param(NativeType::SLongLong, HostType::Long))
        .returns(NativeType::SLongLong, HostType::Long)
        .build();
    let f: extern "C" fn(usize, usize, i64, i64, i64, i64, i64, i64) -> i64 =
        unsafe { std::mem::transmute(link(desc.clone(), weighted as *const () as usize)) };

    assert_eq!(f(0, 0, 1, 10, 100, 1_000, 10_000, 100_000), 654_321);
    assert_eq!(f(0, 0, -1, 0, 0, 0, 0, 1), 5);

    let invoker = BufferInvoker::new(desc, weighted as *const () as usize).expect("bind");
    let args = [-1i64 << 40, 3, 0, 0, 0, 1].map(RawValue::from_i64);
    let reference = unsafe { invoker.invoke(&args) }.expect("call").as_i64();
    assert_eq!(f(0, 0, -1 << 40, 3, 0, 0, 0, 1), reference);
}

#[test]
fn test_compiled_matches_buffer_path() {
    let desc = CallDescriptor::builder(host())
        .param(NativeType::SInt, HostType::Int)
        .param(NativeType::Double, HostType::Double)
        .param(NativeType::SLongLong, HostType::Long)
        .param(NativeType::Float, HostType::Float)
        .returns(NativeType::Double, HostType::Double)
        .build();
    let f: extern "C" fn(usize, usize, i32, f64, i64, f32) -> f64 =
        unsafe { std::mem::transmute(link(desc.clone(), mixed as *const () as usize)) };
    let invoker = BufferInvoker::new(desc, mixed as *const () as usize).expect("bind");

    let args = [RawValue::from_i32(-7), RawValue::from_f64(0.25), RawValue::from_i64(3), RawValue::from_f32(1.5)];
    let reference = unsafe { invoker.invoke(&args) }.expect("call").as_f64();
    assert_eq!(f(0, 0, -7, 0.25, 3, 1.5), reference);
    assert_eq!(reference, 8.5);
}

#[test]
fn test_boolean_results_normalize() {
    let desc = CallDescriptor::builder(host())
        .param(NativeType::SInt, HostType::Int)
        .returns(NativeType::SInt, HostType::Boolean)
        .build();
    let f: extern "C" fn(usize, usize, i32) -> i32 = unsafe { std::mem::transmute(link(desc, passthrough as *const () as usize)) };

    assert_eq!(f(0, 0, 0), 0);
    assert_eq!(f(0, 0, 0x100), 1);
    assert_eq!(f(0, 0, -1), 1);
}

fn capturing() -> extern "C" fn(usize, usize, i32) -> i32 {
    let desc = CallDescriptor::builder(host())
        .param(NativeType::SInt, HostType::Int)
        .returns(NativeType::SInt, HostType::Int)
        .capture_errors(true)
        .build();
    unsafe { std::mem::transmute(link(desc, fail_with as *const () as usize)) }
}

#[test]
fn test_error_survives_later_failing_calls() {
    let f = capturing();
    assert_eq!(f(0, 0, 4242), -1);

    // sets the OS error slot to something else
    assert!(std::fs::metadata("/definitely/not/a/path/stubjit").is_err());
    assert_eq!(last_error::last_error(), 4242);
}

#[test]
fn test_error_capture_is_per_thread() {
    let f = capturing();
    let handles: Vec<_> = (1..=4)
        .map(|n| {
            std::thread::spawn(move || {
                for _ in 0..100 {
                    assert_eq!(f(0, 0, 1000 + n), -1);
                    assert_eq!(last_error::last_error(), 1000 + n);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread");
    }
}
