//! Value round-trips through compiled stubs for every integer native/host pairing

#![cfg(all(
    any(target_os = "linux", target_os = "macos"),
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86")
))]

use proptest::prelude::*;
use std::sync::Arc;
use stubjit::descriptor::Width;
use stubjit::fallback::extend;
use stubjit::last_error;
use stubjit::{
    link_class, Arch, CallDescriptor, CallSite, Capabilities, HostType, NativeType, StrategySelector, StubConfig,
    ValueClass,
};

const NATIVES: [NativeType; 11] = [
    NativeType::SChar,
    NativeType::UChar,
    NativeType::SShort,
    NativeType::UShort,
    NativeType::SInt,
    NativeType::UInt,
    NativeType::SLong,
    NativeType::ULong,
    NativeType::SLongLong,
    NativeType::ULongLong,
    NativeType::Address,
];

const HOSTS: [HostType; 6] =
    [HostType::Boolean, HostType::Byte, HostType::Short, HostType::Char, HostType::Int, HostType::Long];

struct Library;

fn host() -> Arch {
    Arch::host().expect("supported host")
}

fn class_of(native: NativeType) -> ValueClass {
    ValueClass::of(native, host()).expect("primitive")
}

fn link(desc: CallDescriptor, target: usize) -> usize {
    let library = Arc::new(Library);
    let selector = StrategySelector::new(Capabilities::full(host()), StubConfig::default());
    let site = CallSite::new("native", desc, target);
    link_class(&library, &selector, std::slice::from_ref(&site)).expect("link");
    let entry = site.entry_address().expect("compiled stub");
    std::mem::forget(library);
    entry
}

extern "C" fn identity(a: u64) -> u64 {
    a
}

extern "C" fn fifth(_: u64, _: u64, _: u64, _: u64, e: u64, _: u64) -> u64 {
    e
}

extern "C" fn sixth(_: u64, _: u64, _: u64, _: u64, _: u64, f: u64) -> u64 {
    f
}

extern "C" fn double_with_error(x: f64) -> f64 {
    last_error::set_os_error(77);
    x * 2.0
}

extern "C" fn halve_with_error(x: f32) -> f32 {
    last_error::set_os_error(78);
    x / 2.0
}

/// What the native side should see for `bits` passed in a `host` slot
fn expected_argument(native: NativeType, host: HostType, bits: u64) -> u64 {
    let class = class_of(native);
    let bits = if host == HostType::Long { bits } else { bits & 0xFFFF_FFFF };
    if class.width == Width::W64 && host.slot_size() < 8 {
        bits as u32 as i32 as i64 as u64
    } else {
        extend(bits, class)
    }
}

/// Bits of an argument a 64-bit native parameter can be trusted to carry
fn argument_mask(native: NativeType) -> u64 {
    if host() == Arch::X86_32 && class_of(native).width != Width::W64 {
        0xFFFF_FFFF
    } else {
        u64::MAX
    }
}

/// Pass `bits` in a `host` slot through the stub at `entry`, slot `index` of `arity`
fn call_with_argument(entry: usize, host: HostType, bits: u64, index: usize, arity: usize) -> u64 {
    let mut words = [0u64; 6];
    words[index] = bits;
    let [a, b, c, d, e, f] = words;

    unsafe {
        match (arity, host == HostType::Long) {
            (1, true) => std::mem::transmute::<usize, extern "C" fn(usize, usize, u64) -> u64>(entry)(0, 0, a),
            (1, false) => std::mem::transmute::<usize, extern "C" fn(usize, usize, u32) -> u64>(entry)(0, 0, a as u32),
            (_, true) => std::mem::transmute::<
                usize,
                extern "C" fn(usize, usize, u64, u64, u64, u64, u64, u64) -> u64,
            >(entry)(0, 0, a, b, c, d, e, f),
            (_, false) => std::mem::transmute::<
                usize,
                extern "C" fn(usize, usize, u64, u64, u64, u64, u32, u32) -> u64,
            >(entry)(0, 0, a, b, c, d, e as u32, f as u32),
        }
    }
}

/// Host view of a native result
fn expected_result(native: NativeType, host: HostType, bits: u64) -> u64 {
    let value = extend(bits, class_of(native));
    match host {
        HostType::Boolean => (value != 0) as u64,
        HostType::Long => value,
        _ => value & 0xFFFF_FFFF,
    }
}

fn call_for_result(entry: usize, host: HostType, bits: u64) -> u64 {
    unsafe {
        if host == HostType::Long {
            std::mem::transmute::<usize, extern "C" fn(usize, usize, u64) -> u64>(entry)(0, 0, bits)
        } else {
            std::mem::transmute::<usize, extern "C" fn(usize, usize, u64) -> u32>(entry)(0, 0, bits) as u64
        }
    }
}

fn result_stub(native: NativeType, host: HostType, capture: bool) -> usize {
    let desc = CallDescriptor::builder(self::host())
        .param(NativeType::ULongLong, HostType::Long)
        .returns(native, host)
        .capture_errors(capture)
        .build();
    link(desc, identity as *const () as usize)
}

/// Six parameters; the first four are 64-bit, the last two use `native`/`host`
fn tail_stub(native: NativeType, host: HostType, target: usize) -> usize {
    let desc = (0..4)
        .fold(CallDescriptor::builder(self::host()), |b, _| b.param(NativeType::ULongLong, HostType::Long))
        .param(native, host)
        .param(native, host)
        .returns(NativeType::ULongLong, HostType::Long)
        .build();
    link(desc, target)
}

/// Value the target sees in slot `index` (4 or 5) of a `tail_stub`, masked per `argument_mask`
fn tail_argument(native: NativeType, host: HostType, bits: u64, index: usize) -> u64 {
    let packed = self::host() == Arch::X86_32 && class_of(native).width != Width::W64;
    let value = match (index, packed) {
        (4, _) => call_with_argument(tail_stub(native, host, fifth as *const () as usize), host, bits, 4, 6),
        // 4-byte stack words: the sixth value is the high half of what `fifth` reads
        (_, true) => call_with_argument(tail_stub(native, host, fifth as *const () as usize), host, bits, 5, 6) >> 32,
        (_, false) => call_with_argument(tail_stub(native, host, sixth as *const () as usize), host, bits, 5, 6),
    };
    value & argument_mask(native)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn arguments_arrive_extended(
        native in prop::sample::select(NATIVES.to_vec()),
        host in prop::sample::select(HOSTS.to_vec()),
        bits in any::<u64>(),
    ) {
        let desc = CallDescriptor::builder(self::host())
            .param(native, host)
            .returns(NativeType::ULongLong, HostType::Long)
            .build();
        let entry = link(desc, identity as *const () as usize);

        let mask = argument_mask(native);
        let got = call_with_argument(entry, host, bits, 0, 1);
        prop_assert_eq!(got & mask, expected_argument(native, host, bits) & mask);
    }

    #[test]
    fn stack_placed_arguments_arrive_extended(
        native in prop::sample::select(NATIVES.to_vec()),
        host in prop::sample::select(HOSTS.to_vec()),
        bits in any::<u64>(),
    ) {
        let expected = expected_argument(native, host, bits) & argument_mask(native);
        prop_assert_eq!(tail_argument(native, host, bits, 4), expected);
        prop_assert_eq!(tail_argument(native, host, bits, 5), expected);
    }

    #[test]
    fn results_reach_the_host_slot(
        native in prop::sample::select(NATIVES.to_vec()),
        host in prop::sample::select(HOSTS.to_vec()),
        capture in any::<bool>(),
        bits in any::<u64>(),
    ) {
        let entry = result_stub(native, host, capture);
        prop_assert_eq!(call_for_result(entry, host, bits), expected_result(native, host, bits));
    }

    #[test]
    fn captured_float_results_survive_the_helper(x in -1.0e6f64..1.0e6) {
        let desc = CallDescriptor::builder(self::host())
            .param(NativeType::Double, HostType::Double)
            .returns(NativeType::Double, HostType::Double)
            .capture_errors(true)
            .build();
        let f: extern "C" fn(usize, usize, f64) -> f64 =
            unsafe { std::mem::transmute(link(desc, double_with_error as *const () as usize)) };

        prop_assert_eq!(f(0, 0, x), x * 2.0);
        prop_assert_eq!(last_error::last_error(), 77);
    }
}

#[test]
fn test_narrow_results_widen() {
    let cases = [
        (NativeType::SChar, HostType::Byte, 0x1234_5678_9ABC_DE80, 0xFFFF_FF80),
        (NativeType::UShort, HostType::Char, 0x1234_5678_9ABC_FFFE, 0xFFFE),
        (NativeType::UInt, HostType::Long, 0x1234_5678_FFFF_FFFF, 0xFFFF_FFFF),
        (NativeType::SInt, HostType::Long, 0x1234_5678_FFFF_FFFE, u64::MAX - 1),
        (NativeType::UChar, HostType::Boolean, 0xFF00, 0),
        (NativeType::UChar, HostType::Boolean, 0xFF01, 1),
    ];

    for (native, host, bits, expected) in cases {
        for capture in [false, true] {
            let entry = result_stub(native, host, capture);
            assert_eq!(call_for_result(entry, host, bits), expected, "{:?} -> {:?}", native, host);
        }
    }
}

#[test]
fn test_narrow_stack_arguments_sign_extend() {
    let mask = argument_mask(NativeType::SChar);
    assert_eq!(tail_argument(NativeType::SChar, HostType::Byte, (-3i8) as u8 as u64, 4), (-3i64) as u64 & mask);
    assert_eq!(tail_argument(NativeType::SChar, HostType::Byte, (-5i8) as u8 as u64, 5), (-5i64) as u64 & mask);
    assert_eq!(tail_argument(NativeType::UShort, HostType::Char, 0xFFFF_8001, 5), 0x8001);
}

#[test]
fn test_captured_single_result_survives_the_helper() {
    let desc = CallDescriptor::builder(host())
        .param(NativeType::Float, HostType::Float)
        .returns(NativeType::Float, HostType::Float)
        .capture_errors(true)
        .build();
    let f: extern "C" fn(usize, usize, f32) -> f32 =
        unsafe { std::mem::transmute(link(desc, halve_with_error as *const () as usize)) };

    assert_eq!(f(0, 0, 5.0), 2.5);
    assert_eq!(last_error::last_error(), 78);
}
