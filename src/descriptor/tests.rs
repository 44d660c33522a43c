//! Classifier and budget tests

use super::*;

fn ints(arch: Arch, n: usize) -> DescriptorBuilder {
    (0..n).fold(CallDescriptor::builder(arch), |b, _| b.param(NativeType::SInt, HostType::Int))
}

fn floats(b: DescriptorBuilder, n: usize) -> DescriptorBuilder {
    (0..n).fold(b, |b, _| b.param(NativeType::Double, HostType::Double))
}

#[test]
fn test_integer_widths_follow_native_size() {
    let cases = [
        (NativeType::SChar, Width::W8, Signedness::Signed),
        (NativeType::UChar, Width::W8, Signedness::Unsigned),
        (NativeType::SShort, Width::W16, Signedness::Signed),
        (NativeType::UShort, Width::W16, Signedness::Unsigned),
        (NativeType::SInt, Width::W32, Signedness::Signed),
        (NativeType::UInt, Width::W32, Signedness::Unsigned),
        (NativeType::SLongLong, Width::W64, Signedness::Signed),
        (NativeType::ULongLong, Width::W64, Signedness::Unsigned),
    ];

    for (native, width, signedness) in cases {
        let class = ValueClass::of(native, Arch::X86_64).expect("primitive");
        assert_eq!(class.class, RegisterClass::Integer);
        assert_eq!(class.width, width, "{:?}", native);
        assert_eq!(class.signedness, signedness, "{:?}", native);
    }
}

#[test]
fn test_pointer_width_tracks_architecture() {
    assert_eq!(ValueClass::of(NativeType::Address, Arch::X86_32).unwrap().width, Width::W32);
    assert_eq!(ValueClass::of(NativeType::Address, Arch::X86_64).unwrap().width, Width::W64);
    assert_eq!(ValueClass::of(NativeType::SLong, Arch::X86_32).unwrap().width, Width::W32);
    assert_eq!(ValueClass::of(NativeType::ULong, Arch::X86_64).unwrap().width, Width::W64);
}

#[test]
fn test_aarch64_address_is_always_64_bit() {
    let class = ValueClass::of(NativeType::Address, Arch::Aarch64).unwrap();
    assert_eq!(class.width, Width::W64);
    assert_eq!(class.signedness, Signedness::Unsigned);
}

#[test]
fn test_float_classes() {
    let f = ValueClass::of(NativeType::Float, Arch::X86_64).unwrap();
    assert_eq!(f.class, RegisterClass::FloatSingle);
    assert_eq!(f.signedness, Signedness::NotApplicable);

    let d = ValueClass::of(NativeType::Double, Arch::X86_32).unwrap();
    assert_eq!(d.class, RegisterClass::FloatDouble);
    assert_eq!(d.width, Width::W64);
}

#[test]
fn test_composites_are_not_classified() {
    for native in [NativeType::Struct, NativeType::Array, NativeType::String, NativeType::Void] {
        assert!(ValueClass::of(native, Arch::X86_64).is_none(), "{:?}", native);
    }
}

#[test]
fn test_counts_split_register_files() {
    let desc = CallDescriptor::builder(Arch::X86_64)
        .param(NativeType::SInt, HostType::Int)
        .param(NativeType::Double, HostType::Double)
        .param(NativeType::Address, HostType::Long)
        .param(NativeType::Float, HostType::Float)
        .returns(NativeType::Void, HostType::Void)
        .build();

    assert_eq!(desc.integer_count(), 2);
    assert_eq!(desc.float_count(), 2);
    assert!(desc.is_primitive());
}

#[test]
fn test_budget_boundaries_on_64_bit() {
    for arch in [Arch::X86_64, Arch::Aarch64] {
        assert!(floats(ints(arch, 6), 8).build().fits_architecture_budget(arch));
        assert!(!floats(ints(arch, 7), 8).build().fits_architecture_budget(arch));
        assert!(!floats(ints(arch, 6), 9).build().fits_architecture_budget(arch));
    }
}

#[test]
fn test_stack_architecture_has_no_budget() {
    let desc = floats(ints(Arch::X86_32, 20), 20).build();
    assert!(desc.fits_architecture_budget(Arch::X86_32));
}

#[test]
fn test_host_mismatch_is_not_primitive() {
    let desc = CallDescriptor::builder(Arch::X86_64)
        .param(NativeType::Float, HostType::Double)
        .build();
    assert!(!desc.is_primitive());

    let desc = CallDescriptor::builder(Arch::X86_64)
        .param(NativeType::SInt, HostType::Float)
        .build();
    assert!(!desc.is_primitive());
}

#[test]
fn test_composite_param_is_not_primitive() {
    let desc = CallDescriptor::builder(Arch::X86_64)
        .param(NativeType::String, HostType::Long)
        .returns(NativeType::SInt, HostType::Int)
        .build();
    assert!(!desc.is_primitive());
    assert_eq!(desc.integer_count(), 0);
}

#[test]
fn test_signature_display() {
    let desc = CallDescriptor::builder(Arch::X86_64)
        .param(NativeType::SChar, HostType::Byte)
        .param(NativeType::Double, HostType::Double)
        .returns(NativeType::UInt, HostType::Int)
        .capture_errors(true)
        .build();
    assert_eq!(desc.signature(), "(i8, f64) -> u32 [errno]");
}
