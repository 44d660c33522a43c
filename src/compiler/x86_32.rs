//! i386 System V trampolines
//!
//! Everything is stack-passed, so the trampoline always builds a fresh 16-byte aligned
//! argument block and never tail-jumps.
//!
//! Entry layout: `[esp]` return address, `[esp+4]` and `[esp+8]` runtime context,
//! real arguments from `[esp+12]`.

use crate::asm::x86::{ptr, Assembler, Mode, Size, EAX, EDX, ESP};
use crate::descriptor::{CallDescriptor, HostType, RegisterClass, SlotType, ValueClass, Width};

/// Return address plus the two context slots
const HOST_PREFIX: i32 = 4 + 8;

pub(super) fn can_compile(desc: &CallDescriptor) -> bool {
    desc.is_primitive()
}

#[inline]
const fn align16(value: usize) -> usize {
    (value + 15) & !15
}

/// Bytes a parameter occupies in the outgoing argument block
fn target_size(class: ValueClass) -> usize {
    if class.width == Width::W64 {
        8
    } else {
        4
    }
}

/// Spill area the result needs across the helper call
fn result_size(result: &SlotType) -> usize {
    match result.class {
        None => 0,
        Some(class) if class.is_float() => 16,
        Some(class) if class.width == Width::W64 => 8,
        Some(_) => 4,
    }
}

/// `align16(max(params, result) + 4) - 4`, leaving esp 16-byte aligned at the call
pub fn stack_adjust(desc: &CallDescriptor) -> usize {
    let params: usize = desc.params().iter().filter_map(|p| p.class).map(target_size).sum();
    align16(params.max(result_size(desc.result())) + 4) - 4
}

fn emit_params(a: &mut Assembler, desc: &CallDescriptor, adjust: i32) {
    let mut src = 0i32;
    let mut dst = 0i32;

    for slot in desc.params() {
        let Some(class) = slot.class else { continue };
        let disp = adjust + HOST_PREFIX + src;

        match (class.class, class.width) {
            (RegisterClass::Integer, Width::W8) | (RegisterClass::Integer, Width::W16) => {
                let from = if class.width == Width::W8 { Size::Byte } else { Size::Word };
                if class.is_signed() {
                    a.movsx(EAX, ptr(ESP, disp), from);
                } else {
                    a.movzx(EAX, ptr(ESP, disp), from);
                }
                a.mov_store(ptr(ESP, dst), EAX, Size::Dword);
            }
            (_, Width::W64) => {
                a.mov(EAX, ptr(ESP, disp), Size::Dword);
                a.mov_store(ptr(ESP, dst), EAX, Size::Dword);
                if slot.host.slot_size() == 8 {
                    a.mov(EAX, ptr(ESP, disp + 4), Size::Dword);
                } else {
                    a.sar_imm(EAX, 31, Size::Dword);
                }
                a.mov_store(ptr(ESP, dst + 4), EAX, Size::Dword);
            }
            _ => {
                a.mov(EAX, ptr(ESP, disp), Size::Dword);
                a.mov_store(ptr(ESP, dst), EAX, Size::Dword);
            }
        }

        src += slot.host.slot_size() as i32;
        dst += target_size(class) as i32;
    }
}

fn spill_result(a: &mut Assembler, class: ValueClass) {
    match (class.class, class.width) {
        (RegisterClass::FloatSingle, _) => a.fstp(ptr(ESP, 0), Size::Dword),
        (RegisterClass::FloatDouble, _) => a.fstp(ptr(ESP, 0), Size::Qword),
        (_, Width::W64) => {
            a.mov_store(ptr(ESP, 0), EAX, Size::Dword);
            a.mov_store(ptr(ESP, 4), EDX, Size::Dword);
        }
        _ => a.mov_store(ptr(ESP, 0), EAX, Size::Dword),
    }
}

fn reload_result(a: &mut Assembler, class: ValueClass) {
    let slot = ptr(ESP, 0);
    match (class.class, class.width) {
        (RegisterClass::FloatSingle, _) => a.fld(slot, Size::Dword),
        (RegisterClass::FloatDouble, _) => a.fld(slot, Size::Qword),
        (_, Width::W64) => {
            a.mov(EAX, slot, Size::Dword);
            a.mov(EDX, ptr(ESP, 4), Size::Dword);
        }
        (_, Width::W32) => a.mov(EAX, slot, Size::Dword),
        (_, width) => {
            let from = if width == Width::W8 { Size::Byte } else { Size::Word };
            if class.is_signed() {
                a.movsx(EAX, slot, from);
            } else {
                a.movzx(EAX, slot, from);
            }
        }
    }
}

fn extend_result(a: &mut Assembler, class: ValueClass) {
    match class.width {
        Width::W8 | Width::W16 => {
            let from = if class.width == Width::W8 { Size::Byte } else { Size::Word };
            if class.is_signed() {
                a.movsx(EAX, EAX, from);
            } else {
                a.movzx(EAX, EAX, from);
            }
        }
        Width::W32 | Width::W64 => {}
    }
}

/// Narrow native result into an 8-byte host slot: produce edx
fn widen_to_long(a: &mut Assembler, class: ValueClass) {
    if class.is_signed() {
        a.mov(EDX, EAX, Size::Dword);
        a.sar_imm(EDX, 31, Size::Dword);
    } else {
        a.mov_imm(EDX, 0, Size::Dword);
    }
}

fn normalize_boolean(a: &mut Assembler, class: ValueClass) {
    if class.width == Width::W64 {
        a.or(EAX, EDX, Size::Dword);
    } else {
        a.test(EAX, EAX, Size::Dword);
    }
    a.setne(EAX);
    a.movzx(EAX, EAX, Size::Byte);
}

pub(super) fn emit(desc: &CallDescriptor, target: usize, helper: Option<usize>) -> Vec<u8> {
    let mut a = Assembler::new(Mode::Bits32);
    let adjust = stack_adjust(desc) as i32;

    a.sub_imm(ESP, adjust);
    emit_params(&mut a, desc, adjust);
    a.call_abs(EAX, target as u64);

    let result = desc.result();
    match (helper, result.class) {
        (Some(helper), Some(class)) => {
            spill_result(&mut a, class);
            a.call_abs(EAX, helper as u64);
            reload_result(&mut a, class);
        }
        (Some(helper), None) => a.call_abs(EAX, helper as u64),
        (None, Some(class)) if class.is_integer() => extend_result(&mut a, class),
        (None, _) => {}
    }

    if let Some(class) = result.class.filter(|c| c.is_integer()) {
        match result.host {
            HostType::Boolean => normalize_boolean(&mut a, class),
            HostType::Long if class.width != Width::W64 => widen_to_long(&mut a, class),
            _ => {}
        }
    }

    a.add_imm(ESP, adjust);
    a.ret();
    a.into_code()
}
