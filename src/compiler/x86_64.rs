//! x86-64 System V trampolines
//!
//! Hosting entry: rdi/rsi carry the runtime context, real integer arguments start at rdx.
//! Float arguments already sit in xmm0..xmm7 and are left alone.

use super::frame::FrameKind;
use crate::asm::x86::{
    ptr, Assembler, Gpr, Mode, Rm, Size, R11, R8, R9, RAX, RCX, RDI, RDX, RSI, RSP, XMM0,
};
use crate::descriptor::{CallDescriptor, HostType, RegisterClass, SlotType, ValueClass, Width};

/// Where real integer argument `i` arrives under the hosting convention
const HOST_INT_SOURCES: [Option<Gpr>; 6] = [Some(RDX), Some(RCX), Some(R8), Some(R9), None, None];

/// Target ABI integer argument registers
const TARGET_INT_REGS: [Gpr; 6] = [RDI, RSI, RDX, RCX, R8, R9];

pub(super) fn can_compile(desc: &CallDescriptor) -> bool {
    desc.is_primitive() && desc.fits_architecture_budget(desc.arch())
}

fn width_size(width: Width) -> Size {
    match width {
        Width::W8 => Size::Byte,
        Width::W16 => Size::Word,
        Width::W32 => Size::Dword,
        Width::W64 => Size::Qword,
    }
}

/// Move `src` into `dst` with the extension the native class requires
fn load_extended(a: &mut Assembler, dst: Gpr, src: Rm, class: ValueClass, host: HostType) {
    let from = match class.width {
        // 64-bit native fed from a 4-byte host slot widens the host value
        Width::W64 if host.slot_size() < 8 => Size::Dword,
        width => width_size(width),
    };
    let signed = class.is_signed() || (class.width == Width::W64 && from == Size::Dword);

    if signed {
        a.movsx(dst, src, from);
    } else {
        a.movzx(dst, src, from);
    }
}

fn emit_param_moves(a: &mut Assembler, desc: &CallDescriptor) {
    for (i, (slot, class)) in desc.integer_params().enumerate() {
        let src = match HOST_INT_SOURCES[i] {
            Some(reg) => Rm::Reg(reg),
            // Caller-placed: [rsp] holds the return address
            None => Rm::Mem(ptr(RSP, 8 + 8 * (i as i32 - 4))),
        };
        load_extended(a, TARGET_INT_REGS[i], src, class, slot.host);
    }
}

/// Widen a native result in rax to the full register
fn extend_result(a: &mut Assembler, class: ValueClass) {
    if class.width != Width::W64 {
        load_extended(a, RAX, Rm::Reg(RAX), class, HostType::Long);
    }
}

fn normalize_boolean(a: &mut Assembler, result: &SlotType) {
    if result.host == HostType::Boolean {
        a.test(RAX, RAX, Size::Qword);
        a.setne(RAX);
        a.movzx(RAX, RAX, Size::Byte);
    }
}

fn spill_result(a: &mut Assembler, class: ValueClass) {
    let slot = ptr(RSP, 0);
    match class.class {
        RegisterClass::FloatSingle => a.movss_store(slot, XMM0),
        RegisterClass::FloatDouble => a.movsd_store(slot, XMM0),
        RegisterClass::Integer => a.mov_store(slot, RAX, Size::Qword),
    }
}

fn reload_result(a: &mut Assembler, class: ValueClass) {
    let slot = ptr(RSP, 0);
    match class.class {
        RegisterClass::FloatSingle => a.movss_load(XMM0, slot),
        RegisterClass::FloatDouble => a.movsd_load(XMM0, slot),
        RegisterClass::Integer => load_extended(a, RAX, Rm::Mem(slot), class, HostType::Long),
    }
}

pub(super) fn emit(desc: &CallDescriptor, target: usize, helper: Option<usize>, frame: FrameKind) -> Vec<u8> {
    let mut a = Assembler::new(Mode::Bits64);
    emit_param_moves(&mut a, desc);

    if frame == FrameKind::Direct {
        a.jmp_abs(R11, target as u64);
        return a.into_code();
    }

    let result = desc.result();
    let space = match result.class {
        Some(class) if class.is_float() => 24,
        _ => 8,
    };

    a.sub_imm(RSP, space);
    // al = vector register count for variadic targets
    a.xor(RAX, RAX, Size::Dword);
    a.call_abs(R11, target as u64);

    match (helper, result.class) {
        (Some(helper), Some(class)) => {
            spill_result(&mut a, class);
            a.call_abs(R11, helper as u64);
            reload_result(&mut a, class);
        }
        (Some(helper), None) => a.call_abs(R11, helper as u64),
        (None, Some(class)) if class.is_integer() => extend_result(&mut a, class),
        (None, _) => {}
    }

    normalize_boolean(&mut a, result);

    a.add_imm(RSP, space);
    a.ret();
    a.into_code()
}
