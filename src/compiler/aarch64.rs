//! AArch64 AAPCS64 trampolines
//!
//! Hosting entry: x0/x1 carry the runtime context, real integer arguments arrive in
//! x2..x7. Float arguments already sit in v0..v7. Absolute addresses go through x9.

use super::frame::FrameKind;
use crate::asm::aarch64::{Access, Assembler, Cond, Reg, FP, LR, SP, V0, X0, X9};
use crate::descriptor::{CallDescriptor, HostType, RegisterClass, SlotType, ValueClass, Width};

/// Frame record plus one 16-byte spill slot
const FRAME_SIZE: i16 = 32;
const SPILL_OFFSET: u16 = 16;

pub(super) fn can_compile(desc: &CallDescriptor) -> bool {
    desc.is_primitive() && desc.fits_architecture_budget(desc.arch())
}

/// Extend `src` into `dst` per native class; a 4-byte host feeding a 64-bit native is sign-extended
fn move_extended(a: &mut Assembler, dst: Reg, src: Reg, class: ValueClass, host: HostType) {
    match (class.width, class.is_signed()) {
        (Width::W8, true) => a.sxtb(dst, src),
        (Width::W8, false) => a.uxtb(dst, src),
        (Width::W16, true) => a.sxth(dst, src),
        (Width::W16, false) => a.uxth(dst, src),
        (Width::W32, true) => a.sxtw(dst, src),
        (Width::W32, false) => a.uxtw(dst, src),
        (Width::W64, _) if host.slot_size() < 8 => a.sxtw(dst, src),
        (Width::W64, _) => {
            if dst != src {
                a.mov(dst, src);
            }
        }
    }
}

fn emit_param_moves(a: &mut Assembler, desc: &CallDescriptor) {
    for (i, (slot, class)) in desc.integer_params().enumerate() {
        let i = i as u8;
        move_extended(a, Reg(i), Reg(i + 2), class, slot.host);
    }
}

fn spill_result(a: &mut Assembler, class: ValueClass) {
    match class.class {
        RegisterClass::FloatSingle => a.str_fp(V0, FP, SPILL_OFFSET, Access::Single),
        RegisterClass::FloatDouble => a.str_fp(V0, FP, SPILL_OFFSET, Access::FloatDouble),
        RegisterClass::Integer => a.str(X0, FP, SPILL_OFFSET, Access::Double),
    }
}

fn reload_result(a: &mut Assembler, class: ValueClass) {
    let access = match class.width {
        Width::W8 => Access::Byte,
        Width::W16 => Access::Half,
        Width::W32 => Access::Word,
        Width::W64 => Access::Double,
    };

    match class.class {
        RegisterClass::FloatSingle => a.ldr_fp(V0, FP, SPILL_OFFSET, Access::Single),
        RegisterClass::FloatDouble => a.ldr_fp(V0, FP, SPILL_OFFSET, Access::FloatDouble),
        RegisterClass::Integer if class.is_signed() => a.ldrs(X0, FP, SPILL_OFFSET, access),
        RegisterClass::Integer => a.ldr(X0, FP, SPILL_OFFSET, access),
    }
}

fn normalize_boolean(a: &mut Assembler, result: &SlotType, class: ValueClass) {
    if result.host == HostType::Boolean {
        a.cmp_zero(X0, class.width == Width::W64);
        a.cset(X0, Cond::Ne);
    }
}

pub(super) fn emit(desc: &CallDescriptor, target: usize, helper: Option<usize>, frame: FrameKind) -> Vec<u8> {
    let mut a = Assembler::new();

    if frame == FrameKind::Direct {
        emit_param_moves(&mut a, desc);
        a.mov_imm64(X9, target as u64);
        a.br(X9);
        return a.into_code();
    }

    a.stp_pre(FP, LR, SP, -FRAME_SIZE);
    a.add_imm(FP, SP, 0);
    emit_param_moves(&mut a, desc);
    a.mov_imm64(X9, target as u64);
    a.blr(X9);

    let result = desc.result();
    match (helper, result.class) {
        (Some(helper), Some(class)) => {
            spill_result(&mut a, class);
            a.mov_imm64(X9, helper as u64);
            a.blr(X9);
            reload_result(&mut a, class);
        }
        (Some(helper), None) => {
            a.mov_imm64(X9, helper as u64);
            a.blr(X9);
        }
        (None, Some(class)) if class.is_integer() => move_extended(&mut a, X0, X0, class, HostType::Long),
        (None, _) => {}
    }

    if let Some(class) = result.class.filter(|c| c.is_integer()) {
        normalize_boolean(&mut a, result, class);
    }

    a.ldp_post(FP, LR, SP, FRAME_SIZE);
    a.ret();
    a.into_code()
}
