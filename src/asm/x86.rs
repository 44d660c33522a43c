//! Minimal x86 / x86-64 encoder
//!
//! Only the instruction forms the trampolines need: register and `[base + disp]`
//! memory operands, no index registers, no labels.

/// Encoding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Bits32,
    Bits64,
}

/// Operand size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Byte,
    Word,
    Dword,
    Qword,
}

impl Size {
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Dword => 4,
            Self::Qword => 8,
        }
    }
}

/// General purpose register by hardware number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gpr(pub u8);

pub const RAX: Gpr = Gpr(0);
pub const RCX: Gpr = Gpr(1);
pub const RDX: Gpr = Gpr(2);
pub const RSP: Gpr = Gpr(4);
pub const RSI: Gpr = Gpr(6);
pub const RDI: Gpr = Gpr(7);
pub const R8: Gpr = Gpr(8);
pub const R9: Gpr = Gpr(9);
pub const R11: Gpr = Gpr(11);

/// 32-bit mode aliases
pub const EAX: Gpr = RAX;
pub const EDX: Gpr = RDX;
pub const ESP: Gpr = RSP;

/// SSE register by number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xmm(pub u8);

pub const XMM0: Xmm = Xmm(0);

/// `[base + disp]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mem {
    pub base: Gpr,
    pub disp: i32,
}

#[inline]
pub const fn ptr(base: Gpr, disp: i32) -> Mem {
    Mem { base, disp }
}

/// Register-or-memory operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rm {
    Reg(Gpr),
    Mem(Mem),
}

impl From<Gpr> for Rm {
    fn from(r: Gpr) -> Self {
        Rm::Reg(r)
    }
}

impl From<Mem> for Rm {
    fn from(m: Mem) -> Self {
        Rm::Mem(m)
    }
}

pub struct Assembler {
    mode: Mode,
    code: Vec<u8>,
}

impl Assembler {
    pub fn new(mode: Mode) -> Self {
        Self { mode, code: Vec::with_capacity(64) }
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn into_code(self) -> Vec<u8> {
        self.code
    }

    /// Native word size
    #[inline]
    fn word(&self) -> Size {
        match self.mode {
            Mode::Bits32 => Size::Dword,
            Mode::Bits64 => Size::Qword,
        }
    }

    fn emit_rex(&mut self, w: bool, reg: u8, rm: Rm, byte_rm: bool) {
        let b = match rm {
            Rm::Reg(r) => r.0,
            Rm::Mem(m) => m.base.0,
        };
        let uniform_byte = byte_rm && matches!(rm, Rm::Reg(r) if (4..8).contains(&r.0));
        let rex = 0x40 | ((w as u8) << 3) | (((reg >> 3) & 1) << 2) | ((b >> 3) & 1);

        match self.mode {
            Mode::Bits64 => {
                if rex != 0x40 || uniform_byte {
                    self.code.push(rex);
                }
            }
            Mode::Bits32 => {
                debug_assert!(!w && reg < 8 && b < 8, "REX-only operand in 32-bit mode");
            }
        }
    }

    fn emit_modrm(&mut self, reg: u8, rm: Rm) {
        let reg = (reg & 7) << 3;
        match rm {
            Rm::Reg(r) => self.code.push(0xC0 | reg | (r.0 & 7)),
            Rm::Mem(Mem { base, disp }) => {
                let base_low = base.0 & 7;
                let (mode, disp_bytes) = if disp == 0 && base_low != 5 {
                    (0x00, 0)
                } else if i8::try_from(disp).is_ok() {
                    (0x40, 1)
                } else {
                    (0x80, 4)
                };
                self.code.push(mode | reg | base_low);
                if base_low == 4 {
                    // SIB: no index, base = rsp/r12
                    self.code.push(0x24);
                }
                match disp_bytes {
                    1 => self.code.push(disp as i8 as u8),
                    4 => self.code.extend_from_slice(&disp.to_le_bytes()),
                    _ => {}
                }
            }
        }
    }

    fn emit_op(&mut self, prefix: Option<u8>, w: bool, opcode: &[u8], reg: u8, rm: Rm, byte_rm: bool) {
        if let Some(p) = prefix {
            self.code.push(p);
        }
        self.emit_rex(w, reg, rm, byte_rm);
        self.code.extend_from_slice(opcode);
        self.emit_modrm(reg, rm);
    }

    /// Sign-extending load into a full native-width register
    pub fn movsx(&mut self, dst: Gpr, src: impl Into<Rm>, from: Size) {
        let w = self.mode == Mode::Bits64;
        let src = src.into();
        match from {
            Size::Byte => self.emit_op(None, w, &[0x0F, 0xBE], dst.0, src, true),
            Size::Word => self.emit_op(None, w, &[0x0F, 0xBF], dst.0, src, false),
            Size::Dword => {
                debug_assert_eq!(self.mode, Mode::Bits64, "movsxd is 64-bit only");
                self.emit_op(None, true, &[0x63], dst.0, src, false)
            }
            Size::Qword => self.mov(dst, src, Size::Qword),
        }
    }

    /// Zero-extending load; the 32-bit destination clears the upper half in 64-bit mode
    pub fn movzx(&mut self, dst: Gpr, src: impl Into<Rm>, from: Size) {
        let src = src.into();
        match from {
            Size::Byte => self.emit_op(None, false, &[0x0F, 0xB6], dst.0, src, true),
            Size::Word => self.emit_op(None, false, &[0x0F, 0xB7], dst.0, src, false),
            Size::Dword => self.mov(dst, src, Size::Dword),
            Size::Qword => self.mov(dst, src, Size::Qword),
        }
    }

    /// `mov dst, src` for dword/qword
    pub fn mov(&mut self, dst: Gpr, src: impl Into<Rm>, size: Size) {
        debug_assert!(matches!(size, Size::Dword | Size::Qword));
        self.emit_op(None, size == Size::Qword, &[0x8B], dst.0, src.into(), false);
    }

    /// `mov [mem], src` for dword/qword
    pub fn mov_store(&mut self, dst: Mem, src: Gpr, size: Size) {
        debug_assert!(matches!(size, Size::Dword | Size::Qword));
        self.emit_op(None, size == Size::Qword, &[0x89], src.0, Rm::Mem(dst), false);
    }

    /// `mov reg, imm`: imm32 form for dword, movabs for qword
    pub fn mov_imm(&mut self, dst: Gpr, imm: u64, size: Size) {
        match size {
            Size::Qword => {
                self.emit_rex(true, 0, Rm::Reg(dst), false);
                self.code.push(0xB8 + (dst.0 & 7));
                self.code.extend_from_slice(&imm.to_le_bytes());
            }
            _ => {
                self.emit_rex(false, 0, Rm::Reg(dst), false);
                self.code.push(0xB8 + (dst.0 & 7));
                self.code.extend_from_slice(&(imm as u32).to_le_bytes());
            }
        }
    }

    fn alu_imm(&mut self, ext: u8, dst: Gpr, imm: i32) {
        let w = self.mode == Mode::Bits64;
        if let Ok(imm8) = i8::try_from(imm) {
            self.emit_op(None, w, &[0x83], ext, Rm::Reg(dst), false);
            self.code.push(imm8 as u8);
        } else {
            self.emit_op(None, w, &[0x81], ext, Rm::Reg(dst), false);
            self.code.extend_from_slice(&imm.to_le_bytes());
        }
    }

    /// Native-width `add dst, imm`
    pub fn add_imm(&mut self, dst: Gpr, imm: i32) {
        self.alu_imm(0, dst, imm);
    }

    /// Native-width `sub dst, imm`
    pub fn sub_imm(&mut self, dst: Gpr, imm: i32) {
        self.alu_imm(5, dst, imm);
    }

    pub fn xor(&mut self, dst: Gpr, src: Gpr, size: Size) {
        self.emit_op(None, size == Size::Qword, &[0x31], src.0, Rm::Reg(dst), false);
    }

    pub fn or(&mut self, dst: Gpr, src: Gpr, size: Size) {
        self.emit_op(None, size == Size::Qword, &[0x09], src.0, Rm::Reg(dst), false);
    }

    pub fn test(&mut self, a: Gpr, b: Gpr, size: Size) {
        self.emit_op(None, size == Size::Qword, &[0x85], b.0, Rm::Reg(a), false);
    }

    /// Arithmetic shift right by immediate
    pub fn sar_imm(&mut self, dst: Gpr, imm: u8, size: Size) {
        self.emit_op(None, size == Size::Qword, &[0xC1], 7, Rm::Reg(dst), false);
        self.code.push(imm);
    }

    /// `setne r8`
    pub fn setne(&mut self, dst: Gpr) {
        self.emit_op(None, false, &[0x0F, 0x95], 0, Rm::Reg(dst), true);
    }

    pub fn call(&mut self, target: Gpr) {
        self.emit_op(None, false, &[0xFF], 2, Rm::Reg(target), false);
    }

    pub fn jmp(&mut self, target: Gpr) {
        self.emit_op(None, false, &[0xFF], 4, Rm::Reg(target), false);
    }

    pub fn ret(&mut self) {
        self.code.push(0xC3);
    }

    /// Load an absolute address into `scratch` and call it
    pub fn call_abs(&mut self, scratch: Gpr, address: u64) {
        self.mov_imm(scratch, address, self.word());
        self.call(scratch);
    }

    /// Load an absolute address into `scratch` and jump to it
    pub fn jmp_abs(&mut self, scratch: Gpr, address: u64) {
        self.mov_imm(scratch, address, self.word());
        self.jmp(scratch);
    }

    pub fn movss_store(&mut self, dst: Mem, src: Xmm) {
        self.emit_op(Some(0xF3), false, &[0x0F, 0x11], src.0, Rm::Mem(dst), false);
    }

    pub fn movsd_store(&mut self, dst: Mem, src: Xmm) {
        self.emit_op(Some(0xF2), false, &[0x0F, 0x11], src.0, Rm::Mem(dst), false);
    }

    pub fn movss_load(&mut self, dst: Xmm, src: Mem) {
        self.emit_op(Some(0xF3), false, &[0x0F, 0x10], dst.0, Rm::Mem(src), false);
    }

    pub fn movsd_load(&mut self, dst: Xmm, src: Mem) {
        self.emit_op(Some(0xF2), false, &[0x0F, 0x10], dst.0, Rm::Mem(src), false);
    }

    /// x87 `fstp dword/qword [mem]`
    pub fn fstp(&mut self, dst: Mem, size: Size) {
        let opcode = if size == Size::Qword { 0xDD } else { 0xD9 };
        self.emit_op(None, false, &[opcode], 3, Rm::Mem(dst), false);
    }

    /// x87 `fld dword/qword [mem]`
    pub fn fld(&mut self, src: Mem, size: Size) {
        let opcode = if size == Size::Qword { 0xDD } else { 0xD9 };
        self.emit_op(None, false, &[opcode], 0, Rm::Mem(src), false);
    }
}
