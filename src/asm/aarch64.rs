//! Minimal AArch64 encoder
//!
//! Fixed-width A64 words, little endian. Register operands are plain numbers;
//! 31 is `sp` or `xzr` depending on the instruction.

/// Integer register number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(pub u8);

pub const X0: Reg = Reg(0);
pub const X9: Reg = Reg(9);
pub const FP: Reg = Reg(29);
pub const LR: Reg = Reg(30);
pub const SP: Reg = Reg(31);

/// Float/SIMD register number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VReg(pub u8);

pub const V0: VReg = VReg(0);

/// Access size for unsigned-offset loads and stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// `ldrb` / `ldrsb`
    Byte,
    /// `ldrh` / `ldrsh`
    Half,
    /// 32-bit `w` register or `ldrsw`
    Word,
    /// 64-bit `x` register
    Double,
    /// `s` register
    Single,
    /// `d` register
    FloatDouble,
}

impl Access {
    const fn scale(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word | Self::Single => 4,
            Self::Double | Self::FloatDouble => 8,
        }
    }
}

/// Condition codes used by `cset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    Eq = 0,
    Ne = 1,
}

pub struct Assembler {
    code: Vec<u8>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self { code: Vec::with_capacity(96) }
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

    #[inline]
    pub fn emit(&mut self, insn: u32) {
        self.code.extend_from_slice(&insn.to_le_bytes());
    }

    /// Words emitted so far, for inspection
    pub fn words(&self) -> Vec<u32> {
        self.code
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect()
    }

    /// `mov xd, xn` (ORR with xzr)
    pub fn mov(&mut self, dst: Reg, src: Reg) {
        self.emit(0xAA0003E0 | (src.0 as u32) << 16 | dst.0 as u32);
    }

    /// `mov wd, wn`, clearing the upper half
    pub fn mov_w(&mut self, dst: Reg, src: Reg) {
        self.emit(0x2A0003E0 | (src.0 as u32) << 16 | dst.0 as u32);
    }

    fn bitfield(&mut self, base: u32, dst: Reg, src: Reg) {
        self.emit(base | (src.0 as u32) << 5 | dst.0 as u32);
    }

    pub fn sxtb(&mut self, dst: Reg, src: Reg) {
        self.bitfield(0x93401C00, dst, src);
    }

    pub fn sxth(&mut self, dst: Reg, src: Reg) {
        self.bitfield(0x93403C00, dst, src);
    }

    pub fn sxtw(&mut self, dst: Reg, src: Reg) {
        self.bitfield(0x93407C00, dst, src);
    }

    pub fn uxtb(&mut self, dst: Reg, src: Reg) {
        self.bitfield(0x53001C00, dst, src);
    }

    pub fn uxth(&mut self, dst: Reg, src: Reg) {
        self.bitfield(0x53003C00, dst, src);
    }

    /// `uxtw` is spelled as a 32-bit register move
    pub fn uxtw(&mut self, dst: Reg, src: Reg) {
        self.mov_w(dst, src);
    }

    pub fn movz(&mut self, dst: Reg, imm: u16, shift: u8) {
        self.emit(0xD2800000 | ((shift / 16) as u32) << 21 | (imm as u32) << 5 | dst.0 as u32);
    }

    pub fn movk(&mut self, dst: Reg, imm: u16, shift: u8) {
        self.emit(0xF2800000 | ((shift / 16) as u32) << 21 | (imm as u32) << 5 | dst.0 as u32);
    }

    /// Fixed four-instruction 64-bit immediate load
    pub fn mov_imm64(&mut self, dst: Reg, value: u64) {
        self.movz(dst, value as u16, 0);
        self.movk(dst, (value >> 16) as u16, 16);
        self.movk(dst, (value >> 32) as u16, 32);
        self.movk(dst, (value >> 48) as u16, 48);
    }

    pub fn blr(&mut self, target: Reg) {
        self.emit(0xD63F0000 | (target.0 as u32) << 5);
    }

    pub fn br(&mut self, target: Reg) {
        self.emit(0xD61F0000 | (target.0 as u32) << 5);
    }

    pub fn ret(&mut self) {
        self.emit(0xD65F03C0);
    }

    /// `stp rt, rt2, [rn, #offset]!`
    pub fn stp_pre(&mut self, rt: Reg, rt2: Reg, base: Reg, offset: i16) {
        let imm7 = ((offset / 8) as u32) & 0x7F;
        self.emit(0xA9800000 | imm7 << 15 | (rt2.0 as u32) << 10 | (base.0 as u32) << 5 | rt.0 as u32);
    }

    /// `ldp rt, rt2, [rn], #offset`
    pub fn ldp_post(&mut self, rt: Reg, rt2: Reg, base: Reg, offset: i16) {
        let imm7 = ((offset / 8) as u32) & 0x7F;
        self.emit(0xA8C00000 | imm7 << 15 | (rt2.0 as u32) << 10 | (base.0 as u32) << 5 | rt.0 as u32);
    }

    /// `add xd, xn, #imm`; `mov x29, sp` is the zero-immediate form
    pub fn add_imm(&mut self, dst: Reg, src: Reg, imm: u16) {
        self.emit(0x91000000 | ((imm as u32) & 0xFFF) << 10 | (src.0 as u32) << 5 | dst.0 as u32);
    }

    fn mem(&mut self, opcode: u32, access: Access, rt: u8, base: Reg, offset: u16) {
        let scale = access.scale();
        debug_assert_eq!(offset as u32 % scale, 0, "unaligned unsigned offset");
        let imm12 = (offset as u32 / scale) & 0xFFF;
        self.emit(opcode | imm12 << 10 | (base.0 as u32) << 5 | rt as u32);
    }

    /// Integer store of the low `access` bytes of `rt`
    pub fn str(&mut self, rt: Reg, base: Reg, offset: u16, access: Access) {
        let opcode = match access {
            Access::Byte => 0x39000000,
            Access::Half => 0x79000000,
            Access::Word => 0xB9000000,
            _ => 0xF9000000,
        };
        self.mem(opcode, access, rt.0, base, offset);
    }

    /// Zero-extending integer load
    pub fn ldr(&mut self, rt: Reg, base: Reg, offset: u16, access: Access) {
        let opcode = match access {
            Access::Byte => 0x39400000,
            Access::Half => 0x79400000,
            Access::Word => 0xB9400000,
            _ => 0xF9400000,
        };
        self.mem(opcode, access, rt.0, base, offset);
    }

    /// Sign-extending load into a 64-bit register
    pub fn ldrs(&mut self, rt: Reg, base: Reg, offset: u16, access: Access) {
        let opcode = match access {
            Access::Byte => 0x39800000,
            Access::Half => 0x79800000,
            Access::Word => 0xB9800000,
            _ => 0xF9400000,
        };
        self.mem(opcode, access, rt.0, base, offset);
    }

    pub fn str_fp(&mut self, rt: VReg, base: Reg, offset: u16, access: Access) {
        let (opcode, access) = match access {
            Access::Single => (0xBD000000, Access::Single),
            _ => (0xFD000000, Access::FloatDouble),
        };
        self.mem(opcode, access, rt.0, base, offset);
    }

    pub fn ldr_fp(&mut self, rt: VReg, base: Reg, offset: u16, access: Access) {
        let (opcode, access) = match access {
            Access::Single => (0xBD400000, Access::Single),
            _ => (0xFD400000, Access::FloatDouble),
        };
        self.mem(opcode, access, rt.0, base, offset);
    }

    /// `cmp xn, #0` or `cmp wn, #0`
    pub fn cmp_zero(&mut self, src: Reg, wide: bool) {
        let base = if wide { 0xF100001F } else { 0x7100001F };
        self.emit(base | (src.0 as u32) << 5);
    }

    /// `cset wd, cond`
    pub fn cset(&mut self, dst: Reg, cond: Cond) {
        // csinc wd, wzr, wzr, !cond
        let inverted = (cond as u32) ^ 1;
        self.emit(0x1A9F07E0 | inverted << 12 | dst.0 as u32);
    }
}
