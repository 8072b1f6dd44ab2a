//! Instruction table and decoder for the Sharp LR35902 instruction set.
//!
//! The table describes every opcode as a template: mnemonic, zero to two
//! operand kinds, a shift amount for bit fields packed into the opcode byte,
//! and a tagged operation kind consumed by the CPU interpreter. Decoding is a
//! pure function from bytes to a decoded record; it has no side effects and
//! does not touch CPU or memory state.

use std::fmt::Write as _;

/// Bytes the Game Boy instruction set leaves unassigned.
pub const UNASSIGNED_OPCODES: [u8; 11] = [
    0xd3, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd,
];

/// The shape of an operand as it appears in an instruction template.
///
/// Operands packed into the opcode byte (`R16`, `R16Stack`, `R16Mem`, `R8`,
/// `Cond`, `Tgt3`, `BitIndex`, `R8Dst`) are read out using the template's
/// `shift` field; `BitIndex` and `R8Dst` are always read at `shift + 3`
/// since they co-occupy a byte with another 3-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    A,
    Sp,
    Hl,
    CMem,
    SpPlusImm8,
    R16,
    R16Stack,
    R16Mem,
    R8,
    Cond,
    Tgt3,
    BitIndex,
    R8Dst,
    Imm8,
    Imm8Offset,
    Imm8Mem,
    Imm16,
    Imm16Mem,
}

impl Operand {
    /// Bytes following the opcode (plus CB-prefix byte, if any) consumed by
    /// this operand.
    const fn size(self) -> usize {
        match self {
            Operand::SpPlusImm8 | Operand::Imm8 | Operand::Imm8Offset | Operand::Imm8Mem => 1,
            Operand::Imm16 | Operand::Imm16Mem => 2,
            _ => 0,
        }
    }

    /// Number of opcode bits this operand occupies, used to build the
    /// decode mask.
    const fn op_code_bits(self) -> u32 {
        match self {
            Operand::R16 | Operand::R16Stack | Operand::R16Mem | Operand::Cond => 2,
            Operand::R8 | Operand::Tgt3 | Operand::BitIndex | Operand::R8Dst => 3,
            _ => 0,
        }
    }
}

/// The tagged operation a decoded instruction executes. The CPU's
/// interpreter dispatches on this tag with a single `match`; every variant
/// here corresponds to exactly one micro-cycle state machine in
/// [`crate::cpu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    LdR16Imm16,
    LdR16MemA,
    LdAR16Mem,
    LdImm16MemSp,
    IncR16,
    DecR16,
    AddHlR16,
    IncR8,
    DecR8,
    LdR8Imm8,
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    JrImm8,
    JrCondImm8,
    Stop,
    LdR8R8,
    Halt,
    AddAR8,
    AdcAR8,
    SubAR8,
    SbcAR8,
    AndAR8,
    XorAR8,
    OrAR8,
    CpAR8,
    AddAImm8,
    AdcAImm8,
    SubAImm8,
    SbcAImm8,
    AndAImm8,
    XorAImm8,
    OrAImm8,
    CpAImm8,
    RetCond,
    Ret,
    Reti,
    JpCondImm16,
    JpImm16,
    JpHl,
    CallCondImm16,
    CallImm16,
    RstTgt3,
    PopR16,
    PushR16,
    LdhCMemA,
    LdhImm8MemA,
    LdImm16MemA,
    LdhACMem,
    LdhAImm8Mem,
    LdAImm16Mem,
    AddSpImm8,
    LdHlSpPlusImm8,
    LdSpHl,
    Di,
    Ei,
    RlcR8,
    RrcR8,
    RlR8,
    RrR8,
    SlaR8,
    SraR8,
    SwapR8,
    SrlR8,
    BitB3R8,
    ResB3R8,
    SetB3R8,
    Unknown,
}

/// A single entry in an instruction bank: mnemonic text plus enough
/// structure to both decode and disassemble the opcode.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub mnemonic: &'static str,
    pub op_code: u8,
    pub operand1: Operand,
    pub operand2: Operand,
    pub shift: u8,
    pub op: Op,
}

const fn t(
    mnemonic: &'static str,
    op_code: u8,
    operand1: Operand,
    operand2: Operand,
    shift: u8,
    op: Op,
) -> Template {
    Template {
        mnemonic,
        op_code,
        operand1,
        operand2,
        shift,
        op,
    }
}

/// The primary (unprefixed) instruction bank, in first-match order.
pub static PRIMARY: &[Template] = &[
    t("NOP", 0x00, Operand::None, Operand::None, 0, Op::Nop),
    t(
        "LD",
        0x01,
        Operand::R16,
        Operand::Imm16,
        4,
        Op::LdR16Imm16,
    ),
    t("LD", 0x02, Operand::R16Mem, Operand::A, 4, Op::LdR16MemA),
    t("LD", 0x0a, Operand::A, Operand::R16Mem, 4, Op::LdAR16Mem),
    t(
        "LD",
        0x08,
        Operand::Imm16Mem,
        Operand::Sp,
        0,
        Op::LdImm16MemSp,
    ),
    t("INC", 0x03, Operand::R16, Operand::None, 4, Op::IncR16),
    t("DEC", 0x0b, Operand::R16, Operand::None, 4, Op::DecR16),
    t("ADD", 0x09, Operand::Hl, Operand::R16, 4, Op::AddHlR16),
    t("INC", 0x04, Operand::R8, Operand::None, 3, Op::IncR8),
    t("DEC", 0x05, Operand::R8, Operand::None, 3, Op::DecR8),
    t("LD", 0x06, Operand::R8, Operand::Imm8, 3, Op::LdR8Imm8),
    t("RLCA", 0x07, Operand::None, Operand::None, 0, Op::Rlca),
    t("RRCA", 0x0f, Operand::None, Operand::None, 0, Op::Rrca),
    t("RLA", 0x17, Operand::None, Operand::None, 0, Op::Rla),
    t("RRA", 0x1f, Operand::None, Operand::None, 0, Op::Rra),
    t("DAA", 0x27, Operand::None, Operand::None, 0, Op::Daa),
    t("CPL", 0x2f, Operand::None, Operand::None, 0, Op::Cpl),
    t("SCF", 0x37, Operand::None, Operand::None, 0, Op::Scf),
    t("CCF", 0x3f, Operand::None, Operand::None, 0, Op::Ccf),
    t(
        "JR",
        0x18,
        Operand::Imm8Offset,
        Operand::None,
        0,
        Op::JrImm8,
    ),
    t(
        "JR",
        0x20,
        Operand::Cond,
        Operand::Imm8Offset,
        3,
        Op::JrCondImm8,
    ),
    t("STOP", 0x10, Operand::Imm8, Operand::None, 0, Op::Stop),
    // HALT (0x76) sits inside the LD r8,r8 block (0x40-0x7F) but is an exact
    // match, so it must be checked first or the mask match below shadows it.
    t("HALT", 0x76, Operand::None, Operand::None, 0, Op::Halt),
    t("LD", 0x40, Operand::R8Dst, Operand::R8, 0, Op::LdR8R8),
    t("ADD", 0x80, Operand::A, Operand::R8, 0, Op::AddAR8),
    t("ADC", 0x88, Operand::A, Operand::R8, 0, Op::AdcAR8),
    t("SUB", 0x90, Operand::A, Operand::R8, 0, Op::SubAR8),
    t("SBC", 0x98, Operand::A, Operand::R8, 0, Op::SbcAR8),
    t("AND", 0xa0, Operand::A, Operand::R8, 0, Op::AndAR8),
    t("XOR", 0xa8, Operand::A, Operand::R8, 0, Op::XorAR8),
    t("OR", 0xb0, Operand::A, Operand::R8, 0, Op::OrAR8),
    t("CP", 0xb8, Operand::A, Operand::R8, 0, Op::CpAR8),
    t("ADD", 0xc6, Operand::A, Operand::Imm8, 0, Op::AddAImm8),
    t("ADC", 0xce, Operand::A, Operand::Imm8, 0, Op::AdcAImm8),
    t("SUB", 0xd6, Operand::A, Operand::Imm8, 0, Op::SubAImm8),
    t("SBC", 0xde, Operand::A, Operand::Imm8, 0, Op::SbcAImm8),
    t("AND", 0xe6, Operand::A, Operand::Imm8, 0, Op::AndAImm8),
    t("XOR", 0xee, Operand::A, Operand::Imm8, 0, Op::XorAImm8),
    t("OR", 0xf6, Operand::A, Operand::Imm8, 0, Op::OrAImm8),
    t("CP", 0xfe, Operand::A, Operand::Imm8, 0, Op::CpAImm8),
    t("RET", 0xc0, Operand::Cond, Operand::None, 3, Op::RetCond),
    t("RET", 0xc9, Operand::None, Operand::None, 0, Op::Ret),
    t("RETI", 0xd9, Operand::None, Operand::None, 0, Op::Reti),
    t(
        "JP",
        0xc2,
        Operand::Cond,
        Operand::Imm16,
        3,
        Op::JpCondImm16,
    ),
    t("JP", 0xc3, Operand::Imm16, Operand::None, 0, Op::JpImm16),
    t("JP", 0xe9, Operand::Hl, Operand::None, 0, Op::JpHl),
    t(
        "CALL",
        0xc4,
        Operand::Cond,
        Operand::Imm16,
        3,
        Op::CallCondImm16,
    ),
    t(
        "CALL",
        0xcd,
        Operand::Imm16,
        Operand::None,
        0,
        Op::CallImm16,
    ),
    t("RST", 0xc7, Operand::Tgt3, Operand::None, 3, Op::RstTgt3),
    t(
        "POP",
        0xc1,
        Operand::R16Stack,
        Operand::None,
        4,
        Op::PopR16,
    ),
    t(
        "PUSH",
        0xc5,
        Operand::R16Stack,
        Operand::None,
        4,
        Op::PushR16,
    ),
    t("LDH", 0xe2, Operand::CMem, Operand::A, 0, Op::LdhCMemA),
    t(
        "LDH",
        0xe0,
        Operand::Imm8Mem,
        Operand::A,
        0,
        Op::LdhImm8MemA,
    ),
    t(
        "LD",
        0xea,
        Operand::Imm16Mem,
        Operand::A,
        0,
        Op::LdImm16MemA,
    ),
    t("LDH", 0xf2, Operand::A, Operand::CMem, 0, Op::LdhACMem),
    t(
        "LDH",
        0xf0,
        Operand::A,
        Operand::Imm8Mem,
        0,
        Op::LdhAImm8Mem,
    ),
    t(
        "LD",
        0xfa,
        Operand::A,
        Operand::Imm16Mem,
        0,
        Op::LdAImm16Mem,
    ),
    t("ADD", 0xe8, Operand::Sp, Operand::Imm8, 0, Op::AddSpImm8),
    t(
        "LD",
        0xf8,
        Operand::Hl,
        Operand::SpPlusImm8,
        0,
        Op::LdHlSpPlusImm8,
    ),
    t("LD", 0xf9, Operand::Sp, Operand::Hl, 0, Op::LdSpHl),
    t("DI", 0xf3, Operand::None, Operand::None, 0, Op::Di),
    t("EI", 0xfb, Operand::None, Operand::None, 0, Op::Ei),
];

/// The CB-prefixed instruction bank.
pub static CB: &[Template] = &[
    t("RLC", 0x00, Operand::R8, Operand::None, 0, Op::RlcR8),
    t("RRC", 0x08, Operand::R8, Operand::None, 0, Op::RrcR8),
    t("RL", 0x10, Operand::R8, Operand::None, 0, Op::RlR8),
    t("RR", 0x18, Operand::R8, Operand::None, 0, Op::RrR8),
    t("SLA", 0x20, Operand::R8, Operand::None, 0, Op::SlaR8),
    t("SRA", 0x28, Operand::R8, Operand::None, 0, Op::SraR8),
    t("SWAP", 0x30, Operand::R8, Operand::None, 0, Op::SwapR8),
    t("SRL", 0x38, Operand::R8, Operand::None, 0, Op::SrlR8),
    t(
        "BIT",
        0x40,
        Operand::BitIndex,
        Operand::R8,
        0,
        Op::BitB3R8,
    ),
    t(
        "RES",
        0x80,
        Operand::BitIndex,
        Operand::R8,
        0,
        Op::ResB3R8,
    ),
    t(
        "SET",
        0xb0,
        Operand::BitIndex,
        Operand::R8,
        0,
        Op::SetB3R8,
    ),
];

/// Computes the mask that zeroes the operand bits packed into a template's
/// opcode byte, so `(byte & mask) == template.op_code` tests a match.
fn op_code_mask(tmpl: &Template) -> u8 {
    let bits = tmpl.operand1.op_code_bits() + tmpl.operand2.op_code_bits();
    match bits {
        0 => 0xff,
        2 => !(0x3 << tmpl.shift),
        3 => !(0x7 << tmpl.shift),
        6 => !(0x3f << tmpl.shift),
        other => unreachable!("impossible operand bit count: {other}"),
    }
}

/// Finds the first template in `bank` whose masked opcode matches `op_code`.
pub fn find(bank: &'static [Template], op_code: u8) -> Option<&'static Template> {
    bank.iter()
        .find(|tmpl| (op_code & op_code_mask(tmpl)) == tmpl.op_code)
}

/// A fully decoded instruction: the matched template, whether it was
/// CB-prefixed, and its total size in bytes (including the opcode and any
/// prefix byte).
#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    pub template: &'static Template,
    pub cb: bool,
    pub size: usize,
}

pub const CB_PREFIX: u8 = 0xcb;

/// Decodes the instruction at the start of `bytes`.
///
/// Returns an `UNKNOWN` record (a synthetic one-operand-less template with
/// `Op::Unknown`) if the first byte is unassigned, or if `bytes` is too
/// short to contain the full instruction including its immediates. In the
/// latter case `size` is the number of bytes actually available (zero if
/// even the opcode itself is missing, one otherwise).
pub fn decode(bytes: &[u8]) -> Decoded {
    if bytes.is_empty() {
        return Decoded {
            template: &UNKNOWN,
            cb: false,
            size: 0,
        };
    }
    if bytes[0] == CB_PREFIX {
        if bytes.len() < 2 {
            return Decoded {
                template: &UNKNOWN,
                cb: true,
                size: 1,
            };
        }
        let template = find(CB, bytes[1]).unwrap_or(&UNKNOWN);
        return Decoded {
            template,
            cb: true,
            size: 2,
        };
    }
    let template = match find(PRIMARY, bytes[0]) {
        Some(template) => template,
        None => {
            return Decoded {
                template: &UNKNOWN,
                cb: false,
                size: 1,
            }
        }
    };
    let size = 1 + template.operand1.size() + template.operand2.size();
    if bytes.len() < size {
        return Decoded {
            template,
            cb: false,
            size: bytes.len(),
        };
    }
    Decoded {
        template,
        cb: false,
        size,
    }
}

static UNKNOWN: Template = t(
    "UNKNOWN",
    0x00,
    Operand::None,
    Operand::None,
    0,
    Op::Unknown,
);

const R8_NAMES: [&str; 8] = ["B", "C", "D", "E", "H", "L", "[HL]", "A"];
const R16_NAMES: [&str; 4] = ["BC", "DE", "HL", "SP"];
const R16STK_NAMES: [&str; 4] = ["BC", "DE", "HL", "AF"];
const R16MEM_NAMES: [&str; 4] = ["BC", "DE", "HL+", "HL-"];
const COND_NAMES: [&str; 4] = ["NZ", "Z", "NC", "C"];

fn field(byte: u8, shift: u8, width: u8) -> u8 {
    (byte >> shift) & ((1u16 << width) - 1) as u8
}

/// Renders one operand into `out`, given the bytes of the instruction
/// starting at its opcode (or CB byte, for CB instructions) and the offset
/// within `bytes` at which this operand's own bytes (if any) begin.
fn write_operand(
    out: &mut String,
    operand: Operand,
    shift: u8,
    opcode_byte: u8,
    bytes: &[u8],
    operand_offset: usize,
    addr: u16,
) {
    match operand {
        Operand::None => {}
        Operand::A => out.push('A'),
        Operand::Sp => out.push_str("SP"),
        Operand::Hl => out.push_str("HL"),
        Operand::CMem => out.push_str("[C]"),
        Operand::SpPlusImm8 => {
            let imm = bytes[operand_offset] as i8;
            let _ = write!(out, "SP+{imm}");
        }
        Operand::R16 => out.push_str(R16_NAMES[field(opcode_byte, shift, 2) as usize]),
        Operand::R16Stack => out.push_str(R16STK_NAMES[field(opcode_byte, shift, 2) as usize]),
        Operand::R16Mem => {
            let _ = write!(
                out,
                "[{}]",
                R16MEM_NAMES[field(opcode_byte, shift, 2) as usize]
            );
        }
        Operand::R8 => out.push_str(R8_NAMES[field(opcode_byte, shift, 3) as usize]),
        Operand::Cond => out.push_str(COND_NAMES[field(opcode_byte, shift, 2) as usize]),
        Operand::Tgt3 => {
            let _ = write!(out, "{}", field(opcode_byte, shift, 3));
        }
        Operand::BitIndex => {
            let _ = write!(out, "{}", field(opcode_byte, shift + 3, 3));
        }
        Operand::R8Dst => out.push_str(R8_NAMES[field(opcode_byte, shift + 3, 3) as usize]),
        Operand::Imm8 => {
            let imm = bytes[operand_offset];
            let _ = write!(out, "{imm} (${imm:02x})");
        }
        Operand::Imm8Offset => {
            let offset = bytes[operand_offset] as i8;
            let target = addr.wrapping_add(1).wrapping_add(offset as u16);
            let _ = write!(out, "{offset:+} (${target:04x})");
        }
        Operand::Imm8Mem => {
            let imm = bytes[operand_offset];
            let _ = write!(out, "[FF{imm:02x}]");
        }
        Operand::Imm16 => {
            let imm = u16::from_le_bytes([bytes[operand_offset], bytes[operand_offset + 1]]);
            let _ = write!(out, "{imm} (${imm:04x})");
        }
        Operand::Imm16Mem => {
            let imm = u16::from_le_bytes([bytes[operand_offset], bytes[operand_offset + 1]]);
            let _ = write!(out, "[${imm:04x}]");
        }
    }
}

/// Formats a decoded instruction the way the disassembler prints it:
/// `MNEMONIC op1, op2` with no prefix byte shown for CB instructions.
pub fn format_instruction(decoded: &Decoded, bytes: &[u8], addr: u16) -> String {
    let tmpl = decoded.template;
    let opcode_byte = if decoded.cb { bytes[1] } else { bytes[0] };
    let operand_base = if decoded.cb { 2 } else { 1 };
    let mut out = String::from(tmpl.mnemonic);
    if tmpl.operand1 == Operand::None && tmpl.operand2 == Operand::None {
        return out;
    }
    out.push(' ');
    write_operand(
        &mut out,
        tmpl.operand1,
        tmpl.shift,
        opcode_byte,
        bytes,
        operand_base,
        addr,
    );
    if tmpl.operand2 != Operand::None {
        out.push_str(", ");
        let operand2_offset = operand_base + tmpl.operand1.size();
        write_operand(
            &mut out,
            tmpl.operand2,
            tmpl.shift,
            opcode_byte,
            bytes,
            operand2_offset,
            addr,
        );
    }
    out
}

/// Produces one disassembler line: `AAAA: bb bb bb   \t MNEMONIC op1, op2`.
pub fn disassemble_line(bytes: &[u8], addr: u16) -> String {
    let decoded = decode(bytes);
    let raw = &bytes[..decoded.size.min(bytes.len())];
    let mut hex = String::new();
    for b in raw {
        let _ = write!(hex, "{b:02x} ");
    }
    let mnemonic = if decoded.template.op == Op::Unknown {
        "UNKNOWN".to_string()
    } else {
        format_instruction(&decoded, bytes, addr)
    };
    format!("{addr:04x}: {hex:<9}\t{mnemonic}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_decodes_to_single_byte() {
        let decoded = decode(&[0x00]);
        assert_eq!(decoded.template.op, Op::Nop);
        assert_eq!(decoded.size, 1);
        assert!(!decoded.cb);
    }

    #[test]
    fn ld_bc_imm16_decodes_with_three_bytes() {
        let decoded = decode(&[0x01, 0x01, 0x02]);
        assert_eq!(decoded.template.op, Op::LdR16Imm16);
        assert_eq!(decoded.size, 3);
        assert_eq!(format_instruction(&decoded, &[0x01, 0x01, 0x02], 0), "LD BC, 513 ($0201)");
    }

    #[test]
    fn unassigned_opcodes_decode_to_unknown() {
        for op_code in UNASSIGNED_OPCODES {
            let decoded = decode(&[op_code]);
            assert_eq!(decoded.template.op, Op::Unknown);
            assert_eq!(decoded.size, 1);
        }
    }

    #[test]
    fn cb_prefix_is_not_shown_in_mnemonic() {
        let decoded = decode(&[0xcb, 0x7c]);
        assert!(decoded.cb);
        assert_eq!(decoded.size, 2);
        assert_eq!(format_instruction(&decoded, &[0xcb, 0x7c], 0), "BIT 7, H");
    }

    #[test]
    fn truncated_instruction_reports_available_bytes() {
        let decoded = decode(&[0x01, 0x01]);
        assert_eq!(decoded.size, 2);
    }

    #[test]
    fn jr_offset_formats_as_absolute_target() {
        let decoded = decode(&[0x20, 0xfc]);
        assert_eq!(
            format_instruction(&decoded, &[0x20, 0xfc], 0x026e),
            "JR NZ, -4 ($026c)"
        );
    }

    #[test]
    fn opcode_0x76_decodes_to_halt_not_ld_r8_r8() {
        let decoded = decode(&[0x76]);
        assert_eq!(decoded.template.op, Op::Halt);
    }

    #[test]
    fn ld_r8_r8_dispatches_through_shared_template() {
        let decoded = decode(&[0x78]); // LD A, B
        assert_eq!(decoded.template.op, Op::LdR8R8);
        assert_eq!(format_instruction(&decoded, &[0x78], 0), "LD A, B");
    }

    #[test]
    fn every_primary_template_has_a_consistent_mask() {
        for tmpl in PRIMARY {
            let mask = op_code_mask(tmpl);
            assert_eq!(tmpl.op_code & mask, tmpl.op_code);
        }
    }
}
