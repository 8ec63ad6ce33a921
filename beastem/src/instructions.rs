//! Z80 flow-control opcode classification for the debugger (§4.11): call
//! depth tracking for step-over/step-out is the caller's concern (it lives
//! in the run-mode state machine, since it needs to persist across many
//! instructions); this module only answers, for a given two-byte opcode
//! prefix, whether it calls, jumps, or returns, and whether it takes its
//! branch.

use crate::memory::MemoryMap;

/// `direction`: 1 = call (pushes a return address), 0 = unconditional/jump,
/// -1 = return (pops a return address).
pub struct FlowOpcode {
    pub prefix: u8,
    pub opcode: u8,
    pub mask: u8,
    pub flags: u8,
    pub direction: i8,
}

pub const FLOW_OPCODES: [FlowOpcode; 37] = [
    FlowOpcode { prefix: 0x00, opcode: 0xCD, mask: 0, flags: 0, direction: 1 }, // CALL
    FlowOpcode { prefix: 0x00, opcode: 0xDC, mask: 0x01, flags: 0x01, direction: 1 }, // CALL C
    FlowOpcode { prefix: 0x00, opcode: 0xD4, mask: 0x01, flags: 0x00, direction: 1 }, // CALL NC
    FlowOpcode { prefix: 0x00, opcode: 0xCC, mask: 0x40, flags: 0x40, direction: 1 }, // CALL Z
    FlowOpcode { prefix: 0x00, opcode: 0xC4, mask: 0x40, flags: 0x00, direction: 1 }, // CALL NZ
    FlowOpcode { prefix: 0x00, opcode: 0xEC, mask: 0x04, flags: 0x04, direction: 1 }, // CALL PE
    FlowOpcode { prefix: 0x00, opcode: 0xE4, mask: 0x04, flags: 0x00, direction: 1 }, // CALL PO
    FlowOpcode { prefix: 0x00, opcode: 0xFC, mask: 0x80, flags: 0x80, direction: 1 }, // CALL M
    FlowOpcode { prefix: 0x00, opcode: 0xF4, mask: 0x80, flags: 0x00, direction: 1 }, // CALL P
    FlowOpcode { prefix: 0x00, opcode: 0xC9, mask: 0, flags: 0, direction: -1 }, // RET
    FlowOpcode { prefix: 0x00, opcode: 0xD8, mask: 0x01, flags: 0x01, direction: -1 }, // RET C
    FlowOpcode { prefix: 0x00, opcode: 0xD0, mask: 0x01, flags: 0x00, direction: -1 }, // RET NC
    FlowOpcode { prefix: 0x00, opcode: 0xC8, mask: 0x40, flags: 0x40, direction: -1 }, // RET Z
    FlowOpcode { prefix: 0x00, opcode: 0xC0, mask: 0x40, flags: 0x00, direction: -1 }, // RET NZ
    FlowOpcode { prefix: 0x00, opcode: 0xE8, mask: 0x04, flags: 0x04, direction: -1 }, // RET PE
    FlowOpcode { prefix: 0x00, opcode: 0xE0, mask: 0x04, flags: 0x00, direction: -1 }, // RET PO
    FlowOpcode { prefix: 0x00, opcode: 0xF8, mask: 0x80, flags: 0x80, direction: -1 }, // RET M
    FlowOpcode { prefix: 0x00, opcode: 0xF0, mask: 0x80, flags: 0x00, direction: -1 }, // RET P
    FlowOpcode { prefix: 0xED, opcode: 0x4D, mask: 0, flags: 0, direction: -1 }, // RETI
    FlowOpcode { prefix: 0xED, opcode: 0x45, mask: 0, flags: 0, direction: -1 }, // RETN
    FlowOpcode { prefix: 0x00, opcode: 0xC3, mask: 0, flags: 0, direction: 0 }, // JP
    FlowOpcode { prefix: 0x00, opcode: 0xDA, mask: 0x01, flags: 0x01, direction: 0 }, // JP C
    FlowOpcode { prefix: 0x00, opcode: 0xD2, mask: 0x01, flags: 0x00, direction: 0 }, // JP NC
    FlowOpcode { prefix: 0x00, opcode: 0xCA, mask: 0x40, flags: 0x40, direction: 0 }, // JP Z
    FlowOpcode { prefix: 0x00, opcode: 0xC2, mask: 0x40, flags: 0x00, direction: 0 }, // JP NZ
    FlowOpcode { prefix: 0x00, opcode: 0xEA, mask: 0x04, flags: 0x04, direction: 0 }, // JP PE
    FlowOpcode { prefix: 0x00, opcode: 0xE2, mask: 0x04, flags: 0x00, direction: 0 }, // JP PO
    FlowOpcode { prefix: 0x00, opcode: 0xFA, mask: 0x80, flags: 0x80, direction: 0 }, // JP M
    FlowOpcode { prefix: 0x00, opcode: 0xF2, mask: 0x80, flags: 0x00, direction: 0 }, // JP P
    FlowOpcode { prefix: 0x00, opcode: 0xE9, mask: 0, flags: 0, direction: 0 }, // JP (HL)
    // Upstream tags both of these `direction: -1` (return-class); that looks
    // like a copy/paste slip from the adjacent RET rows above, since neither
    // instruction touches the stack. Classified as plain jumps here.
    FlowOpcode { prefix: 0xDD, opcode: 0xE9, mask: 0, flags: 0, direction: 0 }, // JP (IX)
    FlowOpcode { prefix: 0xFD, opcode: 0xE9, mask: 0, flags: 0, direction: 0 }, // JP (IY)
    FlowOpcode { prefix: 0x00, opcode: 0x18, mask: 0, flags: 0, direction: 0 }, // JR
    FlowOpcode { prefix: 0x00, opcode: 0x38, mask: 0x01, flags: 0x01, direction: 0 }, // JR C
    FlowOpcode { prefix: 0x00, opcode: 0x30, mask: 0x01, flags: 0x00, direction: 0 }, // JR NC
    FlowOpcode { prefix: 0x00, opcode: 0x28, mask: 0x40, flags: 0x40, direction: 0 }, // JR Z
    FlowOpcode { prefix: 0x00, opcode: 0x20, mask: 0x40, flags: 0x00, direction: 0 }, // JR NZ
];

fn find(op1: u8, op2: u8) -> Option<&'static FlowOpcode> {
    FLOW_OPCODES
        .iter()
        .find(|f| (f.prefix == 0x00 && f.opcode == op1) || (f.prefix != 0 && f.prefix == op1 && f.opcode == op2))
}

/// True for any flow-control opcode that always diverts control: unconditional
/// jumps, calls and returns (excludes conditional branches, whose outcome
/// depends on CPU flags at run time).
pub fn is_jump_or_return(op1: u8, op2: u8) -> bool {
    find(op1, op2).map(|f| f.direction <= 0 && f.mask == 0).unwrap_or(false)
}

pub fn is_conditional(op1: u8, op2: u8) -> bool {
    find(op1, op2).map(|f| f.mask != 0).unwrap_or(false)
}

/// Whether a conditional branch at (op1, op2) would be taken given the
/// Z80 flag register `flags`. Meaningless for non-conditional opcodes.
pub fn is_taken(op1: u8, op2: u8, flags: u8) -> bool {
    find(op1, op2).map(|f| (flags & f.mask) == f.flags).unwrap_or(false)
}

/// The call/jump/return direction of the opcode at (op1, op2), or `None` if
/// it isn't a recognized flow-control instruction.
pub fn flow_direction(op1: u8, op2: u8) -> Option<i8> {
    find(op1, op2).map(|f| f.direction)
}

/// Peeks the two bytes at `pc` and classifies them without disturbing CPU
/// or bus state, for use by the debugger's disassembly and step-over logic.
pub fn classify_at(memory: &MemoryMap, pc: u16) -> Option<i8> {
    let op1 = memory.peek(pc);
    let op2 = memory.peek(pc.wrapping_add(1));
    flow_direction(op1, op2)
}

/// Byte length of the unprefixed opcode `op`, not counting any `CB`/`ED`/
/// `DD`/`FD` prefix byte that may precede it.
fn base_length(op: u8) -> u8 {
    match op {
        0x01 | 0x11 | 0x21 | 0x31 => 3, // LD rr,nn
        0x22 | 0x2A | 0x32 | 0x3A => 3, // LD (nn),HL/HL,(nn)/(nn),A/A,(nn)
        0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => 3, // JP cc,nn
        0xC3 => 3,                                                 // JP nn
        0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => 3, // CALL cc,nn
        0xCD => 3,                                                 // CALL nn
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => 2, // LD r,n
        0x10 => 2,                                                 // DJNZ d
        0x18 => 2,                                                 // JR d
        0x20 | 0x28 | 0x30 | 0x38 => 2,                            // JR cc,d
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => 2, // ALU A,n
        0xD3 | 0xDB => 2,                                          // OUT (n),A / IN A,(n)
        // 0x40-0x7F (LD r,r' and HALT) and 0x80-0xBF (ALU A,r) are 1 byte each.
        _ => 1,
    }
}

/// Total byte length of an `ED`-prefixed instruction, `op` being the byte
/// after the `ED` prefix. Only the 16-bit memory<->register loads extend
/// past the usual two bytes.
fn ed_length(op: u8) -> u8 {
    match op {
        0x43 | 0x4B | 0x53 | 0x5B | 0x63 | 0x6B | 0x73 | 0x7B => 4,
        _ => 2,
    }
}

/// Total instruction length in bytes, given the first two bytes at the
/// program counter. Used by the run-mode state machine to place the
/// synthetic step-over breakpoint at `pc + length`.
pub fn instruction_length(op1: u8, op2: u8) -> u8 {
    match op1 {
        0xCB => 2,
        0xED => ed_length(op2),
        0xDD | 0xFD => {
            if op2 == 0xCB {
                4 // DD/FD CB d op: displacement + bit-op byte follow.
            } else {
                base_length(op2) + 1
            }
        }
        _ => base_length(op1),
    }
}
