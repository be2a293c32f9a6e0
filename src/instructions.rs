use std::fmt;

pub type RegisterType = u16;
pub type WordType = u64;

pub const MAX_SOURCE_COUNT: u8 = 2;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Opcode {
    LI,
    ADD,
    SUB,
    BEQ,
    BNE,
    HALT,
}

/// A single instruction of the demo ISA. The ISA is intentionally tiny:
/// just enough arithmetic and conditional branching to drive renaming,
/// speculation and recovery. The `predicted_taken` field is the static
/// prediction the fetch stage follows; the actual direction comes out of
/// the register values at execution time.
#[derive(Clone, Copy, Debug)]
pub struct Instr {
    pub opcode: Opcode,
    pub dest: Option<RegisterType>,
    pub source: [RegisterType; MAX_SOURCE_COUNT as usize],
    pub source_cnt: u8,
    pub immediate: WordType,
    pub branch_target: usize,
    pub predicted_taken: bool,
}

impl Instr {
    pub fn li(dest: RegisterType, immediate: WordType) -> Instr {
        Instr {
            opcode: Opcode::LI,
            dest: Some(dest),
            source: [0, 0],
            source_cnt: 0,
            immediate,
            branch_target: 0,
            predicted_taken: false,
        }
    }

    pub fn add(dest: RegisterType, src1: RegisterType, src2: RegisterType) -> Instr {
        Instr {
            opcode: Opcode::ADD,
            dest: Some(dest),
            source: [src1, src2],
            source_cnt: 2,
            immediate: 0,
            branch_target: 0,
            predicted_taken: false,
        }
    }

    pub fn sub(dest: RegisterType, src1: RegisterType, src2: RegisterType) -> Instr {
        Instr {
            opcode: Opcode::SUB,
            dest: Some(dest),
            source: [src1, src2],
            source_cnt: 2,
            immediate: 0,
            branch_target: 0,
            predicted_taken: false,
        }
    }

    pub fn beq(src1: RegisterType, src2: RegisterType, target: usize, predicted_taken: bool) -> Instr {
        Instr {
            opcode: Opcode::BEQ,
            dest: None,
            source: [src1, src2],
            source_cnt: 2,
            immediate: 0,
            branch_target: target,
            predicted_taken,
        }
    }

    pub fn bne(src1: RegisterType, src2: RegisterType, target: usize, predicted_taken: bool) -> Instr {
        Instr {
            opcode: Opcode::BNE,
            dest: None,
            source: [src1, src2],
            source_cnt: 2,
            immediate: 0,
            branch_target: target,
            predicted_taken,
        }
    }

    pub fn halt() -> Instr {
        Instr {
            opcode: Opcode::HALT,
            dest: None,
            source: [0, 0],
            source_cnt: 0,
            immediate: 0,
            branch_target: 0,
            predicted_taken: false,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.opcode, Opcode::BEQ | Opcode::BNE)
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Opcode::LI => write!(f, "LI r{}, #{}", self.dest.unwrap_or(0), self.immediate),
            Opcode::ADD => write!(f, "ADD r{}, r{}, r{}", self.dest.unwrap_or(0), self.source[0], self.source[1]),
            Opcode::SUB => write!(f, "SUB r{}, r{}, r{}", self.dest.unwrap_or(0), self.source[0], self.source[1]),
            Opcode::BEQ => write!(f, "BEQ r{}, r{}, @{}", self.source[0], self.source[1], self.branch_target),
            Opcode::BNE => write!(f, "BNE r{}, r{}, @{}", self.source[0], self.source[1], self.branch_target),
            Opcode::HALT => write!(f, "HALT"),
        }
    }
}

pub struct Program {
    pub instructions: Vec<Instr>,
}

impl Program {
    pub fn new(instructions: Vec<Instr>) -> Program {
        Program { instructions }
    }

    pub fn get(&self, pc: usize) -> &Instr {
        &self.instructions[pc]
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Counts r1 from 0 up to `iterations`. The top-of-loop exit test is
    /// predicted not-taken, so the loop exit is a single misprediction and
    /// exercises one checkpoint rollback. The loop-back branch compares a
    /// register against itself and never mispredicts.
    pub fn counting_loop(iterations: WordType) -> Program {
        Program::new(vec![
            Instr::li(1, 0),            // 0: acc
            Instr::li(2, iterations),   // 1: limit
            Instr::li(3, 1),            // 2: step
            Instr::li(4, 0),            // 3: zero
            Instr::sub(5, 2, 1),        // 4: remaining = limit - acc
            Instr::beq(5, 4, 8, false), // 5: exit when nothing remains
            Instr::add(1, 1, 3),        // 6: acc += step
            Instr::beq(4, 4, 4, true),  // 7: loop back, always taken
            Instr::halt(),              // 8
        ])
    }

    /// Same count as `counting_loop`, but with an extra branch whose
    /// direction alternates every iteration against a static taken
    /// prediction. Its target is its own fall-through, so the architectural
    /// result is unaffected while every other iteration pays a rollback.
    pub fn ping_pong(iterations: WordType) -> Program {
        Program::new(vec![
            Instr::li(1, 0),             // 0: acc
            Instr::li(2, iterations),    // 1: limit
            Instr::li(3, 1),             // 2: one
            Instr::li(4, 0),             // 3: zero
            Instr::li(6, 0),             // 4: toggle
            Instr::sub(5, 2, 1),         // 5: remaining = limit - acc
            Instr::beq(5, 4, 11, false), // 6: exit when nothing remains
            Instr::sub(6, 3, 6),         // 7: toggle = 1 - toggle
            Instr::beq(6, 4, 9, true),   // 8: alternating direction, fall-through target
            Instr::add(1, 1, 3),         // 9: acc += one
            Instr::beq(4, 4, 5, true),   // 10: loop back, always taken
            Instr::halt(),               // 11
        ])
    }
}
