use std::error::Error;
use std::fs::File;
use std::rc::Rc;

use serde::Deserialize;

use crate::backend::renamer::{Dest, InstrClass, Renamer};
use crate::instructions::{Opcode, Program, RegisterType, WordType};

pub struct PerfCounters {
    pub dispatch_cnt: u64,
    pub execute_cnt: u64,
    pub retire_cnt: u64,
    pub mispredict_cnt: u64,
    pub cycle_cnt: u64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            dispatch_cnt: 0,
            execute_cnt: 0,
            retire_cnt: 0,
            mispredict_cnt: 0,
            cycle_cnt: 0,
        }
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Trace {
    pub dispatch: bool,
    pub execute: bool,
    pub retire: bool,
    pub recovery: bool,
    pub cycle: bool,
}

#[derive(Clone, Deserialize, Debug)]
pub struct CPUConfig {
    // the number of architecturally visible registers
    pub arch_reg_count: u16,
    // the size of the physical register file
    pub phys_reg_count: u16,
    // the maximum number of simultaneously unresolved branches (at most 64)
    pub branch_limit: u16,
    // the number of instructions renamed/dispatched per clock cycle
    pub dispatch_n_wide: u8,
    // the number of instructions retired per clock cycle
    pub retire_n_wide: u8,
    // if processing of a single instruction should be traced (printed)
    pub trace: Trace,
}

pub fn load_cpu_config(file_path: &str) -> Result<CPUConfig, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let config = serde_yaml::from_reader(file)?;
    Ok(config)
}

struct PendingBranch {
    branch_id: u16,
    target: usize,
    predicted_taken: bool,
}

// an instruction dispatched last cycle, waiting for its (single cycle) execution
struct ExecSlot {
    al_index: u16,
    opcode: Opcode,
    source: [RegisterType; 2],
    dest: Option<RegisterType>,
    immediate: WordType,
    branch: Option<PendingBranch>,
    pc: usize,
}

/// Minimal cycle-driven pipeline around the renamer. Fetch follows the
/// static predictions embedded in the program; execution is single cycle
/// and happens in dispatch order, so by the time an instruction executes
/// all of its correct-path producers have written their values. Stages run
/// in reverse pipeline order within a cycle.
pub struct CPU {
    renamer: Renamer,
    in_flight: Vec<ExecSlot>,
    fetch_pc: usize,
    dispatch_n_wide: u8,
    retire_n_wide: u8,
    trace: Trace,
    perf_counters: PerfCounters,
    exit: bool,
}

impl CPU {
    pub fn new(cpu_config: &CPUConfig) -> CPU {
        CPU {
            renamer: Renamer::new(
                cpu_config.arch_reg_count,
                cpu_config.phys_reg_count,
                cpu_config.branch_limit,
            ),
            in_flight: Vec::new(),
            fetch_pc: 0,
            dispatch_n_wide: cpu_config.dispatch_n_wide,
            retire_n_wide: cpu_config.retire_n_wide,
            trace: cpu_config.trace.clone(),
            perf_counters: PerfCounters::new(),
            exit: false,
        }
    }

    pub fn run(&mut self, program: &Rc<Program>) {
        let program = Rc::clone(program);
        self.fetch_pc = 0;
        self.exit = false;

        while !self.exit {
            self.perf_counters.cycle_cnt += 1;

            if self.trace.cycle {
                let perf_counters = &self.perf_counters;
                println!(
                    "[Cycles:{}][Dispatched={}][Executed={}][Retired={}][Mispredicted={}][IPC={:.2}]",
                    perf_counters.cycle_cnt,
                    perf_counters.dispatch_cnt,
                    perf_counters.execute_cnt,
                    perf_counters.retire_cnt,
                    perf_counters.mispredict_cnt,
                    perf_counters.retire_cnt as f32 / perf_counters.cycle_cnt as f32
                );
            }

            self.cycle_retire(&program);
            self.cycle_execute(&program);
            self.cycle_dispatch(&program);
        }

        println!(
            "Program complete! cycles={} retired={} mispredicts={} IPC={:.2}",
            self.perf_counters.cycle_cnt,
            self.perf_counters.retire_cnt,
            self.perf_counters.mispredict_cnt,
            self.perf_counters.retire_cnt as f32 / self.perf_counters.cycle_cnt as f32
        );
    }

    pub fn perf_counters(&self) -> &PerfCounters {
        &self.perf_counters
    }

    /// The committed value of an architectural register. Meaningful once
    /// the pipeline has drained.
    pub fn arch_reg_value(&self, arch_reg: RegisterType) -> WordType {
        self.renamer.read(self.renamer.rename_source(arch_reg))
    }

    fn cycle_retire(&mut self, program: &Program) {
        for _ in 0..self.retire_n_wide {
            let entry = match self.renamer.precommit() {
                Some(entry) => entry,
                None => break,
            };
            if !entry.completed {
                break;
            }

            if entry.exception || entry.load_violation {
                // the demo ISA raises neither, but the driver still honors
                // the contract: the head must not commit, everything
                // speculative goes, and fetch restarts at the excepting pc
                self.renamer.squash();
                self.in_flight.clear();
                self.fetch_pc = entry.pc as usize;
                if self.trace.recovery {
                    println!("Squash at pc {}", entry.pc);
                }
                break;
            }

            let pc = entry.pc as usize;
            self.renamer.commit();
            self.perf_counters.retire_cnt += 1;
            if self.trace.retire {
                println!("Retired [{}]", program.get(pc));
            }

            if program.get(pc).opcode == Opcode::HALT {
                self.exit = true;
                break;
            }
        }
    }

    fn cycle_execute(&mut self, program: &Program) {
        let slots = std::mem::take(&mut self.in_flight);

        for slot in &slots {
            let value = match slot.opcode {
                Opcode::LI => slot.immediate,
                Opcode::ADD => self
                    .renamer
                    .read(slot.source[0])
                    .wrapping_add(self.renamer.read(slot.source[1])),
                Opcode::SUB => self
                    .renamer
                    .read(slot.source[0])
                    .wrapping_sub(self.renamer.read(slot.source[1])),
                // condition outcome encoded as the result value
                Opcode::BEQ => {
                    (self.renamer.read(slot.source[0]) == self.renamer.read(slot.source[1])) as WordType
                }
                Opcode::BNE => {
                    (self.renamer.read(slot.source[0]) != self.renamer.read(slot.source[1])) as WordType
                }
                Opcode::HALT => 0,
            };

            if let Some(dest) = slot.dest {
                self.renamer.write(dest, value);
                self.renamer.set_ready(dest);
            }
            self.renamer.set_complete(slot.al_index);
            self.perf_counters.execute_cnt += 1;
            if self.trace.execute {
                println!("Executed [{}]", program.get(slot.pc));
            }

            if let Some(branch) = &slot.branch {
                let taken = value != 0;
                if taken == branch.predicted_taken {
                    self.renamer.resolve(slot.al_index, branch.branch_id, true);
                } else {
                    self.renamer.set_branch_mispredicted(slot.al_index);
                    self.renamer.resolve(slot.al_index, branch.branch_id, false);
                    self.fetch_pc = if taken { branch.target } else { slot.pc + 1 };
                    self.perf_counters.mispredict_cnt += 1;
                    if self.trace.recovery {
                        println!(
                            "Mispredicted [{}], redirect to pc {}",
                            program.get(slot.pc),
                            self.fetch_pc
                        );
                    }
                    // everything younger in this bundle was wrong-path
                    return;
                }
            }
        }
    }

    fn cycle_dispatch(&mut self, program: &Program) {
        for _ in 0..self.dispatch_n_wide {
            let pc = self.fetch_pc;
            if pc >= program.len() {
                break;
            }
            let instr = *program.get(pc);

            if self.renamer.stall_for_dispatch(1) {
                break;
            }
            if instr.dest.is_some() && self.renamer.stall_for_registers(1) {
                break;
            }
            if instr.is_branch() && self.renamer.stall_for_branches(1) {
                break;
            }

            let mut source = [0 as RegisterType; 2];
            for source_index in 0..instr.source_cnt as usize {
                source[source_index] = self.renamer.rename_source(instr.source[source_index]);
            }

            let dest = instr.dest.map(|log_reg| Dest {
                log_reg,
                phys_reg: self.renamer.rename_destination(log_reg),
            });

            let branch = if instr.is_branch() {
                Some(PendingBranch {
                    branch_id: self.renamer.create_checkpoint(),
                    target: instr.branch_target,
                    predicted_taken: instr.predicted_taken,
                })
            } else {
                None
            };

            let class = InstrClass {
                is_branch: instr.is_branch(),
                ..InstrClass::default()
            };
            let al_index = self.renamer.dispatch(dest, class, pc as WordType);

            self.in_flight.push(ExecSlot {
                al_index,
                opcode: instr.opcode,
                source,
                dest: dest.map(|dest| dest.phys_reg),
                immediate: instr.immediate,
                branch,
                pc,
            });
            self.perf_counters.dispatch_cnt += 1;
            if self.trace.dispatch {
                println!("Dispatched [{}]", instr);
            }

            // fetch follows the prediction
            self.fetch_pc = if instr.is_branch() && instr.predicted_taken {
                instr.branch_target
            } else {
                pc + 1
            };
        }
    }
}
