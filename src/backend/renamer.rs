use log::{debug, trace};

use crate::backend::active_list::{ActiveList, ActiveListEntry};
use crate::backend::checkpoint::CheckpointStore;
use crate::backend::free_list::FreeList;
use crate::backend::map_table::MapTable;
use crate::backend::physical_register::PhysRegFile;
use crate::instructions::{RegisterType, WordType};

/// Renamed destination operand of a dispatched instruction.
#[derive(Clone, Copy, Debug)]
pub struct Dest {
    pub log_reg: RegisterType,
    pub phys_reg: RegisterType,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InstrClass {
    pub is_load: bool,
    pub is_store: bool,
    pub is_branch: bool,
    pub is_amo: bool,
    pub is_csr: bool,
}

// The parenthesization matters: == binds tighter than & in the naive
// `mask & gbm == 0` spelling.
fn slot_in_use(gbm: u64, branch_id: u16) -> bool {
    (gbm & (1u64 << branch_id)) != 0
}

/// The register renaming and speculative-recovery unit.
///
/// Owns the speculative and architectural map tables (RMT/AMT), the free
/// list, the active list, the checkpoint store, the physical register file
/// and the global branch mask (GBM), and exposes the per-cycle
/// dispatch/writeback/commit/squash protocol to an external pipeline
/// driver. The driver must perform the stall checks before consuming the
/// corresponding resource; the engine aborts on protocol violations rather
/// than trying to recover from them.
pub struct Renamer {
    arch_reg_count: u16,
    phys_reg_count: u16,
    branch_limit: u16,
    rmt: MapTable,
    amt: MapTable,
    free_list: FreeList,
    active_list: ActiveList,
    checkpoints: CheckpointStore,
    prf: PhysRegFile,
    gbm: u64,
}

impl Renamer {
    pub fn new(arch_reg_count: u16, phys_reg_count: u16, branch_limit: u16) -> Renamer {
        assert!(
            phys_reg_count > arch_reg_count,
            "Renamer: phys_reg_count ({}) must exceed arch_reg_count ({})",
            phys_reg_count,
            arch_reg_count
        );
        assert!(
            branch_limit >= 1 && branch_limit <= 64,
            "Renamer: branch_limit ({}) must be in 1..=64",
            branch_limit
        );

        Renamer {
            arch_reg_count,
            phys_reg_count,
            branch_limit,
            rmt: MapTable::new(arch_reg_count),
            amt: MapTable::new(arch_reg_count),
            free_list: FreeList::new(arch_reg_count, phys_reg_count),
            active_list: ActiveList::new(phys_reg_count - arch_reg_count),
            checkpoints: CheckpointStore::new(branch_limit, arch_reg_count),
            prf: PhysRegFile::new(phys_reg_count, arch_reg_count),
            gbm: 0,
        }
    }

    /// True iff fewer than `n` free physical registers remain.
    pub fn stall_for_registers(&self, n: u64) -> bool {
        self.free_list.count_free() < n
    }

    /// True iff fewer than `n` free checkpoint slots remain. A request for
    /// zero branches never stalls.
    pub fn stall_for_branches(&self, n: u64) -> bool {
        let free_slots = self.branch_limit as u64 - self.gbm.count_ones() as u64;
        free_slots < n
    }

    /// True iff fewer than `n` free active list entries remain.
    pub fn stall_for_dispatch(&self, n: u64) -> bool {
        self.active_list.free_entry_count() < n
    }

    pub fn free_register_count(&self) -> u64 {
        self.free_list.count_free()
    }

    pub fn branch_mask(&self) -> u64 {
        self.gbm
    }

    /// Pure RMT lookup.
    pub fn rename_source(&self, log_reg: RegisterType) -> RegisterType {
        self.rmt.get(log_reg)
    }

    /// Allocates a fresh physical register for `log_reg`, clears its ready
    /// bit and updates the RMT. The driver must have checked
    /// `stall_for_registers` first.
    pub fn rename_destination(&mut self, log_reg: RegisterType) -> RegisterType {
        let phys_reg = self.free_list.pop();
        self.prf.clear_ready(phys_reg);
        self.rmt.set(log_reg, phys_reg);
        trace!("rename r{} -> p{}", log_reg, phys_reg);
        phys_reg
    }

    /// Claims the lowest free checkpoint slot, snapshots the rename state
    /// into it and returns the slot index as the branch id. The driver must
    /// have checked `stall_for_branches` first.
    pub fn create_checkpoint(&mut self) -> u16 {
        let mut branch_id = None;
        for slot in 0..self.branch_limit {
            if !slot_in_use(self.gbm, slot) {
                branch_id = Some(slot);
                break;
            }
        }
        let branch_id = match branch_id {
            Some(slot) => slot,
            None => panic!(
                "Renamer: no free checkpoint slot; stall_for_branches must be checked before create_checkpoint"
            ),
        };

        self.gbm |= 1u64 << branch_id;
        self.checkpoints
            .save(branch_id, &self.rmt, self.free_list.head(), self.gbm);
        trace!("checkpoint branch {} gbm {:#06x}", branch_id, self.gbm);
        branch_id
    }

    /// Inserts an active list entry with all outcome flags clear and
    /// returns its index for later reference by the execution stage. The
    /// driver must have checked `stall_for_dispatch` first.
    pub fn dispatch(&mut self, dest: Option<Dest>, class: InstrClass, pc: WordType) -> u16 {
        assert!(
            !self.active_list.is_full(),
            "Renamer: dispatch on a full active list; stall_for_dispatch must be checked first"
        );

        let mut entry = ActiveListEntry {
            is_load: class.is_load,
            is_store: class.is_store,
            is_branch: class.is_branch,
            is_amo: class.is_amo,
            is_csr: class.is_csr,
            pc,
            ..ActiveListEntry::default()
        };
        if let Some(dest) = dest {
            entry.has_dest = true;
            entry.log_reg = dest.log_reg;
            entry.phys_reg = dest.phys_reg;
        }

        let al_index = self.active_list.insert(entry);
        trace!("dispatch pc {} -> active list entry {}", pc, al_index);
        al_index
    }

    pub fn is_ready(&self, phys_reg: RegisterType) -> bool {
        self.prf.is_ready(phys_reg)
    }

    pub fn set_ready(&mut self, phys_reg: RegisterType) {
        self.prf.set_ready(phys_reg);
    }

    pub fn clear_ready(&mut self, phys_reg: RegisterType) {
        self.prf.clear_ready(phys_reg);
    }

    pub fn read(&self, phys_reg: RegisterType) -> WordType {
        self.prf.read(phys_reg)
    }

    pub fn write(&mut self, phys_reg: RegisterType, value: WordType) {
        self.prf.write(phys_reg, value);
    }

    pub fn set_complete(&mut self, al_index: u16) {
        self.active_list.get_mut(al_index).completed = true;
    }

    pub fn set_exception(&mut self, al_index: u16) {
        self.active_list.get_mut(al_index).exception = true;
    }

    pub fn set_load_violation(&mut self, al_index: u16) {
        self.active_list.get_mut(al_index).load_violation = true;
    }

    pub fn set_branch_mispredicted(&mut self, al_index: u16) {
        self.active_list.get_mut(al_index).branch_mispredicted = true;
    }

    pub fn set_value_mispredicted(&mut self, al_index: u16) {
        self.active_list.get_mut(al_index).value_mispredicted = true;
    }

    pub fn get_exception(&self, al_index: u16) -> bool {
        self.active_list.get(al_index).exception
    }

    /// Resolves the branch occupying checkpoint slot `branch_id`, located
    /// at `al_index` in the active list.
    ///
    /// Correct: the slot is released and its bit is stripped from the
    /// stored mask of every still-unresolved branch, so a later rollback
    /// does not resurrect an already retired slot.
    ///
    /// Mispredicted: the GBM, free list head and RMT are restored from the
    /// checkpoint (with the branch's own bit cleared) and the active list
    /// is truncated to the entry immediately after the branch. The branch
    /// itself did execute, so it stays. Checkpoints taken after this branch
    /// die with the truncation; their GBM bits were a superset and vanish
    /// with the restored mask.
    pub fn resolve(&mut self, al_index: u16, branch_id: u16, correct: bool) {
        assert!(
            slot_in_use(self.gbm, branch_id),
            "Renamer: resolve on branch {} which is not unresolved",
            branch_id
        );

        let mask = 1u64 << branch_id;
        if correct {
            self.gbm &= !mask;
            for other in 0..self.branch_limit {
                if other != branch_id && slot_in_use(self.gbm, other) {
                    *self.checkpoints.gbm_mut(other) &= !mask;
                }
            }
            debug!("branch {} resolved correct, gbm {:#06x}", branch_id, self.gbm);
        } else {
            let checkpoint = self.checkpoints.get(branch_id);
            self.gbm = checkpoint.gbm & !mask;
            self.rmt.copy_from(&checkpoint.rmt);
            self.free_list.set_head(checkpoint.free_list_head);
            self.active_list.truncate_after(al_index);
            debug!(
                "branch {} mispredicted, rolled back to checkpoint, gbm {:#06x}",
                branch_id, self.gbm
            );
        }
    }

    /// Non-destructive peek of the active list head, or `None` when
    /// nothing is in flight. The driver inspects the outcome flags and then
    /// decides between `commit` and `squash`.
    pub fn precommit(&self) -> Option<ActiveListEntry> {
        if self.active_list.is_empty() {
            return None;
        }
        Some(*self.active_list.peek_head())
    }

    /// Retires the head entry. The head must be completed and free of
    /// exception and load violation. With a destination, the AMT mapping it
    /// displaces goes back on the free list; this is the only path by which
    /// physical registers are reclaimed.
    pub fn commit(&mut self) {
        let entry = self.active_list.pop_head();
        assert!(
            entry.completed && !entry.exception && !entry.load_violation,
            "Renamer: commit on a head entry that is not completed or carries an exception"
        );

        if entry.has_dest {
            let stale = self.amt.get(entry.log_reg);
            self.amt.set(entry.log_reg, entry.phys_reg);
            self.free_list.push(stale);
            trace!(
                "commit pc {} r{}: p{} replaces p{} in the AMT",
                entry.pc,
                entry.log_reg,
                entry.phys_reg,
                stale
            );
        }
    }

    /// Full pipeline flush: discards every in-flight instruction and all
    /// speculative rename state, reverting to the last committed
    /// architectural state. The free pool becomes exactly the physical
    /// registers the AMT does not reference, and the AMT-referenced
    /// registers are marked ready since they hold committed values.
    /// A squash with nothing in flight is a no-op.
    pub fn squash(&mut self) {
        self.active_list.clear();
        self.gbm = 0;
        self.rmt.copy_from(&self.amt);

        let amt = &self.amt;
        self.free_list
            .rebuild((0..self.phys_reg_count).filter(|&phys_reg| !amt.maps_to(phys_reg)));

        for arch_reg in 0..self.arch_reg_count {
            self.prf.set_ready(self.amt.get(arch_reg));
        }
        debug!("squash: rename state reverted to architectural state");
    }

    /// Consistency audit: the free list, the AMT and the in-flight
    /// destinations must partition the physical register file, with no
    /// register in more than one set. Panics on any violation. Intended for
    /// tests and debugging harnesses.
    pub fn audit(&self) {
        let mut owner = vec![None::<&str>; self.phys_reg_count as usize];

        let mut claim = |phys_reg: RegisterType, who: &'static str| {
            let slot = &mut owner[phys_reg as usize];
            if let Some(previous) = slot {
                panic!(
                    "Renamer: p{} owned by both {} and {}",
                    phys_reg, previous, who
                );
            }
            *slot = Some(who);
        };

        for phys_reg in self.free_list.iter_free() {
            claim(phys_reg, "free list");
        }
        for arch_reg in 0..self.arch_reg_count {
            claim(self.amt.get(arch_reg), "AMT");
        }
        for entry in self.active_list.iter() {
            if entry.has_dest {
                claim(entry.phys_reg, "in-flight destination");
            }
        }

        for (phys_reg, slot) in owner.iter().enumerate() {
            assert!(slot.is_some(), "Renamer: p{} leaked", phys_reg);
        }
    }
}
