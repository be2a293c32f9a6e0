use crate::backend::map_table::MapTable;

/// Snapshot of the rename state at the moment a branch was dispatched:
/// the RMT, the free list allocation pointer, and the global branch mask
/// with the branch's own bit already set. All owned copies; mutating the
/// live RMT after the snapshot never affects it.
pub struct Checkpoint {
    pub rmt: MapTable,
    pub free_list_head: u64,
    pub gbm: u64,
}

/// Fixed array of checkpoint slots, one per potentially unresolved branch.
/// Slot liveness is governed entirely by the corresponding GBM bit in the
/// renamer; the store itself never allocates after construction.
pub struct CheckpointStore {
    slots: Vec<Checkpoint>,
}

impl CheckpointStore {
    pub fn new(branch_limit: u16, arch_reg_count: u16) -> CheckpointStore {
        let mut slots = Vec::with_capacity(branch_limit as usize);
        for _ in 0..branch_limit {
            slots.push(Checkpoint {
                rmt: MapTable::new(arch_reg_count),
                free_list_head: 0,
                gbm: 0,
            });
        }

        CheckpointStore { slots }
    }

    pub fn save(&mut self, slot: u16, rmt: &MapTable, free_list_head: u64, gbm: u64) {
        let checkpoint = &mut self.slots[slot as usize];
        checkpoint.rmt.copy_from(rmt);
        checkpoint.free_list_head = free_list_head;
        checkpoint.gbm = gbm;
    }

    pub fn get(&self, slot: u16) -> &Checkpoint {
        &self.slots[slot as usize]
    }

    // stored masks are lazily stripped of bits of branches that resolved correctly
    pub fn gbm_mut(&mut self, slot: u16) -> &mut u64 {
        &mut self.slots[slot as usize].gbm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_isolation() {
        let mut live = MapTable::new(8);
        let mut store = CheckpointStore::new(4, 8);

        live.set(3, 9);
        store.save(0, &live, 1, 0b0001);

        // mutating the live table must not leak into the snapshot
        live.set(3, 10);
        live.set(5, 11);
        assert_eq!(store.get(0).rmt.get(3), 9);
        assert_eq!(store.get(0).rmt.get(5), 5);

        // and restoring must not alias the snapshot either
        live.copy_from(&store.get(0).rmt);
        live.set(3, 12);
        assert_eq!(store.get(0).rmt.get(3), 9);
    }

    #[test]
    fn test_slot_reuse_overwrites() {
        let live = MapTable::new(8);
        let mut store = CheckpointStore::new(2, 8);
        store.save(1, &live, 7, 0b10);
        assert_eq!(store.get(1).free_list_head, 7);
        assert_eq!(store.get(1).gbm, 0b10);

        store.save(1, &live, 9, 0b11);
        assert_eq!(store.get(1).free_list_head, 9);
        assert_eq!(store.get(1).gbm, 0b11);
    }
}
