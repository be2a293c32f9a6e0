use crate::instructions::RegisterType;

/// Ring buffer of physical registers not currently bound to any logical
/// register. Allocation pops at the head, reclamation pushes at the tail.
/// Head and tail are monotonically increasing sequence numbers and the slot
/// of a sequence number is `seq % capacity`, so `tail - head` is the free
/// count and the classic head==tail empty/full ambiguity does not arise.
///
/// Checkpoints snapshot the head sequence number. Restoring an older head
/// makes every register popped since the snapshot allocatable again without
/// remembering which registers those were.
pub struct FreeList {
    capacity: u64,
    head: u64,
    tail: u64,
    slots: Vec<RegisterType>,
}

impl FreeList {
    pub fn new(arch_reg_count: u16, phys_reg_count: u16) -> FreeList {
        debug_assert!(phys_reg_count > arch_reg_count);

        // initially free: every register outside the identity mapping
        let mut slots = Vec::with_capacity((phys_reg_count - arch_reg_count) as usize);
        for phys_reg in arch_reg_count..phys_reg_count {
            slots.push(phys_reg);
        }

        let capacity = slots.len() as u64;
        FreeList {
            capacity,
            head: 0,
            tail: capacity,
            slots,
        }
    }

    fn to_index(&self, seq: u64) -> usize {
        (seq % self.capacity) as usize
    }

    pub fn pop(&mut self) -> RegisterType {
        assert!(
            self.count_free() > 0,
            "FreeList: pop on an empty free list"
        );
        let phys_reg = self.slots[self.to_index(self.head)];
        self.head += 1;
        phys_reg
    }

    pub fn push(&mut self, phys_reg: RegisterType) {
        debug_assert!(
            self.count_free() < self.capacity,
            "FreeList: push on a full free list"
        );
        let index = self.to_index(self.tail);
        self.slots[index] = phys_reg;
        self.tail += 1;
    }

    pub fn count_free(&self) -> u64 {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    /// Restores the allocation pointer to a checkpointed value. Only ever
    /// called with a head that is older than the current one.
    pub fn set_head(&mut self, head: u64) {
        debug_assert!(head <= self.head);
        debug_assert!(self.tail - head <= self.capacity);
        self.head = head;
    }

    /// Rewinds the allocation pointer all the way back to the reclamation
    /// pointer, making the list full again.
    pub fn reset_head_to_tail(&mut self) {
        self.head = self.tail - self.capacity;
    }

    /// Replaces the contents with exactly the given registers. Used by a
    /// full squash, where the free pool becomes every physical register the
    /// AMT does not reference. The iterator must yield exactly `capacity`
    /// registers.
    pub fn rebuild(&mut self, free_regs: impl Iterator<Item = RegisterType>) {
        let mut count = 0usize;
        for phys_reg in free_regs {
            self.slots[count] = phys_reg;
            count += 1;
        }
        assert!(
            count as u64 == self.capacity,
            "FreeList: rebuild must refill the list to capacity"
        );
        self.head = 0;
        self.tail = self.capacity;
    }

    pub fn iter_free(&self) -> impl Iterator<Item = RegisterType> + '_ {
        (self.head..self.tail).map(move |seq| self.slots[self.to_index(seq)])
    }
}
