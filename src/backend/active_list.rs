use crate::instructions::{RegisterType, WordType};

/// One dispatched, not yet retired instruction. Outcome flags are all clear
/// at dispatch and are set by the execution stage through the renamer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActiveListEntry {
    pub has_dest: bool,
    pub log_reg: RegisterType,
    pub phys_reg: RegisterType,
    pub is_load: bool,
    pub is_store: bool,
    pub is_branch: bool,
    pub is_amo: bool,
    pub is_csr: bool,
    pub pc: WordType,
    pub completed: bool,
    pub exception: bool,
    pub load_violation: bool,
    pub branch_mispredicted: bool,
    pub value_mispredicted: bool,
}

/// In-order retirement buffer (this design's reorder buffer). Entries are
/// inserted at the tail in dispatch order and leave from the head in the
/// same order; a branch misprediction truncates the tail. Same ring idiom
/// as the free list: monotonic head/tail sequence numbers, slot index is
/// `seq % capacity`.
pub struct ActiveList {
    capacity: u64,
    head: u64,
    tail: u64,
    slots: Vec<ActiveListEntry>,
}

impl ActiveList {
    pub fn new(capacity: u16) -> ActiveList {
        let mut slots = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            slots.push(ActiveListEntry::default());
        }

        ActiveList {
            capacity: capacity as u64,
            head: 0,
            tail: 0,
            slots,
        }
    }

    // sequence number of a live slot index
    fn seq_of(&self, index: u16) -> u64 {
        debug_assert!((index as u64) < self.capacity);
        let head_index = self.head % self.capacity;
        let offset = (index as u64 + self.capacity - head_index) % self.capacity;
        let seq = self.head + offset;
        debug_assert!(seq < self.tail, "ActiveList: index {} is not a live entry", index);
        seq
    }

    pub fn insert(&mut self, entry: ActiveListEntry) -> u16 {
        assert!(!self.is_full(), "ActiveList: insert on a full active list");
        let index = (self.tail % self.capacity) as u16;
        self.slots[index as usize] = entry;
        self.tail += 1;
        index
    }

    pub fn peek_head(&self) -> &ActiveListEntry {
        assert!(!self.is_empty(), "ActiveList: peek on an empty active list");
        &self.slots[(self.head % self.capacity) as usize]
    }

    pub fn pop_head(&mut self) -> ActiveListEntry {
        assert!(!self.is_empty(), "ActiveList: pop on an empty active list");
        let entry = self.slots[(self.head % self.capacity) as usize];
        self.head += 1;
        entry
    }

    pub fn get(&self, index: u16) -> &ActiveListEntry {
        let seq = self.seq_of(index);
        &self.slots[(seq % self.capacity) as usize]
    }

    pub fn get_mut(&mut self, index: u16) -> &mut ActiveListEntry {
        let seq = self.seq_of(index);
        &mut self.slots[(seq % self.capacity) as usize]
    }

    pub fn size(&self) -> u64 {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    pub fn free_entry_count(&self) -> u64 {
        self.capacity - self.size()
    }

    /// Discards the entry at `index` and every younger entry. `index` must
    /// denote a live entry.
    pub fn set_tail(&mut self, index: u16) {
        self.tail = self.seq_of(index);
    }

    /// Discards every entry younger than `index`, keeping `index` itself.
    /// This is the misprediction policy: the branch completed, only the
    /// wrong-path instructions after it are squashed.
    pub fn truncate_after(&mut self, index: u16) {
        self.tail = self.seq_of(index) + 1;
    }

    pub fn clear(&mut self) {
        self.tail = self.head;
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveListEntry> + '_ {
        (self.head..self.tail).map(move |seq| &self.slots[(seq % self.capacity) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pc: WordType) -> ActiveListEntry {
        ActiveListEntry {
            pc,
            ..ActiveListEntry::default()
        }
    }

    #[test]
    fn test_insert_and_pop_in_order() {
        let mut active_list = ActiveList::new(4);
        let i0 = active_list.insert(entry(0));
        let i1 = active_list.insert(entry(1));
        assert_eq!((i0, i1), (0, 1));
        assert_eq!(active_list.size(), 2);

        assert_eq!(active_list.peek_head().pc, 0);
        assert_eq!(active_list.pop_head().pc, 0);
        assert_eq!(active_list.pop_head().pc, 1);
        assert!(active_list.is_empty());
    }

    #[test]
    fn test_indices_wrap_after_retirement() {
        let mut active_list = ActiveList::new(4);
        for pc in 0..4 {
            active_list.insert(entry(pc));
        }
        assert!(active_list.is_full());

        active_list.pop_head();
        active_list.pop_head();
        assert_eq!(active_list.insert(entry(4)), 0);
        assert_eq!(active_list.insert(entry(5)), 1);
        assert_eq!(active_list.get(0).pc, 4);
        assert_eq!(active_list.peek_head().pc, 2);
    }

    #[test]
    fn test_truncate_after() {
        let mut active_list = ActiveList::new(4);
        let _i0 = active_list.insert(entry(0));
        let i1 = active_list.insert(entry(1));
        let _i2 = active_list.insert(entry(2));
        let _i3 = active_list.insert(entry(3));

        active_list.truncate_after(i1);
        assert_eq!(active_list.size(), 2);
        assert_eq!(active_list.pop_head().pc, 0);
        assert_eq!(active_list.pop_head().pc, 1);
    }

    #[test]
    fn test_truncate_after_youngest_is_a_noop() {
        let mut active_list = ActiveList::new(4);
        for pc in 0..4 {
            active_list.insert(entry(pc));
        }
        active_list.truncate_after(3);
        assert_eq!(active_list.size(), 4);
    }

    #[test]
    fn test_set_tail_discards_from_index() {
        let mut active_list = ActiveList::new(4);
        for pc in 0..3 {
            active_list.insert(entry(pc));
        }
        active_list.set_tail(1);
        assert_eq!(active_list.size(), 1);
        assert_eq!(active_list.peek_head().pc, 0);
    }

    #[test]
    fn test_clear() {
        let mut active_list = ActiveList::new(4);
        active_list.insert(entry(0));
        active_list.insert(entry(1));
        active_list.clear();
        assert!(active_list.is_empty());
        assert_eq!(active_list.free_entry_count(), 4);
    }

    #[test]
    fn test_flags_reachable_by_index() {
        let mut active_list = ActiveList::new(4);
        active_list.insert(entry(0));
        let i1 = active_list.insert(entry(1));
        active_list.get_mut(i1).completed = true;
        assert!(active_list.get(i1).completed);
        assert!(!active_list.peek_head().completed);
    }

    #[test]
    #[should_panic]
    fn test_insert_full_panics() {
        let mut active_list = ActiveList::new(2);
        active_list.insert(entry(0));
        active_list.insert(entry(1));
        active_list.insert(entry(2));
    }
}
