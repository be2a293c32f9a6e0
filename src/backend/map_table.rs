use crate::instructions::RegisterType;

/// A logical to physical register map. The RMT holds the speculative
/// mapping used to rename in-flight instructions; the AMT holds the mapping
/// of the youngest committed instruction. Both are instances of this table.
/// Every logical register is always mapped; at reset the mapping is the
/// identity.
#[derive(Clone)]
pub struct MapTable {
    table: Vec<RegisterType>,
}

impl MapTable {
    pub fn new(arch_reg_count: u16) -> MapTable {
        let mut table = Vec::with_capacity(arch_reg_count as usize);
        for arch_reg in 0..arch_reg_count {
            table.push(arch_reg);
        }
        MapTable { table }
    }

    pub fn get(&self, arch_reg: RegisterType) -> RegisterType {
        self.table[arch_reg as usize]
    }

    pub fn set(&mut self, arch_reg: RegisterType, phys_reg: RegisterType) {
        self.table[arch_reg as usize] = phys_reg;
    }

    // value-semantic restore; both tables keep their own storage
    pub fn copy_from(&mut self, other: &MapTable) {
        debug_assert!(self.table.len() == other.table.len());
        self.table.copy_from_slice(&other.table);
    }

    pub fn maps_to(&self, phys_reg: RegisterType) -> bool {
        self.table.contains(&phys_reg)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_at_reset() {
        let table = MapTable::new(8);
        for arch_reg in 0..8 {
            assert_eq!(table.get(arch_reg), arch_reg);
        }
    }

    #[test]
    fn test_copy_from_is_value_semantic() {
        let mut live = MapTable::new(4);
        let snapshot = live.clone();
        live.set(2, 9);
        assert_eq!(snapshot.get(2), 2);

        live.copy_from(&snapshot);
        assert_eq!(live.get(2), 2);
    }

    #[test]
    fn test_maps_to() {
        let mut table = MapTable::new(4);
        table.set(1, 7);
        assert!(table.maps_to(7));
        assert!(!table.maps_to(1));
    }
}
