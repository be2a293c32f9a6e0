use crate::instructions::{RegisterType, WordType};

/// The physical register file: flat value storage plus one ready bit per
/// register. Access is raw; the renamer and its driver are responsible for
/// only reading registers whose ready bit is set. Free/busy tracking lives
/// in the free list, not here.
pub struct PhysRegFile {
    values: Vec<WordType>,
    ready: Vec<bool>,
}

impl PhysRegFile {
    pub fn new(phys_reg_count: u16, arch_reg_count: u16) -> PhysRegFile {
        let mut values = Vec::with_capacity(phys_reg_count as usize);
        let mut ready = Vec::with_capacity(phys_reg_count as usize);
        for phys_reg in 0..phys_reg_count {
            values.push(0);
            // registers backing the identity mapping hold committed values
            ready.push(phys_reg < arch_reg_count);
        }

        PhysRegFile { values, ready }
    }

    pub fn read(&self, phys_reg: RegisterType) -> WordType {
        self.values[phys_reg as usize]
    }

    pub fn write(&mut self, phys_reg: RegisterType, value: WordType) {
        self.values[phys_reg as usize] = value;
    }

    pub fn is_ready(&self, phys_reg: RegisterType) -> bool {
        self.ready[phys_reg as usize]
    }

    pub fn set_ready(&mut self, phys_reg: RegisterType) {
        self.ready[phys_reg as usize] = true;
    }

    pub fn clear_ready(&mut self, phys_reg: RegisterType) {
        self.ready[phys_reg as usize] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_ready_bits() {
        let prf = PhysRegFile::new(12, 8);
        for phys_reg in 0..8 {
            assert!(prf.is_ready(phys_reg));
        }
        for phys_reg in 8..12 {
            assert!(!prf.is_ready(phys_reg));
        }
    }

    #[test]
    fn test_read_write() {
        let mut prf = PhysRegFile::new(12, 8);
        prf.write(9, 42);
        assert_eq!(prf.read(9), 42);

        prf.set_ready(9);
        assert!(prf.is_ready(9));
        prf.clear_ready(9);
        assert!(!prf.is_ready(9));
    }
}
