use crate::protocol::DEVICES;


/**
    which locomotive each bus device currently controls

    index is the device bus address, value the locomotive address, 0 meaning free. A locomotive is owned by at most one slot once [SlotTable::assign] returned.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct SlotTable {
    locos: [u16; DEVICES],
}

impl SlotTable {
    pub const fn new() -> Self {
        Self {locos: [0; DEVICES]}
    }
    /// locomotive controlled by the given slot, if any
    pub fn loco(&self, slot: u8) -> Option<u16> {
        match self.locos.get(usize::from(slot)) {
            Some(&0) | None => None,
            Some(&address) => Some(address),
        }
    }
    /// slot currently controlling the given locomotive
    pub fn owner(&self, address: u16) -> Option<u8> {
        if address == 0
            {return None}
        self.locos.iter()
            .position(|&loco| loco == address)
            .and_then(|slot| u8::try_from(slot).ok())
    }
    /// locomotive is controlled by a slot other than the given one
    pub fn is_busy_for(&self, slot: u8, address: u16) -> bool {
        self.owner(address).is_some_and(|owner| owner != slot)
    }
    /**
        give the locomotive to the given slot

        returns the slot it was taken from, who must be told it lost control. Nothing changes if the slot already owns it.
    */
    pub fn assign(&mut self, slot: u8, address: u16) -> Option<u8> {
        let index = usize::from(slot);
        if index >= DEVICES || self.locos[index] == address
            {return None}
        let previous = self.release(address);
        self.locos[index] = address;
        previous.filter(|&other| other != slot)
    }
    /// free the locomotive, returns the slot that held it
    pub fn release(&mut self, address: u16) -> Option<u8> {
        let slot = self.owner(address)?;
        self.locos[usize::from(slot)] = 0;
        Some(slot)
    }
    pub fn iter(&self) -> impl Iterator<Item=(u8, u16)> + '_ {
        (0u8 ..).zip(self.locos.iter().copied())
            .filter(|&(_, loco)| loco != 0)
    }
}

impl Default for SlotTable {
    fn default() -> Self {Self::new()}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_takes_over() {
        let mut slots = SlotTable::new();
        assert_eq!(slots.assign(3, 300), None);
        assert_eq!(slots.assign(7, 300), Some(3));
        assert_eq!(slots.owner(300), Some(7));
        assert_eq!(slots.loco(3), None);
        assert_eq!(slots.loco(7), Some(300));
        assert_eq!(slots.iter().filter(|&(_, loco)| loco == 300).count(), 1);
    }

    #[test]
    fn reassigning_own_loco_is_silent() {
        let mut slots = SlotTable::new();
        slots.assign(3, 42);
        assert_eq!(slots.assign(3, 42), None);
        assert_eq!(slots.owner(42), Some(3));
    }

    #[test]
    fn switching_loco_frees_previous() {
        let mut slots = SlotTable::new();
        slots.assign(3, 42);
        slots.assign(3, 43);
        assert_eq!(slots.owner(42), None);
        assert_eq!(slots.owner(43), Some(3));
        assert!(slots.is_busy_for(4, 43));
        assert!(!slots.is_busy_for(3, 43));
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let mut slots = SlotTable::new();
        assert_eq!(slots.assign(32, 42), None);
        assert_eq!(slots.owner(42), None);
        assert_eq!(slots.loco(40), None);
    }
}
