//! OAM DMA engine: a one-cycle-granularity copier from a source page into
//! object attribute memory.

pub struct Dma {
    source_page: u8,
    /// Ticks remaining, counting the one-cycle setup delay plus 160 bytes.
    remaining: u16,
    active: bool,
}

const SETUP_CYCLES: u16 = 1;
const TRANSFER_BYTES: u16 = 160;

impl Dma {
    pub fn new() -> Self {
        Self {
            source_page: 0,
            remaining: 0,
            active: false,
        }
    }

    /// Writing the DMA register schedules a transfer, restarting it if one
    /// is already in progress.
    pub fn start(&mut self, source_page: u8) {
        self.source_page = source_page;
        self.remaining = SETUP_CYCLES + TRANSFER_BYTES;
        self.active = true;
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn source_page(&self) -> u8 {
        self.source_page
    }

    /// Advances the engine by one M-cycle. Returns the OAM offset to copy
    /// this cycle, or `None` during the setup cycle or when idle.
    pub fn tick(&mut self) -> Option<u8> {
        if !self.active {
            return None;
        }
        self.remaining -= 1;
        let result = if self.remaining >= TRANSFER_BYTES {
            None
        } else {
            Some((TRANSFER_BYTES - 1 - self.remaining) as u8)
        };
        if self.remaining == 0 {
            self.active = false;
        }
        result
    }
}

impl Default for Dma {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_takes_one_setup_cycle_plus_160_copies() {
        let mut dma = Dma::new();
        dma.start(0xc0);
        assert_eq!(dma.tick(), None, "setup cycle copies nothing");
        for expected_offset in 0..160u16 {
            assert!(dma.active());
            assert_eq!(dma.tick(), Some(expected_offset as u8));
        }
        assert!(!dma.active());
        assert_eq!(dma.tick(), None);
    }

    #[test]
    fn restarting_mid_transfer_abandons_the_old_one() {
        let mut dma = Dma::new();
        dma.start(0xc0);
        dma.tick();
        dma.tick();
        dma.start(0xd0);
        assert_eq!(dma.source_page(), 0xd0);
        assert_eq!(dma.tick(), None);
        assert_eq!(dma.tick(), Some(0));
    }
}
