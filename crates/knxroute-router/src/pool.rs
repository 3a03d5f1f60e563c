use knxroute_core::IndividualAddress;

/// Block of individual addresses leased to client connections.
///
/// A lease bit per address plus a rotating cursor, so a released address is
/// not handed out again until the rest of the block has been tried.
#[derive(Debug, Clone)]
pub struct AddressPool {
    start: IndividualAddress,
    leased: Vec<bool>,
    cursor: usize,
}

impl AddressPool {
    /// A pool of `len` consecutive addresses beginning at `start`, cut short
    /// at the end of the address space.
    pub fn new(start: IndividualAddress, len: u16) -> Self {
        let room = usize::from(u16::MAX - start.raw()) + 1;
        Self {
            start,
            leased: vec![false; usize::from(len).min(room)],
            cursor: 0,
        }
    }

    pub fn start(&self) -> IndividualAddress {
        self.start
    }

    pub fn len(&self) -> usize {
        self.leased.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leased.is_empty()
    }

    pub fn leased_count(&self) -> usize {
        self.leased.iter().filter(|bit| **bit).count()
    }

    pub fn contains(&self, addr: IndividualAddress) -> bool {
        self.offset(addr).is_some()
    }

    pub fn is_leased(&self, addr: IndividualAddress) -> bool {
        self.offset(addr).is_some_and(|pos| self.leased[pos])
    }

    /// Leases the next free address for which `unavailable` is false.
    ///
    /// The scan starts at the cursor and wraps at most once.
    pub fn allocate(
        &mut self,
        mut unavailable: impl FnMut(IndividualAddress) -> bool,
    ) -> Option<IndividualAddress> {
        let len = self.leased.len();
        for step in 0..len {
            let pos = (self.cursor + step) % len;
            if self.leased[pos] {
                continue;
            }
            let addr = self.addr_at(pos);
            if unavailable(addr) {
                continue;
            }
            self.leased[pos] = true;
            self.cursor = (pos + 1) % len;
            return Some(addr);
        }
        None
    }

    /// Returns `addr` to the pool. Addresses outside the block or not
    /// currently leased are ignored; the result says whether anything was
    /// released.
    pub fn release(&mut self, addr: IndividualAddress) -> bool {
        match self.offset(addr) {
            Some(pos) if self.leased[pos] => {
                self.leased[pos] = false;
                true
            }
            _ => false,
        }
    }

    fn addr_at(&self, pos: usize) -> IndividualAddress {
        // `new` keeps every position inside the u16 range.
        IndividualAddress::from_raw(self.start.raw() + pos as u16)
    }

    fn offset(&self, addr: IndividualAddress) -> Option<usize> {
        let offset = usize::from(addr.raw().checked_sub(self.start.raw())?);
        (offset < self.leased.len()).then_some(offset)
    }
}
