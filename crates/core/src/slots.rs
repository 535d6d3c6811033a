use std::fmt;

/// Upper bound on grid size; one bit per slot.
pub const MAX_SLOTS: usize = 128;

pub type SlotIdx = usize;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SlotSet(u128);

impl SlotSet {
    pub const EMPTY: SlotSet = SlotSet(0);

    pub fn full(n: usize) -> Self {
        if n >= MAX_SLOTS {
            SlotSet(u128::MAX)
        } else {
            SlotSet((1u128 << n) - 1)
        }
    }

    pub fn single(slot: SlotIdx) -> Self {
        SlotSet(1u128 << slot)
    }

    pub fn contains(self, slot: SlotIdx) -> bool {
        slot < MAX_SLOTS && self.0 & (1u128 << slot) != 0
    }

    pub fn insert(&mut self, slot: SlotIdx) {
        self.0 |= 1u128 << slot;
    }

    pub fn remove(&mut self, slot: SlotIdx) {
        self.0 &= !(1u128 << slot);
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: SlotSet) -> SlotSet {
        SlotSet(self.0 | other.0)
    }

    pub fn intersection(self, other: SlotSet) -> SlotSet {
        SlotSet(self.0 & other.0)
    }

    pub fn difference(self, other: SlotSet) -> SlotSet {
        SlotSet(self.0 & !other.0)
    }

    pub fn is_subset(self, other: SlotSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Every slot moved one position later. Used to derive the second half of
    /// two-period blocks from their start slots.
    pub fn later_by_one(self) -> SlotSet {
        SlotSet(self.0 << 1)
    }

    pub fn earlier_by_one(self) -> SlotSet {
        SlotSet(self.0 >> 1)
    }

    pub fn first(self) -> Option<SlotIdx> {
        (self.0 != 0).then(|| self.0.trailing_zeros() as usize)
    }

    pub fn last(self) -> Option<SlotIdx> {
        (self.0 != 0).then(|| MAX_SLOTS - 1 - self.0.leading_zeros() as usize)
    }

    pub fn iter(self) -> SlotIter {
        SlotIter(self.0)
    }
}

impl FromIterator<SlotIdx> for SlotSet {
    fn from_iter<I: IntoIterator<Item = SlotIdx>>(iter: I) -> Self {
        let mut set = SlotSet::EMPTY;
        for s in iter {
            set.insert(s);
        }
        set
    }
}

impl fmt::Debug for SlotSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub struct SlotIter(u128);

impl Iterator for SlotIter {
    type Item = SlotIdx;

    fn next(&mut self) -> Option<SlotIdx> {
        if self.0 == 0 {
            return None;
        }
        let slot = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(slot)
    }
}
