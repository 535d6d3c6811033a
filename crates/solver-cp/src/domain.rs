use sched_core::{Model, SlotSet, UnitIdx};

/// Current start domains with a trail for chronological backtracking.
#[derive(Debug, Clone)]
pub struct Domains {
    starts: Vec<SlotSet>,
    trail: Vec<(UnitIdx, SlotSet)>,
}

impl Domains {
    pub fn new(model: &Model<'_>) -> Self {
        Domains {
            starts: model.units.iter().map(|u| u.starts).collect(),
            trail: Vec::new(),
        }
    }

    pub fn get(&self, unit: UnitIdx) -> SlotSet {
        self.starts[unit]
    }

    pub fn size(&self, unit: UnitIdx) -> usize {
        self.starts[unit].len()
    }

    pub fn set(&mut self, unit: UnitIdx, starts: SlotSet) {
        let old = self.starts[unit];
        if old != starts {
            self.trail.push((unit, old));
            self.starts[unit] = starts;
        }
    }

    pub fn mark(&self) -> usize {
        self.trail.len()
    }

    pub fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some((unit, old)) = self.trail.pop() {
                self.starts[unit] = old;
            }
        }
    }
}
