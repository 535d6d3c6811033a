use sched_core::{Model, UnitIdx};

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // smaller root wins so the result does not depend on union order
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Groups units that share no candidate class, teacher or room into
/// independent components, each listed in unit order; components are ordered
/// by their first unit.
pub fn components(model: &Model<'_>) -> Vec<Vec<UnitIdx>> {
    let snap = model.snapshot;
    let units = model.unit_count();
    let class_base = units;
    let teacher_base = class_base + snap.classes.len();
    let room_base = teacher_base + snap.teachers.len();
    let mut sets = DisjointSets::new(room_base + snap.rooms.len());

    for (i, u) in model.units.iter().enumerate() {
        sets.union(i, class_base + u.class);
        for &t in &u.teachers {
            sets.union(i, teacher_base + t);
        }
        for &r in &u.rooms {
            sets.union(i, room_base + r);
        }
    }

    let mut out: Vec<Vec<UnitIdx>> = Vec::new();
    let mut slot_of_root: Vec<Option<usize>> = vec![None; room_base + snap.rooms.len()];
    for i in 0..units {
        let root = sets.find(i);
        match slot_of_root[root] {
            Some(k) => out[k].push(i),
            None => {
                slot_of_root[root] = Some(out.len());
                out.push(vec![i]);
            }
        }
    }
    out
}
