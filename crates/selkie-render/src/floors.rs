//! Vertical floor reservation.
//!
//! Span boxes and arc lines stack upward from the text line. A reservation
//! table hands out the lowest floor whose horizontal extent is still free,
//! so overlapping items stack and disjoint items share a level.

/// One claimed horizontal strip on some floor.
#[derive(Debug, Clone, Copy)]
struct Strip {
    from: f64,
    to: f64,
}

impl Strip {
    fn overlaps(&self, from: f64, to: f64) -> bool {
        self.from < to && from < self.to
    }
}

#[derive(Debug, Clone)]
struct Floor {
    /// Offset of the floor above the baseline of the stack.
    base: f64,
    /// Height of the tallest occupant.
    headroom: f64,
    strips: Vec<Strip>,
}

/// Stack allocator for one row. Reset between rows.
#[derive(Debug, Clone, Default)]
pub struct FloorReservations {
    floors: Vec<Floor>,
}

impl FloorReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `[from, to)` with the given height and returns the vertical
    /// offset of the floor the item landed on.
    pub fn reserve(&mut self, from: f64, to: f64, height: f64) -> f64 {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        for i in 0..self.floors.len() {
            let occupied = self.floors[i]
                .strips
                .iter()
                .any(|s| s.overlaps(from, to));
            if !occupied {
                let floor = &mut self.floors[i];
                floor.strips.push(Strip { from, to });
                if height > floor.headroom {
                    // lift every floor above by the difference
                    let delta = height - floor.headroom;
                    floor.headroom = height;
                    for upper in self.floors.iter_mut().skip(i + 1) {
                        upper.base += delta;
                    }
                }
                return self.floors[i].base;
            }
        }
        let base = self
            .floors
            .last()
            .map(|f| f.base + f.headroom)
            .unwrap_or(0.0);
        self.floors.push(Floor {
            base,
            headroom: height,
            strips: vec![Strip { from, to }],
        });
        base
    }

    /// Total height of the stack.
    pub fn ceiling(&self) -> f64 {
        self.floors
            .last()
            .map(|f| f.base + f.headroom)
            .unwrap_or(0.0)
    }

    /// Height of the stack over the horizontal extent `[from, to)`.
    pub fn ceiling_over(&self, from: f64, to: f64) -> f64 {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let mut top = 0.0f64;
        for floor in &self.floors {
            if floor.strips.iter().any(|s| s.overlaps(from, to)) {
                top = top.max(floor.base + floor.headroom);
            }
        }
        top
    }
}
