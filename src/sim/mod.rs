use std::convert::Infallible;

use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};

use crate::error::ConfigError;

pub mod double_buffer;
pub mod gpucompute;
pub mod patterns;
pub mod scheduler;

pub use double_buffer::{BufferId, DoubleBuffer, StepCounter};
pub use scheduler::{LifeStepper, SchedulerStatistics, StepScheduler, TickOutcome};

/// Side length of the square toroidal grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize(u32);

impl GridSize {
    /// Largest supported side. Keeps a generation within the default storage
    /// buffer binding limit.
    pub const MAX: u32 = 4096;

    pub fn new(n: u32) -> Result<Self, ConfigError> {
        if n == 0 || n > Self::MAX {
            return Err(ConfigError::InvalidGridSize {
                got: n as u64,
                max: Self::MAX,
            });
        }
        Ok(Self(n))
    }
    pub fn side(self) -> u32 {
        self.0
    }
    pub fn cell_count(self) -> usize {
        self.0 as usize * self.0 as usize
    }
    /// Flat index of `(x, y)`, both taken modulo the side length.
    pub fn index(self, x: u32, y: u32) -> usize {
        let n = self.0;
        (y % n) as usize * n as usize + (x % n) as usize
    }
    pub fn coords(self, index: usize) -> (u32, u32) {
        let n = self.0 as usize;
        ((index % n) as u32, (index / n) as u32)
    }
    /// The `(N, N)` uniform pair shared by the compute and render shaders.
    pub fn uniform(self) -> [f32; 2] {
        [self.0 as f32, self.0 as f32]
    }
}

/// One complete grid state: `1` is alive, `0` is dead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    size: GridSize,
    cells: Vec<u32>,
}

impl Generation {
    pub fn empty(size: GridSize) -> Self {
        Self {
            size,
            cells: vec![0; size.cell_count()],
        }
    }

    pub fn from_alive(size: GridSize, alive: &[(u32, u32)]) -> Self {
        let mut generation = Self::empty(size);
        for &(x, y) in alive {
            generation.cells[size.index(x, y)] = 1;
        }
        generation
    }

    /// Each cell is independently alive with probability `p`.
    pub fn random(size: GridSize, p: f32, rng: &mut fastrand::Rng) -> Self {
        let cells = (0..size.cell_count())
            .map(|_| u32::from(rng.f32() < p))
            .collect();
        Self { size, cells }
    }

    /// Rebuild from raw cell words, e.g. a GPU readback. Non-zero words are
    /// treated as alive.
    pub fn from_cells(size: GridSize, cells: Vec<u32>) -> Option<Self> {
        if cells.len() != size.cell_count() {
            return None;
        }
        let cells = cells.into_iter().map(|c| u32::from(c != 0)).collect();
        Some(Self { size, cells })
    }

    pub fn size(&self) -> GridSize {
        self.size
    }
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.cells[self.size.index(x, y)]
    }
    pub fn is_alive(&self, x: u32, y: u32) -> bool {
        self.get(x, y) == 1
    }
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&c| c == 1).count()
    }
    pub fn alive_cells(&self) -> Vec<(u32, u32)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == 1)
            .map(|(i, _)| self.size.coords(i))
            .collect()
    }
}

/// Live neighbors of `(x, y)` among the eight wrapped neighbors.
///
/// Offsets are added as `x + n - 1` rather than `x - 1` so the arithmetic
/// stays in range at coordinate zero before the modulo is taken.
pub fn count_live_neighbors(cells: &[u32], size: GridSize, x: u32, y: u32) -> u32 {
    let n = size.side();
    let (x, y) = (x % n, y % n);
    let left = (x + n - 1) % n;
    let right = (x + 1) % n;
    let up = (y + n - 1) % n;
    let down = (y + 1) % n;
    let at = |cx: u32, cy: u32| cells[size.index(cx, cy)];

    at(left, up)
        + at(x, up)
        + at(right, up)
        + at(left, y)
        + at(right, y)
        + at(left, down)
        + at(x, down)
        + at(right, down)
}

/// B3/S23.
pub fn next_state(current: u32, live_neighbors: u32) -> u32 {
    match live_neighbors {
        2 => current,
        3 => 1,
        _ => 0,
    }
}

/// CPU rendition of the compute pass. Every entry of `next` is assigned from
/// `current` only.
pub fn compute_next_generation(size: GridSize, current: &[u32], next: &mut [u32]) {
    debug_assert_eq!(current.len(), size.cell_count());
    debug_assert_eq!(next.len(), size.cell_count());
    next.par_iter_mut().enumerate().for_each(|(i, out)| {
        let (x, y) = size.coords(i);
        *out = next_state(current[i], count_live_neighbors(current, size, x, y));
    });
}

/// The pair of generation buffers plus the step counter that decides which
/// one is authoritative.
#[derive(Clone, Debug)]
pub struct GridState {
    size: GridSize,
    buffers: DoubleBuffer<Generation>,
}

impl GridState {
    /// Both buffers start out as copies of `seed`.
    pub fn new(seed: Generation) -> Self {
        Self {
            size: seed.size(),
            buffers: DoubleBuffer::new(seed.clone(), seed),
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }
    pub fn counter(&self) -> StepCounter {
        self.buffers.counter()
    }
    pub fn current_id(&self) -> BufferId {
        self.buffers.current_id()
    }
    pub fn next_id(&self) -> BufferId {
        self.buffers.next_id()
    }
    pub fn current_generation(&self) -> &Generation {
        self.buffers.current()
    }

    pub fn read(&self, id: BufferId, x: u32, y: u32) -> u32 {
        self.buffers.get(id).get(x, y)
    }

    /// Set cell `index` of buffer `id`. Any non-zero `value` is stored as 1.
    ///
    /// # Panics
    ///
    /// If `index` is not below `size().cell_count()`.
    pub fn write(&mut self, id: BufferId, index: usize, value: u32) {
        let count = self.size.cell_count();
        assert!(index < count, "cell index {index} out of range for {count} cells");
        debug_assert!(value <= 1, "cell states are 0 or 1");
        self.buffers.get_mut(id).cells[index] = u32::from(value != 0);
    }

    pub fn swap_roles(&mut self) -> (BufferId, BufferId) {
        self.buffers.swap()
    }

    /// Run one compute pass from current into next, then swap roles.
    pub fn step(&mut self) {
        let size = self.size;
        let (current, next) = self.buffers.split();
        compute_next_generation(size, &current.cells, &mut next.cells);
        self.swap_roles();
    }
}

impl LifeStepper for GridState {
    type Error = Infallible;

    fn step(&mut self) -> Result<(), Self::Error> {
        GridState::step(self);
        Ok(())
    }
    fn steps(&self) -> u64 {
        self.counter().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: u32) -> GridSize {
        GridSize::new(n).unwrap()
    }

    fn step_once(generation: &Generation) -> Generation {
        let mut state = GridState::new(generation.clone());
        state.step();
        state.current_generation().clone()
    }

    #[test]
    fn grid_size_rejects_zero_and_oversize() {
        assert!(GridSize::new(0).is_err());
        assert!(GridSize::new(GridSize::MAX + 1).is_err());
        assert_eq!(size(1).cell_count(), 1);
    }

    #[test]
    fn indices_wrap() {
        let s = size(4);
        assert_eq!(s.index(0, 0), 0);
        assert_eq!(s.index(3, 3), 15);
        assert_eq!(s.index(4, 5), s.index(0, 1));
        assert_eq!(s.coords(6), (2, 1));
    }

    #[test]
    fn next_generation_is_binary_and_full_sized() {
        let mut rng = fastrand::Rng::with_seed(7);
        for n in 1..=9 {
            let generation = Generation::random(size(n), 0.5, &mut rng);
            let mut state = GridState::new(generation);
            for _ in 0..5 {
                state.step();
                let cur = state.current_generation();
                assert_eq!(cur.cells().len(), (n * n) as usize);
                assert!(cur.cells().iter().all(|&c| c <= 1));
            }
        }
    }

    #[test]
    fn corner_counts_opposite_corner() {
        let s = size(5);
        let generation = Generation::from_alive(s, &[(4, 4)]);
        assert_eq!(count_live_neighbors(generation.cells(), s, 0, 0), 1);
        // and never itself
        let generation = Generation::from_alive(s, &[(0, 0)]);
        assert_eq!(count_live_neighbors(generation.cells(), s, 0, 0), 0);
        assert_eq!(count_live_neighbors(generation.cells(), s, 4, 4), 1);
    }

    #[test]
    fn birth_needs_exactly_three() {
        let s = size(6);
        let three = Generation::from_alive(s, &[(1, 1), (2, 1), (3, 1)]);
        assert!(step_once(&three).is_alive(2, 2));
        assert!(step_once(&three).is_alive(2, 0));

        let two = Generation::from_alive(s, &[(1, 1), (3, 1)]);
        assert!(!step_once(&two).is_alive(2, 2));
        assert_eq!(step_once(&two).population(), 0);
    }

    #[test]
    fn loneliness_and_overcrowding_kill() {
        let s = size(6);
        let lonely = Generation::from_alive(s, &[(2, 2), (3, 2)]);
        assert_eq!(step_once(&lonely).population(), 0);

        // centre of a plus shape has four neighbors
        let plus = Generation::from_alive(s, &[(2, 2), (1, 2), (3, 2), (2, 1), (2, 3)]);
        assert!(!step_once(&plus).is_alive(2, 2));
    }

    #[test]
    fn rule_table() {
        for n in 0..=8 {
            let expected_dead = if n == 3 { 1 } else { 0 };
            let expected_alive = if n == 2 || n == 3 { 1 } else { 0 };
            assert_eq!(next_state(0, n), expected_dead, "dead cell, {n} neighbors");
            assert_eq!(next_state(1, n), expected_alive, "live cell, {n} neighbors");
        }
    }

    #[test]
    fn wraps_across_edges() {
        // a blinker straddling the seam at x = 0
        let s = size(5);
        let generation = Generation::from_alive(s, &[(4, 2), (0, 2), (1, 2)]);
        let next = step_once(&generation);
        let mut alive = next.alive_cells();
        alive.sort();
        assert_eq!(alive, vec![(0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn grid_state_contract() {
        let s = size(4);
        let mut state = GridState::new(Generation::from_alive(s, &[(1, 1)]));
        assert_eq!(state.current_id(), BufferId::A);
        // both buffers seeded identically
        assert_eq!(state.read(BufferId::A, 1, 1), 1);
        assert_eq!(state.read(BufferId::B, 1, 1), 1);

        let next = state.next_id();
        state.write(next, s.index(2, 2), 1);
        assert_eq!(state.read(state.current_id(), 2, 2), 0);
        assert_eq!(state.read(next, 2, 2), 1);

        assert_eq!(state.swap_roles(), (BufferId::B, BufferId::A));
        assert!(state.current_generation().is_alive(2, 2));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn write_past_the_grid_panics() {
        let s = size(4);
        let mut state = GridState::new(Generation::empty(s));
        let next = state.next_id();
        state.write(next, s.cell_count(), 1);
    }

    #[test]
    fn readback_words_are_normalized() {
        let s = size(2);
        let g = Generation::from_cells(s, vec![0, 5, 1, 0]).unwrap();
        assert_eq!(g.cells(), &[0, 1, 1, 0]);
        assert!(Generation::from_cells(s, vec![0; 3]).is_none());
    }

    #[test]
    fn random_seed_is_reproducible() {
        let s = size(16);
        let a = Generation::random(s, 0.4, &mut fastrand::Rng::with_seed(42));
        let b = Generation::random(s, 0.4, &mut fastrand::Rng::with_seed(42));
        assert_eq!(a, b);
        let none = Generation::random(s, 0.0, &mut fastrand::Rng::with_seed(1));
        assert_eq!(none.population(), 0);
        let all = Generation::random(s, 1.0, &mut fastrand::Rng::with_seed(1));
        assert_eq!(all.population(), s.cell_count());
    }
}
