use super::{Generation, GridSize};

pub struct Pattern {
    pub name: &'static str,
    /// Live cells relative to the pattern's top-left corner.
    pub cells: &'static [(u32, u32)],
}

pub const BLOCK: Pattern = Pattern {
    name: "block",
    cells: &[(0, 0), (1, 0), (0, 1), (1, 1)],
};

pub const BLINKER: Pattern = Pattern {
    name: "blinker",
    cells: &[(0, 0), (1, 0), (2, 0)],
};

pub const GLIDER: Pattern = Pattern {
    name: "glider",
    cells: &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)],
};

pub const BEACON: Pattern = Pattern {
    name: "beacon",
    cells: &[(0, 0), (1, 0), (0, 1), (3, 2), (2, 3), (3, 3)],
};

pub const R_PENTOMINO: Pattern = Pattern {
    name: "r-pentomino",
    cells: &[(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)],
};

pub const PATTERNS: &[Pattern] = &[BLOCK, BLINKER, GLIDER, BEACON, R_PENTOMINO];

impl Pattern {
    pub fn by_name(name: &str) -> Option<&'static Pattern> {
        PATTERNS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Place the pattern with its corner at `(x, y)`, wrapping at the edges.
    pub fn place(&self, size: GridSize, x: u32, y: u32) -> Generation {
        let cells: Vec<_> = self
            .cells
            .iter()
            .map(|&(dx, dy)| ((x + dx) % size.side(), (y + dy) % size.side()))
            .collect();
        Generation::from_alive(size, &cells)
    }

    /// Place the pattern roughly in the middle of the grid.
    pub fn centered(&self, size: GridSize) -> Generation {
        let (w, h) = self.extent();
        let n = size.side();
        self.place(size, n.saturating_sub(w) / 2, n.saturating_sub(h) / 2)
    }

    fn extent(&self) -> (u32, u32) {
        let w = self.cells.iter().map(|c| c.0 + 1).max().unwrap_or(0);
        let h = self.cells.iter().map(|c| c.1 + 1).max().unwrap_or(0);
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::GridState;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Pattern::by_name("Glider").map(|p| p.name), Some("glider"));
        assert!(Pattern::by_name("gosper").is_none());
    }

    #[test]
    fn centered_block_on_four() {
        let size = GridSize::new(4).unwrap();
        let mut alive = BLOCK.centered(size).alive_cells();
        alive.sort();
        assert_eq!(alive, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn glider_returns_after_full_lap() {
        // a glider moves one cell diagonally every 4 generations, so on an
        // 8x8 torus it is back where it started after 32
        let size = GridSize::new(8).unwrap();
        let start = GLIDER.place(size, 0, 0);
        let mut state = GridState::new(start.clone());
        for _ in 0..32 {
            state.step();
        }
        assert_eq!(state.current_generation(), &start);
    }

    #[test]
    fn beacon_has_period_two() {
        let size = GridSize::new(8).unwrap();
        let start = BEACON.centered(size);
        let mut state = GridState::new(start.clone());
        state.step();
        assert_ne!(state.current_generation(), &start);
        state.step();
        assert_eq!(state.current_generation(), &start);
    }
}
