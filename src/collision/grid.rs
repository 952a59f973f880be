use std::collections::HashSet;

use super::shape::Extent;

/// Uniform-cell broad phase. Cells hold object ids, not shapes; the
/// non-empty index is maintained incrementally so `candidate_pairs`
/// never rescans the whole grid.
pub struct Grid {
    cell_size: f32,
    cols: i64,
    rows: i64,
    cells: Vec<HashSet<u64>>,
    non_empty: HashSet<usize>,
}

impl Grid {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        let cols = (width / cell_size).ceil() as i64 + 1;
        let rows = (height / cell_size).ceil() as i64 + 1;
        Self {
            cell_size,
            cols,
            rows,
            cells: vec![HashSet::new(); (cols * rows) as usize],
            non_empty: HashSet::new(),
        }
    }

    fn index(&self, cx: i64, cy: i64) -> Option<usize> {
        if cx < 0 || cy < 0 || cx >= self.cols || cy >= self.rows {
            return None;
        }
        Some((cy * self.cols + cx) as usize)
    }

    /// Adds `id` to every cell the extent covers and returns the cell
    /// indices that were actually touched. Out-of-bounds cells are
    /// skipped silently: shapes may legally sit outside world bounds
    /// and simply get fewer memberships.
    pub fn insert(&mut self, id: u64, extent: &Extent) -> Vec<usize> {
        let min_cx = (extent.min.x / self.cell_size).floor() as i64;
        let min_cy = (extent.min.y / self.cell_size).floor() as i64;
        let max_cx = (extent.max.x / self.cell_size).ceil() as i64;
        let max_cy = (extent.max.y / self.cell_size).ceil() as i64;

        let mut touched = Vec::new();
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                let Some(i) = self.index(cx, cy) else {
                    continue;
                };
                self.cells[i].insert(id);
                self.non_empty.insert(i);
                touched.push(i);
            }
        }
        touched
    }

    /// Removes `id` from the given cells, dropping emptied cells from
    /// the non-empty index.
    pub fn remove(&mut self, id: u64, cells: &[usize]) {
        for &i in cells {
            let cell = &mut self.cells[i];
            cell.remove(&id);
            if cell.is_empty() {
                self.non_empty.remove(&i);
            }
        }
    }

    /// Every unordered id pair sharing at least one cell, reported
    /// exactly once per call. Pairs spanning several cells are
    /// deduplicated through the canonical `(min, max)` key.
    pub fn candidate_pairs(&self) -> Vec<(u64, u64)> {
        let mut seen: HashSet<(u64, u64)> = HashSet::new();
        let mut pairs = Vec::new();

        for &i in &self.non_empty {
            let cell = &self.cells[i];
            if cell.len() < 2 {
                continue;
            }
            let ids: Vec<u64> = cell.iter().copied().collect();
            for (n, &a) in ids.iter().enumerate() {
                for &b in &ids[n + 1..] {
                    let key = (a.min(b), a.max(b));
                    if seen.insert(key) {
                        pairs.push(key);
                    }
                }
            }
        }
        pairs
    }

    #[cfg(test)]
    pub fn occupied_cells(&self) -> usize {
        self.non_empty.len()
    }
}
