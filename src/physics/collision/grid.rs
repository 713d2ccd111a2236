//! The broad phase grid is responsible for detecting pairs of possibly
//! intersecting colliders for further, more accurate narrow phase inspection.

use itertools::Itertools;

use super::AABB;
use crate::{math as m, physics::ColliderKey};

/// Error for grid parameters that can't describe a grid.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigurationError {
    #[error("Grid resolution must be at least 1x1, got {columns}x{rows}")]
    ZeroResolution { columns: usize, rows: usize },
    #[error("Grid bounds must have positive width and height, got min {min:?} and max {max:?}")]
    InvalidBounds { min: [f64; 2], max: [f64; 2] },
    #[error("Grid bounds must be finite")]
    NonFinite,
    #[error("A {columns}x{rows} grid has more than {} cells", MAX_CELL_COUNT)]
    TooManyCells { columns: usize, rows: usize },
}

/// Upper limit for the total number of cells in a grid.
pub const MAX_CELL_COUNT: usize = 1 << 24;

/// Parameters for the creation of a broad phase grid.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct GridParams {
    /// Area covered by the grid.
    ///
    /// Colliders outside of the bounds are still detected,
    /// but they all end up in the cells along the edges,
    /// so keep the bounds around the area where things happen.
    pub bounds: AABB,
    /// Number of cells along the x and y axes.
    ///
    /// Cells should be a little larger than typical colliders so that
    /// each cell only contains a handful of colliders at a time.
    pub resolution: [usize; 2],
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            bounds: AABB::new(m::Vec2::new(-40.0, -10.0), m::Vec2::new(40.0, 10.0)),
            resolution: [80, 20],
        }
    }
}

impl GridParams {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let [columns, rows] = self.resolution;
        if columns == 0 || rows == 0 {
            return Err(ConfigurationError::ZeroResolution { columns, rows });
        }
        match columns.checked_mul(rows) {
            Some(count) if count <= MAX_CELL_COUNT => {}
            _ => return Err(ConfigurationError::TooManyCells { columns, rows }),
        }
        if !self.bounds.is_finite() {
            return Err(ConfigurationError::NonFinite);
        }
        if self.bounds.width() <= 0.0 || self.bounds.height() <= 0.0 {
            let (min, max) = (self.bounds.min(), self.bounds.max());
            return Err(ConfigurationError::InvalidBounds {
                min: [min.x, min.y],
                max: [max.x, max.y],
            });
        }
        Ok(())
    }
}

/// A uniform grid over a rectangular area.
///
/// Every cell holds the keys of the colliders whose AABB touches it,
/// so large colliders appear in many cells and the same pair of colliders
/// can be reported by more than one cell.
/// Use a [`PairSet`][super::PairSet] to deduplicate them.
///
/// The grid is always in a valid configuration,
/// since configuration changes are checked before they're applied.
#[derive(Clone, Debug)]
pub struct Grid {
    bounds: AABB,
    column_count: usize,
    row_count: usize,
    cell_size: m::Vec2,
    /// Row-major, indexed by `row * column_count + column`.
    cells: Vec<Vec<ColliderKey>>,
}

impl Grid {
    pub fn new(params: GridParams) -> Result<Self, ConfigurationError> {
        params.validate()?;
        let [column_count, row_count] = params.resolution;
        let grid = Self {
            bounds: params.bounds,
            column_count,
            row_count,
            cell_size: cell_size(&params),
            cells: vec![Vec::new(); column_count * row_count],
        };
        log::debug!(
            "Created a {}x{} grid with cell size {:?}",
            column_count,
            row_count,
            grid.cell_size
        );
        Ok(grid)
    }

    /// Change the bounds and resolution of the grid. This removes everything from it.
    ///
    /// If the parameters are invalid, the grid is left unchanged.
    pub fn configure(
        &mut self,
        bounds: AABB,
        resolution: [usize; 2],
    ) -> Result<(), ConfigurationError> {
        *self = Self::new(GridParams { bounds, resolution })?;
        Ok(())
    }

    /// Change the resolution of the grid, keeping its bounds.
    /// This removes everything from the grid.
    #[inline]
    pub fn set_resolution(&mut self, resolution: [usize; 2]) -> Result<(), ConfigurationError> {
        self.configure(self.bounds, resolution)
    }

    #[inline]
    pub fn params(&self) -> GridParams {
        GridParams {
            bounds: self.bounds,
            resolution: self.resolution(),
        }
    }

    #[inline]
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    #[inline]
    pub fn resolution(&self) -> [usize; 2] {
        [self.column_count, self.row_count]
    }

    #[inline]
    pub fn cell_size(&self) -> m::Vec2 {
        self.cell_size
    }

    /// Remove all colliders from the grid.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Insert a collider into every cell its AABB touches.
    pub fn insert(&mut self, key: ColliderKey, aabb: &AABB) {
        let ([min_col, min_row], [max_col, max_row]) = self.cell_range(aabb);
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                self.cells[row * self.column_count + col].push(key);
            }
        }
    }

    /// Clear the grid and fill it with the given colliders.
    pub fn rebuild<'a>(&mut self, colliders: impl IntoIterator<Item = (ColliderKey, &'a AABB)>) {
        self.clear();
        for (key, aabb) in colliders {
            self.insert(key, aabb);
        }
    }

    /// The cell containing a point, with points outside the bounds
    /// clamped to the nearest edge cell.
    pub fn cell_at_point(&self, point: m::Vec2) -> [usize; 2] {
        let rel = (point - self.bounds.min()) / self.cell_size;
        [
            clamp_index(rel.x, self.column_count),
            clamp_index(rel.y, self.row_count),
        ]
    }

    /// The inclusive range of cells touched by an AABB, as `(min, max)` indices.
    #[inline]
    pub fn cell_range(&self, aabb: &AABB) -> ([usize; 2], [usize; 2]) {
        (self.cell_at_point(aabb.min()), self.cell_at_point(aabb.max()))
    }

    /// Colliders in the cell at the given column and row,
    /// or `None` if the cell is out of range.
    pub fn cell(&self, column: usize, row: usize) -> Option<&[ColliderKey]> {
        if column >= self.column_count || row >= self.row_count {
            return None;
        }
        Some(&self.cells[row * self.column_count + column])
    }

    /// Iterate over all cells that have colliders in them,
    /// along with their `[column, row]` indices.
    pub fn occupied_cells(&self) -> impl '_ + Iterator<Item = ([usize; 2], &[ColliderKey])> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(idx, cell)| {
                (
                    [idx % self.column_count, idx / self.column_count],
                    cell.as_slice(),
                )
            })
    }

    /// Every unordered pair of colliders that share a cell.
    ///
    /// Pairs sharing more than one cell are yielded once per shared cell.
    pub fn candidate_pairs_per_cell(
        &self,
    ) -> impl '_ + Iterator<Item = (ColliderKey, ColliderKey)> {
        self.occupied_cells().flat_map(|(_, cell)| {
            cell.iter()
                .copied()
                .tuple_combinations::<(ColliderKey, ColliderKey)>()
        })
    }

    /// Colliders in all cells touched by the given AABB.
    /// A collider in more than one of these cells is yielded more than once.
    pub fn colliders_near(&self, aabb: &AABB) -> impl '_ + Iterator<Item = ColliderKey> {
        let ([min_col, min_row], [max_col, max_row]) = self.cell_range(aabb);
        (min_row..=max_row)
            .cartesian_product(min_col..=max_col)
            .flat_map(move |(row, col)| self.cells[row * self.column_count + col].iter().copied())
    }
}

fn cell_size(params: &GridParams) -> m::Vec2 {
    let [columns, rows] = params.resolution;
    m::Vec2::new(
        params.bounds.width() / columns as f64,
        params.bounds.height() / rows as f64,
    )
}

/// Convert a position in cell units into a cell index in `0..count`.
#[inline]
fn clamp_index(pos: f64, count: usize) -> usize {
    // f64::max also maps NaN to 0
    pos.floor().max(0.0).min((count - 1) as f64) as usize
}
