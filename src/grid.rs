//! Simulation grid sizing derived from the host surface.

/// Cell resolution of the simulation domain. Derived from the surface pixel
/// size and the configured resolution scale; only changes on an explicit
/// resize, never mid-step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    /// Derive grid dimensions from the surface size in physical pixels.
    /// A surface that has not been laid out yet (zero-sized) clamps to 1x1
    /// so the pipeline stays structurally valid.
    pub fn from_surface(surface_width: u32, surface_height: u32, resolution_scale: f32) -> Self {
        let scale = |px: u32| ((resolution_scale * px as f32).round() as u32).max(1);
        Self {
            width: scale(surface_width),
            height: scale(surface_height),
        }
    }

    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// One cell in normalized surface coordinates.
    pub fn cell_scale(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    /// Margin kept out of the interior update region. Zero in bounded
    /// (bounce) mode, where an explicit reflection pass owns the edges; one
    /// cell in open mode, where the outermost ring is left untouched.
    pub fn boundary_space(&self, bounded: bool) -> [f32; 2] {
        if bounded {
            [0.0, 0.0]
        } else {
            self.cell_scale()
        }
    }

    /// Aspect-correction factor applied to advection offsets so a velocity
    /// of a given magnitude covers the same on-screen distance on both axes.
    pub fn aspect_ratio(&self) -> [f32; 2] {
        let longest = self.width.max(self.height) as f32;
        [longest / self.width as f32, longest / self.height as f32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_matches_scaled_surface() {
        let grid = GridSize::from_surface(400, 300, 0.5);
        assert_eq!(grid, GridSize { width: 200, height: 150 });
    }

    #[test]
    fn grid_rounds_to_nearest_cell() {
        let grid = GridSize::from_surface(333, 250, 0.5);
        assert_eq!(grid.width, 167); // 166.5 rounds up
        assert_eq!(grid.height, 125);
    }

    #[test]
    fn degenerate_surface_clamps_to_one_cell() {
        let grid = GridSize::from_surface(0, 0, 0.5);
        assert_eq!(grid, GridSize { width: 1, height: 1 });
        assert_eq!(GridSize::from_surface(1, 1, 0.1).cells(), 1);
    }

    #[test]
    fn cell_scale_is_reciprocal_of_dimensions() {
        let grid = GridSize::from_surface(200, 100, 1.0);
        assert_eq!(grid.cell_scale(), [1.0 / 200.0, 1.0 / 100.0]);
    }

    #[test]
    fn boundary_space_follows_domain_mode() {
        let grid = GridSize::from_surface(128, 64, 1.0);
        assert_eq!(grid.boundary_space(true), [0.0, 0.0]);
        assert_eq!(grid.boundary_space(false), grid.cell_scale());
    }

    #[test]
    fn aspect_ratio_normalizes_to_longest_axis() {
        let grid = GridSize::from_surface(200, 100, 1.0);
        assert_eq!(grid.aspect_ratio(), [1.0, 2.0]);
    }
}
