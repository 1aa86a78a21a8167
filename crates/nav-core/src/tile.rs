//! Tile arithmetic on the 31-bit grid.
//!
//! A [`TileId`] packs the tile column and row at a given zoom as
//! `(column << zoom) + row`.  The zoom is not stored in the id, so every call
//! that decodes one takes the zoom explicitly; the tile cache uses a single
//! zoom for its whole lifetime.

use crate::geo::{Area31, Point31};
use crate::TileId;

/// Zoom level at which road tiles are cached unless configured otherwise.
pub const DEFAULT_TILE_ZOOM: u32 = 16;

impl TileId {
    /// Tile containing `p` at `zoom` (`zoom <= 31`).
    #[inline]
    pub fn containing(p: Point31, zoom: u32) -> TileId {
        let shift = 31 - zoom.min(31);
        let col = u64::from(p.x >> shift);
        let row = u64::from(p.y >> shift);
        TileId((col << zoom) + row)
    }

    /// Column index at `zoom`.
    #[inline]
    pub fn column(self, zoom: u32) -> u32 {
        (self.0 >> zoom) as u32
    }

    /// Row index at `zoom`.
    #[inline]
    pub fn row(self, zoom: u32) -> u32 {
        (self.0 & ((1u64 << zoom) - 1)) as u32
    }

    /// Inclusive grid area covered by this tile.
    pub fn area(self, zoom: u32) -> Area31 {
        let shift = 31 - zoom.min(31);
        let size = 1u64 << shift;
        let left = u64::from(self.column(zoom)) << shift;
        let top = u64::from(self.row(zoom)) << shift;
        Area31::new(
            left as u32,
            top as u32,
            (left + size - 1) as u32,
            (top + size - 1) as u32,
        )
    }

    /// Side length of a tile at `zoom`, in 31-bit units.
    #[inline]
    pub fn side(zoom: u32) -> u32 {
        1u32 << (31 - zoom.min(31))
    }
}
