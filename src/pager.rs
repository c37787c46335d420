//! Stateless page-window arithmetic
//!
//! The browse position is not persisted server-side: it round-trips
//! through the postback payload and comes back as untrusted input. The
//! window is therefore always recomputed against the authoritative total,
//! with the requested cursor clamped to the last real page first.

use crate::ids::ProductId;

/// Fixed number of items per browse page
pub const PAGE_SIZE: usize = 5;

/// Navigation requested by the pressed button
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavDirection {
    /// Fresh entry into a browse: back to page one
    None,
    Back,
    Next,
    /// Redisplay at the current (clamped) position, used after a
    /// selection toggle
    Hold,
}

/// Visible window over an ordered candidate list, 1-based inclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
    /// Zero-based page index to round-trip in the next payload
    pub cursor: usize,
}

/// Compute the visible window for a requested cursor and direction
pub fn page(total: usize, cursor: usize, direction: NavDirection) -> PageWindow {
    if total == 0 {
        return PageWindow {
            start: 0,
            end: 0,
            cursor: 0,
        };
    }

    let last_page = (total - 1) / PAGE_SIZE;
    let mut cursor = cursor.min(last_page);
    match direction {
        NavDirection::None => cursor = 0,
        NavDirection::Back => {
            if cursor > 0 {
                cursor -= 1;
            }
        }
        NavDirection::Next => {
            if (cursor + 1) * PAGE_SIZE < total {
                cursor += 1;
            }
        }
        NavDirection::Hold => {}
    }

    let start = cursor * PAGE_SIZE + 1;
    let end = (start + PAGE_SIZE - 1).min(total);
    PageWindow { start, end, cursor }
}

/// Toggle a candidate in the ordered selection: remove the first
/// occurrence if present, otherwise append. An involution.
pub fn toggle(markers: &[ProductId], id: ProductId) -> Vec<ProductId> {
    let mut out = markers.to_vec();
    match out.iter().position(|marker| *marker == id) {
        Some(position) => {
            out.remove(position);
        }
        None => out.push(id),
    }
    out
}
