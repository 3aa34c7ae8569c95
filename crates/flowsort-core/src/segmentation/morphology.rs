use ndarray::{s, Array2};

use super::components::label_components;
use super::config::Connectivity;

/// Morphological opening (erosion followed by dilation) with a 3x3 square
/// kernel, each repeated `iterations` times.
///
/// Removes isolated pixels and jagged spurs while keeping larger regions.
pub fn morphological_opening(mask: &Array2<bool>, iterations: usize) -> Array2<bool> {
    let mut result = mask.clone();
    for _ in 0..iterations {
        result = erode(&result);
    }
    for _ in 0..iterations {
        result = dilate(&result);
    }
    result
}

/// Fill background regions enclosed by foreground whose area is below
/// `max_area` pixels. Regions touching the image border are never holes.
///
/// `connectivity` is the foreground's. Background is labelled with the dual
/// adjacency, so a gap that only touches at corners still counts as open
/// when the foreground is 4-connected.
pub fn fill_holes(mask: &Array2<bool>, max_area: usize, connectivity: Connectivity) -> Array2<bool> {
    if mask.is_empty() {
        return mask.clone();
    }

    let background = mask.mapv(|v| !v);
    let labeling = label_components(&background, connectivity.dual());

    let mut fill = vec![false; labeling.components.iter().map(|c| c.label as usize + 1).max().unwrap_or(0)];
    for comp in &labeling.components {
        if comp.area < max_area && !comp.touches_edge(mask.dim()) {
            fill[comp.label as usize] = true;
        }
    }

    let mut result = mask.clone();
    ndarray::Zip::from(&mut result)
        .and(&labeling.labels)
        .for_each(|out, &label| {
            if label != 0 && fill[label as usize] {
                *out = true;
            }
        });
    result
}

/// Binary erosion: a pixel stays set only if its whole 3x3 neighbourhood is
/// set. Out-of-bounds neighbours count as unset.
pub fn erode(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    Array2::from_shape_fn((h, w), |(row, col)| {
        row > 0
            && col > 0
            && row + 1 < h
            && col + 1 < w
            && mask
                .slice(s![row - 1..=row + 1, col - 1..=col + 1])
                .iter()
                .all(|&v| v)
    })
}

/// Binary dilation: a pixel is set when any pixel of its 3x3 neighbourhood is
/// set. The neighbourhood is clipped at the frame edge.
pub fn dilate(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    Array2::from_shape_fn((h, w), |(row, col)| {
        mask.slice(s![
            row.saturating_sub(1)..(row + 2).min(h),
            col.saturating_sub(1)..(col + 2).min(w)
        ])
        .iter()
        .any(|&v| v)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(size: usize, inner: usize) -> Array2<bool> {
        // Square ring: outer `size`, hole of side `inner` in the middle.
        let off = (size - inner) / 2;
        Array2::from_shape_fn((size + 4, size + 4), |(r, c)| {
            let (r, c) = (r as i64 - 2, c as i64 - 2);
            let inside = r >= 0 && c >= 0 && r < size as i64 && c < size as i64;
            let in_hole = r >= off as i64
                && c >= off as i64
                && r < (off + inner) as i64
                && c < (off + inner) as i64;
            inside && !in_hole
        })
    }

    #[test]
    fn test_fill_small_hole() {
        let mask = ring(10, 4);
        let filled = fill_holes(&mask, 100, Connectivity::Four);
        assert_eq!(filled.iter().filter(|&&v| v).count(), 100);
    }

    #[test]
    fn test_large_hole_kept() {
        let mask = ring(10, 4);
        let filled = fill_holes(&mask, 16, Connectivity::Four);
        assert_eq!(filled, mask);
    }

    /// Diamond outline: closed under 8-adjacency, open at every corner step
    /// under 4-adjacency.
    fn diamond(radius: usize) -> Array2<bool> {
        let side = 2 * radius + 3;
        let centre = (radius + 1) as i64;
        Array2::from_shape_fn((side, side), |(r, c)| {
            (r as i64 - centre).abs() + (c as i64 - centre).abs() == radius as i64
        })
    }

    #[test]
    fn test_diagonal_gaps_are_not_holes_for_four_connected_foreground() {
        let mask = diamond(4);
        assert_eq!(fill_holes(&mask, 1000, Connectivity::Four), mask);
    }

    #[test]
    fn test_diagonal_outline_encloses_hole_for_eight_connected_foreground() {
        let mask = diamond(4);
        let filled = fill_holes(&mask, 1000, Connectivity::Eight);
        // Outline (16) plus the 25 interior pixels.
        assert_eq!(filled.iter().filter(|&&v| v).count(), 41);
        assert!(filled[[5, 5]]);
    }

    #[test]
    fn test_dilate_clips_at_edges() {
        let mut mask = Array2::from_elem((4, 5), false);
        mask[[0, 0]] = true;
        let grown = dilate(&mask);
        assert_eq!(grown.iter().filter(|&&v| v).count(), 4);
        assert!(grown[[1, 1]]);
        assert!(!grown[[2, 2]]);
    }

    #[test]
    fn test_opening_removes_speck() {
        let mut mask = Array2::from_elem((20, 20), false);
        for r in 5..15 {
            for c in 5..15 {
                mask[[r, c]] = true;
            }
        }
        mask[[1, 1]] = true;
        let opened = morphological_opening(&mask, 1);
        assert!(!opened[[1, 1]]);
        assert_eq!(opened.iter().filter(|&&v| v).count(), 100);
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let mut mask = Array2::from_elem((6, 6), false);
        mask[[2, 3]] = true;
        assert_eq!(morphological_opening(&mask, 0), mask);
    }
}
