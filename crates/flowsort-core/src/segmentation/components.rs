use std::collections::VecDeque;

use ndarray::Array2;

use super::config::Connectivity;

/// One blob in a [`Labeling`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentStats {
    pub label: u32,
    /// Pixel count.
    pub area: usize,
    /// Inclusive (min_row, max_row, min_col, max_col).
    pub bbox: (usize, usize, usize, usize),
}

impl ComponentStats {
    pub fn bbox_height(&self) -> usize {
        self.bbox.1 - self.bbox.0 + 1
    }

    pub fn bbox_width(&self) -> usize {
        self.bbox.3 - self.bbox.2 + 1
    }

    /// Whether the bounding box reaches any edge of a `(rows, cols)` image.
    pub fn touches_edge(&self, (rows, cols): (usize, usize)) -> bool {
        let (top, bottom, left, right) = self.bbox;
        top == 0 || left == 0 || bottom + 1 >= rows || right + 1 >= cols
    }

    fn grow(&mut self, row: usize, col: usize) {
        self.area += 1;
        self.bbox.0 = self.bbox.0.min(row);
        self.bbox.1 = self.bbox.1.max(row);
        self.bbox.2 = self.bbox.2.min(col);
        self.bbox.3 = self.bbox.3.max(col);
    }
}

/// Label image plus per-component statistics.
#[derive(Clone, Debug)]
pub struct Labeling {
    /// 0 for background, otherwise the component label.
    pub labels: Array2<u32>,
    /// Sorted by area descending, ties broken by ascending label.
    pub components: Vec<ComponentStats>,
}

impl Labeling {
    /// Boolean mask of the pixels carrying `label`.
    pub fn mask_of(&self, label: u32) -> Array2<bool> {
        self.labels.mapv(|l| l == label && label != 0)
    }
}

/// Flood-fill labelling of a binary mask.
///
/// Components are numbered from 1 in the raster order of their first pixel,
/// so the result depends only on the mask and the connectivity.
pub fn label_components(mask: &Array2<bool>, connectivity: Connectivity) -> Labeling {
    let (h, w) = mask.dim();
    let mut labels = Array2::<u32>::zeros((h, w));
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for ((row, col), &set) in mask.indexed_iter() {
        if !set || labels[[row, col]] != 0 {
            continue;
        }
        let label = components.len() as u32 + 1;
        let mut stats = ComponentStats {
            label,
            area: 0,
            bbox: (row, row, col, col),
        };
        labels[[row, col]] = label;
        queue.push_back((row, col));

        while let Some((r, c)) = queue.pop_front() {
            stats.grow(r, c);
            for &(dr, dc) in offsets(connectivity) {
                let (Some(nr), Some(nc)) = (r.checked_add_signed(dr), c.checked_add_signed(dc)) else {
                    continue;
                };
                if nr < h && nc < w && mask[[nr, nc]] && labels[[nr, nc]] == 0 {
                    labels[[nr, nc]] = label;
                    queue.push_back((nr, nc));
                }
            }
        }
        components.push(stats);
    }

    components.sort_by(|a, b| b.area.cmp(&a.area).then(a.label.cmp(&b.label)));
    Labeling { labels, components }
}

/// Keep only the largest connected component of `mask`.
///
/// Returns the retained mask and its statistics, or an empty mask and `None`
/// when there is no foreground.
pub fn largest_component(
    mask: &Array2<bool>,
    connectivity: Connectivity,
) -> (Array2<bool>, Option<ComponentStats>) {
    let labeling = label_components(mask, connectivity);
    match labeling.components.first() {
        Some(largest) => (labeling.mask_of(largest.label), Some(largest.clone())),
        None => (Array2::from_elem(mask.dim(), false), None),
    }
}

fn offsets(connectivity: Connectivity) -> &'static [(isize, isize)] {
    const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
    const EIGHT: [(isize, isize); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];
    match connectivity {
        Connectivity::Four => &FOUR,
        Connectivity::Eight => &EIGHT,
    }
}
