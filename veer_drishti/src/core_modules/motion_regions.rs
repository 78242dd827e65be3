// THEORY:
// `motion_regions` is the spatial grouping step of the motion heuristic. It takes two
// grayscale projections of consecutive frames and answers "where did something move?"
// as a list of pixel regions.
//
// Algorithm steps:
// 1.  **Difference**: per-pixel absolute difference of the two luminance buffers.
// 2.  **Binarize**: a pixel is "hot" when its difference is strictly greater than the
//     threshold.
// 3.  **Region Growing**: every unvisited hot pixel seeds a depth-first flood fill over
//     its 8 neighbours. The fill collects the region's area (pixel count) and its
//     bounding rectangle.
//
// The module is stateless: it has no memory of earlier frames beyond the two buffers
// it is handed.

/// A connected group of changed pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionRegion {
    pub min_x: u32,
    pub min_y: u32,
    /// Inclusive.
    pub max_x: u32,
    /// Inclusive.
    pub max_y: u32,
    /// Number of changed pixels in the region.
    pub area: usize,
}

impl MotionRegion {
    /// The region's bounding rectangle as `(x, y, x + w, y + h)`.
    pub fn rect(&self) -> (u32, u32, u32, u32) {
        (self.min_x, self.min_y, self.max_x + 1, self.max_y + 1)
    }
}

/// Marks every pixel whose luminance changed by more than `threshold`.
pub fn binarize_difference(current: &[u8], previous: &[u8], threshold: u8) -> Vec<bool> {
    current
        .iter()
        .zip(previous)
        .map(|(&a, &b)| a.abs_diff(b) > threshold)
        .collect()
}

/// Finds all 8-connected regions of `true` cells in a row-major mask.
pub fn find_regions(mask: &[bool], width: u32, height: u32) -> Vec<MotionRegion> {
    let (w, h) = (width as usize, height as usize);
    if mask.len() != w * h {
        return Vec::new();
    }

    let mut visited = vec![false; mask.len()];
    let mut regions = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for seed in 0..mask.len() {
        if !mask[seed] || visited[seed] {
            continue;
        }

        visited[seed] = true;
        stack.push(seed);
        let mut region = MotionRegion {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            area: 0,
        };

        while let Some(index) = stack.pop() {
            let (x, y) = (index % w, index / w);
            region.area += 1;
            region.min_x = region.min_x.min(x as u32);
            region.min_y = region.min_y.min(y as u32);
            region.max_x = region.max_x.max(x as u32);
            region.max_y = region.max_y.max(y as u32);

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let neighbour = ny as usize * w + nx as usize;
                    if mask[neighbour] && !visited[neighbour] {
                        visited[neighbour] = true;
                        stack.push(neighbour);
                    }
                }
            }
        }

        regions.push(region);
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> (Vec<bool>, u32, u32) {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mask = rows.iter().flat_map(|r| r.chars().map(|c| c == '#')).collect();
        (mask, width, height)
    }

    #[test]
    fn threshold_is_strict() {
        let mask = binarize_difference(&[100, 130, 131, 0], &[100, 100, 100, 255], 30);
        assert_eq!(mask, vec![false, false, true, true]);
    }

    #[test]
    fn separates_disjoint_regions() {
        let (mask, w, h) = mask_from(&["##...", "##...", ".....", "....#"]);
        let regions = find_regions(&mask, w, h);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].area, 4);
        assert_eq!(regions[0].rect(), (0, 0, 2, 2));
        assert_eq!(regions[1].area, 1);
        assert_eq!(regions[1].rect(), (4, 3, 5, 4));
    }

    #[test]
    fn diagonal_neighbours_join() {
        let (mask, w, h) = mask_from(&["#..", ".#.", "..#"]);
        let regions = find_regions(&mask, w, h);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
        assert_eq!(regions[0].rect(), (0, 0, 3, 3));
    }

    #[test]
    fn mismatched_mask_yields_nothing() {
        assert!(find_regions(&[true, true], 3, 3).is_empty());
    }
}
