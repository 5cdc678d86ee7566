//! Connected-component labeling over an RGBA raster.
//!
//! Pass 1 visits pixels in row-major order, creating one forest node per
//! pixel and unioning it with each already-visited neighbor of exactly
//! the same RGB color. Because every adjacency is tested from exactly
//! one of its two pixels, the finished forest partitions the raster into
//! maximal same-color connected regions.
//!
//! Pass 2 resolves every node's representative and groups coordinates
//! into [`Segment`]s, folding bounding boxes as it goes.

use serde::{Deserialize, Serialize};

use crate::segment::{BoundingBox, Segment, SegmentId};
use crate::types::{PixelCoord, Rgb, RgbaImage};
use crate::union_find::DisjointSetForest;

/// Pixel adjacency used when growing regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge-adjacent neighbors only.
    #[default]
    Four,
    /// Edge- and corner-adjacent neighbors.
    Eight,
}

/// Options for [`label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelOptions {
    pub connectivity: Connectivity,
    /// Pixels of this color are not labeled and belong to no segment.
    pub background: Option<Rgb>,
}

/// Label every maximal connected same-color region of `raster`.
///
/// Segments are returned in the order their first pixel is met in a
/// row-major scan; members are listed in row-major order. A zero-size
/// raster yields no segments.
#[must_use]
pub fn label(raster: &RgbaImage, options: &LabelOptions) -> Vec<Segment> {
    let (width, height) = raster.dimensions();
    let w = width as usize;
    let len = w * height as usize;
    let colors: Vec<Rgb> = raster.pixels().map(|p| Rgb::from_rgba(*p)).collect();
    let labeled: Vec<bool> = colors
        .iter()
        .map(|&c| options.background != Some(c))
        .collect();

    let mut forest = DisjointSetForest::new(len);

    // Pass 1: union with already-visited neighbors.
    for y in 0..height as usize {
        for x in 0..w {
            let i = y * w + x;
            if !labeled[i] {
                continue;
            }
            for n in visited_neighbors(x, y, w, options.connectivity)
                .into_iter()
                .flatten()
            {
                if labeled[n] && colors[n] == colors[i] {
                    forest.union(i, n);
                }
            }
        }
    }

    // Pass 2: materialize one segment per representative.
    let mut slot_of_root = vec![usize::MAX; len];
    let mut segments: Vec<(PixelCoord, BoundingBox, Vec<PixelCoord>)> = Vec::new();
    for i in 0..len {
        if !labeled[i] {
            continue;
        }
        let root = forest.find(i);
        #[allow(clippy::cast_possible_truncation)]
        let coord = PixelCoord::new((i % w) as u32, (i / w) as u32);
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = segments.len();
            #[allow(clippy::cast_possible_truncation)]
            let root_coord = PixelCoord::new((root % w) as u32, (root / w) as u32);
            segments.push((root_coord, BoundingBox::around(coord), Vec::new()));
        }
        let (_, bounds, members) = &mut segments[slot_of_root[root]];
        bounds.include(coord);
        members.push(coord);
    }

    log::debug!(
        "labeled {}x{} raster into {} segments",
        width,
        height,
        segments.len()
    );

    segments
        .into_iter()
        .enumerate()
        .map(|(id, (root, bounds, members))| {
            let color = colors[root.y as usize * w + root.x as usize];
            Segment::from_parts(SegmentId(id), root, color, bounds, members)
        })
        .collect()
}

/// Indices of the neighbors of `(x, y)` that a row-major scan has
/// already visited: west and north, plus north-west and north-east for
/// eight-connectivity.
const fn visited_neighbors(
    x: usize,
    y: usize,
    width: usize,
    connectivity: Connectivity,
) -> [Option<usize>; 4] {
    let i = y * width + x;
    let west = if x > 0 { Some(i - 1) } else { None };
    let north = if y > 0 { Some(i - width) } else { None };
    let (north_west, north_east) = match connectivity {
        Connectivity::Four => (None, None),
        Connectivity::Eight => (
            if x > 0 && y > 0 {
                Some(i - width - 1)
            } else {
                None
            },
            if x + 1 < width && y > 0 {
                Some(i - width + 1)
            } else {
                None
            },
        ),
    };
    [west, north, north_west, north_east]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use image::Rgba;

    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn red_block_on_black() -> RgbaImage {
        RgbaImage::from_fn(4, 4, |x, y| if x < 2 && y < 2 { RED } else { BLACK })
    }

    #[test]
    fn red_block_and_black_background() {
        let segments = label(&red_block_on_black(), &LabelOptions::default());
        assert_eq!(segments.len(), 2);

        let red = segments
            .iter()
            .find(|s| s.label_color() == Rgb::new(255, 0, 0))
            .unwrap();
        assert_eq!(red.len(), 4);
        assert_eq!(
            red.bounds(),
            BoundingBox {
                north: 0,
                south: 1,
                east: 1,
                west: 0,
            }
        );

        let black = segments
            .iter()
            .find(|s| s.label_color() == Rgb::BLACK)
            .unwrap();
        assert_eq!(black.len(), 12);
        assert_eq!(
            black.bounds(),
            BoundingBox {
                north: 0,
                south: 3,
                east: 3,
                west: 0,
            }
        );
    }

    #[test]
    fn empty_raster_has_no_segments() {
        let img = RgbaImage::new(0, 0);
        assert!(label(&img, &LabelOptions::default()).is_empty());
    }

    #[test]
    fn diagonal_pixels_are_separate_under_four_connectivity() {
        // Checkerboard: no two same-colored pixels share an edge.
        let img = RgbaImage::from_fn(3, 3, |x, y| if (x + y) % 2 == 0 { RED } else { BLACK });
        let four = label(&img, &LabelOptions::default());
        assert_eq!(four.len(), 9);
        assert!(four.iter().all(|s| s.len() == 1));

        let eight = label(
            &img,
            &LabelOptions {
                connectivity: Connectivity::Eight,
                background: None,
            },
        );
        assert_eq!(eight.len(), 2);
    }

    #[test]
    fn same_color_disconnected_regions_are_distinct() {
        // Two red columns separated by a black column.
        let img = RgbaImage::from_fn(3, 2, |x, _| if x == 1 { BLACK } else { RED });
        let segments = label(&img, &LabelOptions::default());
        assert_eq!(segments.len(), 3);
        let reds = segments
            .iter()
            .filter(|s| s.label_color() == Rgb::new(255, 0, 0))
            .count();
        assert_eq!(reds, 2);
    }

    #[test]
    fn u_shape_merges_through_late_join() {
        // The two arms of the U only meet on the bottom row, so the
        // union happens after both arms already have representatives.
        let img = RgbaImage::from_fn(3, 3, |x, y| if x == 1 && y < 2 { BLACK } else { RED });
        let segments = label(&img, &LabelOptions::default());
        assert_eq!(segments.len(), 2);
        let red = segments
            .iter()
            .find(|s| s.label_color() == Rgb::new(255, 0, 0))
            .unwrap();
        assert_eq!(red.len(), 7);
    }

    #[test]
    fn alpha_is_ignored_when_comparing_colors() {
        let img = RgbaImage::from_fn(2, 1, |x, _| Rgba([7, 7, 7, if x == 0 { 255 } else { 10 }]));
        assert_eq!(label(&img, &LabelOptions::default()).len(), 1);
    }

    #[test]
    fn background_pixels_are_skipped() {
        let segments = label(
            &red_block_on_black(),
            &LabelOptions {
                connectivity: Connectivity::Four,
                background: Some(Rgb::BLACK),
            },
        );
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 4);
    }

    #[test]
    fn segments_partition_the_raster() {
        // A small deterministic pattern with several colors.
        let palette = [RED, BLACK, Rgba([0, 0, 255, 255])];
        let img = RgbaImage::from_fn(7, 5, |x, y| palette[((x + y * y) % 3) as usize]);
        let segments = label(&img, &LabelOptions::default());

        let mut seen = HashSet::new();
        for segment in &segments {
            assert!(!segment.is_empty());
            let bounds = segment.bounds();
            assert!(bounds.north <= bounds.south);
            assert!(bounds.west <= bounds.east);
            for &c in segment.members() {
                assert!(bounds.contains(c));
                assert!(seen.insert(c), "pixel {c:?} in more than one segment");
                assert_eq!(Rgb::from_rgba(*img.get_pixel(c.x, c.y)), segment.label_color());
            }
        }
        assert_eq!(seen.len(), 35);
    }

    #[test]
    fn root_is_a_member() {
        let segments = label(&red_block_on_black(), &LabelOptions::default());
        for segment in &segments {
            assert!(segment.members().contains(&segment.root()));
        }
    }
}
