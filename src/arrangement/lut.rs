//! The arrangement lookup table.
//!
//! A MessagePack file maps sign patterns of one or two planes at the tet
//! corners to precomputed arrangements. One-plane entries are keyed by the
//! outer index alone; two-plane entries may need a secondary inner index
//! derived from the orientations of the pairwise zero crossings along tet
//! edges. Keys involving an exact zero are unrepresentable and fall back to
//! the incremental kernel.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::predicates::{orient1d, Orientation};

use super::{Arrangement, ArrangementCell, ArrangementFace, BaryPlane, INVALID};

/// On-disk schema: `{ "start_index": [u32], "data": [entry] }` where an
/// entry is `[[point], [[vertices], plane, positive_cell, negative_cell],
/// [cell_faces]]`.
#[derive(Serialize, Deserialize)]
struct RawLut {
    start_index: Vec<u32>,
    data: Vec<RawEntry>,
}

#[derive(Serialize, Deserialize)]
struct RawEntry(Vec<[u32; 3]>, Vec<RawFace>, Vec<Vec<u32>>);

#[derive(Serialize, Deserialize)]
struct RawFace(Vec<u32>, u32, u32, u32);

/// Loaded lookup table for one- and two-plane arrangements.
#[derive(Debug, Default)]
pub struct Lut {
    start_index: Vec<u32>,
    data: Vec<Arrangement>,
}

impl Lut {
    /// Load from a MessagePack file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path).map_err(|e| Error::LookupTableMissing {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(&bytes).map_err(|reason| Error::LookupTableMissing {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Decode from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let raw: RawLut = rmp_serde::from_slice(bytes).map_err(|e| e.to_string())?;
        if raw.start_index.is_empty() {
            return Err("empty start_index".into());
        }
        if *raw.start_index.last().unwrap() as usize != raw.data.len() {
            return Err("start_index does not bracket data".into());
        }
        let data = raw
            .data
            .into_iter()
            .map(|RawEntry(vertices, faces, cells)| Arrangement {
                vertices,
                faces: faces
                    .into_iter()
                    .map(|RawFace(vertices, supporting_plane, positive_cell, negative_cell)| ArrangementFace {
                        vertices,
                        supporting_plane,
                        positive_cell,
                        negative_cell,
                    })
                    .collect(),
                cells: cells.into_iter().map(|faces| ArrangementCell { faces }).collect(),
                ..Default::default()
            })
            .collect();
        Ok(Self { start_index: raw.start_index, data })
    }

    /// Encode to MessagePack bytes (used to build table files).
    pub fn to_bytes(&self) -> Vec<u8> {
        let raw = RawLut {
            start_index: self.start_index.clone(),
            data: self
                .data
                .iter()
                .map(|a| {
                    RawEntry(
                        a.vertices.clone(),
                        a.faces
                            .iter()
                            .map(|f| RawFace(f.vertices.clone(), f.supporting_plane, f.positive_cell, f.negative_cell))
                            .collect(),
                        a.cells.iter().map(|c| c.faces.clone()).collect(),
                    )
                })
                .collect(),
        };
        rmp_serde::to_vec_named(&raw).expect("lookup table serialization cannot fail")
    }

    /// Assemble a table from bracketed entries.
    pub fn from_entries(start_index: Vec<u32>, data: Vec<Arrangement>) -> Self {
        assert!(*start_index.last().expect("non-empty start_index") as usize == data.len());
        Self { start_index, data }
    }

    /// Number of stored arrangements.
    #[inline] pub fn len(&self) -> usize { self.data.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Fast-path lookup for one or two planes; `None` means the caller must
    /// use the incremental kernel.
    pub(super) fn lookup(&self, planes: &[BaryPlane]) -> Option<&Arrangement> {
        match planes {
            [p0] => {
                let outer = outer_index_1(p0);
                if outer == INVALID {
                    return None;
                }
                let start = *self.start_index.get(outer as usize)? as usize;
                debug_assert!(self.start_index[outer as usize + 1] as usize == start + 1);
                self.data.get(start)
            }
            [p0, p1] => {
                let outer = outer_index_2(p0, p1);
                if outer == INVALID {
                    return None;
                }
                let start = *self.start_index.get(outer as usize)? as usize;
                let end = *self.start_index.get(outer as usize + 1)? as usize;
                if end == start + 1 {
                    self.data.get(start)
                } else if end > start {
                    let inner = inner_index_2(outer, p0, p1);
                    if inner == INVALID {
                        return None;
                    }
                    debug_assert!((inner as usize) < end - start);
                    self.data.get(start + inner as usize)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Outer key for a single plane: two bits per tet corner, the second plane
/// assumed negative everywhere so the two-plane table can be reused.
pub fn outer_index_1(p0: &BaryPlane) -> u32 {
    if p0.contains(&0.0) {
        // The plane passes through a tet vertex; not representable.
        return INVALID;
    }
    let mut index = 0u32;
    for (corner, &value) in p0.iter().enumerate() {
        if value > 0.0 {
            index |= 1 << (2 * corner);
        }
    }
    index
}

/// Outer key for a plane pair: two bits per tet corner.
pub fn outer_index_2(p0: &BaryPlane, p1: &BaryPlane) -> u32 {
    if p0.contains(&0.0) || p1.contains(&0.0) {
        return INVALID;
    }
    let mut index = 0u32;
    for corner in 0..4 {
        if p0[corner] > 0.0 {
            index |= 1 << (2 * corner);
        }
        if p1[corner] > 0.0 {
            index |= 1 << (2 * corner + 1);
        }
    }
    index
}

/// Inner key: orientation of the two planes' crossings on each tet edge
/// where both planes change sign.
pub fn inner_index_2(outer_index: u32, p0: &BaryPlane, p1: &BaryPlane) -> u32 {
    let corner_bits = |c: usize| (outer_index >> (2 * c)) & 3;

    let mut index = 0u32;
    let mut edge_count = 0u32;
    for (i, j) in [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)] {
        // Both planes cross edge (i, j) iff both bit pairs differ.
        if corner_bits(i) ^ corner_bits(j) != 3 {
            continue;
        }
        match orient1d([p0[i], p0[j]], [p1[i], p1[j]]) {
            Orientation::Positive => {
                index |= 1 << edge_count;
                edge_count += 1;
            }
            Orientation::Negative => {
                edge_count += 1;
            }
            Orientation::Zero | Orientation::Invalid => return INVALID,
        }
    }

    if edge_count == 4 {
        // Patterns 6 (0110) and 9 (1001) cannot occur; the table skips them.
        debug_assert!(index != 6 && index != 9);
        if index > 9 {
            index -= 2;
        } else if index > 6 {
            index -= 1;
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::super::compute_arrangement;
    use super::*;

    #[test]
    fn outer_index_bit_layout() {
        // All negative: zero. Positive corner k sets bit 2k.
        assert_eq!(outer_index_1(&[-1.0, -1.0, -1.0, -1.0]), 0);
        assert_eq!(outer_index_1(&[1.0, -1.0, -1.0, -1.0]), 1);
        assert_eq!(outer_index_1(&[-1.0, 1.0, -1.0, -1.0]), 4);
        assert_eq!(outer_index_1(&[-1.0, -1.0, 1.0, -1.0]), 16);
        assert_eq!(outer_index_1(&[-1.0, -1.0, -1.0, 1.0]), 64);
        assert_eq!(outer_index_1(&[1.0, 1.0, 1.0, 1.0]), 85);
        // Zero at a corner is unrepresentable.
        assert_eq!(outer_index_1(&[0.0, 1.0, -1.0, 1.0]), INVALID);
    }

    #[test]
    fn outer_index_2_interleaves_planes() {
        let p0 = [1.0, -1.0, -1.0, -1.0];
        let p1 = [-1.0, 1.0, -1.0, -1.0];
        assert_eq!(outer_index_2(&p0, &p1), 1 | 8);
    }

    #[test]
    fn inner_index_needs_shared_crossing_edges() {
        // Parallel cuts on the same edges: all four shared edges resolve.
        let p0 = [1.0, -3.0, -3.0, -3.0];
        let p1 = [3.0, -1.0, -1.0, -1.0];
        let outer = outer_index_2(&p0, &p1);
        let inner = inner_index_2(outer, &p0, &p1);
        assert_ne!(inner, INVALID);
    }

    #[test]
    fn msgpack_round_trip() {
        // Build a tiny one-plane table from the incremental kernel: outer
        // keys 0..256 for the single-plane sign patterns that occur.
        let mut start_index = vec![0u32];
        let mut data = Vec::new();
        for outer in 0u32..256 {
            // Single-plane keys only populate bits 2k; others stay empty.
            let corners: Vec<f64> = (0..4)
                .map(|c| if (outer >> (2 * c)) & 1 == 1 { 1.0 } else { -1.0 })
                .collect();
            let representable =
                (0..4).all(|c| (outer >> (2 * c + 1)) & 1 == 0) && outer_index_1(&[corners[0], corners[1], corners[2], corners[3]]) == outer;
            if representable {
                let plane = [corners[0], corners[1], corners[2], corners[3]];
                let arrangement = compute_arrangement(&[plane], None).unwrap();
                data.push((*arrangement).clone());
            }
            start_index.push(data.len() as u32);
        }
        let lut = Lut::from_entries(start_index, data);

        let bytes = lut.to_bytes();
        let reloaded = Lut::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.len(), lut.len());

        // The reloaded table answers a one-plane query identically to the
        // general path.
        let plane = [1.0, -1.0, -1.0, -1.0];
        let from_lut = reloaded.lookup(&[plane]).unwrap();
        let from_kernel = compute_arrangement(&[plane], None).unwrap();
        assert_eq!(from_lut.vertices.len(), from_kernel.vertices.len());
        assert_eq!(from_lut.faces.len(), from_kernel.faces.len());
        assert_eq!(from_lut.cells.len(), from_kernel.cells.len());

        // Degenerate key falls through.
        assert!(reloaded.lookup(&[[0.0, 1.0, -1.0, 1.0]]).is_none());
    }

    #[test]
    fn corrupt_bytes_are_rejected() {
        assert!(Lut::from_bytes(&[0xff, 0x00, 0x13]).is_err());
    }

    #[test]
    fn load_reads_a_table_file() {
        let arrangement = compute_arrangement(&[[1.0, -1.0, -1.0, -1.0]], None).unwrap();
        let lut = Lut::from_entries(vec![0, 1], vec![(*arrangement).clone()]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ia_lut.msgpack");
        std::fs::write(&path, lut.to_bytes()).unwrap();

        let reloaded = Lut::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn missing_table_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.msgpack");
        match Lut::load(&path) {
            Err(Error::LookupTableMissing { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected LookupTableMissing, got {other:?}"),
        }
    }
}
