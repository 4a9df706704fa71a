//! Sign propagation over the cell-adjacency graph and the boolean-driven
//! surface filter.
//!
//! A cell bounded by the odd (negative-side) half of a patch lies inside
//! that patch's function; crossing the patch flips the function's sign and
//! nothing else. Functions that never appear on a patch are settled per
//! cell by testing the cell's representative vertex for containment.

use std::collections::VecDeque;

use crate::containers::{DynamicBitset, FlatMap};
use crate::error::{Error, Result};
use crate::scene::{BlobTree, BoolOp, NodeKind, Scene};

use super::{FilteredSurface, SurfaceNetworkProcessor, INVALID};

/// Map shell id -> arrangement cell id.
fn shell_to_cell(proc: &SurfaceNetworkProcessor) -> Vec<u32> {
    let mut map = vec![INVALID; proc.shells.len()];
    for (cell, shells) in proc.arrangement_cells.iter().enumerate() {
        for &shell in shells {
            map[shell as usize] = cell as u32;
        }
    }
    map
}

/// A cell is inside a patch's function iff it is bounded by the patch's odd
/// (negative-side) half.
#[inline]
fn inside_sign(half_patch: u32) -> bool {
    half_patch % 2 == 1
}

/// The cell on the other side of a half-patch: where its sibling's shell
/// lives.
#[inline]
fn opposite_cell(proc: &SurfaceNetworkProcessor, shell_to_cell: &[u32], half_patch: u32) -> u32 {
    shell_to_cell[proc.shell_of_half_patch[(half_patch ^ 1) as usize] as usize]
}

/// BFS the cell-adjacency graph and label every (function, cell) pair.
pub(super) fn propagate_labels(
    proc: &SurfaceNetworkProcessor,
    scene: &Scene,
) -> Result<Vec<DynamicBitset>> {
    let num_functions = scene.primitive_count();
    let num_cells = proc.arrangement_cells.len();
    let shell_to_cell = shell_to_cell(proc);

    let mut labels = vec![DynamicBitset::new(num_cells, false); num_functions];
    if num_cells == 0 {
        // No surface anywhere in the domain.
        return Ok(labels);
    }
    let mut visited_cells = DynamicBitset::new(num_cells, false);
    let mut visited_functions = DynamicBitset::new(num_functions, false);
    let mut inactive_stacks: Vec<Vec<u32>> = vec![Vec::new(); num_functions];
    let mut queue = VecDeque::from([0u32]);

    while let Some(cell_index) = queue.pop_front() {
        if visited_cells.get(cell_index as usize) {
            continue;
        }
        visited_cells.set(cell_index as usize, true);

        // Neighbours of this cell with the (function, sign) of the patch
        // between, keyed by cell id for deterministic traversal.
        let mut neighbors: FlatMap<u32, (u32, bool)> = FlatMap::new();
        for &shell in &proc.arrangement_cells[cell_index as usize] {
            for &half_patch in &proc.shells[shell as usize] {
                let function = proc.patch_functions[(half_patch / 2) as usize];
                let sign = inside_sign(half_patch);
                let opposite = opposite_cell(proc, &shell_to_cell, half_patch);
                neighbors.insert(opposite, (function, sign));

                if visited_functions.get(function as usize)
                    && labels[function as usize].get(cell_index as usize) != sign
                {
                    return Err(Error::InconsistentCellLabel { cell: cell_index, primitive: function });
                }
                labels[function as usize].set(cell_index as usize, sign);
                visited_functions.set(function as usize, true);
                // Back-fill cells recorded before the function was first seen.
                if !inactive_stacks[function as usize].is_empty() {
                    for &cell in &inactive_stacks[function as usize] {
                        labels[function as usize].set(cell as usize, sign);
                    }
                    inactive_stacks[function as usize].clear();
                }
            }
        }

        // Functions still unseen: remember the cells whose labels must be
        // back-filled when (if ever) the function appears.
        for function in 0..num_functions {
            if !visited_functions.get(function) {
                inactive_stacks[function].push(cell_index);
                for (&other, _) in neighbors.iter() {
                    inactive_stacks[function].push(other);
                }
            }
        }

        // Seed the neighbours: same labels with the crossing function
        // flipped.
        for (&other, &(function, sign)) in neighbors.iter() {
            if !visited_cells.get(other as usize) {
                for f in 0..num_functions {
                    let bit = labels[f].get(cell_index as usize);
                    labels[f].set(other as usize, bit);
                }
                labels[function as usize].set(other as usize, !sign);
                queue.push_back(other);
            }
        }
    }

    // Functions absent from every patch fully contain or entirely miss each
    // cell: settle them by testing the cell's representative vertex.
    for function in 0..num_functions {
        if visited_functions.get(function) {
            continue;
        }
        for (cell, shells) in proc.arrangement_cells.iter().enumerate() {
            let representative_shell = &proc.shells[shells[0] as usize];
            let representative_patch = &proc.patches[(representative_shell[0] / 2) as usize];
            let representative_face = &proc.iso_faces[representative_patch[0] as usize];
            let representative = proc.iso_vertices[representative_face.vertices[0] as usize];
            labels[function].set(cell, scene.contains(function as u32, representative));
        }
    }

    Ok(labels)
}

/// Post-order the blobtree over the label columns, yielding the active
/// cells of the boolean expression.
fn filter_cells(tree: &BlobTree, root: u32, labels: &[DynamicBitset], num_cells: usize) -> Result<DynamicBitset> {
    fn evaluate(
        tree: &BlobTree,
        node_id: u32,
        labels: &[DynamicBitset],
        depth: usize,
    ) -> Result<DynamicBitset> {
        if node_id == INVALID || node_id as usize >= tree.node_count() {
            return Err(Error::BlobtreeEvaluationFailed(format!("missing node {node_id}")));
        }
        if depth > tree.node_count() {
            return Err(Error::BlobtreeEvaluationFailed("tree depth exceeds node count".into()));
        }
        let node = tree.node(node_id);
        match node.kind {
            NodeKind::Leaf { primitive } => labels
                .get(primitive as usize)
                .cloned()
                .ok_or_else(|| Error::BlobtreeEvaluationFailed(format!("leaf references primitive {primitive}"))),
            NodeKind::Operation(op) => {
                let mut left = evaluate(tree, node.left, labels, depth + 1)?;
                let right = evaluate(tree, node.right, labels, depth + 1)?;
                match op {
                    BoolOp::Union => left |= &right,
                    BoolOp::Intersection => left &= &right,
                    BoolOp::Difference => {
                        let flipped = right.flipped();
                        left &= &flipped;
                    }
                }
                Ok(left)
            }
        }
    }

    if num_cells == 0 {
        return Ok(DynamicBitset::default());
    }
    evaluate(tree, root, labels, 0)
}

/// Stage I: boolean evaluation, boundary extraction, and integrals.
pub(super) fn filter_surface(
    proc: &SurfaceNetworkProcessor,
    scene: &Scene,
    root: u32,
    face_areas: &[f64],
    face_volumes: &[f64],
) -> Result<FilteredSurface> {
    assert!(face_areas.len() == proc.iso_faces.len(), "one area per iso-face");
    assert!(face_volumes.len() == proc.iso_faces.len(), "one volume part per iso-face");

    let num_cells = proc.arrangement_cells.len();
    let active = filter_cells(scene.tree(), root, &proc.cell_labels, num_cells)?;

    // Aggregate the caller-supplied per-face integrals per patch.
    let mut patch_area = vec![0.0f64; proc.patches.len()];
    let mut patch_volume = vec![0.0f64; proc.patches.len()];
    for (patch, faces) in proc.patches.iter().enumerate() {
        for &face in faces {
            patch_area[patch] += face_areas[face as usize];
            patch_volume[patch] += face_volumes[face as usize];
        }
    }

    let shell_to_cell = shell_to_cell(proc);
    let mut out = FilteredSurface::default();
    let mut visited = DynamicBitset::new(num_cells, false);
    let mut queue: VecDeque<u32> = VecDeque::new();
    if let Some(seed) = active.find_first() {
        queue.push_back(seed as u32);
    }

    while let Some(cell_index) = queue.pop_front() {
        if visited.get(cell_index as usize) || !active.get(cell_index as usize) {
            continue;
        }
        visited.set(cell_index as usize, true);

        for &shell in &proc.arrangement_cells[cell_index as usize] {
            for &half_patch in &proc.shells[shell as usize] {
                let patch = (half_patch / 2) as usize;
                let odd = inside_sign(half_patch);
                let opposite = opposite_cell(proc, &shell_to_cell, half_patch);

                if !active.get(opposite as usize) {
                    // The boundary of the active region: emit the patch,
                    // counter-clockwise seen from outside the region.
                    for &face in &proc.patches[patch] {
                        let vertices = &proc.iso_faces[face as usize].vertices;
                        out.vertex_counts.push(vertices.len() as u32);
                        if odd {
                            out.faces.extend_from_slice(vertices);
                        } else {
                            out.faces.extend(vertices.iter().rev());
                        }
                    }
                    out.surface_area += patch_area[patch];
                } else if !visited.get(opposite as usize) {
                    queue.push_back(opposite);
                }

                // The moment telescopes over every processed half-patch,
                // signed by the outward side.
                out.volume += if odd { patch_volume[patch] } else { -patch_volume[patch] };
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Primitive;
    use glam::DVec3;

    fn label(bits: &[bool]) -> DynamicBitset {
        let mut set = DynamicBitset::new(bits.len(), false);
        for (i, &b) in bits.iter().enumerate() {
            set.set(i, b);
        }
        set
    }

    fn sphere_scene(n: usize) -> Scene {
        let mut scene = Scene::new();
        for i in 0..n {
            scene.add_primitive(Primitive::Sphere { center: DVec3::ZERO, radius: 1.0 + i as f64 });
        }
        scene
    }

    #[test]
    fn boolean_ops_on_label_columns() {
        // Three cells; two primitives.
        let labels = vec![label(&[true, true, false]), label(&[false, true, false])];

        let mut scene = sphere_scene(2);
        let a = 0;
        let b = 1;
        let union = scene.union(a, b);
        let active = filter_cells(scene.tree(), union, &labels, 3).unwrap();
        assert_eq!(active.iter_ones().collect::<Vec<_>>(), vec![0, 1]);

        let mut scene = sphere_scene(2);
        let inter = scene.intersect(0, 1);
        let active = filter_cells(scene.tree(), inter, &labels, 3).unwrap();
        assert_eq!(active.iter_ones().collect::<Vec<_>>(), vec![1]);

        let mut scene = sphere_scene(2);
        let diff = scene.difference(0, 1);
        let active = filter_cells(scene.tree(), diff, &labels, 3).unwrap();
        assert_eq!(active.iter_ones().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn union_is_commutative_and_associative() {
        let labels = vec![
            label(&[true, false, false, true]),
            label(&[false, true, false, true]),
            label(&[false, false, true, false]),
        ];
        let build = |order: [u32; 3]| {
            let mut scene = sphere_scene(3);
            let ab = scene.union(order[0], order[1]);
            let root = scene.union(ab, order[2]);
            filter_cells(scene.tree(), root, &labels, 4).unwrap()
        };
        let abc = build([0, 1, 2]);
        assert_eq!(abc, build([2, 1, 0]));
        assert_eq!(abc, build([1, 2, 0]));
        assert_eq!(abc.iter_ones().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn malformed_tree_is_an_error() {
        let labels = vec![label(&[true])];
        let scene = sphere_scene(1);
        // A node id past the arena.
        let out = filter_cells(scene.tree(), 7, &labels, 1);
        assert!(matches!(out, Err(Error::BlobtreeEvaluationFailed(_))));
    }

    #[test]
    fn leaf_requires_matching_label_column() {
        let labels: Vec<DynamicBitset> = Vec::new();
        let scene = sphere_scene(1);
        let root = scene.root().unwrap();
        let out = filter_cells(scene.tree(), root, &labels, 1);
        assert!(matches!(out, Err(Error::BlobtreeEvaluationFailed(_))));
    }
}
