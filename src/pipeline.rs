//! The end-to-end solve: background mesh, scalar field, surface network,
//! boolean filtering, and integrals in one call.

use glam::DVec3;
use log::info;

use crate::arrangement::Lut;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::integrate::face_integrals;
use crate::mesh::TetMesh;
use crate::processor::{FilteredSurface, SurfaceNetworkProcessor};
use crate::scene::Scene;

/// The caller-facing output of a solve.
#[derive(Clone, Debug, Default)]
pub struct SolveResult {
    /// All surface-network vertices; unused entries are not pruned, output
    /// polygons index into this array.
    pub vertices: Vec<DVec3>,
    pub surface: FilteredSurface,
    pub stats: SolveStats,
}

/// Pipeline counts reported after a run (printed even by failing drivers).
#[derive(Clone, Copy, Debug, Default)]
pub struct SolveStats {
    pub num_tets: usize,
    pub num_iso_vertices: usize,
    pub num_iso_faces: usize,
    pub num_patches: usize,
    pub num_chains: usize,
    pub num_shells: usize,
    pub num_components: usize,
    pub num_cells: usize,
    pub num_output_polygons: usize,
}

/// Run the whole pipeline for `scene` under `config`.
pub fn solve(scene: &Scene, config: &Config) -> Result<SolveResult> {
    config.validate()?;
    let lut = match &config.lut_path {
        Some(path) => Some(Lut::load(path)?),
        None => None,
    };

    let mesh = TetMesh::generate(config.resolution, config.aabb_min(), config.aabb_max());
    info!("background mesh: {} vertices, {} tets", mesh.num_vertices(), mesh.num_tets());
    let scalar_field = scene.evaluate_scalar_field(&mesh);

    let mut processor = SurfaceNetworkProcessor::new(&mesh, &scalar_field, lut.as_ref());
    processor.run(scene)?;

    let root = scene
        .root()
        .ok_or_else(|| Error::BlobtreeEvaluationFailed("the scene does not form a single tree".into()))?;

    // Per-face integrals, evaluated here and handed to the filter.
    let mut areas = Vec::with_capacity(processor.iso_faces.len());
    let mut moments = Vec::with_capacity(processor.iso_faces.len());
    for face in &processor.iso_faces {
        let polygon: Vec<DVec3> = face
            .vertices
            .iter()
            .map(|&v| processor.iso_vertices[v as usize])
            .collect();
        let integrals = face_integrals(&polygon);
        areas.push(integrals.area);
        moments.push(integrals.moment);
    }

    let surface = processor.filter_surface(scene, root, &areas, &moments)?;
    let stats = SolveStats {
        num_tets: mesh.num_tets(),
        num_iso_vertices: processor.iso_verts.len(),
        num_iso_faces: processor.iso_faces.len(),
        num_patches: processor.patches.len(),
        num_chains: processor.chains.len(),
        num_shells: processor.shells.len(),
        num_components: processor.components.len(),
        num_cells: processor.arrangement_cells.len(),
        num_output_polygons: surface.vertex_counts.len(),
    };
    info!(
        "solve: {} output polygons, area {:.6}, volume {:.6}",
        stats.num_output_polygons, surface.surface_area, surface.volume
    );

    Ok(SolveResult { vertices: processor.iso_vertices.clone(), surface, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Primitive;
    use std::collections::HashMap;
    use std::f64::consts::PI;

    fn config(resolution: u32) -> Config {
        Config { resolution, aabb_min: [-1.0; 3], aabb_max: [1.0; 3], lut_path: None }
    }

    fn sphere(center: [f64; 3], radius: f64) -> Primitive {
        Primitive::Sphere { center: DVec3::from_array(center), radius }
    }

    /// Every emitted edge must appear in exactly two polygons with opposite
    /// orientations.
    fn assert_watertight(result: &SolveResult) {
        let mut edges: HashMap<(u32, u32), (u32, i64)> = HashMap::new();
        let mut cursor = 0usize;
        for &count in &result.surface.vertex_counts {
            let polygon = &result.surface.faces[cursor..cursor + count as usize];
            for i in 0..polygon.len() {
                let a = polygon[i];
                let b = polygon[(i + 1) % polygon.len()];
                let entry = edges.entry((a.min(b), a.max(b))).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += if a < b { 1 } else { -1 };
            }
            cursor += count as usize;
        }
        for (&edge, &(count, signed)) in &edges {
            assert_eq!(count, 2, "edge {edge:?} not shared by exactly two polygons");
            assert_eq!(signed, 0, "edge {edge:?} traversed twice in the same direction");
        }
    }

    fn relative_error(measured: f64, expected: f64) -> f64 {
        (measured - expected).abs() / expected.abs()
    }

    #[test]
    fn single_sphere() {
        let mut scene = Scene::new();
        scene.add_primitive(sphere([0.0; 3], 0.5));

        let result = solve(&scene, &config(8)).unwrap();
        assert_eq!(result.stats.num_components, 1);
        assert_eq!(result.stats.num_shells, 2);
        assert_eq!(result.stats.num_cells, 2);
        assert!(result.stats.num_output_polygons > 0);
        assert_watertight(&result);

        let expected_area = 4.0 * PI * 0.25;
        let expected_volume = 4.0 / 3.0 * PI * 0.125;
        assert!(
            relative_error(result.surface.surface_area, expected_area) < 0.05,
            "area {} vs {}",
            result.surface.surface_area,
            expected_area
        );
        assert!(
            relative_error(result.surface.volume, expected_volume) < 0.05,
            "volume {} vs {}",
            result.surface.volume,
            expected_volume
        );
    }

    #[test]
    fn two_disjoint_spheres_union() {
        let mut scene = Scene::new();
        let a = scene.add_primitive(sphere([-0.4, 0.0, 0.0], 0.2));
        let b = scene.add_primitive(sphere([0.4, 0.0, 0.0], 0.2));
        scene.union(a, b);

        let result = solve(&scene, &config(20)).unwrap();
        assert_eq!(result.stats.num_components, 2);
        assert_eq!(result.stats.num_shells, 4);
        assert_eq!(result.stats.num_cells, 3);
        assert_watertight(&result);

        let expected_area = 2.0 * 4.0 * PI * 0.04;
        let expected_volume = 2.0 * 4.0 / 3.0 * PI * 0.008;
        assert!(relative_error(result.surface.surface_area, expected_area) < 0.05);
        assert!(relative_error(result.surface.volume, expected_volume) < 0.05);
    }

    #[test]
    fn box_minus_sphere() {
        // Resolution 9 keeps the box walls off the grid planes; the corner
        // sphere carves one octant out of the box.
        let mut scene = Scene::new();
        let solid = scene.add_primitive(Primitive::Box {
            center: DVec3::ZERO,
            half_size: DVec3::splat(0.5),
        });
        let carve = scene.add_primitive(sphere([0.5, 0.5, 0.5], 0.3));
        scene.difference(solid, carve);

        let result = solve(&scene, &config(9)).unwrap();
        // One connected surface component; four shells and four cells
        // around the intersection circle.
        assert_eq!(result.stats.num_components, 1);
        assert_eq!(result.stats.num_shells, 4);
        assert_eq!(result.stats.num_cells, 4);
        assert!(result.stats.num_chains >= 1);
        assert_watertight(&result);

        let expected_volume = 1.0 - (4.0 / 3.0 * PI * 0.027) / 8.0;
        assert!(
            relative_error(result.surface.volume, expected_volume) < 0.05,
            "volume {} vs {}",
            result.surface.volume,
            expected_volume
        );
    }

    #[test]
    fn coplanar_planes_union() {
        // Two identical half-spaces; the duplicate-plane detector must
        // merge them and the union must equal either one.
        let plane = Primitive::Plane { point: DVec3::new(0.0, 0.0, 0.1), normal: DVec3::Z };
        let mut scene = Scene::new();
        let a = scene.add_primitive(plane.clone());
        let b = scene.add_primitive(plane);
        scene.union(a, b);

        let result = solve(&scene, &config(4)).unwrap();
        assert_eq!(result.stats.num_cells, 2);
        // The emitted boundary is the plane's cross-section of the domain.
        assert!(relative_error(result.surface.surface_area, 4.0) < 1e-9);
        assert!(result.stats.num_output_polygons > 0);
    }

    #[test]
    fn degenerate_sphere_touching_grid_vertices() {
        // At resolution 4 the sphere of radius 0.5 passes exactly through
        // mesh vertices such as (0.5, 0, 0): the predicates return zero and
        // the kernel must fall through to a valid complex.
        let mut scene = Scene::new();
        scene.add_primitive(sphere([0.0; 3], 0.5));

        let result = solve(&scene, &config(4)).unwrap();
        assert_eq!(result.stats.num_components, 1);
        assert_eq!(result.stats.num_cells, 2);
        assert_watertight(&result);
        // Coarse but closed: the inscribed approximation undershoots, so
        // only the neighbourhood is checked.
        let expected_volume = 4.0 / 3.0 * PI * 0.125;
        assert!(result.surface.volume > 0.5 * expected_volume);
        assert!(result.surface.volume < 1.1 * expected_volume);
    }

    #[test]
    fn nested_spheres_difference() {
        let mut scene = Scene::new();
        let large = scene.add_primitive(sphere([0.0; 3], 0.8));
        let small = scene.add_primitive(sphere([0.0; 3], 0.3));
        scene.difference(large, small);

        let result = solve(&scene, &config(14)).unwrap();
        assert_eq!(result.stats.num_components, 2);
        assert_eq!(result.stats.num_shells, 4);
        assert_eq!(result.stats.num_cells, 3);
        assert_watertight(&result);

        let expected_area = 4.0 * PI * (0.64 + 0.09);
        let expected_volume = 4.0 / 3.0 * PI * (0.512 - 0.027);
        assert!(relative_error(result.surface.surface_area, expected_area) < 0.05);
        assert!(relative_error(result.surface.volume, expected_volume) < 0.05);
    }

    #[test]
    fn function_without_patches_uses_containment_test() {
        // The second sphere never crosses the domain: its labels come from
        // the AABB/containment fallback and the union reduces to the first.
        let mut scene = Scene::new();
        let near = scene.add_primitive(sphere([0.0; 3], 0.5));
        let far = scene.add_primitive(sphere([10.0, 0.0, 0.0], 0.1));
        scene.union(near, far);

        let result = solve(&scene, &config(8)).unwrap();
        assert_eq!(result.stats.num_cells, 2);
        let expected_volume = 4.0 / 3.0 * PI * 0.125;
        assert!(relative_error(result.surface.volume, expected_volume) < 0.05);
    }

    #[test]
    fn reversal_symmetry() {
        // Negating the field swaps inside and outside: the boundary is the
        // same with reversed orientation and the volume changes sign.
        let mut scene = Scene::new();
        scene.add_primitive(sphere([0.0; 3], 0.5));
        let root = scene.root().unwrap();
        let config = config(8);

        let mesh = TetMesh::generate(config.resolution, config.aabb_min(), config.aabb_max());
        let field = scene.evaluate_scalar_field(&mesh);
        let negated = field.mapv(|x| -x);

        let run = |field: &ndarray::Array2<f64>| {
            let mut processor = SurfaceNetworkProcessor::new(&mesh, field, None);
            processor.run(&scene).unwrap();
            let mut areas = Vec::new();
            let mut moments = Vec::new();
            for face in &processor.iso_faces {
                let polygon: Vec<DVec3> =
                    face.vertices.iter().map(|&v| processor.iso_vertices[v as usize]).collect();
                let integrals = face_integrals(&polygon);
                areas.push(integrals.area);
                moments.push(integrals.moment);
            }
            processor.filter_surface(&scene, root, &areas, &moments).unwrap()
        };

        let forward = run(&field);
        let backward = run(&negated);
        assert_eq!(forward.vertex_counts, backward.vertex_counts);
        assert!((forward.surface_area - backward.surface_area).abs() < 1e-9);
        assert!((forward.volume + backward.volume).abs() < 1e-9);

        // Same polygons, traversed the other way round.
        let edge_set = |surface: &crate::FilteredSurface| {
            let mut cursor = 0usize;
            let mut directed = std::collections::HashSet::new();
            for &count in &surface.vertex_counts {
                let polygon = &surface.faces[cursor..cursor + count as usize];
                for i in 0..polygon.len() {
                    directed.insert((polygon[i], polygon[(i + 1) % polygon.len()]));
                }
                cursor += count as usize;
            }
            directed
        };
        let forward_edges = edge_set(&forward);
        for &(a, b) in &edge_set(&backward) {
            assert!(forward_edges.contains(&(b, a)), "edge ({a}, {b}) not reversed");
        }
    }

    #[test]
    fn label_matrix_is_consistent_across_patches() {
        // For every patch: the cell behind its odd half is inside the
        // patch's function, the cell behind its even half is outside.
        let mut scene = Scene::new();
        let solid = scene.add_primitive(Primitive::Box {
            center: DVec3::ZERO,
            half_size: DVec3::splat(0.5),
        });
        let carve = scene.add_primitive(sphere([0.5, 0.5, 0.5], 0.3));
        scene.difference(solid, carve);

        let config = config(9);
        let mesh = TetMesh::generate(config.resolution, config.aabb_min(), config.aabb_max());
        let field = scene.evaluate_scalar_field(&mesh);
        let mut processor = SurfaceNetworkProcessor::new(&mesh, &field, None);
        processor.run(&scene).unwrap();

        let mut shell_to_cell = vec![u32::MAX; processor.shells.len()];
        for (cell, shells) in processor.arrangement_cells.iter().enumerate() {
            for &shell in shells {
                shell_to_cell[shell as usize] = cell as u32;
            }
        }
        // Shells partition half-patches; cells partition shells.
        assert!(shell_to_cell.iter().all(|&c| c != u32::MAX));
        let mut seen = vec![false; 2 * processor.patches.len()];
        for shell in &processor.shells {
            for &half in shell {
                assert!(!seen[half as usize], "half-patch in two shells");
                seen[half as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));

        for patch in 0..processor.patches.len() as u32 {
            let function = processor.patch_functions[patch as usize] as usize;
            let outside_cell = shell_to_cell[processor.shell_of_half_patch[2 * patch as usize] as usize];
            let inside_cell =
                shell_to_cell[processor.shell_of_half_patch[2 * patch as usize + 1] as usize];
            assert!(processor.cell_labels[function].get(inside_cell as usize));
            assert!(!processor.cell_labels[function].get(outside_cell as usize));
        }
    }
}
