use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::DVec3;
use serde::Deserialize;

use crate::cli::{Cli, SolveArgs, TableArgs};
use crate::scene::{AxisLine, ExtrudedSolid, HelixLine, MeshSolid, PolyLine, Primitive, Scene};

/// On-disk scene description: a primitive table plus a boolean expression
/// over primitive indices.
#[derive(Deserialize)]
struct SceneSpec {
    primitives: Vec<PrimitiveSpec>,
    tree: ExpressionSpec,
}

#[derive(Deserialize)]
struct ProfileSpec {
    points: Vec<[f64; 3]>,
    bulges: Vec<f64>,
    reference_normal: [f64; 3],
}

impl ProfileSpec {
    fn build(&self) -> PolyLine {
        PolyLine::new(
            self.points.iter().map(|&p| DVec3::from_array(p)).collect(),
            self.bulges.clone(),
            DVec3::from_array(self.reference_normal),
            true,
        )
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PrimitiveSpec {
    Constant {
        value: f64,
    },
    Plane {
        point: [f64; 3],
        normal: [f64; 3],
    },
    Sphere {
        center: [f64; 3],
        radius: f64,
    },
    Cylinder {
        bottom: [f64; 3],
        offset: [f64; 3],
        radius: f64,
    },
    Cone {
        top: [f64; 3],
        bottom: [f64; 3],
        radius_top: f64,
        radius_bottom: f64,
    },
    Box {
        center: [f64; 3],
        half_size: [f64; 3],
    },
    Mesh {
        points: Vec<[f64; 3]>,
        faces: Vec<Vec<u32>>,
    },
    ExtrudePolyline {
        profiles: Vec<ProfileSpec>,
        axis_points: Vec<[f64; 3]>,
        axis_bulges: Vec<f64>,
        axis_reference_normal: [f64; 3],
    },
    ExtrudeArc {
        profiles: Vec<ProfileSpec>,
        start: [f64; 3],
        end: [f64; 3],
        bulge: f64,
        reference_normal: [f64; 3],
    },
    ExtrudeHelix {
        profiles: Vec<ProfileSpec>,
        axis_start: [f64; 3],
        axis_end: [f64; 3],
        radius: f64,
        advance_per_round: f64,
        start_direction: [f64; 3],
    },
}

impl PrimitiveSpec {
    fn build(&self) -> Primitive {
        match self {
            PrimitiveSpec::Constant { value } => Primitive::Constant { value: *value },
            PrimitiveSpec::Plane { point, normal } => Primitive::Plane {
                point: DVec3::from_array(*point),
                normal: DVec3::from_array(*normal),
            },
            PrimitiveSpec::Sphere { center, radius } => Primitive::Sphere {
                center: DVec3::from_array(*center),
                radius: *radius,
            },
            PrimitiveSpec::Cylinder { bottom, offset, radius } => Primitive::Cylinder {
                bottom: DVec3::from_array(*bottom),
                offset: DVec3::from_array(*offset),
                radius: *radius,
            },
            PrimitiveSpec::Cone { top, bottom, radius_top, radius_bottom } => Primitive::Cone {
                top: DVec3::from_array(*top),
                bottom: DVec3::from_array(*bottom),
                radius_top: *radius_top,
                radius_bottom: *radius_bottom,
            },
            PrimitiveSpec::Box { center, half_size } => Primitive::Box {
                center: DVec3::from_array(*center),
                half_size: DVec3::from_array(*half_size),
            },
            PrimitiveSpec::Mesh { points, faces } => {
                let mut indices = Vec::new();
                let mut ranges = Vec::new();
                for face in faces {
                    ranges.push((indices.len() as u32, face.len() as u32));
                    indices.extend_from_slice(face);
                }
                Primitive::Mesh(MeshSolid::new(
                    points.iter().map(|&p| DVec3::from_array(p)).collect(),
                    indices,
                    ranges,
                ))
            }
            PrimitiveSpec::ExtrudePolyline { profiles, axis_points, axis_bulges, axis_reference_normal } => {
                let axis = AxisLine::PolyLine(PolyLine::new(
                    axis_points.iter().map(|&p| DVec3::from_array(p)).collect(),
                    axis_bulges.clone(),
                    DVec3::from_array(*axis_reference_normal),
                    false,
                ));
                Primitive::Extrude(ExtrudedSolid::new(profiles.iter().map(ProfileSpec::build).collect(), axis))
            }
            PrimitiveSpec::ExtrudeArc { profiles, start, end, bulge, reference_normal } => {
                let axis = AxisLine::PolyLine(PolyLine::single_arc(
                    DVec3::from_array(*start),
                    DVec3::from_array(*end),
                    *bulge,
                    DVec3::from_array(*reference_normal),
                ));
                Primitive::Extrude(ExtrudedSolid::new(profiles.iter().map(ProfileSpec::build).collect(), axis))
            }
            PrimitiveSpec::ExtrudeHelix {
                profiles,
                axis_start,
                axis_end,
                radius,
                advance_per_round,
                start_direction,
            } => {
                let axis = AxisLine::Helix(HelixLine::new(
                    DVec3::from_array(*axis_start),
                    DVec3::from_array(*axis_end),
                    *radius,
                    *advance_per_round,
                    DVec3::from_array(*start_direction),
                ));
                Primitive::Extrude(ExtrudedSolid::new(profiles.iter().map(ProfileSpec::build).collect(), axis))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpressionSpec {
    Leaf {
        primitive: u32,
    },
    Operation {
        op: OpSpec,
        left: Box<ExpressionSpec>,
        right: Box<ExpressionSpec>,
    },
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum OpSpec {
    Union,
    Intersection,
    Difference,
}

fn build_expression(scene: &mut Scene, leaves: &[u32], expression: &ExpressionSpec) -> Result<u32> {
    match expression {
        ExpressionSpec::Leaf { primitive } => leaves
            .get(*primitive as usize)
            .copied()
            .with_context(|| format!("tree references unknown primitive {primitive}")),
        ExpressionSpec::Operation { op, left, right } => {
            let left = build_expression(scene, leaves, left)?;
            let right = build_expression(scene, leaves, right)?;
            Ok(match op {
                OpSpec::Union => scene.union(left, right),
                OpSpec::Intersection => scene.intersect(left, right),
                OpSpec::Difference => scene.difference(left, right),
            })
        }
    }
}

/// Read a scene description file into a [`Scene`].
pub fn load_scene(path: &Path) -> Result<Scene> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read scene {}", path.display()))?;
    let spec: SceneSpec = serde_json::from_str(&text)
        .with_context(|| format!("cannot parse scene {}", path.display()))?;
    if spec.primitives.is_empty() {
        bail!("scene has no primitives");
    }

    let mut scene = Scene::new();
    let leaves: Vec<u32> = spec.primitives.iter().map(|p| scene.add_primitive(p.build())).collect();
    build_expression(&mut scene, &leaves, &spec.tree)?;
    Ok(scene)
}

pub fn solve(cli: &Cli, args: &SolveArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => crate::Config::load(path)?,
        None => crate::Config::default(),
    };
    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    if let Some(lut) = &args.lut {
        config.lut_path = Some(lut.clone());
    }

    if cli.verbose > 0 {
        eprintln!(
            "[solve] scene={} resolution={} box=[{:?}, {:?}]",
            args.scene.display(),
            config.resolution,
            config.aabb_min,
            config.aabb_max
        );
    }

    let scene = load_scene(&args.scene)?;
    let result = crate::solve(&scene, &config)?;

    println!("polygons:      {}", result.stats.num_output_polygons);
    println!("surface area:  {:.9}", result.surface.surface_area);
    println!("volume:        {:.9}", result.surface.volume);
    if cli.verbose > 0 {
        let s = &result.stats;
        eprintln!(
            "[solve] tets={} iso_verts={} iso_faces={} patches={} chains={} shells={} components={} cells={}",
            s.num_tets,
            s.num_iso_vertices,
            s.num_iso_faces,
            s.num_patches,
            s.num_chains,
            s.num_shells,
            s.num_components,
            s.num_cells
        );
    }

    if let Some(output) = &args.output {
        write_obj(output, &result)?;
        if cli.verbose > 0 {
            eprintln!("[solve] wrote {}", output.display());
        }
    }
    Ok(())
}

/// Write the filtered surface as Wavefront OBJ polygons.
fn write_obj(path: &Path, result: &crate::SolveResult) -> Result<()> {
    use std::io::Write;

    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    for v in &result.vertices {
        writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
    }
    let mut cursor = 0usize;
    for &count in &result.surface.vertex_counts {
        write!(out, "f")?;
        for &index in &result.surface.faces[cursor..cursor + count as usize] {
            write!(out, " {}", index + 1)?;
        }
        writeln!(out)?;
        cursor += count as usize;
    }
    Ok(())
}

pub fn table(cli: &Cli, args: &TableArgs) -> Result<()> {
    let lut = crate::Lut::load(&args.table)?;
    println!("entries: {}", lut.len());
    if cli.verbose > 0 {
        eprintln!("[table] loaded {}", args.table.display());
    }
    Ok(())
}
