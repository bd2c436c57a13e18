//! Indexed polygon mesh with optional texture maps and blend shapes.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::texture::Texture;
use crate::util::{Bounds, Error, Result, Vec2, Vec3};

/// One corner of a face: indices into the position / uv / normal arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertex {
    pub position: usize,
    pub uv: Option<usize>,
    pub normal: Option<usize>,
}

impl FaceVertex {
    pub fn new(position: usize) -> Self {
        Self { position, uv: None, normal: None }
    }
}

/// A convex polygon, rendered as a triangle fan around its first corner.
pub type Face = SmallVec<[FaceVertex; 4]>;

/// Named alternate vertex positions with a weight in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct BlendShape {
    pub targets: Vec<Vec3>,
    pub weight: f32,
}

/// Mesh data plus texture maps and blend shape state.
#[derive(Debug, Clone, Default)]
pub struct Model {
    source: Option<PathBuf>,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    faces: Vec<Face>,
    diffuse_map: Option<Texture>,
    normal_map: Option<Texture>,
    specular_map: Option<Texture>,
    /// Rest positions that blend shapes are applied on top of.
    original: Option<Vec<Vec3>>,
    blend_shapes: BTreeMap<String, BlendShape>,
}

impl Model {
    /// Build a model from raw arrays. Positions are backed up as the rest pose.
    pub fn from_parts(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        faces: Vec<Face>,
    ) -> Self {
        let mut model = Self {
            positions,
            normals,
            uvs,
            faces,
            ..Default::default()
        };
        model.backup_original_vertices();
        model
    }

    /// Triangle soup helper: every consecutive index triple becomes a face.
    pub fn from_triangles(positions: Vec<Vec3>, indices: &[usize]) -> Self {
        let faces = indices
            .chunks_exact(3)
            .map(|tri| tri.iter().map(|&i| FaceVertex::new(i)).collect())
            .collect();
        Self::from_parts(positions, Vec::new(), Vec::new(), faces)
    }

    /// Load a mesh plus `<stem>_diffuse.tga`, `<stem>_nm.tga` and `<stem>_spec.tga`.
    ///
    /// Never fails: a missing or malformed file produces an empty model, which
    /// callers detect through [`Self::is_empty`].
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(model) => model,
            Err(e) => {
                warn!("mesh load failed: {e}");
                Self {
                    source: Some(path.to_path_buf()),
                    ..Default::default()
                }
            }
        }
    }

    /// Fallible variant of [`Self::load`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let (models, _) = tobj::load_obj(path, &load_options()).map_err(|source| Error::ObjLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let mut model = Self::from_tobj(&models);
        if model.is_empty() {
            return Err(Error::EmptyModel(path.to_path_buf()));
        }
        model.source = Some(path.to_path_buf());
        model.diffuse_map = load_sibling_texture(path, "_diffuse.tga");
        model.normal_map = load_sibling_texture(path, "_nm.tga");
        model.specular_map = load_sibling_texture(path, "_spec.tga");
        info!(
            "loaded {}: v# {} f# {} vt# {} vn# {}",
            path.display(),
            model.positions.len(),
            model.faces.len(),
            model.uvs.len(),
            model.normals.len()
        );
        Ok(model)
    }

    /// Parse mesh text from a reader. Material libraries are ignored.
    pub fn from_obj_reader(reader: &mut impl BufRead) -> Result<Self> {
        let (models, _) = tobj::load_obj_buf(reader, &load_options(), |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })
        .map_err(|source| Error::ObjLoad {
            path: PathBuf::from("<buffer>"),
            source,
        })?;
        Ok(Self::from_tobj(&models))
    }

    /// Merge every object of the file into one mesh.
    fn from_tobj(models: &[tobj::Model]) -> Self {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut uvs = Vec::new();
        let mut faces = Vec::new();

        for m in models {
            let mesh = &m.mesh;
            let (p_base, n_base, t_base) = (positions.len(), normals.len(), uvs.len());
            positions.extend(mesh.positions.chunks_exact(3).map(Vec3::from_slice));
            normals.extend(mesh.normals.chunks_exact(3).map(Vec3::from_slice));
            uvs.extend(mesh.texcoords.chunks_exact(2).map(Vec2::from_slice));

            let has_uv = mesh.texcoord_indices.len() == mesh.indices.len();
            let has_n = mesh.normal_indices.len() == mesh.indices.len();
            let corner = |k: usize| FaceVertex {
                position: p_base + mesh.indices[k] as usize,
                uv: has_uv.then(|| t_base + mesh.texcoord_indices[k] as usize),
                normal: has_n.then(|| n_base + mesh.normal_indices[k] as usize),
            };

            // no arities means the mesh is all triangles
            let mut start = 0usize;
            if mesh.face_arities.is_empty() {
                while start + 3 <= mesh.indices.len() {
                    faces.push((start..start + 3).map(corner).collect());
                    start += 3;
                }
            } else {
                for &arity in &mesh.face_arities {
                    let end = start + arity as usize;
                    if arity >= 3 && end <= mesh.indices.len() {
                        faces.push((start..end).map(corner).collect());
                    }
                    start = end;
                }
            }
        }

        Self::from_parts(positions, normals, uvs, faces)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when loading failed or the mesh has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn face(&self, face: usize) -> &[FaceVertex] {
        &self.faces[face]
    }

    /// Corner triples of the triangle fan covering `face`.
    pub fn fan(&self, face: usize) -> impl Iterator<Item = [usize; 3]> {
        let n = self.faces[face].len();
        (1..n.saturating_sub(1)).map(|k| [0, k, k + 1])
    }

    /// Total number of fan triangles across all faces.
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(|f| f.len().saturating_sub(2)).sum()
    }

    #[inline]
    pub fn vertex(&self, face: usize, nth: usize) -> Vec3 {
        self.positions[self.faces[face][nth].position]
    }

    /// Texture coordinate of a face corner, `(0, 0)` when the mesh has none.
    #[inline]
    pub fn uv(&self, face: usize, nth: usize) -> Vec2 {
        self.faces[face][nth]
            .uv
            .and_then(|i| self.uvs.get(i).copied())
            .unwrap_or(Vec2::ZERO)
    }

    /// Unit vertex normal of a face corner, if the mesh has normals.
    #[inline]
    pub fn normal(&self, face: usize, nth: usize) -> Option<Vec3> {
        self.faces[face][nth]
            .normal
            .and_then(|i| self.normals.get(i))
            .and_then(|n| n.try_normalize())
    }

    /// Diffuse map sample, `None` without a diffuse map.
    pub fn diffuse(&self, uv: Vec2) -> Option<[u8; 3]> {
        self.diffuse_map.as_ref().map(|t| t.sample(uv))
    }

    /// Normal map sample in tangent-less object space.
    pub fn normal_at(&self, uv: Vec2) -> Option<Vec3> {
        self.normal_map.as_ref().map(|t| t.sample_normal(uv))
    }

    /// Specular exponent from the red channel of the specular map.
    pub fn specular(&self, uv: Vec2) -> Option<f32> {
        self.specular_map.as_ref().map(|t| t.sample(uv)[0] as f32)
    }

    pub fn set_diffuse_map(&mut self, tex: Option<Texture>) {
        self.diffuse_map = tex;
    }

    pub fn set_normal_map(&mut self, tex: Option<Texture>) {
        self.normal_map = tex;
    }

    pub fn set_specular_map(&mut self, tex: Option<Texture>) {
        self.specular_map = tex;
    }

    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::EMPTY;
        for &p in &self.positions {
            b.expand(p);
        }
        b
    }

    // ------------------------------------------------------------------
    // Vertex mutation
    // ------------------------------------------------------------------

    /// Move vertex `i` to `pos`. Out-of-range indices are ignored.
    pub fn set_vertex(&mut self, i: usize, pos: Vec3) {
        if let Some(v) = self.positions.get_mut(i) {
            *v = pos;
        }
    }

    /// Displace vertex `i` by `offset`. Out-of-range indices are ignored.
    pub fn offset_vertex(&mut self, i: usize, offset: Vec3) {
        if let Some(v) = self.positions.get_mut(i) {
            *v += offset;
        }
    }

    /// Snapshot the current positions as the rest pose.
    pub fn backup_original_vertices(&mut self) {
        self.original = Some(self.positions.clone());
    }

    /// Put positions back to the rest pose, leaving blend weights alone.
    pub fn restore_original_vertices(&mut self) {
        if let Some(orig) = &self.original {
            self.positions.clone_from(orig);
        }
    }

    /// Neutral pose: rest positions and every blend weight at zero.
    pub fn reset_vertices(&mut self) {
        for shape in self.blend_shapes.values_mut() {
            shape.weight = 0.0;
        }
        self.restore_original_vertices();
    }

    // ------------------------------------------------------------------
    // Blend shapes
    // ------------------------------------------------------------------

    /// Register a blend shape at weight 0. Rejected when the vertex count differs.
    pub fn add_blend_shape(&mut self, name: impl Into<String>, targets: Vec<Vec3>) -> bool {
        let name = name.into();
        if targets.len() != self.positions.len() {
            warn!(
                "blend shape '{name}' rejected: {} targets for {} vertices",
                targets.len(),
                self.positions.len()
            );
            return false;
        }
        debug!("added blend shape '{name}'");
        self.blend_shapes.insert(name, BlendShape { targets, weight: 0.0 });
        true
    }

    /// Set a weight, clamped into `[0, 1]`. Returns false for unknown shapes.
    pub fn set_blend_weight(&mut self, name: &str, weight: f32) -> bool {
        match self.blend_shapes.get_mut(name) {
            Some(shape) => {
                shape.weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
                true
            }
            None => false,
        }
    }

    pub fn blend_weight(&self, name: &str) -> Option<f32> {
        self.blend_shapes.get(name).map(|s| s.weight)
    }

    /// Recompute positions: `rest + sum(weight * (target - rest))`.
    pub fn apply_blend_shapes(&mut self) {
        if self.original.is_none() {
            self.backup_original_vertices();
        }
        let Some(orig) = &self.original else {
            return;
        };
        self.positions.clone_from(orig);
        let active = self.blend_shapes.values().filter(|s| s.weight > 0.0);
        for (n, shape) in active.enumerate() {
            let w = shape.weight;
            for ((p, &o), &t) in self.positions.iter_mut().zip(orig).zip(&shape.targets) {
                if n == 0 {
                    // lerp form lands on the target exactly at w = 1
                    *p = o * (1.0 - w) + t * w;
                } else {
                    *p += (t - o) * w;
                }
            }
        }
    }

    pub fn clear_blend_weights(&mut self) {
        for shape in self.blend_shapes.values_mut() {
            shape.weight = 0.0;
        }
        self.apply_blend_shapes();
    }

    /// Show exactly one shape at `intensity`. Returns false for unknown shapes.
    pub fn set_expression(&mut self, name: &str, intensity: f32) -> bool {
        self.clear_blend_weights();
        if !self.set_blend_weight(name, intensity) {
            warn!("expression '{name}' not found");
            return false;
        }
        self.apply_blend_shapes();
        true
    }

    /// Linear mix: `from` at `1 - t`, `to` at `t`, everything else off.
    pub fn blend_between(&mut self, from: &str, to: &str, t: f32) -> bool {
        if !self.has_blend_shape(from) || !self.has_blend_shape(to) {
            warn!("cannot blend '{from}' -> '{to}': missing shape");
            return false;
        }
        for shape in self.blend_shapes.values_mut() {
            shape.weight = 0.0;
        }
        self.set_blend_weight(from, 1.0 - t);
        self.set_blend_weight(to, t);
        self.apply_blend_shapes();
        true
    }

    /// Store the current positions as a new shape.
    pub fn save_current_as_blend_shape(&mut self, name: impl Into<String>) -> bool {
        let current = self.positions.clone();
        self.add_blend_shape(name, current)
    }

    pub fn has_blend_shape(&self, name: &str) -> bool {
        self.blend_shapes.contains_key(name)
    }

    /// Shape names in sorted order.
    pub fn blend_shape_names(&self) -> Vec<&str> {
        self.blend_shapes.keys().map(String::as_str).collect()
    }

    /// Procedural `expand`, `squash` and `twist` shapes for previewing.
    pub fn create_demo_blend_shapes(&mut self) {
        if self.positions.is_empty() {
            warn!("no vertices to build blend shapes from");
            return;
        }
        let base = self.original.clone().unwrap_or_else(|| self.positions.clone());
        let center = base.iter().copied().sum::<Vec3>() / base.len() as f32;

        let expand = base
            .iter()
            .map(|&v| v + (v - center).try_normalize().unwrap_or(Vec3::ZERO) * 0.1)
            .collect();
        let squash = base.iter().map(|&v| Vec3::new(v.x, v.y * 0.8, v.z)).collect();
        let (s, c) = 0.3f32.sin_cos();
        let twist = base
            .iter()
            .map(|&v| {
                if v.y > center.y {
                    Vec3::new(v.x * c - v.z * s, v.y, v.x * s + v.z * c)
                } else {
                    v
                }
            })
            .collect();

        self.add_blend_shape("expand", expand);
        self.add_blend_shape("squash", squash);
        self.add_blend_shape("twist", twist);
    }
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        single_index: false,
        triangulate: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

fn load_sibling_texture(mesh: &Path, suffix: &str) -> Option<Texture> {
    let stem = mesh.file_stem()?.to_string_lossy();
    let path = mesh.with_file_name(format!("{stem}{suffix}"));
    if !path.exists() {
        return None;
    }
    match Texture::load(&path) {
        Ok(tex) => {
            debug!("texture {} loaded", path.display());
            Some(tex)
        }
        Err(e) => {
            warn!("texture {} failed: {e}", path.display());
            None
        }
    }
}
