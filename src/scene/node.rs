//! Scene graph nodes and their transforms.

use std::fmt;

use crate::util::{Mat4, Vec3};

/// Scale below which an axis is treated as collapsed during decomposition.
const MIN_SCALE: f32 = 1e-4;

/// Position, XYZ Euler rotation (radians) and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// `T * Rz * Ry * Rx * S`
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_scale(self.scale)
    }

    /// Decompose an affine matrix without shear.
    ///
    /// Translation comes from the last column and scale from the column
    /// lengths. Rotation is only extracted when every scale axis is above
    /// `1e-4`, otherwise it is left at zero.
    pub fn from_matrix(m: &Mat4) -> Self {
        let position = m.w_axis.truncate();
        let sx = m.x_axis.truncate().length();
        let sy = m.y_axis.truncate().length();
        let sz = m.z_axis.truncate().length();
        let scale = Vec3::new(sx, sy, sz);

        let mut rotation = Vec3::ZERO;
        if sx > MIN_SCALE && sy > MIN_SCALE && sz > MIN_SCALE {
            // r[row][col] of the unscaled rotation
            let r00 = m.x_axis.x / sx;
            let r10 = m.x_axis.y / sx;
            let r20 = m.x_axis.z / sx;
            let r11 = m.y_axis.y / sy;
            let r21 = m.y_axis.z / sy;
            let r12 = m.z_axis.y / sz;
            let r22 = m.z_axis.z / sz;

            rotation.y = (-r20).clamp(-1.0, 1.0).asin();
            if rotation.y.cos() > MIN_SCALE {
                rotation.x = r21.atan2(r22);
                rotation.z = r10.atan2(r00);
            } else {
                // gimbal lock: fold z into x
                rotation.x = (-r12).atan2(r11);
                rotation.z = 0.0;
            }
        }

        Self { position, rotation, scale }
    }

    /// Component-wise linear interpolation.
    pub fn interpolate(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.lerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Empty,
    Mesh,
    Light,
    Camera,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "EMPTY",
            Self::Mesh => "MESH",
            Self::Light => "LIGHT",
            Self::Camera => "CAMERA",
        };
        f.write_str(s)
    }
}

/// Key of a model in the scene's model registry (its source path).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelHandle(pub String);

impl ModelHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A node in the scene tree. Parents own their children.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    /// Local transform relative to the parent.
    pub transform: Transform,
    pub model: Option<ModelHandle>,
    pub visible: bool,
    pub selected: bool,
    world_transform: Transform,
    world_matrix: Mat4,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::default(),
            model: None,
            visible: true,
            selected: false,
            world_transform: Transform::default(),
            world_matrix: Mat4::IDENTITY,
            children: Vec::new(),
        }
    }

    /// Mesh node referencing a registered model.
    pub fn with_model(name: impl Into<String>, model: ModelHandle) -> Self {
        let mut node = Self::new(name, NodeKind::Mesh);
        node.model = Some(model);
        node
    }

    pub fn attach_model(&mut self, model: ModelHandle) {
        self.model = Some(model);
        self.kind = NodeKind::Mesh;
    }

    #[inline]
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SceneNode] {
        &mut self.children
    }

    /// Take ownership of `child` and append it.
    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Detach the first direct child named `name` and hand it back.
    pub fn remove_child(&mut self, name: &str) -> Option<SceneNode> {
        let idx = self.children.iter().position(|c| c.name == name)?;
        Some(self.children.remove(idx))
    }

    pub fn find_child(&self, name: &str) -> Option<&SceneNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Search order: all direct children first (insertion order), then each
    /// child's subtree in insertion order. First match wins.
    pub fn find_descendant(&self, name: &str) -> Option<&SceneNode> {
        self.find_child(name)
            .or_else(|| self.children.iter().find_map(|c| c.find_descendant(name)))
    }

    /// Mutable [`Self::find_descendant`] with the same search order.
    pub fn find_descendant_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if let Some(idx) = self.children.iter().position(|c| c.name == name) {
            return Some(&mut self.children[idx]);
        }
        let idx = self
            .children
            .iter()
            .position(|c| c.find_descendant(name).is_some())?;
        self.children[idx].find_descendant_mut(name)
    }

    /// The node whose direct child [`Self::find_descendant`] would return.
    pub fn find_parent_of(&self, name: &str) -> Option<&SceneNode> {
        if self.find_child(name).is_some() {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_parent_of(name))
    }

    /// Detach the node [`Self::find_descendant`] would return.
    pub fn remove_descendant(&mut self, name: &str) -> Option<SceneNode> {
        if let Some(node) = self.remove_child(name) {
            return Some(node);
        }
        let idx = self
            .children
            .iter()
            .position(|c| c.find_descendant(name).is_some())?;
        self.children[idx].remove_descendant(name)
    }

    /// Depth-first pre-order walk.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a SceneNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    #[inline]
    pub fn local_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    /// World matrix from the last [`Self::update_world_transform`].
    #[inline]
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    /// Decomposed world transform from the last update.
    #[inline]
    pub fn world_transform(&self) -> &Transform {
        &self.world_transform
    }

    /// `world = parent_world * local`, decompose, then recurse into children.
    pub fn update_world_transform(&mut self, parent_world: Mat4) {
        self.world_matrix = parent_world * self.local_matrix();
        self.world_transform = Transform::from_matrix(&self.world_matrix);
        let world = self.world_matrix;
        for child in &mut self.children {
            child.update_world_transform(world);
        }
    }

    /// Indented `- name [MESH] [HIDDEN] [SELECTED]` lines for this subtree.
    pub fn hierarchy_lines(&self, depth: usize, out: &mut Vec<String>) {
        let mut line = format!("{}- {}", "  ".repeat(depth), self.name);
        if self.has_model() {
            line.push_str(" [MESH]");
        }
        if !self.visible {
            line.push_str(" [HIDDEN]");
        }
        if self.selected {
            line.push_str(" [SELECTED]");
        }
        out.push(line);
        for child in &self.children {
            child.hierarchy_lines(depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    fn tree() -> SceneNode {
        // Root
        //  - A
        //    - dup (deep)
        //  - B
        //    - dup (deep, second)
        //  - dup (direct)
        let mut root = SceneNode::new("Root", NodeKind::Empty);
        let mut a = SceneNode::new("A", NodeKind::Empty);
        let mut deep = SceneNode::new("dup", NodeKind::Empty);
        deep.transform.position = Vec3::X;
        a.add_child(deep);
        let mut b = SceneNode::new("B", NodeKind::Empty);
        b.add_child(SceneNode::new("dup", NodeKind::Light));
        root.add_child(a);
        root.add_child(b);
        root.add_child(SceneNode::new("dup", NodeKind::Camera));
        root
    }

    #[test]
    fn test_matrix_round_trip() {
        let t = Transform {
            position: Vec3::new(1.0, -2.0, 3.0),
            rotation: Vec3::new(0.3, -0.4, 1.1),
            scale: Vec3::new(2.0, 0.5, 1.5),
        };
        let back = Transform::from_matrix(&t.matrix());
        assert!(approx(back.position, t.position));
        assert!(approx(back.rotation, t.rotation));
        assert!(approx(back.scale, t.scale));
    }

    #[test]
    fn test_gimbal_lock_decomposition() {
        let t = Transform {
            rotation: Vec3::new(0.2, FRAC_PI_2, 0.0),
            ..Default::default()
        };
        let back = Transform::from_matrix(&t.matrix());
        assert!((back.rotation.y - FRAC_PI_2).abs() < 1e-3);
        assert_eq!(back.rotation.z, 0.0);
        assert!(back.matrix().abs_diff_eq(t.matrix(), 1e-3));
    }

    #[test]
    fn test_collapsed_scale_skips_rotation() {
        let t = Transform {
            rotation: Vec3::new(0.5, 0.5, 0.5),
            scale: Vec3::new(1.0, 0.0, 1.0),
            ..Default::default()
        };
        let back = Transform::from_matrix(&t.matrix());
        assert_eq!(back.rotation, Vec3::ZERO);
        assert!(back.rotation.is_finite());
    }

    #[test]
    fn test_find_descendant_prefers_direct_children() {
        let root = tree();
        assert_eq!(root.find_descendant("dup").unwrap().kind, NodeKind::Camera);
        assert!(root.find_descendant("nope").is_none());
    }

    #[test]
    fn test_find_descendant_insertion_order() {
        let mut root = tree();
        root.remove_child("dup");
        let found = root.find_descendant("dup").unwrap();
        assert_eq!(found.transform.position, Vec3::X);
        assert_eq!(root.find_parent_of("dup").unwrap().name, "A");

        let m = root.find_descendant_mut("dup").unwrap();
        m.visible = false;
        assert!(!root.find_child("A").unwrap().children()[0].visible);
    }

    #[test]
    fn test_remove_child_detaches_subtree() {
        let mut root = tree();
        let b = root.remove_child("B").unwrap();
        assert_eq!(b.children().len(), 1);
        assert!(root.find_child("B").is_none());
        assert!(root.remove_child("B").is_none());
    }

    #[test]
    fn test_remove_descendant_follows_find_order() {
        let mut root = tree();
        root.remove_child("dup");
        let removed = root.remove_descendant("dup").unwrap();
        assert_eq!(removed.kind, NodeKind::Empty);
        assert_eq!(root.find_descendant("dup").unwrap().kind, NodeKind::Light);
    }

    #[test]
    fn test_world_transform_composes_parent() {
        let mut root = SceneNode::new("Root", NodeKind::Empty);
        let mut parent = SceneNode::new("P", NodeKind::Empty);
        parent.transform.position = Vec3::new(0.0, 2.0, 0.0);
        parent.transform.scale = Vec3::splat(2.0);
        let mut child = SceneNode::new("C", NodeKind::Empty);
        child.transform.position = Vec3::new(1.0, 0.0, 0.0);
        parent.add_child(child);
        root.add_child(parent);

        root.update_world_transform(Mat4::IDENTITY);
        let c = root.find_descendant("C").unwrap();
        assert!(approx(c.world_transform().position, Vec3::new(2.0, 2.0, 0.0)));
        assert!(approx(c.world_transform().scale, Vec3::splat(2.0)));
        assert!(approx(c.world_matrix().transform_point3(Vec3::ZERO), Vec3::new(2.0, 2.0, 0.0)));
    }

    #[test]
    fn test_world_transform_idempotent() {
        let mut root = tree();
        root.find_child_mut("A").unwrap().transform = Transform {
            position: Vec3::new(0.1, 0.2, 0.3),
            rotation: Vec3::new(0.7, -1.2, 2.5),
            scale: Vec3::new(1.3, 0.9, 2.2),
        };
        root.update_world_transform(Mat4::IDENTITY);
        let first = root.find_descendant("A").unwrap().clone();
        let first_deep = root.find_child("A").unwrap().children()[0].world_matrix();

        root.update_world_transform(Mat4::IDENTITY);
        let second = root.find_descendant("A").unwrap();
        assert_eq!(first.world_matrix(), second.world_matrix());
        assert_eq!(first.world_transform(), second.world_transform());
        assert_eq!(first_deep, root.find_child("A").unwrap().children()[0].world_matrix());
    }

    #[test]
    fn test_hierarchy_lines() {
        let mut root = tree();
        root.find_child_mut("A").unwrap().visible = false;
        let mut lines = Vec::new();
        root.hierarchy_lines(0, &mut lines);
        assert_eq!(lines[0], "- Root");
        assert_eq!(lines[1], "  - A [HIDDEN]");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_interpolate() {
        let a = Transform::default();
        let b = Transform::from_position(Vec3::new(2.0, 0.0, 0.0));
        let mid = a.interpolate(&b, 0.5);
        assert_eq!(mid.position, Vec3::X);
        assert_eq!(mid.scale, Vec3::ONE);
    }
}
