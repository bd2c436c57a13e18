//! Scene: node tree, model registry, selection, camera and light.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use super::camera::Camera;
use super::light::Light;
use super::node::{ModelHandle, NodeKind, SceneNode};
use crate::geom::{Model, Texture};
use crate::util::{Bounds, Error, Mat4, Result};

/// Name of the node that always sits at the top of the tree.
pub const ROOT_NAME: &str = "Root";

/// The whole renderable world.
///
/// Models live in a registry keyed by their source path, so several nodes can
/// share one mesh. Nodes refer to them through [`ModelHandle`].
pub struct Scene {
    root: SceneNode,
    models: HashMap<String, Model>,
    selected: Option<String>,
    pub camera: Camera,
    pub light: Light,
    background: Option<Texture>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            root: SceneNode::new(ROOT_NAME, NodeKind::Empty),
            models: HashMap::new(),
            selected: None,
            camera: Camera::default(),
            light: Light::default(),
            background: None,
        }
    }

    pub fn root(&self) -> &SceneNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut SceneNode {
        &mut self.root
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    /// Load a mesh file (once per path) and attach it to a new node under the root.
    ///
    /// Returns the name of the created node. The node name defaults to the
    /// file stem and is made unique.
    pub fn load_model(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<String> {
        let path = path.as_ref();
        let key = path.to_string_lossy().into_owned();
        if !self.models.contains_key(&key) {
            let model = Model::load(path);
            if model.is_empty() {
                return Err(Error::EmptyModel(path.to_path_buf()));
            }
            self.models.insert(key.clone(), model);
        }
        let base = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Mesh".to_string()),
        };
        Ok(self.attach_mesh_node(key, &base))
    }

    /// Register an in-memory model under `key` (if not yet present) and attach
    /// it to a new node under the root.
    pub fn add_model(&mut self, key: impl Into<String>, model: Model, name: &str) -> String {
        let key = key.into();
        self.models.entry(key.clone()).or_insert(model);
        self.attach_mesh_node(key, name)
    }

    fn attach_mesh_node(&mut self, key: String, base: &str) -> String {
        let name = self.generate_unique_name(base);
        self.root
            .add_child(SceneNode::with_model(name.clone(), ModelHandle(key)));
        debug!("created mesh node '{name}'");
        name
    }

    pub fn model(&self, handle: &ModelHandle) -> Option<&Model> {
        self.models.get(handle.as_str())
    }

    pub fn model_mut(&mut self, handle: &ModelHandle) -> Option<&mut Model> {
        self.models.get_mut(handle.as_str())
    }

    /// Model attached to the named node.
    pub fn node_model_mut(&mut self, name: &str) -> Option<&mut Model> {
        let handle = self.find_node(name)?.model.clone()?;
        self.models.get_mut(handle.as_str())
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// New empty node under the root. Returns its (unique) name.
    pub fn create_empty_node(&mut self, name: Option<&str>) -> String {
        let name = self.generate_unique_name(name.filter(|n| !n.is_empty()).unwrap_or("Empty"));
        self.root.add_child(SceneNode::new(name.clone(), NodeKind::Empty));
        name
    }

    /// Insert `node` under `parent`, renaming it if its name is taken.
    pub fn add_node(&mut self, parent: &str, mut node: SceneNode) -> Result<String> {
        if self.find_node(parent).is_none() {
            return Err(Error::node(parent));
        }
        node.name = self.generate_unique_name(&node.name);
        let name = node.name.clone();
        let parent = self.find_node_mut(parent).ok_or_else(|| Error::node(parent))?;
        parent.add_child(node);
        Ok(name)
    }

    /// Move an existing node (with its subtree) under a new parent.
    pub fn reparent(&mut self, name: &str, new_parent: &str) -> Result<()> {
        if name == ROOT_NAME {
            return Err(Error::other("cannot reparent the root node"));
        }
        let node = self.find_node(name).ok_or_else(|| Error::node(name))?;
        if node.find_descendant(new_parent).is_some() || name == new_parent {
            return Err(Error::other(format!("'{new_parent}' is inside '{name}'")));
        }
        if self.find_node(new_parent).is_none() {
            return Err(Error::node(new_parent));
        }
        let node = self.root.remove_descendant(name).ok_or_else(|| Error::node(name))?;
        let parent = self
            .find_node_mut(new_parent)
            .ok_or_else(|| Error::node(new_parent))?;
        parent.add_child(node);
        Ok(())
    }

    pub fn find_node(&self, name: &str) -> Option<&SceneNode> {
        if self.root.name == name {
            return Some(&self.root);
        }
        self.root.find_descendant(name)
    }

    pub fn find_node_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if self.root.name == name {
            return Some(&mut self.root);
        }
        self.root.find_descendant_mut(name)
    }

    /// Parent of the named node; `None` for the root and unknown names.
    pub fn parent_of(&self, name: &str) -> Option<&SceneNode> {
        if self.root.name == name {
            return None;
        }
        self.root.find_parent_of(name)
    }

    /// Remove a node and its subtree.
    ///
    /// Returns false for the root and for unknown names, leaving the scene
    /// unchanged. Clears the selection if it pointed into the removed subtree.
    pub fn delete_node(&mut self, name: &str) -> bool {
        if name == ROOT_NAME {
            warn!("cannot delete root node");
            return false;
        }
        let Some(removed) = self.root.remove_descendant(name) else {
            warn!("node not found: {name}");
            return false;
        };
        if let Some(sel) = &self.selected {
            if removed.name == *sel || removed.find_descendant(sel).is_some() {
                self.selected = None;
            }
        }
        info!("deleted node {name}");
        true
    }

    /// Copy a node (and its subtree) next to the original, with a fresh name.
    pub fn duplicate_node(&mut self, name: &str) -> Option<String> {
        if name == ROOT_NAME {
            return None;
        }
        let parent = self.parent_of(name)?.name.clone();
        let mut copy = self.find_node(name)?.clone();
        copy.visit_mut(&mut |n| n.selected = false);
        // children keep their names only if still unique after the copy
        let mut taken = Vec::new();
        copy.visit(&mut |n| taken.push(n.name.clone()));
        let mut renames = Vec::new();
        for old in taken.into_iter().skip(1) {
            renames.push((old.clone(), self.generate_unique_name(&old)));
        }
        copy.visit_mut(&mut |n| {
            if let Some((_, new)) = renames.iter().find(|(old, _)| *old == n.name) {
                n.name = new.clone();
            }
        });
        self.add_node(&parent, copy).ok()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select a node by name. Unknown names clear the selection and return false.
    pub fn select_node(&mut self, name: &str) -> bool {
        self.clear_selection();
        match self.find_node_mut(name) {
            Some(node) => {
                node.selected = true;
                self.selected = Some(name.to_string());
                debug!("selected node {name}");
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        if let Some(prev) = self.selected.take() {
            if let Some(node) = self.find_node_mut(&prev) {
                node.selected = false;
            }
        }
    }

    pub fn selected_node(&self) -> Option<&SceneNode> {
        self.selected.as_deref().and_then(|n| self.find_node(n))
    }

    pub fn selected_node_mut(&mut self) -> Option<&mut SceneNode> {
        let name = self.selected.clone()?;
        self.find_node_mut(&name)
    }

    /// Cycle the selection forward through mesh nodes.
    pub fn select_next(&mut self) -> Option<String> {
        self.cycle_selection(1)
    }

    /// Cycle the selection backward through mesh nodes.
    pub fn select_previous(&mut self) -> Option<String> {
        self.cycle_selection(-1)
    }

    fn cycle_selection(&mut self, step: isize) -> Option<String> {
        let names: Vec<String> = self.mesh_nodes().iter().map(|n| n.name.clone()).collect();
        if names.is_empty() {
            return None;
        }
        let n = names.len() as isize;
        let next = match self.selected.as_ref().and_then(|s| names.iter().position(|x| x == s)) {
            Some(i) => (i as isize + step).rem_euclid(n) as usize,
            None if step >= 0 => 0,
            None => names.len() - 1,
        };
        let name = names[next].clone();
        self.select_node(&name);
        Some(name)
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Recompute every world matrix from the root down.
    pub fn update_all_transforms(&mut self) {
        self.root.update_world_transform(Mat4::IDENTITY);
    }

    /// All nodes with a model, pre-order.
    pub fn mesh_nodes(&self) -> Vec<&SceneNode> {
        let mut out = Vec::new();
        self.root.visit(&mut |n| {
            if n.has_model() {
                out.push(n);
            }
        });
        out
    }

    /// Visible nodes with a model. Hidden nodes hide their whole subtree.
    pub fn visible_mesh_nodes(&self) -> Vec<&SceneNode> {
        fn collect<'a>(node: &'a SceneNode, out: &mut Vec<&'a SceneNode>) {
            if !node.visible {
                return;
            }
            if node.has_model() {
                out.push(node);
            }
            for child in node.children() {
                collect(child, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// Visible mesh nodes paired with their models.
    pub fn visible_meshes(&self) -> Vec<(&SceneNode, &Model)> {
        self.visible_mesh_nodes()
            .into_iter()
            .filter_map(|n| {
                let model = self.model(n.model.as_ref()?)?;
                Some((n, model))
            })
            .collect()
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_nodes().len()
    }

    /// World-space bounds of all visible meshes (requires up-to-date transforms).
    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::EMPTY;
        for (node, model) in self.visible_meshes() {
            let world = node.world_matrix();
            for &p in model.positions() {
                b.expand(world.transform_point3(p));
            }
        }
        b
    }

    /// `base`, then `base_1`, `base_2`, ... until no node has that name.
    pub fn generate_unique_name(&self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 1;
        while self.find_node(&candidate).is_some() {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        candidate
    }

    /// Printable tree, one line per node.
    pub fn hierarchy_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.hierarchy_lines(0, &mut out);
        out
    }

    /// Drop every node and model. A fresh root is created.
    pub fn clear(&mut self) {
        self.selected = None;
        self.models.clear();
        self.root = SceneNode::new(ROOT_NAME, NodeKind::Empty);
        info!("scene cleared");
    }

    // ------------------------------------------------------------------
    // Background
    // ------------------------------------------------------------------

    /// Background image drawn behind the meshes. Keeps the old one on failure.
    pub fn load_background(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let tex = Texture::load(path.as_ref())?;
        info!("loaded background {}", path.as_ref().display());
        self.background = Some(tex);
        Ok(())
    }

    pub fn set_background(&mut self, tex: Option<Texture>) {
        self.background = tex;
    }

    pub fn clear_background(&mut self) {
        self.background = None;
    }

    pub fn background(&self) -> Option<&Texture> {
        self.background.as_ref()
    }
}
