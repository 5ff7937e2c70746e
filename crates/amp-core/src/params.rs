//! Ordered parameter tree shared between models and the export layer.
//!
//! A [`ParamMap`] mirrors a model's component tree: internal nodes are named
//! sub-maps, leaves are [`TensorData`] records holding a shape and the tensor
//! values flattened row-major. Entries keep insertion order, which is what
//! makes two exports of the same architecture structurally comparable.

use crate::error::{ModelError, ModelResult};

/// A single tensor leaf: literal shape plus row-major flattened values.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    /// Tensor dimensions; never empty, even for one-element tensors.
    pub shape: Vec<usize>,
    /// Values flattened in row-major order.
    pub values: Vec<f32>,
}

impl TensorData {
    /// Create a new leaf from a shape and flattened values.
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    /// Number of elements implied by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check the leaf invariants, reporting `path` on failure.
    pub fn validate(&self, path: &str) -> ModelResult<()> {
        if self.shape.is_empty() {
            return Err(ModelError::malformed_parameter(path, "empty shape"));
        }
        if self.values.len() != self.element_count() {
            return Err(ModelError::malformed_parameter(
                path,
                format!(
                    "shape {:?} implies {} values, found {}",
                    self.shape,
                    self.element_count(),
                    self.values.len()
                ),
            ));
        }
        Ok(())
    }
}

/// One entry in a parameter tree: either a leaf tensor or a nested node.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamEntry {
    Tensor(TensorData),
    Node(ParamMap),
}

/// Insertion-ordered mapping from component/parameter name to entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    entries: Vec<(String, ParamEntry)>,
}

impl ParamMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tensor leaf under `name`.
    pub fn insert_tensor(&mut self, name: impl Into<String>, data: TensorData) {
        self.entries.push((name.into(), ParamEntry::Tensor(data)));
    }

    /// Append a nested node under `name`.
    pub fn insert_node(&mut self, name: impl Into<String>, node: ParamMap) {
        self.entries.push((name.into(), ParamEntry::Node(node)));
    }

    /// Look up a direct child by name.
    pub fn get(&self, name: &str) -> Option<&ParamEntry> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
    }

    /// Look up a direct child leaf by name.
    pub fn tensor(&self, name: &str) -> Option<&TensorData> {
        match self.get(name) {
            Some(ParamEntry::Tensor(data)) => Some(data),
            _ => None,
        }
    }

    /// Look up a direct child node by name.
    pub fn node(&self, name: &str) -> Option<&ParamMap> {
        match self.get(name) {
            Some(ParamEntry::Node(node)) => Some(node),
            _ => None,
        }
    }

    /// Iterate entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ParamEntry)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no children.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of scalar values across all leaves, recursively.
    pub fn value_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, entry)| match entry {
                ParamEntry::Tensor(data) => data.values.len(),
                ParamEntry::Node(node) => node.value_count(),
            })
            .sum()
    }

    /// Total number of leaves, recursively.
    pub fn leaf_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, entry)| match entry {
                ParamEntry::Tensor(_) => 1,
                ParamEntry::Node(node) => node.leaf_count(),
            })
            .sum()
    }

    /// Validate every leaf in the tree, reporting full dotted paths.
    pub fn validate(&self, prefix: &str) -> ModelResult<()> {
        for (name, entry) in self.entries() {
            let path = join_path(prefix, name);
            match entry {
                ParamEntry::Tensor(data) => data.validate(&path)?,
                ParamEntry::Node(node) => node.validate(&path)?,
            }
        }
        Ok(())
    }
}

/// Join a dotted parameter path, skipping an empty prefix.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
