//! Include-spec flattening.
//!
//! Walks a nested [`IncludeSpec`] in pre-order and assigns every
//! relationship node a [`PathId`]. Later stages refer to paths by id and
//! reach parents through `parent` links instead of splitting strings.

use std::collections::HashMap;

use relq_proto::{FieldFilters, IncludeSpec};

use super::path::{PathId, RelationPath};

/// One relationship node of the include tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatPath {
    /// Position in pre-order.
    pub id: PathId,
    /// Dotted path from the root.
    pub path: RelationPath,
    /// The enclosing path, `None` for top-level entries.
    pub parent: Option<PathId>,
    /// Filters declared on this node (possibly empty).
    pub filters: FieldFilters,
    /// Fields requested on this node (empty means all).
    pub fields: Vec<String>,
}

/// The flattened include tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedIncludes {
    entries: Vec<FlatPath>,
}

/// Flatten an include spec rooted at the request entity.
pub fn flatten(spec: &IncludeSpec) -> FlattenedIncludes {
    flatten_with_prefix(spec, None)
}

/// Flatten an include spec whose paths are nested under `prefix`.
///
/// Top-level entries of `spec` have no parent id since `prefix` itself is not
/// part of the result.
pub fn flatten_with_prefix(spec: &IncludeSpec, prefix: Option<&RelationPath>) -> FlattenedIncludes {
    let mut out = FlattenedIncludes {
        entries: Vec::with_capacity(spec.node_count()),
    };
    walk(spec, prefix, None, &mut out.entries);
    out
}

fn walk(
    spec: &IncludeSpec,
    prefix: Option<&RelationPath>,
    parent: Option<PathId>,
    entries: &mut Vec<FlatPath>,
) {
    for (name, node) in spec.iter() {
        let path = match prefix {
            Some(prefix) => prefix.child(name),
            None => RelationPath::root(name),
        };
        let id = PathId(entries.len() as u32);
        entries.push(FlatPath {
            id,
            path: path.clone(),
            parent,
            filters: node.filters.clone(),
            fields: node.fields.clone(),
        });

        if !node.include.is_empty() {
            walk(&node.include, Some(&path), Some(id), entries);
        }
    }
}

impl FlattenedIncludes {
    /// Number of paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no paths.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in pre-order.
    pub fn entries(&self) -> &[FlatPath] {
        &self.entries
    }

    /// Look up an entry by id.
    pub fn get(&self, id: PathId) -> Option<&FlatPath> {
        self.entries.get(id.index())
    }

    /// Look up an entry by dotted path.
    pub fn lookup(&self, dotted: &str) -> Option<&FlatPath> {
        self.entries.iter().find(|e| e.path.to_string() == dotted)
    }

    /// Paths in pre-order.
    pub fn paths(&self) -> Vec<&RelationPath> {
        self.entries.iter().map(|e| &e.path).collect()
    }

    /// Paths that carry a non-empty filter, in path order.
    pub fn filter_map(&self) -> Vec<(&RelationPath, &FieldFilters)> {
        self.entries
            .iter()
            .filter(|e| !e.filters.is_empty())
            .map(|e| (&e.path, &e.filters))
            .collect()
    }

    /// Paths that carry a non-empty projection, in path order.
    pub fn fields_map(&self) -> Vec<(&RelationPath, &[String])> {
        self.entries
            .iter()
            .filter(|e| !e.fields.is_empty())
            .map(|e| (&e.path, e.fields.as_slice()))
            .collect()
    }

    /// Ids of the direct children of `parent` (`None` for top-level), in order.
    pub fn children_of(&self, parent: Option<PathId>) -> impl Iterator<Item = &FlatPath> {
        self.entries.iter().filter(move |e| e.parent == parent)
    }

    /// Split into the path list and the filter and field maps keyed by dotted path.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Vec<String>,
        HashMap<String, FieldFilters>,
        HashMap<String, Vec<String>>,
    ) {
        let mut paths = Vec::with_capacity(self.entries.len());
        let mut filters = HashMap::new();
        let mut fields = HashMap::new();
        for entry in self.entries {
            let key = entry.path.to_string();
            if !entry.filters.is_empty() {
                filters.insert(key.clone(), entry.filters);
            }
            if !entry.fields.is_empty() {
                fields.insert(key.clone(), entry.fields);
            }
            paths.push(key);
        }
        (paths, filters, fields)
    }
}
