// Visibility: category toggles hide edges, search dims everything outside the matches' neighborhood

use crate::model::EdgeCategory;
use crate::store::{GraphStore, Neighborhood};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// On/off switch per edge category. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryToggles {
    resource: bool,
    network: bool,
    data: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            resource: true,
            network: true,
            data: true,
        }
    }
}

impl CategoryToggles {
    pub fn new(resource: bool, network: bool, data: bool) -> Self {
        Self {
            resource,
            network,
            data,
        }
    }

    pub fn is_enabled(&self, category: EdgeCategory) -> bool {
        match category {
            EdgeCategory::Resource => self.resource,
            EdgeCategory::Network => self.network,
            EdgeCategory::Data => self.data,
        }
    }

    pub fn set(&mut self, category: EdgeCategory, enabled: bool) {
        match category {
            EdgeCategory::Resource => self.resource = enabled,
            EdgeCategory::Network => self.network = enabled,
            EdgeCategory::Data => self.data = enabled,
        }
    }

    /// Flip one category, returning its new state.
    pub fn toggle(&mut self, category: EdgeCategory) -> bool {
        let enabled = !self.is_enabled(category);
        self.set(category, enabled);
        enabled
    }
}

/// Hidden removes an element from rendering and layout; dimmed only fades it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementFlags {
    pub hidden: bool,
    pub dimmed: bool,
}

/// Per-element flags produced by one [`FilterEngine::compute`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityMap {
    flags: HashMap<String, ElementFlags>,
    matches: BTreeSet<String>,
    searching: bool,
}

impl VisibilityMap {
    pub fn flags(&self, id: &str) -> ElementFlags {
        self.flags.get(id).copied().unwrap_or_default()
    }

    pub fn is_hidden(&self, id: &str) -> bool {
        self.flags(id).hidden
    }

    pub fn is_dimmed(&self, id: &str) -> bool {
        self.flags(id).dimmed
    }

    /// Nodes whose label or id matched the active search.
    pub fn matches(&self) -> &BTreeSet<String> {
        &self.matches
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn hidden_ids(&self) -> BTreeSet<&str> {
        self.ids_where(|f| f.hidden)
    }

    pub fn dimmed_ids(&self) -> BTreeSet<&str> {
        self.ids_where(|f| f.dimmed)
    }

    fn ids_where(&self, pred: impl Fn(&ElementFlags) -> bool) -> BTreeSet<&str> {
        self.flags
            .iter()
            .filter(|(_, f)| pred(f))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Holds toggle and search state and derives a [`VisibilityMap`] from the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterEngine {
    toggles: CategoryToggles,
    query: String,
}

impl FilterEngine {
    pub fn new(toggles: CategoryToggles) -> Self {
        Self {
            toggles,
            query: String::new(),
        }
    }

    pub fn toggles(&self) -> &CategoryToggles {
        &self.toggles
    }

    pub fn set_category(&mut self, category: EdgeCategory, enabled: bool) {
        self.toggles.set(category, enabled);
    }

    pub fn toggle_category(&mut self, category: EdgeCategory) -> bool {
        self.toggles.toggle(category)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Hidden comes from the toggles alone. A non-blank query then dims every
    /// element outside the matched nodes and their one-hop neighborhood over
    /// visible edges.
    pub fn compute(&self, store: &GraphStore) -> VisibilityMap {
        let mut map = VisibilityMap::default();
        for node in store.nodes() {
            map.flags.insert(node.id.clone(), ElementFlags::default());
        }
        for edge in store.edges() {
            map.flags.insert(
                edge.id.clone(),
                ElementFlags {
                    hidden: !self.toggles.is_enabled(edge.category()),
                    dimmed: false,
                },
            );
        }

        let needle = self.query.trim().to_lowercase();
        if needle.is_empty() {
            return map;
        }
        map.searching = true;

        map.matches = store
            .nodes()
            .filter(|n| {
                n.label.to_lowercase().contains(&needle) || n.id.to_lowercase().contains(&needle)
            })
            .map(|n| n.id.clone())
            .collect();

        let mut highlighted = Neighborhood::default();
        for id in &map.matches {
            if let Some(hood) =
                store.neighborhood_where(id, |e| self.toggles.is_enabled(e.category()))
            {
                highlighted.extend(hood);
            }
        }

        for (id, flags) in map.flags.iter_mut() {
            flags.dimmed = !highlighted.contains(id);
        }
        debug!(
            "Search '{}' matched {} node(s), highlighted {} element(s)",
            needle,
            map.matches.len(),
            highlighted.nodes.len() + highlighted.edges.len()
        );
        map
    }
}
