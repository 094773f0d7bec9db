use std::collections::{BTreeMap, BTreeSet};

use crate::{any::TypeInfo, errors::CyclePath, provider::ProviderNode, utils::thread_safety::RcThreadSafety};

/// Providers by the keys they produce, in registration order
#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<TypeInfo, Vec<RcThreadSafety<ProviderNode>>>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends the node under every output key, once per key
    pub(crate) fn add(&mut self, node: &RcThreadSafety<ProviderNode>) {
        for output in &node.outputs {
            let nodes = self.entries.entry(output.type_info).or_default();
            if !nodes.iter().any(|added| RcThreadSafety::ptr_eq(added, node)) {
                nodes.push(node.clone());
            }
        }
    }

    /// Removes a node added last, leaving the registry as it was before [`Registry::add`]
    pub(crate) fn rollback(&mut self, node: &RcThreadSafety<ProviderNode>) {
        for output in &node.outputs {
            if let Some(nodes) = self.entries.get_mut(&output.type_info) {
                nodes.retain(|added| !RcThreadSafety::ptr_eq(added, node));
                if nodes.is_empty() {
                    self.entries.remove(&output.type_info);
                }
            }
        }
    }

    #[must_use]
    pub(crate) fn providers(&self, key: &TypeInfo) -> Vec<RcThreadSafety<ProviderNode>> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Every node once, in key order of its first output
    #[must_use]
    pub(crate) fn nodes(&self) -> Vec<RcThreadSafety<ProviderNode>> {
        let mut nodes: Vec<RcThreadSafety<ProviderNode>> = Vec::new();
        for node in self.entries.values().flatten() {
            if !nodes.iter().any(|added| RcThreadSafety::ptr_eq(added, node)) {
                nodes.push(node.clone());
            }
        }
        nodes
    }

    /// Edges from every produced key to the keys its providers consume
    fn dependency_graph(&self) -> BTreeMap<TypeInfo, BTreeSet<TypeInfo>> {
        let mut graph: BTreeMap<TypeInfo, BTreeSet<TypeInfo>> = BTreeMap::new();
        for (key, nodes) in &self.entries {
            let edges = graph.entry(*key).or_default();
            for node in nodes {
                edges.extend(node.input_keys());
            }
        }
        graph
    }

    pub(crate) fn dfs_detect(&self) -> Result<(), CyclePath> {
        let graph = self.dependency_graph();
        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();

        for type_info in graph.keys() {
            if let Some(position) = Self::dfs_visit(&graph, type_info, &mut visited, &mut stack) {
                return Err(CyclePath(stack.split_off(position).into_boxed_slice()));
            }
        }
        Ok(())
    }

    /// Returns the stack position where the cycle starts
    fn dfs_visit(
        graph: &BTreeMap<TypeInfo, BTreeSet<TypeInfo>>,
        type_info: &TypeInfo,
        visited: &mut BTreeSet<TypeInfo>,
        stack: &mut Vec<TypeInfo>,
    ) -> Option<usize> {
        if visited.contains(type_info) {
            return None;
        }
        if let Some(position) = stack.iter().position(|on_stack| on_stack == type_info) {
            return Some(position);
        }
        stack.push(*type_info);

        if let Some(edges) = graph.get(type_info) {
            for edge in edges {
                if let Some(position) = Self::dfs_visit(graph, edge, visited, stack) {
                    return Some(position);
                }
            }
        }

        stack.pop();
        visited.insert(*type_info);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::{any::TypeInfo, provider::ProviderNode, utils::thread_safety::RcThreadSafety};

    use std::{panic::Location, sync::Arc};

    struct A;
    struct B;
    struct C;
    struct D;

    fn node(provider: ProviderNode) -> RcThreadSafety<ProviderNode> {
        RcThreadSafety::new(provider)
    }

    #[test]
    fn test_registry_dfs_detect_ok() {
        let mut registry = Registry::new();
        registry.add(&node(ProviderNode::new(|| Arc::new(A), Location::caller()).unwrap()));
        registry.add(&node(ProviderNode::new(|_: Arc<A>| Arc::new(B), Location::caller()).unwrap()));
        registry.add(&node(
            ProviderNode::new(|_: Arc<B>, _: Arc<A>| Arc::new(C), Location::caller()).unwrap(),
        ));

        registry.dfs_detect().unwrap();
    }

    #[test]
    fn test_registry_dfs_detect_cycle() {
        let mut registry = Registry::new();
        registry.add(&node(ProviderNode::new(|_: Arc<C>| Arc::new(A), Location::caller()).unwrap()));
        registry.add(&node(ProviderNode::new(|_: Arc<A>| Arc::new(B), Location::caller()).unwrap()));
        registry.add(&node(
            ProviderNode::new(|_: Arc<B>, _: Option<Arc<D>>| Arc::new(C), Location::caller()).unwrap(),
        ));

        let path = registry.dfs_detect().unwrap_err();
        assert_eq!(path.types().len(), 3);
        assert!(path.contains(&TypeInfo::of::<Arc<A>>()));
        assert!(path.contains(&TypeInfo::of::<Arc<B>>()));
        assert!(path.contains(&TypeInfo::of::<Arc<C>>()));
        assert!(!path.contains(&TypeInfo::of::<Arc<D>>()));
    }

    #[test]
    fn test_rollback() {
        let mut registry = Registry::new();
        let a = node(ProviderNode::new(|| Arc::new(A), Location::caller()).unwrap());
        let self_loop = node(ProviderNode::new(|_: Arc<A>| Arc::new(A), Location::caller()).unwrap());

        registry.add(&a);
        registry.add(&self_loop);
        assert!(registry.dfs_detect().is_err());

        registry.rollback(&self_loop);
        registry.dfs_detect().unwrap();
        assert_eq!(registry.providers(&TypeInfo::of::<Arc<A>>()).len(), 1);
        assert_eq!(registry.nodes().len(), 1);
    }
}
