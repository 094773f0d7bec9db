use crate::{any::TypeInfo, registry::Registry, store::ObjectStore};

/// DOT renderings of the registered providers and of the stored values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    /// Edges from every input type to its provider, and from the provider to every output type
    pub providers: String,
    /// One edge from every type to each of its stored values, labeled with the group
    pub objects: String,
}

pub(crate) fn render(registry: &Registry, store: &ObjectStore) -> Graph {
    Graph {
        providers: render_providers(registry),
        objects: render_objects(store),
    }
}

fn render_providers(registry: &Registry) -> String {
    let mut output = String::from("digraph G {\n");
    output.push_str("  rankdir=LR;\n");
    output.push_str("  node [shape=box, style=rounded];\n\n");

    for (index, node) in registry.nodes().iter().enumerate() {
        let id = format!("provider_{index}");
        let shape = if node.may_fail { "octagon" } else { "ellipse" };
        output.push_str(&format!(
            "  \"{id}\" [shape={shape}, label=\"{}\"];\n",
            escape_dot_label(&node.location.to_string())
        ));

        for key in node.input_keys() {
            output.push_str(&format!("  \"{}\" -> \"{id}\";\n", type_label(&key)));
        }
        for dependency in &node.outputs {
            output.push_str(&format!(
                "  \"{id}\" -> \"{}\" [label=\"{}\"];\n",
                type_label(&dependency.type_info),
                escape_dot_label(&format!("{} {}", dependency.multiplicity, dependency.group))
            ));
        }
    }

    output.push_str("}\n");
    output
}

fn render_objects(store: &ObjectStore) -> String {
    let mut output = String::from("digraph G {\n");
    output.push_str("  rankdir=LR;\n");
    output.push_str("  node [shape=box, style=rounded];\n\n");

    for (key, group, count) in store.counts() {
        let type_label = type_label(key);
        let group = escape_dot_label(group);
        for index in 0..count {
            output.push_str(&format!(
                "  \"{type_label}\" -> \"{type_label}[{group}][{index}]\" [label=\"{group}\"];\n"
            ));
        }
    }

    output.push_str("}\n");
    output
}

fn type_label(type_info: &TypeInfo) -> String {
    escape_dot_label(&type_info.to_string())
}

fn escape_dot_label(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::{escape_dot_label, render};
    use crate::{
        any::TypeInfo,
        dependency::DEFAULT_GROUP,
        provider::ProviderNode,
        reflect::Shared as _,
        registry::Registry,
        store::ObjectStore,
        utils::thread_safety::RcThreadSafety,
    };

    use std::{panic::Location, sync::Arc};

    struct Config;
    struct Server;

    #[test]
    fn test_escape() {
        assert_eq!(escape_dot_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }

    #[test]
    fn test_render() {
        let mut registry = Registry::new();
        registry.add(&RcThreadSafety::new(
            ProviderNode::new(|_: Arc<Config>| Arc::new(Server), Location::caller()).unwrap(),
        ));

        let mut store = ObjectStore::new();
        store.push(TypeInfo::of::<Arc<Config>>(), DEFAULT_GROUP, Arc::new(Config).into_stored());
        store.push(TypeInfo::of::<Arc<Config>>(), "test", Arc::new(Config).into_stored());

        let graph = render(&registry, &store);

        assert!(graph.providers.starts_with("digraph G {"));
        assert!(graph.providers.contains("\"Arc<Config>\" -> \"provider_0\";"));
        assert!(graph.providers.contains("\"provider_0\" -> \"Arc<Server>\""));
        assert!(graph.objects.contains("\"Arc<Config>\" -> \"Arc<Config>[default][0]\" [label=\"default\"];"));
        assert!(graph.objects.contains("\"Arc<Config>\" -> \"Arc<Config>[test][0]\" [label=\"test\"];"));
    }
}
