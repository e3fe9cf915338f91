use std::collections::{BTreeMap, HashMap};

use petgraph::prelude::*;

use crate::index::Dist;

/// Output of the resolver, one distribution per name.
///
/// Every dependency of every member is satisfied by the member with that name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSet {
	by_name: BTreeMap<String, Dist>,
	install_order: Vec<Dist>,
}

impl ResolvedSet {
	/// `chosen` maps each name to its distribution and the names it depends on.
	pub(super) fn new(chosen: BTreeMap<String, (Dist, Vec<String>)>) -> Self {
		let mut graph = DiGraph::<&str, ()>::new();
		let mut nodes = HashMap::<&str, NodeIndex>::new();
		for name in chosen.keys() {
			nodes.insert(name, graph.add_node(name));
		}
		for (name, (_, deps)) in &chosen {
			for dep in deps {
				if let (Some(a), Some(b)) = (nodes.get(name.as_str()), nodes.get(dep.as_str())) {
					graph.update_edge(*a, *b, ());
				}
			}
		}

		/* Components come out with dependencies before their dependents, members of a cycle are ordered by name */
		let mut install_order = Vec::<Dist>::with_capacity(chosen.len());
		for mut component in petgraph::algo::tarjan_scc(&graph) {
			component.sort_by_key(|i| graph[*i]);
			install_order.extend(component.into_iter().filter_map(|i| chosen.get(graph[i]).map(|(d, _)| d.clone())));
		}

		Self {
			by_name: chosen.into_iter().map(|(name, (dist, _))| (name, dist)).collect(),
			install_order,
		}
	}

	/// Distributions in name order.
	pub fn iter(&self) -> impl Iterator<Item = &Dist> {
		self.by_name.values()
	}

	/// Distributions ordered so dependencies come before the packages needing them.
	pub fn install_order(&self) -> &[Dist] {
		&self.install_order
	}

	pub fn get(&self, name: &str) -> Option<&Dist> {
		self.by_name.get(name)
	}

	pub fn contains(&self, dist: &Dist) -> bool {
		self.by_name.get(dist.name()) == Some(dist)
	}

	pub fn len(&self) -> usize {
		self.by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_name.is_empty()
	}
}

impl<'a> IntoIterator for &'a ResolvedSet {
	type Item = &'a Dist;
	type IntoIter = std::collections::btree_map::Values<'a, String, Dist>;
	fn into_iter(self) -> Self::IntoIter {
		self.by_name.values()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn chosen(entries: &[(&str, &[&str])]) -> BTreeMap<String, (Dist, Vec<String>)> {
		entries.iter().map(|(dist, deps)| {
			let dist = Dist::new(dist).unwrap();
			(dist.name().to_string(), (dist, deps.iter().map(|s| s.to_string()).collect()))
		}).collect()
	}

	#[test]
	fn dependencies_install_first() {
		let set = ResolvedSet::new(chosen(&[
			("app-1.0-0", &["lib", "python"]),
			("lib-2.0-0", &["python"]),
			("python-3.3-0", &[]),
		]));
		let order: Vec<&str> = set.install_order().iter().map(Dist::as_str).collect();
		assert_eq!(order, vec!["python-3.3-0", "lib-2.0-0", "app-1.0-0"]);
	}

	#[test]
	fn cycle_members_order_by_name() {
		let set = ResolvedSet::new(chosen(&[
			("b-1.0-0", &["a"]),
			("a-1.0-0", &["b"]),
		]));
		let order: Vec<&str> = set.install_order().iter().map(Dist::as_str).collect();
		assert_eq!(order, vec!["a-1.0-0", "b-1.0-0"]);
		assert!(set.contains(&Dist::new("a-1.0-0").unwrap()));
		assert!(!set.contains(&Dist::new("a-2.0-0").unwrap()));
	}
}
