use envkit_rs::index::{Dist, Spec};
use envkit_rs::planner::{Action, PlanError, Planner};
use envkit_rs::{Executor, Prefix, ReinstallPolicy};
use envkit_rs_test_utils::*;

fn dist(s: &str) -> Dist {
	Dist::new(s).unwrap()
}

fn specs(s: &[&str]) -> Vec<Spec> {
	s.iter().map(|s| Spec::new(s).unwrap()).collect()
}

#[test]
fn plan_install_skips_linked_dependency() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let index = sample_index().unwrap();
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.env("test").unwrap(), [dist("pkgB-2.1-0")]);

	let actions = planner.plan_install(&prefix, &index, &specs(&["pkgA"])).unwrap();
	assert_eq!(actions, vec![Action::Fetch(dist("pkgA-1.0-0")), Action::Link(dist("pkgA-1.0-0"))]);
}

#[test]
fn plan_install_orders_fetch_unlink_link() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let index = sample_index().unwrap();
	let fetcher = MockFetcher::new();
	fetcher.add_fetched(root.config.package_cache_dir(), &dist("python-2.7.5-0"));
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.env("test").unwrap(), [dist("python-3.3.2-0")]);

	let actions = planner.plan_install(&prefix, &index, &specs(&["scipy"])).unwrap();
	assert_eq!(actions, vec![
		Action::Fetch(dist("numpy-1.7.1-py27_0")),
		Action::Fetch(dist("scipy-0.12.0-py27_0")),
		Action::Unlink(dist("python-3.3.2-0")),
		Action::Link(dist("python-2.7.5-0")),
		Action::Link(dist("numpy-1.7.1-py27_0")),
		Action::Link(dist("scipy-0.12.0-py27_0")),
	]);
}

#[test]
fn plan_install_finds_fetched_in_any_cache() {
	init_logging();
	let mut root = TestRoot::new().unwrap();
	let second = root.root().join("pkgs2");
	root.config.set_pkgs_dirs(vec![root.root().join("pkgs"), second.clone()]);
	let index = sample_index().unwrap();
	let fetcher = MockFetcher::new();
	fetcher.add_fetched(&second, &dist("pkgB-2.1-0"));
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.env("test").unwrap(), []);

	let actions = planner.install_actions(&prefix, &index, &specs(&["pkgA"])).unwrap();
	assert_eq!(actions, vec![
		Action::Fetch(dist("pkgA-1.0-0")),
		Action::Link(dist("pkgB-2.1-0")),
		Action::Link(dist("pkgA-1.0-0")),
	]);
}

#[test]
fn plan_install_is_idempotent() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let index = sample_index().unwrap();
	let fetcher = MockFetcher::new();
	let deployment = MockDeployment::new();
	let path = root.env("test").unwrap();
	let request = specs(&["scipy", "pkgA"]);

	let mut prefix = Prefix::load(&path, &deployment).unwrap();
	let planner = Planner::new(&root.config, &fetcher);
	let actions = planner.plan_install(&prefix, &index, &request).unwrap();
	Executor::new(&root.config, &fetcher, &deployment).execute(&mut prefix, &actions, Some(&index)).unwrap();

	let prefix = Prefix::load(&path, &deployment).unwrap();
	assert!(planner.install_actions(&prefix, &index, &request).unwrap().is_empty());
	assert!(matches!(planner.plan_install(&prefix, &index, &request), Err(PlanError::NoActionNeeded)));
}

#[test]
fn plan_install_root_only_outside_root() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let index = sample_index().unwrap();
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);

	let env = Prefix::new(root.env("test").unwrap(), []);
	match planner.plan_install(&env, &index, &specs(&["pkgA", "conda"])) {
		Err(PlanError::RootOnlyPackage(names)) => assert_eq!(names, vec!["conda".to_string()]),
		other => panic!("unexpected plan {:?}", other),
	}

	let root_prefix = Prefix::new(root.root(), []);
	assert!(planner.plan_install(&root_prefix, &index, &specs(&["conda"])).is_ok());
}

#[test]
fn plan_install_reinstall_policy() {
	init_logging();
	let mut root = TestRoot::new().unwrap();
	let index = sample_index().unwrap();
	let fetcher = MockFetcher::new();
	let prefix = Prefix::new(root.env("test").unwrap(), [dist("pkgB-1.9-0")]);

	/* Newest upgrades the linked build */
	let actions = Planner::new(&root.config, &fetcher).install_actions(&prefix, &index, &specs(&["pkgB"])).unwrap();
	assert_eq!(actions, vec![
		Action::Fetch(dist("pkgB-2.1-0")),
		Action::Unlink(dist("pkgB-1.9-0")),
		Action::Link(dist("pkgB-2.1-0")),
	]);

	root.config.set_reinstall_policy(ReinstallPolicy::PreferLinked);
	let planner = Planner::new(&root.config, &fetcher);
	assert!(planner.install_actions(&prefix, &index, &specs(&["pkgB"])).unwrap().is_empty());
	/* Unless the linked build no longer fits */
	let actions = planner.install_actions(&prefix, &index, &specs(&["pkgA"])).unwrap();
	assert!(actions.contains(&Action::Unlink(dist("pkgB-1.9-0"))));
	assert!(actions.contains(&Action::Link(dist("pkgB-2.1-0"))));
}

#[test]
fn plan_install_surfaces_resolve_errors() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let index = sample_index().unwrap();
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.env("test").unwrap(), []);
	assert!(matches!(planner.plan_install(&prefix, &index, &specs(&["nonexistent"])), Err(PlanError::Resolve(_))));
}
