use envkit_rs::index::{Dist, Spec};
use envkit_rs::planner::{Action, PlanError, Planner};
use envkit_rs::Prefix;
use envkit_rs_test_utils::*;

fn dist(s: &str) -> Dist {
	Dist::new(s).unwrap()
}

fn specs(s: &[&str]) -> Vec<Spec> {
	s.iter().map(|s| Spec::new(s).unwrap()).collect()
}

fn linked() -> Vec<Dist> {
	vec![dist("python-2.7.5-0"), dist("numpy-1.7.1-py27_0"), dist("scipy-0.12.0-py27_0"), dist("conda-1.7.2-py27_0")]
}

#[test]
fn plan_remove_only_named_package() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.env("test").unwrap(), linked());

	/* numpy has both a dependency and a dependent linked, neither is touched */
	let actions = planner.plan_remove(&prefix, &specs(&["numpy"])).unwrap();
	assert_eq!(actions, vec![Action::Unlink(dist("numpy-1.7.1-py27_0"))]);
}

#[test]
fn plan_remove_not_installed() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.env("test").unwrap(), linked());

	match planner.plan_remove(&prefix, &specs(&["numpy", "pkgA"])) {
		Err(PlanError::NameNotInstalled(name)) => assert_eq!(name, "pkgA"),
		other => panic!("unexpected plan {:?}", other),
	}
}

#[test]
fn plan_remove_protected_from_root() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.root(), linked());

	assert!(matches!(planner.plan_remove(&prefix, &specs(&["conda"])), Err(PlanError::ProtectedPackage(_))));
	/* Checked before anything else, even names that aren't installed */
	match planner.plan_remove(&prefix, &specs(&["scipy", "pyyaml", "python", "ghost"])) {
		Err(PlanError::ProtectedPackage(names)) => assert_eq!(names, vec!["python".to_string(), "pyyaml".to_string()]),
		other => panic!("unexpected plan {:?}", other),
	}
	assert_eq!(planner.plan_remove(&prefix, &specs(&["scipy"])).unwrap(), vec![Action::Unlink(dist("scipy-0.12.0-py27_0"))]);
}

#[test]
fn plan_remove_protected_allowed_outside_root() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.env("test").unwrap(), linked());

	assert_eq!(planner.plan_remove(&prefix, &specs(&["conda"])).unwrap(), vec![Action::Unlink(dist("conda-1.7.2-py27_0"))]);
}

#[test]
fn plan_remove_custom_protected_set() {
	init_logging();
	let mut root = TestRoot::new().unwrap();
	root.config.set_protected_packages(["scipy"]);
	let fetcher = MockFetcher::new();
	let planner = Planner::new(&root.config, &fetcher);
	let prefix = Prefix::new(root.root(), linked());

	assert!(matches!(planner.plan_remove(&prefix, &specs(&["scipy"])), Err(PlanError::ProtectedPackage(_))));
	assert!(planner.plan_remove(&prefix, &specs(&["conda"])).is_ok());
}
