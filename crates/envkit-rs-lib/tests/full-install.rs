use envkit_rs::index::{Dist, Index};
use envkit_rs::installation::{ChannelFetcher, Deployment, HardLinkDeployment};
use envkit_rs::planner::{Action, PlanError};
use envkit_rs::{Error, Manager};
use envkit_rs_test_utils::*;

/// Writes archives for a small index into a `file://` channel inside the test root.
fn local_channel(root: &TestRoot) -> Index {
	let channel_dir = root.root().join("channel").join("linux-64");
	let channel = format!("file://{}/", channel_dir.display());
	let packages: [(&str, &[&str], &[(&str, &str)]); 3] = [
		("pkgA-1.0-0", &["pkgB >=2.0"], &[("bin/pkgA", "a"), ("info/index.json", "{}")]),
		("pkgB-2.1-0", &[], &[("lib/pkgB/core.txt", "b 2.1"), ("lib/pkgB/extra.txt", "extra")]),
		("pkgB-1.9-0", &[], &[("lib/pkgB/core.txt", "b 1.9")]),
	];

	let mut builder = IndexBuilder::new();
	for (name, depends, files) in packages {
		let dist = Dist::new(name).unwrap();
		let archive = write_package_archive(&channel_dir, &dist, files).unwrap();
		let checksum = sha256::digest(std::fs::read(archive).unwrap().as_slice());
		let channel = channel.clone();
		builder = builder.package_with(name, depends, move |r| {
			r.channel = channel;
			r.sha256 = Some(checksum);
		});
	}
	builder.build().unwrap()
}

#[test]
fn full_install_and_uninstall() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let index = local_channel(&root);
	let fetcher = ChannelFetcher::new(&root.config);
	let deployment = HardLinkDeployment;
	let manager = Manager::new(&root.config, &fetcher, &deployment);
	let env = root.env("test").unwrap();

	let actions = manager.install(&index, "pkgA-1.0-0.tar.gz", Some(env.as_path())).unwrap();
	assert_eq!(actions.len(), 4);
	assert_eq!(std::fs::read_to_string(env.join("bin/pkgA")).unwrap(), "a");
	assert_eq!(std::fs::read_to_string(env.join("lib/pkgB/core.txt")).unwrap(), "b 2.1");
	assert!(!env.join("info").exists());
	assert!(root.config.package_cache_dir().join("pkgA-1.0-0").is_dir());

	/* Installing again changes nothing */
	assert!(matches!(manager.install(&index, "pkgA-1.0-0.tar.gz", Some(env.as_path())), Err(Error::Plan(PlanError::NoActionNeeded))));
	assert_eq!(manager.installed_prefixes("pkgB-2.1-0.tar.gz").unwrap(), vec![env.clone()]);

	/* Uninstall leaves the dependency */
	let actions = manager.uninstall("pkgA-1.0-0.tar.gz", Some(env.as_path())).unwrap();
	assert_eq!(actions, vec![Action::Unlink(Dist::new("pkgA-1.0-0").unwrap())]);
	assert!(!env.join("bin").exists());
	assert!(env.join("lib/pkgB/core.txt").exists());
	assert_eq!(deployment.linked(&env).unwrap().len(), 1);
}

#[test]
fn full_install_replaces_older_build() {
	init_logging();
	let root = TestRoot::new().unwrap();
	let index = local_channel(&root);
	let fetcher = ChannelFetcher::new(&root.config);
	let deployment = HardLinkDeployment;
	let manager = Manager::new(&root.config, &fetcher, &deployment);
	let env = root.env("test").unwrap();

	manager.install(&index, "pkgB-1.9-0.tar.gz", Some(env.as_path())).unwrap();
	assert_eq!(std::fs::read_to_string(env.join("lib/pkgB/core.txt")).unwrap(), "b 1.9");

	let actions = manager.install(&index, "pkgA-1.0-0.tar.gz", Some(env.as_path())).unwrap();
	assert!(actions.contains(&Action::Unlink(Dist::new("pkgB-1.9-0").unwrap())));
	assert_eq!(std::fs::read_to_string(env.join("lib/pkgB/core.txt")).unwrap(), "b 2.1");
	assert_eq!(deployment.linked(&env).unwrap().into_iter().map(|d| d.to_string()).collect::<Vec<_>>(), vec!["pkgA-1.0-0", "pkgB-2.1-0"]);
}

#[test]
fn full_install_links_from_second_cache() {
	init_logging();
	let mut root = TestRoot::new().unwrap();
	let index = local_channel(&root);
	let env = root.env("test").unwrap();
	let deployment = HardLinkDeployment;

	/* Fetch into the default cache then move everything to a read only mirror */
	{
		let fetcher = ChannelFetcher::new(&root.config);
		let manager = Manager::new(&root.config, &fetcher, &deployment);
		manager.install(&index, "pkgA-1.0-0.tar.gz", Some(env.as_path())).unwrap();
		manager.uninstall("pkgA-1.0-0.tar.gz", Some(env.as_path())).unwrap();
	}
	let mirror = root.root().join("mirror");
	mirror_package_cache(root.config.package_cache_dir(), &mirror).unwrap();
	std::fs::remove_dir_all(root.config.package_cache_dir()).unwrap();
	root.config.set_pkgs_dirs(vec![root.root().join("pkgs"), mirror]);

	let fetcher = ChannelFetcher::new(&root.config);
	let manager = Manager::new(&root.config, &fetcher, &deployment);
	let actions = manager.install(&index, "pkgA-1.0-0.tar.gz", Some(env.as_path())).unwrap();
	assert_eq!(actions, vec![Action::Link(Dist::new("pkgA-1.0-0").unwrap())]);
	assert!(env.join("bin/pkgA").exists());
}
