//! Property tests for the upload plan: ordering, exclusion, idempotence.

use std::collections::HashSet;

use proptest::prelude::*;

use kb_deploy::{
    UploadPlan, UploadStep, ENTRY_POINT_FILE, LONG_LIVED_CACHE_CONTROL, NO_CACHE_CONTROL,
    SERVICE_WORKER_FILE,
};

use crate::common::BuildDirBuilder;

/// Asset paths that can never collide with the entry point or service
/// worker: short names, extensions outside `.html`, fixed directories.
fn asset_path() -> impl Strategy<Value = String> {
    let name = proptest::string::string_regex("[a-z0-9]{1,8}\\.(js|css|map|png|txt)").unwrap();
    let dir = proptest::sample::select(vec!["", "assets/", "static/js/", "static/css/"]);
    (dir, name).prop_map(|(dir, name)| format!("{}{}", dir, name))
}

fn asset_set() -> impl Strategy<Value = HashSet<String>> {
    proptest::collection::hash_set(asset_path(), 0..16)
}

fn build_dir(
    assets: &HashSet<String>,
    entry_point: bool,
    service_worker: bool,
) -> tempfile::TempDir {
    let mut builder = BuildDirBuilder::new();
    for asset in assets {
        builder = builder.with_file(asset, "asset");
    }
    if entry_point {
        builder = builder.with_file(ENTRY_POINT_FILE, "<html></html>");
    }
    if service_worker {
        builder = builder.with_file(SERVICE_WORKER_FILE, "self.addEventListener");
    }
    builder.build()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: The plan always starts with exactly one bulk sync that
    /// carries the long-lived cache directive and excludes both no-cache
    /// files, whatever the build tree contains.
    #[test]
    fn property_plan_starts_with_excluding_bulk_sync(
        assets in asset_set(),
        entry_point in any::<bool>(),
        service_worker in any::<bool>(),
    ) {
        let dir = build_dir(&assets, entry_point, service_worker);
        let plan = UploadPlan::for_build_dir(dir.path()).unwrap();

        let syncs: Vec<_> = plan
            .steps()
            .iter()
            .filter(|step| matches!(step, UploadStep::Sync { .. }))
            .collect();
        prop_assert_eq!(syncs.len(), 1);
        prop_assert!(matches!(
            &plan.steps()[0],
            UploadStep::Sync { cache_control, excludes, .. }
                if *cache_control == LONG_LIVED_CACHE_CONTROL
                && excludes == &[ENTRY_POINT_FILE, SERVICE_WORKER_FILE]
        ), "first step is not the expected long-lived sync");
    }

    /// PROPERTY: A no-cache copy step exists exactly for the special files
    /// present, entry point always before service worker, never reordered
    /// ahead of the sync.
    #[test]
    fn property_no_cache_copies_match_present_files(
        assets in asset_set(),
        entry_point in any::<bool>(),
        service_worker in any::<bool>(),
    ) {
        let dir = build_dir(&assets, entry_point, service_worker);
        let plan = UploadPlan::for_build_dir(dir.path()).unwrap();

        let expected = 1 + usize::from(entry_point) + usize::from(service_worker);
        prop_assert_eq!(plan.steps().len(), expected);

        let copies: Vec<String> = plan
            .steps()
            .iter()
            .filter_map(|step| match step {
                UploadStep::Copy { source, cache_control } => {
                    assert_eq!(*cache_control, NO_CACHE_CONTROL);
                    source
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                }
                UploadStep::Sync { .. } => None,
            })
            .collect();

        let mut expected_copies = Vec::new();
        if entry_point {
            expected_copies.push(ENTRY_POINT_FILE.to_string());
        }
        if service_worker {
            expected_copies.push(SERVICE_WORKER_FILE.to_string());
        }
        prop_assert_eq!(copies, expected_copies);

        // The sync step is always first.
        prop_assert!(matches!(plan.steps()[0], UploadStep::Sync { .. }), "first step is not a sync");
    }

    /// PROPERTY: The asset count covers every file except the two no-cache
    /// specials.
    #[test]
    fn property_asset_count_excludes_specials(
        assets in asset_set(),
        entry_point in any::<bool>(),
        service_worker in any::<bool>(),
    ) {
        let dir = build_dir(&assets, entry_point, service_worker);
        let plan = UploadPlan::for_build_dir(dir.path()).unwrap();
        prop_assert_eq!(plan.asset_count(), assets.len());
    }

    /// PROPERTY: Planning is deterministic - the same build tree always
    /// yields the same plan, so re-publishing identical output converges
    /// on the same key-to-cache-control mapping.
    #[test]
    fn property_plan_is_deterministic(
        assets in asset_set(),
        entry_point in any::<bool>(),
        service_worker in any::<bool>(),
    ) {
        let dir = build_dir(&assets, entry_point, service_worker);
        let first = UploadPlan::for_build_dir(dir.path()).unwrap();
        let second = UploadPlan::for_build_dir(dir.path()).unwrap();
        prop_assert_eq!(first, second);
    }
}
