//! Mapping pipeline integration tests
//!
//! End-to-end behaviour of range resolution and application:
//! - percentages stay in [0, 1] and hit the endpoints exactly
//! - negative values are excluded from ranges and from rendering
//! - repeated passes are idempotent
//! - cached ranges stay stale until invalidated

use codescape::{
    ApplicationEngine, CollectingSink, EntryOutcome, MappingEntry, MappingEntryRegistry, MethodLibrary, NodeId,
    Property, PropertyKey, PropertyType, RangeResolver, RangeResult, Region, RenderSink, Rgba, Scope,
    StructureTree, TargetHandle, VisualUpdate, VisualValue,
};
use mockall::mock;
use serde_json::json;

/// Tree `proj/src/{name}` with one region per value on key NFP:complexity
fn build_tree(files: &[(&str, &[f64])]) -> (StructureTree, NodeId, Vec<NodeId>) {
    let mut tree = StructureTree::new("proj", "/proj");
    let src = tree.add_folder(tree.root(), "src", "src", "/proj/src").unwrap();
    let mut file_ids = Vec::new();
    for (name, values) in files {
        let relative = format!("src/{}", name);
        let file = tree
            .add_file(src, *name, relative.clone(), format!("/proj/{}", relative))
            .unwrap();
        for (i, value) in values.iter().enumerate() {
            let mut region = Region::new(format!("{}#{}", name, i), relative.clone(), i as u32, i as u32 + 1).unwrap();
            region.set_property(Property::nfp("complexity", *value));
            tree.insert_region(file, region).unwrap();
        }
        file_ids.push(file);
    }
    (tree, src, file_ids)
}

fn complexity() -> PropertyKey {
    PropertyKey::nfp("complexity")
}

fn green_to_red() -> MappingEntry {
    MappingEntry::new(PropertyType::Nfp, "complexity", "Color_Scale")
        .with_config("from", json!("0,1,0,1"))
        .with_config("to", json!("1,0,0,1"))
}

fn size_scale(from: f64, to: f64) -> MappingEntry {
    MappingEntry::new(PropertyType::Nfp, "complexity", "Size_Scale")
        .with_config("from", json!(from))
        .with_config("to", json!(to))
}

fn size_of(value: Option<VisualValue>) -> f32 {
    match value {
        Some(VisualValue::Size(s)) => s,
        other => panic!("expected a size, got {:?}", other),
    }
}

// ============================================================================
// Range Scenarios
// ============================================================================

#[test]
fn test_file_scope_with_negative_value() {
    let (tree, _, files) = build_tree(&[("Main.java", &[2.0, 8.0, -1.0])]);
    let resolver = RangeResolver::new();
    let library = MethodLibrary::new();

    let range = resolver.resolve(&tree, &complexity(), &Scope::File(files[0])).unwrap();
    assert_eq!(range, RangeResult::new(2.0, 8.0));

    let mut sink = CollectingSink::new();
    let report = ApplicationEngine::new(&tree, &resolver, &library).apply_all([&green_to_red()], files[0], &mut sink);

    assert_eq!(sink.value_of("Main.java#1"), Some(VisualValue::Color(Rgba::RED)));
    assert_eq!(sink.value_of("Main.java#0"), Some(VisualValue::Color(Rgba::GREEN)));
    assert_eq!(sink.value_of("Main.java#2"), None);
    assert_eq!(report.totals.applied, 2);
    assert_eq!(report.totals.skipped_negative, 1);
}

#[test]
fn test_negative_values_excluded_everywhere() {
    let (tree, _, files) = build_tree(&[("A.java", &[-1.0, -1.0, 5.0])]);
    let resolver = RangeResolver::new();
    let library = MethodLibrary::new();

    assert_eq!(
        resolver.resolve(&tree, &complexity(), &Scope::File(files[0])).unwrap(),
        RangeResult::new(5.0, 5.0)
    );

    let mut sink = CollectingSink::new();
    let report = ApplicationEngine::new(&tree, &resolver, &library).apply_all([&size_scale(1.0, 3.0)], tree.root(), &mut sink);
    assert_eq!(report.totals.skipped_negative, 2);
    assert_eq!(report.totals.applied, 1);
    // degenerate range: the region gets the scale's start value
    assert_eq!(sink.value_of("A.java#2"), Some(VisualValue::Size(1.0)));
}

#[test]
fn test_folder_scope_ignores_empty_file() {
    let (tree, src, _) = build_tree(&[("A.java", &[1.0, 2.0, 3.0]), ("B.java", &[4.0]), ("C.java", &[])]);
    let range = RangeResolver::new()
        .resolve(&tree, &complexity(), &Scope::Folder(src))
        .unwrap();
    assert_eq!(range, RangeResult::new(1.0, 4.0));
}

#[test]
fn test_percentages_within_unit_interval() {
    let values = [3.0, 0.0, 7.5, 12.0, 9.25, 4.0];
    let (tree, _, _) = build_tree(&[("A.java", &values)]);
    let range = RangeResolver::new()
        .resolve(&tree, &complexity(), &Scope::Global)
        .unwrap();

    assert_eq!(range, RangeResult::new(0.0, 12.0));
    for v in values {
        let p = range.percentage(v);
        assert!((0.0..=1.0).contains(&p), "p = {} for {}", p, v);
    }
    assert_eq!(range.percentage(range.min), 0.0);
    assert_eq!(range.percentage(range.max), 1.0);
}

// ============================================================================
// Application Scenarios
// ============================================================================

#[test]
fn test_apply_twice_is_idempotent() {
    let (tree, src, _) = build_tree(&[("A.java", &[1.0, 5.0, -1.0]), ("B.java", &[3.0])]);
    let resolver = RangeResolver::new();
    let library = MethodLibrary::new();
    let engine = ApplicationEngine::new(&tree, &resolver, &library);
    let entries = [green_to_red(), size_scale(0.0, 10.0).with_config("range", json!("file"))];

    let mut first = CollectingSink::new();
    let mut second = CollectingSink::new();
    let report_a = engine.apply_all(entries.iter(), src, &mut first);
    let report_b = engine.apply_all(entries.iter(), src, &mut second);

    assert_eq!(report_a, report_b);
    assert_eq!(first.assignments(), second.assignments());
}

#[test]
fn test_property_replacement_needs_invalidation() {
    let (mut tree, _, files) = build_tree(&[("A.java", &[2.0, 8.0])]);
    let resolver = RangeResolver::new();
    let library = MethodLibrary::new();
    let entry = size_scale(0.0, 6.0);

    {
        let mut sink = CollectingSink::new();
        ApplicationEngine::new(&tree, &resolver, &library).apply_all([&entry], files[0], &mut sink);
        assert_eq!(size_of(sink.value_of("A.java#1")), 6.0);
    }

    tree.region_mut("A.java#1")
        .unwrap()
        .set_property(Property::nfp("complexity", 4.0));

    // stale: still normalised against [2, 8]
    let mut stale = CollectingSink::new();
    ApplicationEngine::new(&tree, &resolver, &library).apply_all([&entry], files[0], &mut stale);
    assert!((size_of(stale.value_of("A.java#1")) - 2.0).abs() < 1e-5);

    // fresh: [2, 4]
    resolver.invalidate();
    let mut fresh = CollectingSink::new();
    ApplicationEngine::new(&tree, &resolver, &library).apply_all([&entry], files[0], &mut fresh);
    assert_eq!(size_of(fresh.value_of("A.java#1")), 6.0);
}

#[test]
fn test_global_range_mode_uses_whole_tree() {
    let (tree, _, files) = build_tree(&[("A.java", &[0.0, 5.0]), ("B.java", &[10.0])]);
    let resolver = RangeResolver::new();
    let library = MethodLibrary::new();
    let entry = size_scale(0.0, 10.0).with_config("range", json!("global"));

    let mut sink = CollectingSink::new();
    let report = ApplicationEngine::new(&tree, &resolver, &library).apply_all([&entry], files[0], &mut sink);

    assert_eq!(report.entries[0].range, Some(RangeResult::new(0.0, 10.0)));
    assert_eq!(sink.value_of("A.java#1"), Some(VisualValue::Size(5.0)));
    assert_eq!(sink.value_of("B.java#0"), None);
}

#[test]
fn test_feature_fixed_color() {
    let mut tree = StructureTree::new("proj", "/proj");
    let file = tree.add_file(tree.root(), "A.java", "A.java", "/proj/A.java").unwrap();
    for (id, member) in [("r1", true), ("r2", false)] {
        let mut region = Region::new(id, "A.java", 0, 0).unwrap();
        region.set_property(Property::feature("Logging", member));
        tree.insert_region(file, region).unwrap();
    }
    let registry = MappingEntryRegistry::new();
    let entry = registry.effective_entry(&PropertyKey::feature("logging"));

    let resolver = RangeResolver::new();
    let mut sink = CollectingSink::new();
    let report = ApplicationEngine::new(&tree, &resolver, registry.library()).apply_all([&entry], tree.root(), &mut sink);

    assert_eq!(report.entries[0].outcome, EntryOutcome::Applied);
    assert_eq!(report.totals.applied, 2);
    assert_eq!(
        sink.value_of("r1"),
        Some(VisualValue::Color(Rgba::new(0.6933, 0.9471, 1.0, 1.0)))
    );
    assert_eq!(resolver.cached_len(), 0);
}

// ============================================================================
// Registry Scenarios
// ============================================================================

#[test]
fn test_upsert_replaces_previous_entry() {
    let mut registry = MappingEntryRegistry::new();
    registry.upsert(MappingEntry::new(PropertyType::Nfp, "complexity", "Color_Scale"));
    registry.upsert(MappingEntry::new(PropertyType::Nfp, "complexity", "Size_Scale"));

    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.get(PropertyType::Nfp, "complexity").unwrap().method_name,
        "Size_Scale"
    );
}

#[test]
fn test_deactivated_entry_emits_nothing() {
    let (tree, _, _) = build_tree(&[("A.java", &[1.0, 2.0])]);
    let mut registry = MappingEntryRegistry::new();
    registry.upsert(green_to_red());
    registry.set_active(&complexity(), false).unwrap();

    let resolver = RangeResolver::new();
    let mut sink = CollectingSink::new();
    let report = ApplicationEngine::new(&tree, &resolver, registry.library()).apply_all(registry.iter(), tree.root(), &mut sink);

    assert_eq!(report.totals.skipped_inactive, 1);
    assert!(sink.assignments().is_empty());
}

// ============================================================================
// Render Sink Seam
// ============================================================================

mock! {
    Renderer {}

    impl RenderSink for Renderer {
        fn target_for(&self, region_id: &str) -> Option<TargetHandle>;
        fn submit(&mut self, region_id: &str, update: VisualUpdate);
    }
}

#[test]
fn test_renderer_receives_addressed_updates() {
    let (tree, _, files) = build_tree(&[("A.java", &[2.0, 8.0])]);
    let resolver = RangeResolver::new();
    let library = MethodLibrary::new();

    let mut renderer = MockRenderer::new();
    renderer
        .expect_target_for()
        .withf(|id| id == "A.java#0")
        .return_const(Some(TargetHandle(10)));
    renderer
        .expect_target_for()
        .withf(|id| id == "A.java#1")
        .return_const(None::<TargetHandle>);
    renderer
        .expect_submit()
        .withf(|id, update| {
            id == "A.java#0"
                && *update
                    == VisualUpdate {
                        target: TargetHandle(10),
                        value: VisualValue::Color(Rgba::GREEN),
                    }
        })
        .times(1)
        .return_const(());

    let report = ApplicationEngine::new(&tree, &resolver, &library).apply_all([&green_to_red()], files[0], &mut renderer);
    assert_eq!(report.totals.applied, 1);
    assert_eq!(report.totals.skipped_missing_target, 1);
}
