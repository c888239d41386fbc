// End-to-end tests for loading, filtering, layout and export through the view-model

use serde_json::{Value, json};
use skymap_client::EnumerationResponse;
use skymap_core::export::export_structured;
use skymap_core::{
    EdgeCategory, ExportFormat, GraphStore, IngestOutcome, Layout, Status, ViewMode, ViewModel,
};
use std::collections::BTreeSet;

fn response(value: Value) -> EnumerationResponse {
    serde_json::from_value(value).unwrap()
}

fn loaded(value: Value) -> ViewModel {
    let mut vm = ViewModel::default();
    let outcome = vm.load_response(response(value));
    assert!(matches!(outcome, IngestOutcome::Applied(_)));
    vm
}

/// A small three-tier service with every edge category present.
fn service_topology() -> Value {
    json!({
        "elements": [
            {"data": {"id": "vpc-1", "type": "vpc", "label": "prod"}},
            {"data": {"id": "subnet-a", "type": "subnet", "label": "public-a", "parent": "vpc-1"}},
            {"data": {"id": "lb-1", "type": "load_balancer", "label": "edge-lb", "parent": "subnet-a"}},
            {"data": {"id": "web-1", "type": "instance", "label": "web-1", "parent": "subnet-a"}},
            {"data": {"id": "web-2", "type": "instance", "label": "web-2", "parent": "subnet-a"}},
            {"data": {"id": "db-1", "type": "rds_instance", "label": "orders-db", "parent": "vpc-1"}},
            {"data": {"id": "bucket-1", "type": "s3_bucket", "label": "assets"}},
            {"data": {"id": "queue-1", "type": "sqs_queue", "label": "jobs"}},
            {"data": {"id": "n1", "source": "lb-1", "target": "web-1", "category": "network"}},
            {"data": {"id": "n2", "source": "lb-1", "target": "web-2", "category": "network"}},
            {"data": {"id": "n3", "source": "web-1", "target": "db-1", "category": "network"}},
            {"data": {"id": "d1", "source": "web-1", "target": "bucket-1", "category": "data"}},
            {"data": {"id": "d2", "source": "web-2", "target": "queue-1", "category": "data", "derived": true}},
            {"data": {"id": "r1", "source": "db-1", "target": "vpc-1", "category": "resource"}}
        ]
    })
}

fn hidden(vm: &ViewModel) -> BTreeSet<String> {
    vm.visibility().hidden_ids().into_iter().map(String::from).collect()
}

fn dimmed(vm: &ViewModel) -> BTreeSet<String> {
    vm.visibility().dimmed_ids().into_iter().map(String::from).collect()
}

// ============================================================================
// Ingestion Scenarios
// ============================================================================

#[test]
fn test_child_nested_inside_container() {
    let vm = loaded(json!({
        "elements": [
            {"data": {"id": "vpc-1", "type": "vpc", "label": "VPC"}},
            {"data": {"id": "i-1", "type": "instance", "label": "web-1", "parent": "vpc-1"}}
        ]
    }));

    assert_eq!(vm.store().node_count(), 2);
    assert_eq!(vm.store().edge_count(), 0);
    assert!(vm.warnings().is_empty());
    assert_eq!(vm.status(), &Status::Done { nodes: 2, edges: 0 });

    let container = vm.layout().rect("vpc-1").unwrap();
    let child = vm.layout().rect("i-1").unwrap();
    assert!(container.contains(child));
}

#[test]
fn test_dangling_edge_dropped_with_warning() {
    let vm = loaded(json!({
        "elements": [
            {"data": {"id": "i-1", "type": "instance", "label": "web-1"}},
            {"data": {"id": "e1", "source": "i-1", "target": "sg-missing", "category": "network"}}
        ]
    }));

    assert_eq!(vm.store().node_count(), 1);
    assert_eq!(vm.store().edge_count(), 0);
    assert_eq!(vm.warnings().len(), 1);
    assert!(vm.warnings()[0].contains("sg-missing"));
    assert_eq!(vm.status().to_string(), "Done: 1 nodes, 0 edges");
}

#[test]
fn test_every_kept_edge_has_both_endpoints() {
    let mut value = service_topology();
    let elements = value["elements"].as_array_mut().unwrap();
    elements.push(json!({"data": {"id": "x1", "source": "ghost", "target": "web-1", "category": "data"}}));
    elements.push(json!({"data": {"id": "x2", "source": "web-2", "target": "phantom", "category": "network"}}));
    let vm = loaded(value);

    for edge in vm.store().edges() {
        assert!(vm.store().contains(&edge.source));
        assert!(vm.store().contains(&edge.target));
    }
    for dropped in ["x1", "x2"] {
        assert!(!vm.store().contains(dropped));
        assert!(vm.warnings().iter().any(|w| w.contains(dropped)));
    }
}

#[test]
fn test_edge_sharing_a_node_id_never_hides_the_node() {
    let mut vm = loaded(json!({
        "elements": [
            {"data": {"id": "x", "type": "instance", "label": "x"}},
            {"data": {"id": "y", "type": "instance", "label": "y"}},
            {"data": {"id": "x", "source": "x", "target": "y", "category": "network"}}
        ]
    }));
    assert_eq!(vm.store().edge_count(), 0);
    assert_eq!(vm.warnings(), ["edge x dropped: id already names a node"]);

    vm.set_category(EdgeCategory::Network, false);
    vm.relayout();
    assert!(!vm.visibility().is_hidden("x"));
    assert!(vm.layout().position("x").is_some());
}

#[test]
fn test_unnamed_edge_does_not_replace_declared_one() {
    let vm = loaded(json!({
        "elements": [
            {"data": {"id": "a", "type": "instance", "label": "a"}},
            {"data": {"id": "b", "type": "instance", "label": "b"}},
            {"data": {"id": "edge:a:b:1", "source": "a", "target": "b", "category": "data"}},
            {"data": {"source": "a", "target": "b", "category": "network"}}
        ]
    }));
    assert_eq!(vm.store().edge_count(), 2);
    assert!(vm.warnings().is_empty());
    assert_eq!(
        vm.store().edge("edge:a:b:1").map(|e| e.category()),
        Some(EdgeCategory::Data)
    );
}

#[test]
fn test_duplicate_edge_id_is_reported() {
    let vm = loaded(json!({
        "elements": [
            {"data": {"id": "a", "type": "instance", "label": "a"}},
            {"data": {"id": "b", "type": "instance", "label": "b"}},
            {"data": {"id": "e1", "source": "a", "target": "b", "category": "data"}},
            {"data": {"id": "e1", "source": "b", "target": "a", "category": "network"}}
        ]
    }));
    assert_eq!(vm.store().edge_count(), 1);
    assert_eq!(vm.warnings(), ["edge e1: duplicate id, earlier record replaced"]);
}

#[test]
fn test_empty_result_is_not_an_error() {
    let vm = loaded(json!({"elements": []}));
    assert!(vm.store().is_empty());
    assert_eq!(vm.status().to_string(), "Done: 0 nodes, 0 edges");
    assert!(vm.layout().is_empty());
}

#[test]
fn test_backend_warnings_and_findings_replace_previous() {
    let mut vm = loaded(json!({
        "elements": [{"data": {"id": "a", "type": "instance", "label": "a"}}],
        "warnings": ["ec2 ap-south-1: throttled"],
        "findings": [
            {"severity": "critical", "title": "Admin role assumable by anyone", "node_id": "a"},
            {"severity": "low", "title": "Unused security group"}
        ]
    }));
    assert_eq!(vm.warnings(), ["ec2 ap-south-1: throttled"]);
    assert_eq!(vm.findings().total(), 2);
    assert_eq!(vm.findings().for_element("a").count(), 1);

    vm.load_response(response(json!({"elements": []})));
    assert!(vm.warnings().is_empty());
    assert!(vm.findings().is_empty());
}

// ============================================================================
// Stale Response Tests
// ============================================================================

#[test]
fn test_superseded_response_never_overwrites_store() {
    let mut vm = loaded(json!({
        "elements": [{"data": {"id": "current", "type": "instance", "label": "current"}}]
    }));

    let slow = vm.begin_ingestion();
    let fast = vm.begin_ingestion();

    let outcome = vm.complete_ingestion::<String>(
        fast,
        Ok(response(json!({
            "elements": [{"data": {"id": "fresh", "type": "lambda", "label": "fresh"}}]
        }))),
    );
    assert!(matches!(outcome, IngestOutcome::Applied(_)));

    let outcome = vm.complete_ingestion::<String>(
        slow,
        Ok(response(json!({
            "elements": [{"data": {"id": "old", "type": "lambda", "label": "old"}}]
        }))),
    );
    assert_eq!(outcome, IngestOutcome::Stale);
    assert!(vm.store().contains("fresh"));
    assert!(!vm.store().contains("old"));
    assert!(!vm.is_ingesting());
}

#[test]
fn test_failure_leaves_graph_and_allows_retry() {
    let mut vm = loaded(service_topology());
    let before = vm.store().node_count();

    let ticket = vm.begin_ingestion();
    let outcome = vm.complete_ingestion(ticket, Err::<EnumerationResponse, _>("connection refused"));
    assert_eq!(outcome, IngestOutcome::Failed("connection refused".to_string()));
    assert_eq!(vm.store().node_count(), before);
    assert_eq!(vm.status().to_string(), "connection refused");

    let outcome = vm.load_response(response(json!({"elements": []})));
    assert!(matches!(outcome, IngestOutcome::Applied(_)));
}

// ============================================================================
// Category Toggle Tests
// ============================================================================

#[test]
fn test_hiding_data_leaves_other_categories() {
    let mut vm = loaded(service_topology());
    vm.set_category(EdgeCategory::Data, false);

    let expected: BTreeSet<String> = ["d1", "d2"].into_iter().map(String::from).collect();
    assert_eq!(hidden(&vm), expected);
    for id in ["n1", "n2", "n3", "r1"] {
        assert!(!vm.visibility().is_hidden(id));
    }
}

#[test]
fn test_toggle_independence() {
    let mut vm = loaded(service_topology());
    vm.set_category(EdgeCategory::Resource, false);
    let baseline = hidden(&vm);

    vm.toggle_category(EdgeCategory::Network);
    vm.toggle_category(EdgeCategory::Data);
    vm.toggle_category(EdgeCategory::Resource);
    vm.toggle_category(EdgeCategory::Network);
    vm.toggle_category(EdgeCategory::Resource);
    vm.toggle_category(EdgeCategory::Data);

    assert_eq!(hidden(&vm), baseline);
}

#[test]
fn test_nodes_never_hidden_by_toggles() {
    let mut vm = loaded(service_topology());
    for category in EdgeCategory::ALL {
        vm.set_category(category, false);
    }
    for node in vm.store().nodes() {
        assert!(!vm.visibility().is_hidden(&node.id));
    }
    assert_eq!(hidden(&vm).len(), vm.store().edge_count());
}

// ============================================================================
// Search Tests
// ============================================================================

#[test]
fn test_search_highlights_match_and_neighbours() {
    let mut vm = loaded(service_topology());
    vm.set_search("web-1");

    let lit: BTreeSet<&str> = ["web-1", "lb-1", "db-1", "bucket-1", "n1", "n3", "d1"]
        .into_iter()
        .collect();
    for element in vm.store().elements() {
        let id = element.id();
        assert_eq!(
            vm.visibility().is_dimmed(id),
            !lit.contains(id),
            "unexpected dim state for {}",
            id
        );
    }
}

#[test]
fn test_search_does_not_spread_over_hidden_edges() {
    let mut vm = loaded(service_topology());
    vm.set_category(EdgeCategory::Data, false);
    vm.set_search("web-1");

    assert!(!vm.visibility().is_dimmed("db-1"));
    assert!(vm.visibility().is_dimmed("bucket-1"));
}

#[test]
fn test_search_without_match_dims_everything() {
    let mut vm = loaded(service_topology());
    vm.set_search("no-such-thing");
    assert!(vm.visibility().matches().is_empty());
    assert_eq!(
        dimmed(&vm).len(),
        vm.store().node_count() + vm.store().edge_count()
    );
}

#[test]
fn test_search_is_case_insensitive_on_label_and_id() {
    let mut vm = loaded(service_topology());
    vm.set_search("ORDERS");
    assert!(vm.visibility().matches().contains("db-1"));

    vm.set_search("queue-1");
    assert!(vm.visibility().matches().contains("queue-1"));
}

#[test]
fn test_search_round_trip_restores_toggle_state() {
    let mut vm = loaded(service_topology());
    vm.set_category(EdgeCategory::Network, false);
    let hidden_before = hidden(&vm);
    let dimmed_before = dimmed(&vm);

    vm.set_search("web");
    assert!(!dimmed(&vm).is_empty());
    vm.set_search("");

    assert_eq!(hidden(&vm), hidden_before);
    assert_eq!(dimmed(&vm), dimmed_before);
    assert!(dimmed_before.is_empty());
}

// ============================================================================
// Layout Tests
// ============================================================================

#[test]
fn test_relayout_is_idempotent() {
    for mode in ViewMode::ALL {
        let mut vm = loaded(service_topology());
        vm.set_view_mode(mode);
        let first: Vec<_> = vm.layout().iter().map(|(id, r)| (id.clone(), *r)).collect();
        vm.relayout();
        let second: Vec<_> = vm.layout().iter().map(|(id, r)| (id.clone(), *r)).collect();
        assert_eq!(first, second, "layout changed between runs in {}", mode);
    }
}

#[test]
fn test_every_mode_places_every_node() {
    for mode in ViewMode::ALL {
        let mut vm = loaded(service_topology());
        vm.set_view_mode(mode);
        for node in vm.store().nodes() {
            assert!(vm.layout().rect(&node.id).is_some(), "{} missing in {}", node.id, mode);
        }
        assert!(vm.layout().rect("vpc-1").unwrap().contains(vm.layout().rect("web-1").unwrap()));
    }
}

// ============================================================================
// Export Tests
// ============================================================================

#[test]
fn test_structured_export_of_empty_graph() {
    let out = export_structured(&GraphStore::new(), &Layout::default()).unwrap();
    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value, json!({"elements": []}));
}

#[test]
fn test_structured_export_round_trips_through_ingestion() {
    let mut vm = loaded(service_topology());
    let artifact = vm.export(ExportFormat::Json).unwrap();
    let text = String::from_utf8(artifact.as_bytes().to_vec()).unwrap();

    let reloaded = loaded(serde_json::from_str(&text).unwrap());
    assert_eq!(reloaded.store().node_count(), vm.store().node_count());
    assert_eq!(reloaded.store().edge_count(), vm.store().edge_count());
    assert!(reloaded.store().edge("d2").unwrap().derived);
    assert!(reloaded.warnings().is_empty());
}

#[test]
fn test_svg_export_skips_hidden_edges() {
    let mut vm = loaded(service_topology());
    let before = match vm.export(ExportFormat::Svg).unwrap() {
        skymap_core::ExportArtifact::Svg(svg) => svg,
        other => panic!("unexpected artifact {:?}", other.format()),
    };
    vm.set_category(EdgeCategory::Network, false);
    let after = match vm.export(ExportFormat::Svg).unwrap() {
        skymap_core::ExportArtifact::Svg(svg) => svg,
        other => panic!("unexpected artifact {:?}", other.format()),
    };
    assert!(after.len() < before.len());
    assert!(!matches!(vm.status(), Status::Failed(_)));
}

#[test]
fn test_png_export_has_png_signature() {
    let mut vm = loaded(service_topology());
    let artifact = vm.export(ExportFormat::Png).unwrap();
    assert_eq!(&artifact.as_bytes()[..8], b"\x89PNG\r\n\x1a\n");
}
