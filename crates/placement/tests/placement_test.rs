//! End-to-end tests for container placement.
//!
//! # Test Strategy
//!
//! 1. **Reference scenarios**: small netmaps with known answers
//! 2. **Policy errors**: every structural failure surfaces as its error kind
//! 3. **Stability**: determinism and the effect of netmap changes
//! 4. **JSON**: policies and netmaps decoded from their wire form

use std::collections::HashSet;
use std::sync::Arc;

use corelib::{Clause, Error, Filter, Node, NodeInfo, Operation, PlacementPolicy, Replica, Selector};
use placement::{validate_policy, Netmap, SelectionConfig};

fn node(key: u8, attrs: &[(&str, &str)]) -> NodeInfo {
    attrs
        .iter()
        .fold(NodeInfo::new(vec![0x03, key, key]), |info, (k, v)| {
            info.with_attribute(*k, *v)
        })
}

fn keys(nodes: &[Arc<Node>]) -> Vec<Vec<u8>> {
    nodes.iter().map(|n| n.public_key().to_vec()).collect()
}

fn cities() -> Netmap {
    Netmap::from_infos(vec![
        node(0, &[("City", "Saint-Petersburg"), ("Country", "RU")]),
        node(1, &[("City", "Moscow"), ("Country", "RU")]),
        node(2, &[("City", "Berlin"), ("Country", "DE")]),
        node(3, &[("City", "Paris"), ("Country", "FR")]),
    ])
}

// ============================================================================
// Reference Scenarios
// ============================================================================

#[test]
fn test_single_replica_takes_backup_factor_nodes() {
    let netmap = Netmap::from_infos((0..4).map(|i| node(i, &[])));
    let policy = PlacementPolicy::new()
        .with_backup_factor(3)
        .with_selector(Selector::new("X", 1))
        .with_replica(Replica::new(1, "X"));

    let result = netmap.get_container_nodes(&policy, b"container").unwrap();

    assert_eq!(result.flatten().len(), 3);
}

#[test]
fn test_replicas_follow_city_filters() {
    let policy = PlacementPolicy::new()
        .with_filter(Filter::eq("City", "Saint-Petersburg").named("SPB"))
        .with_filter(Filter::eq("City", "Moscow").named("MSK"))
        .with_selector(Selector::new("SPB", 1).with_filter("SPB"))
        .with_selector(Selector::new("MSK", 1).with_filter("MSK"))
        .with_replica(Replica::new(1, "SPB"))
        .with_replica(Replica::new(1, "MSK"));

    let result = cities().get_container_nodes(&policy, b"container").unwrap();

    let replicas = result.replicas();
    assert_eq!(replicas.len(), 2);
    assert_eq!(replicas[0].len(), 1);
    assert_eq!(replicas[0][0].attribute("City"), "Saint-Petersburg");
    assert_eq!(replicas[1].len(), 1);
    assert_eq!(replicas[1][0].attribute("City"), "Moscow");
}

#[test]
fn test_lower_bound_with_single_country() {
    let netmap = Netmap::from_infos((0..3).map(|i| node(i, &[("Country", "DE")])));
    let policy = PlacementPolicy::new()
        .with_backup_factor(2)
        .with_selector(
            Selector::new("X", 2)
                .with_clause(Clause::Same)
                .with_attribute("Country"),
        )
        .with_replica(Replica::new(2, "X"));

    let result = netmap.get_container_nodes(&policy, b"container").unwrap();

    assert_eq!(result.flatten().len(), 3);
}

#[test]
fn test_distinct_over_single_value() {
    let netmap = Netmap::from_infos((0..3).map(|i| node(i, &[("Country", "DE")])));
    let policy = PlacementPolicy::new()
        .with_backup_factor(1)
        .with_selector(
            Selector::new("X", 2)
                .with_clause(Clause::Distinct)
                .with_attribute("Country"),
        )
        .with_replica(Replica::new(2, "X"));

    assert_eq!(
        netmap.get_container_nodes(&policy, b"container").err(),
        Some(Error::NotEnoughNodes("X".into()))
    );
}

#[test]
fn test_composite_filter() {
    let policy = PlacementPolicy::new()
        .with_backup_factor(1)
        .with_filter(Filter::eq("Country", "RU").named("RU"))
        .with_filter(
            Filter::or([Filter::reference("RU"), Filter::eq("City", "Paris")]).named("RUorParis"),
        )
        .with_selector(Selector::new("S", 3).with_filter("RUorParis"))
        .with_replica(Replica::new(3, "S"));

    let result = cities().get_container_nodes(&policy, b"container").unwrap();

    let chosen: HashSet<&str> = result.replicas()[0]
        .iter()
        .map(|n| n.attribute("City"))
        .collect();
    assert_eq!(chosen, HashSet::from(["Saint-Petersburg", "Moscow", "Paris"]));
}

#[test]
fn test_numeric_filter_on_capacity() {
    let netmap = Netmap::from_infos((0..6).map(|i| {
        let capacity = (u32::from(i) * 100).to_string();
        node(i, &[("Capacity", capacity.as_str())])
    }));
    let policy = PlacementPolicy::new()
        .with_backup_factor(1)
        .with_filter(Filter::ge("Capacity", 300).named("Big"))
        .with_selector(Selector::new("S", 3).with_filter("Big"))
        .with_replica(Replica::new(3, "S"));

    let result = netmap.get_container_nodes(&policy, b"container").unwrap();

    assert!(result.flatten().iter().all(|n| n.capacity >= 300));
    assert_eq!(result.flatten().len(), 3);
}

// ============================================================================
// Policy Errors
// ============================================================================

#[test]
fn test_unknown_filter_inside_and() {
    let policy = PlacementPolicy::new()
        .with_filter(
            Filter::and([Filter::eq("Country", "RU"), Filter::reference("Missing")]).named("F"),
        )
        .with_selector(Selector::new("S", 1).with_filter("F"))
        .with_replica(Replica::new(1, "S"));

    assert_eq!(
        cities().get_container_nodes(&policy, b"container").err(),
        Some(Error::FilterNotFound("Missing".into()))
    );
    assert_eq!(
        validate_policy(&policy),
        Err(Error::FilterNotFound("Missing".into()))
    );
}

#[test]
fn test_invalid_number() {
    let policy = PlacementPolicy::new()
        .with_filter(Filter::leaf("Capacity", Operation::Gt, "many").named("F"))
        .with_replica(Replica::new(1, ""));

    assert_eq!(
        cities().get_container_nodes(&policy, b"container").err(),
        Some(Error::InvalidNumber("many".into()))
    );
}

#[test]
fn test_not_enough_nodes() {
    let policy = PlacementPolicy::new()
        .with_backup_factor(1)
        .with_selector(
            Selector::new("S", 5)
                .with_clause(Clause::Distinct)
                .with_attribute("City"),
        )
        .with_replica(Replica::new(5, "S"));

    assert_eq!(
        cities().get_container_nodes(&policy, b"container").err(),
        Some(Error::NotEnoughNodes("S".into()))
    );
}

#[test]
fn test_empty_netmap() {
    let policy = PlacementPolicy::new().with_replica(Replica::new(1, ""));

    assert_eq!(
        Netmap::default().get_container_nodes(&policy, b"container").err(),
        Some(Error::NotEnoughNodes(String::new()))
    );
}

#[test]
fn test_empty_policy_yields_no_replicas() {
    let result = cities()
        .get_container_nodes(&PlacementPolicy::new(), b"container")
        .unwrap();

    assert!(result.replicas().is_empty());
    assert!(result.flatten().is_empty());
}

// ============================================================================
// Stability
// ============================================================================

fn racks(n: u8) -> Vec<NodeInfo> {
    (0..n)
        .map(|i| {
            let rack = format!("rack-{}", i % 5);
            node(i, &[("Rack", rack.as_str()), ("Capacity", "50"), ("Price", "2")])
        })
        .collect()
}

/// Racks of nodes whose capacity and price differ from node to node.
fn varied_racks(n: u8) -> Vec<NodeInfo> {
    (0..n)
        .map(|i| {
            let rack = format!("rack-{}", i % 5);
            let capacity = (10 + u32::from(i) * 37 % 90).to_string();
            let price = (1 + i % 4).to_string();
            node(
                i,
                &[
                    ("Rack", rack.as_str()),
                    ("Capacity", capacity.as_str()),
                    ("Price", price.as_str()),
                ],
            )
        })
        .collect()
}

fn lone_rack_node() -> NodeInfo {
    node(200, &[("Rack", "rack-unrelated"), ("Capacity", "95"), ("Price", "1")])
}

fn chosen_set(netmap: &Netmap, policy: &PlacementPolicy, pivot: &[u8]) -> HashSet<Vec<u8>> {
    let result = netmap.get_container_nodes(policy, pivot).unwrap();
    keys(&result.flatten()).into_iter().collect()
}

fn rack_policy() -> PlacementPolicy {
    PlacementPolicy::new()
        .with_backup_factor(2)
        .with_selector(
            Selector::new("R", 3)
                .with_clause(Clause::Distinct)
                .with_attribute("Rack"),
        )
        .with_replica(Replica::new(3, "R"))
}

#[test]
fn test_same_inputs_same_nodes() {
    let netmap = Netmap::from_infos(racks(40));
    let policy = rack_policy();

    let a = netmap.get_container_nodes(&policy, b"cid").unwrap();
    let b = netmap.get_container_nodes(&policy, b"cid").unwrap();

    assert_eq!(keys(&a.flatten()), keys(&b.flatten()));
}

#[test]
fn test_netmap_order_does_not_matter() {
    let infos = racks(40);
    let mut reversed = infos.clone();
    reversed.reverse();
    let policy = rack_policy();

    let a = Netmap::from_infos(infos)
        .get_container_nodes(&policy, b"cid")
        .unwrap();
    let b = Netmap::from_infos(reversed)
        .get_container_nodes(&policy, b"cid")
        .unwrap();

    let set = |nodes: &[Arc<Node>]| keys(nodes).into_iter().collect::<HashSet<_>>();
    assert_eq!(set(&a.flatten()), set(&b.flatten()));
}

#[test]
fn test_removing_unselected_node_keeps_selection() {
    let infos = racks(40);
    let policy = rack_policy();
    let before = Netmap::from_infos(infos.clone())
        .get_container_nodes(&policy, b"cid")
        .unwrap();
    let chosen: HashSet<Vec<u8>> = keys(&before.flatten()).into_iter().collect();

    let Some(victim) = infos
        .iter()
        .position(|info| !chosen.contains(&info.public_key))
    else {
        panic!("every node was selected");
    };
    let mut shrunk = infos;
    shrunk.remove(victim);

    let after = Netmap::from_infos(shrunk)
        .get_container_nodes(&policy, b"cid")
        .unwrap();
    let after: HashSet<Vec<u8>> = keys(&after.flatten()).into_iter().collect();

    assert_eq!(chosen, after);
}

#[test]
fn test_adding_node_in_new_rack_keeps_selection() {
    let infos = varied_racks(40);
    let mut grown = infos.clone();
    grown.push(lone_rack_node());
    let before = Netmap::from_infos(infos);
    let after = Netmap::from_infos(grown);
    let policy = rack_policy();

    for t in 0..50 {
        let pivot = format!("cid-{t}");
        assert_eq!(
            chosen_set(&before, &policy, pivot.as_bytes()),
            chosen_set(&after, &policy, pivot.as_bytes()),
            "pivot {pivot}"
        );
    }
}

#[test]
fn test_removing_node_in_lone_rack_keeps_selection() {
    let mut infos = varied_racks(40);
    infos.push(lone_rack_node());
    let before = Netmap::from_infos(infos.clone());
    infos.pop();
    let after = Netmap::from_infos(infos);
    let policy = rack_policy();

    for t in 0..50 {
        let pivot = format!("cid-{t}");
        assert_eq!(
            chosen_set(&before, &policy, pivot.as_bytes()),
            chosen_set(&after, &policy, pivot.as_bytes()),
            "pivot {pivot}"
        );
    }
}

#[test]
fn test_placement_vectors_ignore_unrelated_nodes() {
    let infos = varied_racks(40);
    let mut grown = infos.clone();
    grown.push(lone_rack_node());
    let before = Netmap::from_infos(infos);
    let after = Netmap::from_infos(grown);
    let policy = rack_policy();

    let a = before.get_container_nodes(&policy, b"cid").unwrap();
    let b = after.get_container_nodes(&policy, b"cid").unwrap();
    let a = before.get_placement_vectors(&a, b"object");
    let b = after.get_placement_vectors(&b, b"object");

    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(keys(x), keys(y));
    }
}

#[test]
fn test_custom_aggregator() {
    let netmap = Netmap::from_infos(racks(20));
    let config =
        SelectionConfig::from_json(r#"{"aggregator": "min", "backup_factor": 1}"#).unwrap();
    let policy = rack_policy().with_backup_factor(0);

    let result = netmap
        .get_container_nodes_with(&config, &policy, b"cid")
        .unwrap();

    assert_eq!(result.flatten().len(), 3);
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn test_policy_and_netmap_from_json() {
    let netmap = Netmap::from_json(
        r#"[
            {"publicKey": "01", "attributes": [{"key": "Country", "value": "RU"}]},
            {"publicKey": "02", "attributes": [{"key": "Country", "value": "DE"}]},
            {"publicKey": "03", "attributes": [{"key": "Country", "value": "RU"}]}
        ]"#,
    )
    .unwrap();
    let policy = PlacementPolicy::from_json(
        r#"{
            "replicas": [{"count": 2, "selector": "RU"}],
            "containerBackupFactor": 1,
            "selectors": [{
                "name": "RU",
                "count": 2,
                "clause": "SAME",
                "attribute": "Country",
                "filter": "OnlyRU"
            }],
            "filters": [{"name": "OnlyRU", "key": "Country", "op": "EQ", "value": "RU"}]
        }"#,
    )
    .unwrap();

    let result = netmap.get_container_nodes(&policy, b"cid").unwrap();

    let mut chosen = keys(&result.flatten());
    chosen.sort();
    assert_eq!(chosen, vec![vec![0x01], vec![0x03]]);
}

#[test]
fn test_null_selector_entry() {
    let policy = PlacementPolicy::from_json(r#"{"selectors": [null]}"#).unwrap();

    assert_eq!(
        cities().get_container_nodes(&policy, b"cid").err(),
        Some(Error::MissingField("SELECT"))
    );
}
