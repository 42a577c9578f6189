//! Structural comparison of a snapshot against the shadow store
//!
//! Walks the snapshot object by object, interface by interface, property by
//! property. Every shadow entry is either matched by the walk or reported
//! as an extra, so nothing in the mirror goes unchecked. Findings come out
//! in snapshot traversal order; per-interface and per-object extras follow
//! their parent's findings and extra objects come last.

use sigwatch_model::{
    DivergenceReport, Finding, InterfaceName, Interfaces, ObjectPath, Properties, ShadowStore,
    Snapshot,
};
use std::collections::BTreeSet;

/// Compare `snapshot` (ground truth) with `shadow` (the mirror)
///
/// Neither input is modified. Equal inputs yield an empty report. An
/// interface the snapshot lists without properties is satisfied when the
/// mirror knows the interface by name.
#[must_use]
pub fn compare(snapshot: &Snapshot, shadow: &ShadowStore) -> DivergenceReport {
    let mut report = DivergenceReport::new();
    let mut visited: BTreeSet<&ObjectPath> = BTreeSet::new();

    for (path, expected) in snapshot.objects() {
        if shadow.contains(path) {
            visited.insert(path);
            compare_object(path, expected, shadow, &mut report);
        } else {
            report.push(Finding::MissingObject { path: path.clone() });
        }
    }

    for path in shadow.paths() {
        if !visited.contains(path) {
            report.push(Finding::ExtraObject {
                path: path.clone(),
                interfaces: shadow.interface_names(path).into_iter().cloned().collect(),
            });
        }
    }

    report
}

fn compare_object(
    path: &ObjectPath,
    expected: &Interfaces,
    shadow: &ShadowStore,
    report: &mut DivergenceReport,
) {
    let names = shadow.interface_names(path);
    let actual = shadow.get(path);
    let no_properties = Properties::new();
    let mut visited: BTreeSet<&InterfaceName> = BTreeSet::new();

    for (interface, expected_props) in expected {
        if !names.contains(interface) {
            report.push(Finding::MissingInterface {
                path: path.clone(),
                interface: interface.clone(),
            });
            continue;
        }
        visited.insert(interface);
        let actual_props = actual
            .and_then(|interfaces| interfaces.get(interface))
            .unwrap_or(&no_properties);
        compare_interface(path, interface, expected_props, actual_props, report);
    }

    for interface in names {
        if !visited.contains(interface) {
            report.push(Finding::ExtraInterface {
                path: path.clone(),
                interface: interface.clone(),
            });
        }
    }
}

fn compare_interface(
    path: &ObjectPath,
    interface: &InterfaceName,
    expected: &Properties,
    actual: &Properties,
    report: &mut DivergenceReport,
) {
    // A mismatched property counts as accounted for
    for (property, expected_value) in expected {
        match actual.get(property) {
            None => report.push(Finding::MissingProperty {
                path: path.clone(),
                interface: interface.clone(),
                property: property.clone(),
                expected: expected_value.clone(),
            }),
            Some(actual_value) if actual_value != expected_value => {
                report.push(Finding::ValueMismatch {
                    path: path.clone(),
                    interface: interface.clone(),
                    property: property.clone(),
                    expected: expected_value.clone(),
                    actual: actual_value.clone(),
                });
            }
            Some(_) => {}
        }
    }

    for (property, actual_value) in actual {
        if !expected.contains_key(property) {
            report.push(Finding::ExtraProperty {
                path: path.clone(),
                interface: interface.clone(),
                property: property.clone(),
                actual: actual_value.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use sigwatch_model::{FindingKind, ObjectTree, PropertyName, PropertyValue};

    fn object(iface: &str, props: &[(&str, PropertyValue)]) -> Interfaces {
        Interfaces::from([(
            InterfaceName::new(iface),
            props
                .iter()
                .map(|(name, value)| (PropertyName::new(*name), value.clone()))
                .collect(),
        )])
    }

    fn tree(entries: Vec<(&str, Interfaces)>) -> ObjectTree {
        entries
            .into_iter()
            .map(|(path, interfaces)| (ObjectPath::new(path), interfaces))
            .collect()
    }

    fn store(entries: Vec<(&str, Interfaces)>) -> ShadowStore {
        ShadowStore::from_tree(tree(entries))
    }

    fn bare(iface: &str) -> (InterfaceName, Properties) {
        (InterfaceName::new(iface), Properties::new())
    }

    #[test]
    fn equal_trees_produce_empty_report() {
        let objects = tree(vec![("/o/1", object("X", &[("count", 5.into())]))]);
        let snapshot = Snapshot::new(objects.clone());
        assert!(compare(&snapshot, &ShadowStore::from_tree(objects)).is_empty());
    }

    #[test]
    fn value_mismatch_reports_both_sides() {
        let snapshot = Snapshot::new(tree(vec![("/o/1", object("X", &[("count", 5.into())]))]));
        let shadow = store(vec![("/o/1", object("X", &[("count", 4.into())]))]);

        let report = compare(&snapshot, &shadow);
        assert_eq!(
            report.findings(),
            &[Finding::ValueMismatch {
                path: ObjectPath::new("/o/1"),
                interface: InterfaceName::new("X"),
                property: PropertyName::new("count"),
                expected: PropertyValue::Int(5),
                actual: PropertyValue::Int(4),
            }]
        );
    }

    #[test]
    fn object_missing_from_shadow() {
        let snapshot = Snapshot::new(tree(vec![
            ("/o/1", object("X", &[("a", 1.into())])),
            ("/o/2", object("X", &[("a", 2.into())])),
        ]));
        let shadow = store(vec![("/o/1", object("X", &[("a", 1.into())]))]);

        let report = compare(&snapshot, &shadow);
        assert_eq!(
            report.findings(),
            &[Finding::MissingObject {
                path: ObjectPath::new("/o/2")
            }]
        );
    }

    #[test]
    fn extra_object_then_clean_after_removal() {
        let snapshot = Snapshot::new(tree(vec![("/o/1", object("X", &[("a", 1.into())]))]));
        let mut shadow = store(vec![
            ("/o/1", object("X", &[("a", 1.into())])),
            ("/o/3", object("Y", &[("b", true.into())])),
        ]);

        let report = compare(&snapshot, &shadow);
        assert_eq!(
            report.findings(),
            &[Finding::ExtraObject {
                path: ObjectPath::new("/o/3"),
                interfaces: vec![InterfaceName::new("Y")],
            }]
        );

        shadow
            .remove_interfaces(&ObjectPath::new("/o/3"), &[InterfaceName::new("Y")])
            .unwrap();
        assert!(compare(&snapshot, &shadow).is_empty());
    }

    #[test]
    fn mismatch_is_not_also_extra() {
        let snapshot = Snapshot::new(tree(vec![("/o/1", object("X", &[("a", 1.into())]))]));
        let shadow = store(vec![("/o/1", object("X", &[("a", "one".into())]))]);

        let counts = compare(&snapshot, &shadow).count_by_kind();
        assert_eq!(counts.get(&FindingKind::ValueMismatch), Some(&1));
        assert_eq!(counts.get(&FindingKind::ExtraProperty), None);
    }

    #[test]
    fn findings_follow_traversal_order() {
        let mut expected_a = object("X", &[("p", 1.into()), ("q", 2.into())]);
        expected_a.insert(
            InterfaceName::new("Z"),
            Properties::from([(PropertyName::new("z"), PropertyValue::from(0))]),
        );
        let snapshot = Snapshot::new(tree(vec![
            ("/a", expected_a),
            ("/b", object("X", &[("p", 1.into())])),
        ]));

        let mut actual_a = object("X", &[("q", 3.into()), ("r", 4.into())]);
        actual_a.insert(
            InterfaceName::new("W"),
            Properties::from([(PropertyName::new("w"), PropertyValue::from(0))]),
        );
        let shadow = store(vec![
            ("/a", actual_a),
            ("/c", object("X", &[("p", 1.into())])),
        ]);

        let kinds: Vec<FindingKind> = compare(&snapshot, &shadow).iter().map(Finding::kind).collect();
        assert_eq!(
            kinds,
            vec![
                // /a [X]
                FindingKind::MissingProperty,
                FindingKind::ValueMismatch,
                FindingKind::ExtraProperty,
                // /a [Z], then the unvisited [W]
                FindingKind::MissingInterface,
                FindingKind::ExtraInterface,
                // /b
                FindingKind::MissingObject,
                // /c
                FindingKind::ExtraObject,
            ]
        );
    }

    #[test]
    fn property_less_object_missing_from_shadow() {
        let snapshot = Snapshot::new(tree(vec![
            ("/o/1", object("X", &[("a", 1.into())])),
            ("/o/2", Interfaces::from([bare("Introspectable")])),
        ]));
        let shadow = store(vec![("/o/1", object("X", &[("a", 1.into())]))]);

        assert_eq!(
            compare(&snapshot, &shadow).findings(),
            &[Finding::MissingObject {
                path: ObjectPath::new("/o/2")
            }]
        );
    }

    #[test]
    fn property_less_interface_matches_by_name() {
        let mut announced = object("Pv", &[("size", 8.into())]);
        announced.extend([bare("Introspectable")]);
        let snapshot = Snapshot::new(tree(vec![("/o/1", announced.clone())]));

        assert!(compare(&snapshot, &store(vec![("/o/1", announced)])).is_empty());

        let without = store(vec![("/o/1", object("Pv", &[("size", 8.into())]))]);
        assert_eq!(
            compare(&snapshot, &without).findings(),
            &[Finding::MissingInterface {
                path: ObjectPath::new("/o/1"),
                interface: InterfaceName::new("Introspectable"),
            }]
        );
    }

    #[test]
    fn property_less_interface_only_in_shadow_is_extra() {
        let snapshot = Snapshot::new(tree(vec![("/o/1", object("X", &[("a", 1.into())]))]));
        let mut announced = object("X", &[("a", 1.into())]);
        announced.extend([bare("Introspectable")]);

        assert_eq!(
            compare(&snapshot, &store(vec![("/o/1", announced)])).findings(),
            &[Finding::ExtraInterface {
                path: ObjectPath::new("/o/1"),
                interface: InterfaceName::new("Introspectable"),
            }]
        );
    }

    #[test]
    fn nested_values_compare_structurally() {
        let nested = PropertyValue::Array(vec![
            PropertyValue::from("pv0"),
            PropertyValue::Array(vec![1u64.into(), 2u64.into()]),
        ]);
        let snapshot = Snapshot::new(tree(vec![("/o/1", object("X", &[("seg", nested.clone())]))]));
        let shadow = store(vec![("/o/1", object("X", &[("seg", nested)]))]);
        assert!(compare(&snapshot, &shadow).is_empty());
    }

    fn small_tree() -> impl Strategy<Value = ObjectTree> {
        prop::collection::btree_map(
            "/o/[0-4]",
            prop::collection::btree_map(
                "[A-C]",
                prop::collection::btree_map("[a-c]", 0i64..3, 1..3),
                1..3,
            ),
            0..4,
        )
        .prop_map(|raw| -> ObjectTree {
            raw.into_iter()
                .map(|(path, ifaces)| {
                    let ifaces: Interfaces = ifaces
                        .into_iter()
                        .map(|(iface, props)| {
                            let props: Properties = props
                                .into_iter()
                                .map(|(k, v)| (PropertyName::new(k), PropertyValue::Int(v)))
                                .collect();
                            (InterfaceName::new(iface), props)
                        })
                        .collect();
                    (ObjectPath::new(path), ifaces)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_compare_is_idempotent(a in small_tree(), b in small_tree()) {
            let snapshot = Snapshot::new(a);
            let shadow = ShadowStore::from_tree(b);
            let first = compare(&snapshot, &shadow);
            let second = compare(&snapshot, &shadow);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_tree_matches_itself(a in small_tree()) {
            let snapshot = Snapshot::new(a.clone());
            prop_assert!(compare(&snapshot, &ShadowStore::from_tree(a)).is_empty());
        }

        #[test]
        fn prop_swapping_sides_swaps_missing_and_extra_objects(a in small_tree(), b in small_tree()) {
            let forward = compare(&Snapshot::new(a.clone()), &ShadowStore::from_tree(b.clone())).count_by_kind();
            let backward = compare(&Snapshot::new(b), &ShadowStore::from_tree(a)).count_by_kind();
            prop_assert_eq!(
                forward.get(&FindingKind::MissingObject),
                backward.get(&FindingKind::ExtraObject)
            );
        }
    }
}
