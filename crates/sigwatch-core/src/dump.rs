//! Diagnostic dump of the shadow store next to a fresh snapshot
//!
//! Rendering is pure so it can be checked in tests; the engine logs the
//! result line by line.

use crate::error::SourceError;
use crate::listener::ListenerStats;
use sigwatch_model::{ObjectTree, PropertyKey, Snapshot};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Render one tree under a title line
///
/// Objects, interfaces and properties appear in sorted order.
#[must_use]
pub fn render_tree(title: &str, tree: &ObjectTree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    for (path, interfaces) in tree {
        let _ = writeln!(out, "object {path}");
        for (interface, properties) in interfaces {
            let _ = writeln!(out, "interface {interface}");
            for (property, value) in properties {
                let _ = writeln!(out, "\t{property}: {value}");
            }
        }
    }
    out
}

/// Everything printed when the engine shuts down or escalates
#[derive(Debug)]
pub struct DumpInput<'a> {
    /// Mirror contents
    pub shadow: &'a ObjectTree,
    /// Fresh snapshot, or why none could be fetched
    pub snapshot: Result<&'a Snapshot, &'a SourceError>,
    /// Properties the producer invalidated at some point
    pub invalidated: &'a BTreeSet<PropertyKey>,
    /// Listener counters
    pub stats: ListenerStats,
    /// Cumulative divergence count
    pub errors: u64,
}

/// Render the full dump
#[must_use]
pub fn render_dump(input: &DumpInput<'_>) -> String {
    let mut out = render_tree("Dumping shadow store", input.shadow);

    match input.snapshot {
        Ok(snapshot) => out.push_str(&render_tree("Dumping snapshot", snapshot.objects())),
        Err(e) => {
            let _ = writeln!(out, "Dumping snapshot");
            let _ = writeln!(out, "snapshot unavailable: {e}");
        }
    }

    if !input.invalidated.is_empty() {
        let _ = writeln!(out, "Invalidated properties");
        for key in input.invalidated {
            let _ = writeln!(out, "\t{}[{}][{}]", key.path, key.interface, key.property);
        }
    }

    let stats = input.stats;
    let _ = writeln!(
        out,
        "events: added={} removed={} updated={} buffered={} anomalies={} ignored={}",
        stats.added, stats.removed, stats.updated, stats.buffered, stats.anomalies, stats.ignored
    );
    let _ = writeln!(out, "cumulative errors: {}", input.errors);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigwatch_model::{InterfaceName, Interfaces, ObjectPath, Properties, PropertyName, PropertyValue};

    fn sample() -> ObjectTree {
        ObjectTree::from([
            (
                ObjectPath::new("/o/2"),
                Interfaces::from([(
                    InterfaceName::new("Vg"),
                    Properties::from([
                        (PropertyName::new("Name"), PropertyValue::from("vg0")),
                        (PropertyName::new("Free"), PropertyValue::from(10u64)),
                    ]),
                )]),
            ),
            (
                ObjectPath::new("/o/1"),
                Interfaces::from([(
                    InterfaceName::new("Pv"),
                    Properties::from([(PropertyName::new("Used"), PropertyValue::from(true))]),
                )]),
            ),
        ])
    }

    #[test]
    fn tree_is_rendered_sorted() {
        let text = render_tree("Dumping shadow store", &sample());
        assert_eq!(
            text,
            "Dumping shadow store\n\
             object /o/1\n\
             interface Pv\n\
             \tUsed: true\n\
             object /o/2\n\
             interface Vg\n\
             \tFree: 10\n\
             \tName: \"vg0\"\n"
        );
    }

    #[test]
    fn fetch_failure_still_dumps_shadow() {
        let shadow = sample();
        let error = SourceError::Unavailable("gone".into());
        let invalidated = BTreeSet::new();
        let text = render_dump(&DumpInput {
            shadow: &shadow,
            snapshot: Err(&error),
            invalidated: &invalidated,
            stats: ListenerStats::default(),
            errors: 2,
        });

        assert!(text.starts_with("Dumping shadow store\nobject /o/1"));
        assert!(text.contains("snapshot unavailable: snapshot source unavailable: gone"));
        assert!(text.ends_with("cumulative errors: 2\n"));
    }

    #[test]
    fn invalidated_keys_are_listed() {
        let shadow = ObjectTree::new();
        let snapshot = Snapshot::default();
        let invalidated = BTreeSet::from([PropertyKey {
            path: ObjectPath::new("/o/1"),
            interface: InterfaceName::new("Pv"),
            property: PropertyName::new("Used"),
        }]);
        let text = render_dump(&DumpInput {
            shadow: &shadow,
            snapshot: Ok(&snapshot),
            invalidated: &invalidated,
            stats: ListenerStats::default(),
            errors: 0,
        });
        assert!(text.contains("Invalidated properties\n\t/o/1[Pv][Used]\n"));
    }
}
