//! Divergence findings and reports
//!
//! A [`DivergenceReport`] is the ordered list of [`Finding`]s produced by one
//! comparison of a snapshot against the shadow store. "Expected" always
//! refers to the snapshot side, "actual" to the shadow side.

use crate::path::{InterfaceName, ObjectPath, PropertyName};
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// One structural difference between snapshot and shadow store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Object in the snapshot, absent from the shadow store
    MissingObject {
        /// Object path
        path: ObjectPath,
    },
    /// Interface in the snapshot, absent from the shadow object
    MissingInterface {
        /// Object path
        path: ObjectPath,
        /// Interface name
        interface: InterfaceName,
    },
    /// Property in the snapshot, absent from the shadow interface
    MissingProperty {
        /// Object path
        path: ObjectPath,
        /// Interface name
        interface: InterfaceName,
        /// Property name
        property: PropertyName,
        /// Snapshot value
        expected: PropertyValue,
    },
    /// Property present on both sides with different values
    ValueMismatch {
        /// Object path
        path: ObjectPath,
        /// Interface name
        interface: InterfaceName,
        /// Property name
        property: PropertyName,
        /// Snapshot value
        expected: PropertyValue,
        /// Shadow value
        actual: PropertyValue,
    },
    /// Property in the shadow store that the snapshot does not have
    ExtraProperty {
        /// Object path
        path: ObjectPath,
        /// Interface name
        interface: InterfaceName,
        /// Property name
        property: PropertyName,
        /// Shadow value
        actual: PropertyValue,
    },
    /// Interface in the shadow store that the snapshot does not have
    ExtraInterface {
        /// Object path
        path: ObjectPath,
        /// Interface name
        interface: InterfaceName,
    },
    /// Object in the shadow store that the snapshot does not have
    ExtraObject {
        /// Object path
        path: ObjectPath,
        /// Interfaces the shadow store holds for it
        interfaces: Vec<InterfaceName>,
    },
}

/// Discriminant of a [`Finding`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// See [`Finding::MissingObject`]
    MissingObject,
    /// See [`Finding::MissingInterface`]
    MissingInterface,
    /// See [`Finding::MissingProperty`]
    MissingProperty,
    /// See [`Finding::ValueMismatch`]
    ValueMismatch,
    /// See [`Finding::ExtraProperty`]
    ExtraProperty,
    /// See [`Finding::ExtraInterface`]
    ExtraInterface,
    /// See [`Finding::ExtraObject`]
    ExtraObject,
}

impl Finding {
    /// Kind of this finding
    #[must_use]
    pub fn kind(&self) -> FindingKind {
        match self {
            Self::MissingObject { .. } => FindingKind::MissingObject,
            Self::MissingInterface { .. } => FindingKind::MissingInterface,
            Self::MissingProperty { .. } => FindingKind::MissingProperty,
            Self::ValueMismatch { .. } => FindingKind::ValueMismatch,
            Self::ExtraProperty { .. } => FindingKind::ExtraProperty,
            Self::ExtraInterface { .. } => FindingKind::ExtraInterface,
            Self::ExtraObject { .. } => FindingKind::ExtraObject,
        }
    }

    /// Object the finding is about
    #[must_use]
    pub fn path(&self) -> &ObjectPath {
        match self {
            Self::MissingObject { path }
            | Self::MissingInterface { path, .. }
            | Self::MissingProperty { path, .. }
            | Self::ValueMismatch { path, .. }
            | Self::ExtraProperty { path, .. }
            | Self::ExtraInterface { path, .. }
            | Self::ExtraObject { path, .. } => path,
        }
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingObject { path } => write!(f, "missing object {path}"),
            Self::MissingInterface { path, interface } => {
                write!(f, "missing interface {interface} for object {path}")
            }
            Self::MissingProperty {
                path,
                interface,
                property,
                expected,
            } => write!(
                f,
                "missing property {property} (snapshot value {expected}) for interface {interface} of object {path}"
            ),
            Self::ValueMismatch {
                path,
                interface,
                property,
                expected,
                actual,
            } => write!(
                f,
                "property ({property}) mismatch on {path} [{interface}]: snapshot {expected} != signal value {actual}"
            ),
            Self::ExtraProperty {
                path,
                interface,
                property,
                actual,
            } => write!(
                f,
                "property {property} = {actual} present in shadow store but not in snapshot for {path} [{interface}]"
            ),
            Self::ExtraInterface { path, interface } => write!(
                f,
                "interface {interface} present in shadow store but not in snapshot for object {path}"
            ),
            Self::ExtraObject { path, interfaces } => {
                write!(f, "object {path} present in shadow store but not in snapshot (interfaces:")?;
                for interface in interfaces {
                    write!(f, " {interface}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Display for FindingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingObject => "missing_object",
            Self::MissingInterface => "missing_interface",
            Self::MissingProperty => "missing_property",
            Self::ValueMismatch => "value_mismatch",
            Self::ExtraProperty => "extra_property",
            Self::ExtraInterface => "extra_interface",
            Self::ExtraObject => "extra_object",
        })
    }
}

/// Ordered findings of one comparison pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DivergenceReport {
    findings: Vec<Finding>,
}

impl DivergenceReport {
    /// Empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finding
    #[inline]
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Findings in emission order
    #[inline]
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Iterate findings in emission order
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }

    /// Number of findings
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Whether the comparison found nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Tally findings per kind
    #[must_use]
    pub fn count_by_kind(&self) -> BTreeMap<FindingKind, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Consume into the list of findings
    #[inline]
    #[must_use]
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

impl FromIterator<Finding> for DivergenceReport {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        Self {
            findings: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DivergenceReport {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn count_by_kind_tallies() {
        let report: DivergenceReport = [
            Finding::MissingObject {
                path: ObjectPath::new("/a"),
            },
            Finding::MissingObject {
                path: ObjectPath::new("/b"),
            },
            Finding::ExtraInterface {
                path: ObjectPath::new("/c"),
                interface: InterfaceName::new("X"),
            },
        ]
        .into_iter()
        .collect();

        let counts = report.count_by_kind();
        assert_eq!(counts[&FindingKind::MissingObject], 2);
        assert_eq!(counts[&FindingKind::ExtraInterface], 1);
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn mismatch_message_names_both_values() {
        let finding = Finding::ValueMismatch {
            path: ObjectPath::new("/o/1"),
            interface: InterfaceName::new("X"),
            property: PropertyName::new("count"),
            expected: PropertyValue::Int(5),
            actual: PropertyValue::Int(4),
        };
        assert_eq!(
            finding.to_string(),
            "property (count) mismatch on /o/1 [X]: snapshot 5 != signal value 4"
        );
    }

    #[test]
    fn findings_serialize_with_kind_tag() {
        let finding = Finding::MissingObject {
            path: ObjectPath::new("/o/2"),
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "missing_object");
        assert_eq!(json["path"], "/o/2");
    }
}
