//! Compaction of parallel connection and value groups into response shapes.
//!
//! Connection groups that produced identical value groups are merged into a
//! single entry, in order of first occurrence. A single remaining entry is
//! then flattened:
//!
//! ```text
//! [[1]],      [[300, 300]]              -> {connection: 1, values: [300, 300]}
//! [[1], [2]], [[300, 300], [300, 300]]  -> {connections: [1, 2], values: [300, 300]}
//! [[1], [2]], [[300, 300], [400, 400]]  -> {groups: [{connection: 1, ..}, {connection: 2, ..}]}
//! ```

use std::collections::HashMap;

use serde::Serialize;

/// Response shape for a set of connections and their values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompactedGroups<C> {
    Connection { connection: C, values: Vec<f64> },
    Connections { connections: Vec<C>, values: Vec<f64> },
    Groups { groups: Vec<GroupEntry<C>> },
}

/// One entry of the nested `groups` shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupEntry<C> {
    Connection { connection: C, values: Vec<f64> },
    Connections { connections: Vec<C>, values: Vec<f64> },
}

impl<C> GroupEntry<C> {
    fn from_members(mut connections: Vec<C>, values: Vec<f64>) -> Self {
        if connections.len() == 1 {
            if let Some(connection) = connections.pop() {
                return Self::Connection { connection, values };
            }
        }
        Self::Connections { connections, values }
    }

    fn map_connections<D>(self, f: &mut impl FnMut(C) -> D) -> GroupEntry<D> {
        match self {
            Self::Connection { connection, values } => GroupEntry::Connection {
                connection: f(connection),
                values,
            },
            Self::Connections {
                connections,
                values,
            } => GroupEntry::Connections {
                connections: connections.into_iter().map(&mut *f).collect(),
                values,
            },
        }
    }
}

impl<C> CompactedGroups<C> {
    /// Replaces every connection, e.g. asset names by entity addresses.
    #[must_use]
    pub fn map_connections<D>(self, mut f: impl FnMut(C) -> D) -> CompactedGroups<D> {
        match self {
            Self::Connection { connection, values } => CompactedGroups::Connection {
                connection: f(connection),
                values,
            },
            Self::Connections {
                connections,
                values,
            } => CompactedGroups::Connections {
                connections: connections.into_iter().map(&mut f).collect(),
                values,
            },
            Self::Groups { groups } => CompactedGroups::Groups {
                groups: groups
                    .into_iter()
                    .map(|g| g.map_connections(&mut f))
                    .collect(),
            },
        }
    }
}

/// Merges connection groups with identical value groups and picks the
/// flattest shape. Members of merged groups are concatenated into one flat
/// connection list. Groups are paired positionally; surplus entries in the
/// longer list are ignored.
///
/// Value groups compare by exact numeric equality: values differing in
/// their last bit are distinct, `0.0` equals `-0.0`, and missing values
/// (`NaN`) are equal to each other.
#[must_use]
pub fn compact<C>(connection_groups: Vec<Vec<C>>, value_groups: Vec<Vec<f64>>) -> CompactedGroups<C> {
    let mut index: HashMap<Vec<u64>, usize> = HashMap::new();
    let mut classes: Vec<(Vec<C>, Vec<f64>)> = Vec::new();

    for (connections, values) in connection_groups.into_iter().zip(value_groups) {
        let key = value_key(&values);
        match index.get(&key) {
            Some(&i) => classes[i].0.extend(connections),
            None => {
                index.insert(key, classes.len());
                classes.push((connections, values));
            }
        }
    }

    if classes.len() == 1 {
        if let Some((connections, values)) = classes.pop() {
            return match GroupEntry::from_members(connections, values) {
                GroupEntry::Connection { connection, values } => {
                    CompactedGroups::Connection { connection, values }
                }
                GroupEntry::Connections {
                    connections,
                    values,
                } => CompactedGroups::Connections {
                    connections,
                    values,
                },
            };
        }
    }

    CompactedGroups::Groups {
        groups: classes
            .into_iter()
            .map(|(connections, values)| GroupEntry::from_members(connections, values))
            .collect(),
    }
}

fn value_key(values: &[f64]) -> Vec<u64> {
    values.iter().map(|&v| canonical_bits(v)).collect()
}

fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0_f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}
