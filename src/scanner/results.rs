//! Aggregation of probe outcomes.
//!
//! The [`ResultTable`] groups ports by address and state. It is owned by
//! the single collecting task during a scan and only read afterwards.

use crate::scanner::traits::{PortState, ProbeOutcome};
use serde::ser::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// Ports of one address, bucketed by state. Buckets iterate ascending.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResultGroup {
    pub address: IpAddr,
    pub opened: BTreeSet<u16>,
    pub closed: BTreeSet<u16>,
    pub unresponsive: BTreeSet<u16>,
}

impl ResultGroup {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            opened: BTreeSet::new(),
            closed: BTreeSet::new(),
            unresponsive: BTreeSet::new(),
        }
    }

    /// The bucket holding ports in `state`.
    pub fn bucket(&self, state: PortState) -> &BTreeSet<u16> {
        match state {
            PortState::Opened => &self.opened,
            PortState::Closed => &self.closed,
            PortState::Unresponsive => &self.unresponsive,
        }
    }

    fn bucket_mut(&mut self, state: PortState) -> &mut BTreeSet<u16> {
        match state {
            PortState::Opened => &mut self.opened,
            PortState::Closed => &mut self.closed,
            PortState::Unresponsive => &mut self.unresponsive,
        }
    }

    /// Total ports recorded for this address.
    pub fn len(&self) -> usize {
        self.opened.len() + self.closed.len() + self.unresponsive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every recorded (port, state) pair, ports ascending.
    pub fn entries(&self) -> Vec<(u16, PortState)> {
        let mut entries: Vec<(u16, PortState)> = [
            PortState::Opened,
            PortState::Closed,
            PortState::Unresponsive,
        ]
        .into_iter()
        .flat_map(|state| self.bucket(state).iter().map(move |&port| (port, state)))
        .collect();
        entries.sort_unstable_by_key(|(port, _)| *port);
        entries
    }
}

/// Outcome counts across a whole table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub addresses: usize,
    pub opened: usize,
    pub closed: usize,
    pub unresponsive: usize,
}

impl ResultSummary {
    pub fn total(&self) -> usize {
        self.opened + self.closed + self.unresponsive
    }
}

/// Address to [`ResultGroup`] mapping, addresses ascending.
///
/// `record` takes `&mut self`; a table shared between tasks needs a lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    groups: BTreeMap<IpAddr, ResultGroup>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome into the table, creating its group on first sight.
    pub fn record(&mut self, outcome: ProbeOutcome) {
        self.groups
            .entry(outcome.address)
            .or_insert_with(|| ResultGroup::new(outcome.address))
            .bucket_mut(outcome.state)
            .insert(outcome.port);
    }

    pub fn get(&self, address: &IpAddr) -> Option<&ResultGroup> {
        self.groups.get(address)
    }

    /// Groups in ascending address order.
    pub fn groups(&self) -> impl Iterator<Item = &ResultGroup> {
        self.groups.values()
    }

    /// Number of distinct addresses.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn summary(&self) -> ResultSummary {
        self.groups().fold(
            ResultSummary {
                addresses: self.len(),
                ..ResultSummary::default()
            },
            |mut acc, group| {
                acc.opened += group.opened.len();
                acc.closed += group.closed.len();
                acc.unresponsive += group.unresponsive.len();
                acc
            },
        )
    }
}

impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.groups.values())
    }
}

impl Extend<ProbeOutcome> for ResultTable {
    fn extend<I: IntoIterator<Item = ProbeOutcome>>(&mut self, iter: I) {
        for outcome in iter {
            self.record(outcome);
        }
    }
}

impl FromIterator<ProbeOutcome> for ResultTable {
    fn from_iter<I: IntoIterator<Item = ProbeOutcome>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::traits::Task;
    use std::net::Ipv4Addr;

    fn outcome(last: u8, port: u16, state: PortState) -> ProbeOutcome {
        let address = IpAddr::V4(Ipv4Addr::new(192, 168, 0, last));
        ProbeOutcome::new(Task::new(address, port), state)
    }

    #[test]
    fn test_record_groups_by_address() {
        let table: ResultTable = vec![
            outcome(2, 443, PortState::Opened),
            outcome(1, 22, PortState::Closed),
            outcome(2, 80, PortState::Opened),
            outcome(2, 25, PortState::Unresponsive),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 2);
        let second = table.get(&IpAddr::V4(Ipv4Addr::new(192, 168, 0, 2))).unwrap();
        assert_eq!(second.opened.iter().copied().collect::<Vec<_>>(), vec![80, 443]);
        assert_eq!(second.unresponsive.len(), 1);
        assert!(second.closed.is_empty());
    }

    #[test]
    fn test_groups_iterate_in_address_order() {
        let table: ResultTable = vec![
            outcome(9, 1, PortState::Closed),
            outcome(3, 1, PortState::Closed),
            outcome(5, 1, PortState::Closed),
        ]
        .into_iter()
        .collect();

        let order: Vec<String> = table.groups().map(|g| g.address.to_string()).collect();
        assert_eq!(order, vec!["192.168.0.3", "192.168.0.5", "192.168.0.9"]);
    }

    #[test]
    fn test_summary_and_entries() {
        let table: ResultTable = vec![
            outcome(1, 8002, PortState::Closed),
            outcome(1, 8001, PortState::Opened),
            outcome(1, 8000, PortState::Closed),
        ]
        .into_iter()
        .collect();

        let summary = table.summary();
        assert_eq!(summary.addresses, 1);
        assert_eq!(summary.opened, 1);
        assert_eq!(summary.closed, 2);
        assert_eq!(summary.total(), 3);

        let group = table.groups().next().unwrap();
        assert_eq!(
            group.entries(),
            vec![
                (8000, PortState::Closed),
                (8001, PortState::Opened),
                (8002, PortState::Closed)
            ]
        );
    }

    #[test]
    fn test_serializes_as_group_list() {
        let table: ResultTable = vec![outcome(1, 80, PortState::Opened)].into_iter().collect();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json[0]["address"], "192.168.0.1");
        assert_eq!(json[0]["opened"], serde_json::json!([80]));
        assert_eq!(json[0]["closed"], serde_json::json!([]));
    }
}
