use crate::graph::NodeId;
use crate::graph::index::Region;

/// Access history of one placeholder or variable.
///
/// Mutations are ordered against each other through `last_writer`. Readers stay in the ledger
/// until a mutation touching their region orders them; readers of disjoint regions survive so
/// that a later overlapping mutation can still be ordered after them.
#[derive(Debug, Clone, Default)]
pub(crate) struct AccessLedger {
    last_writer: Option<NodeId>,
    readers: Vec<(NodeId, Region)>,
}

impl AccessLedger {
    /// Record a read and return the mutation it has to execute after, if any.
    pub(crate) fn record_read(&mut self, reader: NodeId, region: Region) -> Option<NodeId> {
        self.readers.push((reader, region));
        self.last_writer
    }

    /// Record a mutation and return the nodes it has to execute after.
    pub(crate) fn record_write(&mut self, writer: NodeId, region: &Region) -> Vec<NodeId> {
        let mut deps: Vec<NodeId> = self.last_writer.into_iter().collect();
        let (overlapping, disjoint): (Vec<_>, Vec<_>) = std::mem::take(&mut self.readers)
            .into_iter()
            .partition(|(_, r)| r.overlaps(region));
        deps.extend(
            overlapping
                .into_iter()
                .map(|(id, _)| id)
                .filter(|id| *id != writer),
        );
        self.readers = disjoint;
        self.last_writer = Some(writer);
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: usize) -> NodeId {
        NodeId::new(0, index)
    }

    #[test]
    fn reads_follow_last_write() {
        let mut ledger = AccessLedger::default();
        assert_eq!(ledger.record_read(id(1), Region(vec![0..2])), None);
        assert_eq!(ledger.record_write(id(2), &Region(vec![0..1])), vec![id(1)]);
        assert_eq!(ledger.record_read(id(3), Region(vec![1..2])), Some(id(2)));
    }

    #[test]
    fn disjoint_readers_are_kept_for_later_writes() {
        let mut ledger = AccessLedger::default();
        ledger.record_read(id(1), Region(vec![0..1]));
        assert_eq!(ledger.record_write(id(2), &Region(vec![1..2])), vec![]);
        assert_eq!(ledger.record_write(id(3), &Region(vec![0..2])), vec![id(2), id(1)]);
    }

    #[test]
    fn self_read_is_not_a_dependency() {
        let mut ledger = AccessLedger::default();
        ledger.record_read(id(4), Region(vec![0..2]));
        assert_eq!(ledger.record_write(id(4), &Region(vec![0..1])), vec![]);
    }
}
