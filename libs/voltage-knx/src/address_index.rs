//! Group address to communication object index
//!
//! Built once from the object list. Only objects carrying the
//! communication flag are indexed. Entries are kept sorted by address so a
//! lookup is a binary search.
//!
//! When several communication objects share one address, the object with
//! the lowest index wins and the others are never reached from the bus.

use tracing::{debug, warn};

use crate::com_object::{ComObject, ObjectFlags};

/// Sorted `(address, object index)` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressIndex {
    entries: Vec<(u16, usize)>,
}

impl AddressIndex {
    /// Index every communication object of `objects`
    pub fn build(objects: &[ComObject]) -> Self {
        let mut entries: Vec<(u16, usize)> = objects
            .iter()
            .enumerate()
            .filter(|(_, obj)| obj.flags().contains(ObjectFlags::COMMUNICATION))
            .map(|(index, obj)| (obj.address().raw(), index))
            .collect();

        // (address, index) ordering puts the lowest index first among duplicates
        entries.sort_unstable();
        let before = entries.len();
        entries.dedup_by(|dropped, kept| {
            let duplicate = dropped.0 == kept.0;
            if duplicate {
                warn!(
                    "Duplicate group address {:04X}: object {} shadowed by object {}",
                    dropped.0, dropped.1, kept.1
                );
            }
            duplicate
        });

        debug!(
            "Address index built: {} entries ({} objects, {} duplicates dropped)",
            entries.len(),
            objects.len(),
            before - entries.len()
        );
        Self { entries }
    }

    /// Local object index for a destination address
    pub fn lookup(&self, address: u16) -> Option<usize> {
        self.entries
            .binary_search_by_key(&address, |(addr, _)| *addr)
            .ok()
            .map(|pos| self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in address order
    pub fn iter(&self) -> impl Iterator<Item = (u16, usize)> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::address::GroupAddress;
    use crate::dpt::Dpt;

    fn obj(raw: u16, flags: ObjectFlags) -> ComObject {
        ComObject::new(GroupAddress::from_raw(raw), Dpt::SWITCH, flags)
    }

    #[test]
    fn test_lookup_exact_match() {
        let objects = vec![
            obj(0x0A03, ObjectFlags::SENSOR),
            obj(0x0801, ObjectFlags::LOGIC_IN),
            obj(0x0902, ObjectFlags::LOGIC_IN_INIT),
        ];
        let index = AddressIndex::build(&objects);
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup(0x0A03), Some(0));
        assert_eq!(index.lookup(0x0801), Some(1));
        assert_eq!(index.lookup(0x0902), Some(2));
        assert_eq!(index.lookup(0x0800), None);
        assert_eq!(index.lookup(0xFFFF), None);
    }

    #[test]
    fn test_skips_objects_without_communication_flag() {
        let objects = vec![
            obj(0x0801, ObjectFlags::READ | ObjectFlags::WRITE),
            obj(0x0802, ObjectFlags::SENSOR),
        ];
        let index = AddressIndex::build(&objects);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup(0x0801), None);
        assert_eq!(index.lookup(0x0802), Some(1));
    }

    #[test]
    fn test_duplicate_address_lowest_index_wins() {
        let objects = vec![
            obj(0x0100, ObjectFlags::SENSOR),
            obj(0x0805, ObjectFlags::READ),
            obj(0x0805, ObjectFlags::LOGIC_IN),
            obj(0x0805, ObjectFlags::SENSOR),
        ];
        let index = AddressIndex::build(&objects);
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(0x0805), Some(2));
    }

    #[test]
    fn test_empty_list() {
        let index = AddressIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.lookup(0), None);
    }

    #[test]
    fn test_iter_sorted() {
        let objects = vec![
            obj(0x0300, ObjectFlags::SENSOR),
            obj(0x0100, ObjectFlags::SENSOR),
            obj(0x0200, ObjectFlags::SENSOR),
        ];
        let index = AddressIndex::build(&objects);
        let addrs: Vec<u16> = index.iter().map(|(a, _)| a).collect();
        assert_eq!(addrs, vec![0x0100, 0x0200, 0x0300]);
    }
}
