// src/order/mod.rs

//! Order list: the packages a run must touch and their per-run flags
//!
//! The list holds two things. One is the sequence the driver walks, as
//! produced by an [`OrderSorter`]. The other is a flag set per package,
//! indexed by package id so it also covers packages outside the list.
//! `UNPACKED`, `CONFIGURED`, and `REMOVED` are state markers: setting one
//! with [`OrderList::set_state`] clears the other two. All other flags are
//! independent bits.

mod sort;

pub use sort::{OrderSorter, TopoSorter};

use crate::graph::PackageId;
use std::fmt;

/// Per-package flag set
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderFlags(u16);

impl OrderFlags {
    pub const NONE: OrderFlags = OrderFlags(0);
    /// Still pending processing in this run
    pub const IN_LIST: OrderFlags = OrderFlags(1 << 0);
    /// Configure right after unpack
    pub const IMMEDIATE: OrderFlags = OrderFlags(1 << 1);
    /// Subject of an in-progress cycle-breaking descent
    pub const LOOP: OrderFlags = OrderFlags(1 << 2);
    pub const UNPACKED: OrderFlags = OrderFlags(1 << 3);
    pub const CONFIGURED: OrderFlags = OrderFlags(1 << 4);
    pub const REMOVED: OrderFlags = OrderFlags(1 << 5);
    /// Archive expected but absent
    pub const MISSING: OrderFlags = OrderFlags(1 << 6);
    /// Mask of the exclusive state markers
    pub const STATES: OrderFlags = OrderFlags((1 << 3) | (1 << 4) | (1 << 5));

    /// All bits of `other` are set
    pub fn contains(self, other: OrderFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any bit of `other` is set
    pub fn intersects(self, other: OrderFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: OrderFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: OrderFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for OrderFlags {
    type Output = OrderFlags;

    fn bitor(self, rhs: OrderFlags) -> OrderFlags {
        OrderFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for OrderFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(OrderFlags, &str); 7] = [
            (OrderFlags::IN_LIST, "InList"),
            (OrderFlags::IMMEDIATE, "Immediate"),
            (OrderFlags::LOOP, "Loop"),
            (OrderFlags::UNPACKED, "UnPacked"),
            (OrderFlags::CONFIGURED, "Configured"),
            (OrderFlags::REMOVED, "Removed"),
            (OrderFlags::MISSING, "Missing"),
        ];

        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "OrderFlags({})", set.join(" | "))
    }
}

/// Packages to process, in order, with their flags
#[derive(Debug, Clone)]
pub struct OrderList {
    order: Vec<PackageId>,
    flags: Vec<OrderFlags>,
}

impl OrderList {
    /// Create an empty list able to flag `package_count` packages
    pub fn new(package_count: usize) -> Self {
        Self {
            order: Vec::new(),
            flags: vec![OrderFlags::NONE; package_count],
        }
    }

    /// Append a package and flag it `IN_LIST`
    pub fn push(&mut self, package: PackageId) {
        self.order.push(package);
        self.flag(package, OrderFlags::IN_LIST);
    }

    pub fn flags(&self, package: PackageId) -> OrderFlags {
        self.flags[package.index()]
    }

    pub fn is_flag(&self, package: PackageId, flag: OrderFlags) -> bool {
        self.flags[package.index()].contains(flag)
    }

    pub fn flag(&mut self, package: PackageId, flag: OrderFlags) {
        self.flags[package.index()].insert(flag);
    }

    pub fn unflag(&mut self, package: PackageId, flag: OrderFlags) {
        self.flags[package.index()].remove(flag);
    }

    /// Replace the state marker of a package
    pub fn set_state(&mut self, package: PackageId, state: OrderFlags) {
        let flags = &mut self.flags[package.index()];
        flags.remove(OrderFlags::STATES);
        flags.insert(state);
    }

    /// The package has been neither unpacked nor configured yet this run
    ///
    /// An early-removed package still counts as now: it is reinstalled at
    /// its own position. Packages outside the list never get a marker.
    pub fn is_now(&self, package: PackageId) -> bool {
        !self.flags[package.index()].intersects(OrderFlags::UNPACKED | OrderFlags::CONFIGURED)
    }

    pub fn packages(&self) -> &[PackageId] {
        &self.order
    }

    /// Replace the sequence after sorting
    pub fn set_order(&mut self, order: Vec<PackageId>) {
        self.order = order;
    }

    pub fn iter(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_sets_in_list() {
        let mut list = OrderList::new(3);
        list.push(PackageId(1));
        assert!(list.is_flag(PackageId(1), OrderFlags::IN_LIST));
        assert!(!list.is_flag(PackageId(0), OrderFlags::IN_LIST));
        assert_eq!(list.packages(), &[PackageId(1)]);
    }

    #[test]
    fn test_state_markers_are_exclusive() {
        let mut list = OrderList::new(1);
        let pkg = PackageId(0);
        list.push(pkg);
        list.flag(pkg, OrderFlags::LOOP | OrderFlags::IMMEDIATE);
        assert!(list.is_now(pkg));

        list.set_state(pkg, OrderFlags::UNPACKED);
        assert!(!list.is_now(pkg));
        list.set_state(pkg, OrderFlags::CONFIGURED);
        assert!(list.is_flag(pkg, OrderFlags::CONFIGURED));
        assert!(!list.is_flag(pkg, OrderFlags::UNPACKED));

        list.set_state(pkg, OrderFlags::REMOVED);
        assert!(!list.is_flag(pkg, OrderFlags::CONFIGURED));
        assert!(list.is_now(pkg));
        assert!(list.is_flag(pkg, OrderFlags::LOOP | OrderFlags::IMMEDIATE | OrderFlags::IN_LIST));
    }

    #[test]
    fn test_unflag_leaves_other_bits() {
        let mut list = OrderList::new(1);
        let pkg = PackageId(0);
        list.flag(pkg, OrderFlags::LOOP | OrderFlags::MISSING);
        list.unflag(pkg, OrderFlags::LOOP);
        assert!(list.is_flag(pkg, OrderFlags::MISSING));
        assert!(!list.is_flag(pkg, OrderFlags::LOOP));
    }

    #[test]
    fn test_flags_debug_names() {
        let flags = OrderFlags::IN_LIST | OrderFlags::CONFIGURED;
        assert_eq!(format!("{:?}", flags), "OrderFlags(InList | Configured)");
    }
}
