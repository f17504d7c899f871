//! Group expressions
//!
//! An expression is a single [`Group`] handle, the universe of every group,
//! or a [`MultiGroup`]: an ordered list of included and excluded operands.
//! Composites own a memo table of their last evaluation per remote node.

use crate::group::Group;
use crate::memo::MemoTable;
use groupspace_types::GroupPath;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Anything that can be evaluated to a set of group nodes
#[derive(Debug, Clone)]
pub enum GroupExpr {
    Group(Group),
    Multi(Arc<MultiGroup>),
    /// Every active group of every community
    Universe,
}

impl GroupExpr {
    /// A composite with no operands, which represents nothing
    pub fn empty() -> Self {
        GroupExpr::Multi(Arc::new(MultiGroup::new()))
    }

    pub fn group(path: GroupPath) -> Self {
        GroupExpr::Group(Group::new(path))
    }

    pub fn subtree(path: GroupPath) -> Self {
        GroupExpr::Group(Group::with_subgroups_of(path))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            GroupExpr::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&MultiGroup> {
        match self {
            GroupExpr::Multi(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_universe(&self) -> bool {
        matches!(self, GroupExpr::Universe)
    }
}

impl From<Group> for GroupExpr {
    fn from(group: Group) -> Self {
        GroupExpr::Group(group)
    }
}

impl From<MultiGroup> for GroupExpr {
    fn from(multi: MultiGroup) -> Self {
        GroupExpr::Multi(Arc::new(multi))
    }
}

impl From<Arc<MultiGroup>> for GroupExpr {
    fn from(multi: Arc<MultiGroup>) -> Self {
        GroupExpr::Multi(multi)
    }
}

/// Structural equality, insensitive to operand order
///
/// A composite equals the universe when it includes the universe and every
/// exclusion is empty.
impl PartialEq for GroupExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GroupExpr::Group(a), GroupExpr::Group(b)) => a == b,
            (GroupExpr::Universe, GroupExpr::Universe) => true,
            (GroupExpr::Multi(m), GroupExpr::Universe)
            | (GroupExpr::Universe, GroupExpr::Multi(m)) => m.equals_universe(),
            (GroupExpr::Multi(a), GroupExpr::Multi(b)) => Arc::ptr_eq(a, b) || **a == **b,
            _ => false,
        }
    }
}

impl fmt::Display for GroupExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupExpr::Group(g) => fmt::Display::fmt(g, f),
            GroupExpr::Multi(m) => fmt::Display::fmt(m, f),
            GroupExpr::Universe => f.write_str("UniverseOfGroups"),
        }
    }
}

/// One entry of a composite
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub expr: GroupExpr,
    pub excluded: bool,
}

static MULTI_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A composite expression: the union of its included operands minus the
/// union of its excluded ones
///
/// Cloning produces an independent composite with a fresh identity and an
/// empty memo.
pub struct MultiGroup {
    id: u64,
    operands: Vec<Operand>,
    pub(crate) memo: MemoTable,
}

impl MultiGroup {
    pub fn new() -> Self {
        Self {
            id: MULTI_COUNTER.fetch_add(1, Ordering::Relaxed),
            operands: Vec::new(),
            memo: MemoTable::new(),
        }
    }

    /// Composite including each of `exprs`
    pub fn of<I, E>(exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<GroupExpr>,
    {
        let mut multi = Self::new();
        for expr in exprs {
            multi.add(expr);
        }
        multi
    }

    /// Identity of this composite; clones get a new one
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn included(&self) -> impl Iterator<Item = &GroupExpr> {
        self.operands.iter().filter(|op| !op.excluded).map(|op| &op.expr)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &GroupExpr> {
        self.operands.iter().filter(|op| op.excluded).map(|op| &op.expr)
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    /// True when there are no operands at all
    pub fn has_no_operands(&self) -> bool {
        self.operands.is_empty()
    }

    /// Include `expr`
    ///
    /// Including the universe drops every other included operand. Returns
    /// false when `expr` is already an operand, included or excluded.
    pub fn add(&mut self, expr: impl Into<GroupExpr>) -> bool {
        let expr = expr.into();
        if expr.is_universe() {
            if self.includes_universe() {
                return false;
            }
            self.operands.retain(|op| op.excluded);
            self.push(expr, false);
            return true;
        }
        if self.operands.iter().any(|op| op.expr == expr) {
            return false;
        }
        self.push(expr, false);
        true
    }

    /// Exclude `expr`
    ///
    /// An included operand equal to `expr` is removed first. Excluding the
    /// universe empties the composite. Returns false when `expr` was already
    /// excluded.
    pub fn add_excluded(&mut self, expr: impl Into<GroupExpr>) -> bool {
        let expr = expr.into();
        if expr.is_universe() {
            if self
                .operands
                .iter()
                .any(|op| op.excluded && op.expr.is_universe())
            {
                return false;
            }
            self.operands.clear();
            self.push(expr, true);
            return true;
        }
        if let Some(pos) = self
            .operands
            .iter()
            .position(|op| !op.excluded && op.expr == expr)
        {
            self.operands.remove(pos);
        }
        if self.operands.iter().any(|op| op.excluded && op.expr == expr) {
            self.memo.clear();
            return false;
        }
        self.push(expr, true);
        true
    }

    /// Remove the first operand equal to `expr`, included or excluded
    pub fn remove(&mut self, expr: &GroupExpr) -> bool {
        match self.operands.iter().position(|op| &op.expr == expr) {
            Some(pos) => {
                self.operands.remove(pos);
                self.memo.clear();
                true
            }
            None => false,
        }
    }

    fn push(&mut self, expr: GroupExpr, excluded: bool) {
        self.operands.push(Operand { expr, excluded });
        self.memo.clear();
    }

    fn includes_universe(&self) -> bool {
        self.included().any(GroupExpr::is_universe)
    }

    pub(crate) fn equals_universe(&self) -> bool {
        self.includes_universe() && self.excluded().all(crate::algebra::is_empty)
    }

    /// Drop every cached evaluation
    pub fn clear_memo(&self) {
        self.memo.clear();
    }
}

impl Default for MultiGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MultiGroup {
    fn clone(&self) -> Self {
        Self {
            id: MULTI_COUNTER.fetch_add(1, Ordering::Relaxed),
            operands: self.operands.clone(),
            memo: MemoTable::new(),
        }
    }
}

impl PartialEq for MultiGroup {
    fn eq(&self, other: &Self) -> bool {
        self.operands.len() == other.operands.len()
            && self.operands.iter().all(|op| other.operands.contains(op))
            && other.operands.iter().all(|op| self.operands.contains(op))
    }
}

impl fmt::Debug for MultiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiGroup")
            .field("id", &self.id)
            .field("operands", &self.operands)
            .field("memo", &self.memo)
            .finish()
    }
}

impl fmt::Display for MultiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MultiGroup[")?;
        for (i, op) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if op.excluded {
                f.write_str("Forbidden ")?;
            }
            write!(f, "{}", op.expr)?;
        }
        f.write_str("]")
    }
}
