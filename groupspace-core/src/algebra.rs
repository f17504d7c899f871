//! Set algebra over group expressions
//!
//! Operations build new expressions without evaluating anything. Results
//! are set-exact: evaluating `intersect(a, b)` yields the intersection of
//! the evaluations of `a` and `b`, for any activation state.

use crate::expr::{GroupExpr, MultiGroup};
use crate::group::Group;

/// Expression representing everything either operand represents
pub fn union(a: &GroupExpr, b: &GroupExpr) -> GroupExpr {
    let mut multi = MultiGroup::new();
    multi.add(a.clone());
    multi.add(b.clone());
    multi.into()
}

/// Expression representing what both operands represent
pub fn intersect(a: &GroupExpr, b: &GroupExpr) -> GroupExpr {
    match (a, b) {
        (GroupExpr::Universe, other) | (other, GroupExpr::Universe) => other.clone(),
        (GroupExpr::Group(x), GroupExpr::Group(y)) => match intersect_groups(x, y) {
            Some(group) => GroupExpr::Group(group),
            None => GroupExpr::empty(),
        },
        _ => {
            let (a_included, a_excluded) = split(a);
            let (b_included, b_excluded) = split(b);

            let mut multi = MultiGroup::new();
            for x in &a_included {
                for y in &b_included {
                    let both = intersect(x, y);
                    if !is_empty(&both) {
                        multi.add(both);
                    }
                }
            }
            for excluded in a_excluded.into_iter().chain(b_excluded) {
                multi.add_excluded(excluded);
            }
            multi.into()
        }
    }
}

/// Expression representing what `a` represents and `b` does not
pub fn minus(a: &GroupExpr, b: &GroupExpr) -> GroupExpr {
    let mut multi = match a {
        GroupExpr::Multi(m) => (**m).clone(),
        other => MultiGroup::of([other.clone()]),
    };
    multi.add_excluded(b.clone());
    multi.into()
}

/// Expression representing what exactly one operand represents
pub fn symmetric_difference(a: &GroupExpr, b: &GroupExpr) -> GroupExpr {
    minus(&union(a, b), &intersect(a, b))
}

/// Structural emptiness: true when `expr` represents nothing whatever the
/// activation state
///
/// Groups and the universe are never structurally empty.
pub fn is_empty(expr: &GroupExpr) -> bool {
    match expr {
        GroupExpr::Group(_) | GroupExpr::Universe => false,
        GroupExpr::Multi(m) => m.included().all(is_empty),
    }
}

/// Narrowest handle covering the nodes both handles can represent
fn intersect_groups(x: &Group, y: &Group) -> Option<Group> {
    if x.path() == y.path() {
        return Some(if x.includes_subgroups() { y.clone() } else { x.clone() });
    }
    if x.includes_subgroups() && x.path().is_ancestor_of(y.path()) {
        return Some(y.clone());
    }
    if y.includes_subgroups() && y.path().is_ancestor_of(x.path()) {
        return Some(x.clone());
    }
    None
}

fn split(expr: &GroupExpr) -> (Vec<GroupExpr>, Vec<GroupExpr>) {
    match expr {
        GroupExpr::Multi(m) => (m.included().cloned().collect(), m.excluded().cloned().collect()),
        other => (vec![other.clone()], Vec::new()),
    }
}

impl GroupExpr {
    pub fn union(&self, other: &GroupExpr) -> GroupExpr {
        union(self, other)
    }

    pub fn intersect(&self, other: &GroupExpr) -> GroupExpr {
        intersect(self, other)
    }

    pub fn minus(&self, other: &GroupExpr) -> GroupExpr {
        minus(self, other)
    }

    pub fn symmetric_difference(&self, other: &GroupExpr) -> GroupExpr {
        symmetric_difference(self, other)
    }

    /// See [`is_empty`]
    pub fn is_empty(&self) -> bool {
        is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(p: &str) -> GroupExpr {
        GroupExpr::Group(Group::parse("c", p).unwrap())
    }

    fn t(p: &str) -> GroupExpr {
        GroupExpr::Group(Group::parse("c", p).unwrap().with_subgroups())
    }

    #[test]
    fn test_intersect_groups() {
        assert_eq!(intersect(&g("a"), &g("a")), g("a"));
        assert_eq!(intersect(&t("a"), &g("a")), g("a"));
        assert_eq!(intersect(&t("a"), &t("a")), t("a"));
        assert_eq!(intersect(&t("a"), &g("a/b")), g("a/b"));
        assert_eq!(intersect(&t("a/b"), &t("a")), t("a/b"));
        assert!(is_empty(&intersect(&g("a"), &g("a/b"))));
        assert!(is_empty(&intersect(&t("a"), &g("b"))));
        assert!(is_empty(&intersect(
            &g("a"),
            &GroupExpr::Group(Group::parse("other", "a").unwrap())
        )));
    }

    #[test]
    fn test_intersect_universe_is_identity() {
        assert_eq!(intersect(&GroupExpr::Universe, &g("a")), g("a"));
        assert_eq!(intersect(&g("a"), &GroupExpr::Universe), g("a"));
        assert_eq!(
            intersect(&GroupExpr::Universe, &GroupExpr::Universe),
            GroupExpr::Universe
        );
    }

    #[test]
    fn test_intersect_composites() {
        let left = union(&g("a"), &g("b"));
        let right = union(&t("b"), &g("c"));

        let both = intersect(&left, &right);
        assert_eq!(both, GroupExpr::from(MultiGroup::of([g("b")])));
    }

    #[test]
    fn test_intersect_keeps_exclusions() {
        let left = minus(&t("a"), &g("a/b"));
        let both = intersect(&left, &t("a/b"));

        // (a* - a/b) ∩ a/b* = a/b* - a/b
        let mut expected = MultiGroup::of([t("a/b")]);
        expected.add_excluded(g("a/b"));
        assert_eq!(both, GroupExpr::from(expected));
    }

    #[test]
    fn test_union_with_universe() {
        assert_eq!(union(&g("a"), &GroupExpr::Universe), GroupExpr::Universe);
        assert_eq!(union(&g("a"), &g("a")), GroupExpr::from(MultiGroup::of([g("a")])));
    }

    #[test]
    fn test_minus() {
        assert!(is_empty(&minus(&g("a"), &g("a"))));
        assert!(is_empty(&minus(&t("a"), &GroupExpr::Universe)));

        let m = minus(&union(&g("a"), &g("b")), &g("b"));
        let multi = m.as_multi().unwrap();
        assert_eq!(multi.included().count(), 1);
        assert_eq!(multi.excluded().count(), 1);
    }

    #[test]
    fn test_minus_does_not_touch_operand() {
        let base = union(&g("a"), &g("b"));
        let _ = minus(&base, &g("a"));
        assert_eq!(base.as_multi().unwrap().excluded().count(), 0);
    }

    #[test]
    fn test_is_empty() {
        assert!(!is_empty(&g("a")));
        assert!(!is_empty(&GroupExpr::Universe));
        assert!(is_empty(&GroupExpr::empty()));
        assert!(is_empty(&GroupExpr::from(MultiGroup::of([GroupExpr::empty()]))));

        let mut only_excluded = MultiGroup::new();
        only_excluded.add_excluded(g("a"));
        assert!(is_empty(&GroupExpr::from(only_excluded)));
    }

    #[test]
    fn test_symmetric_difference_of_equal_is_empty() {
        let x = symmetric_difference(&t("a"), &t("a"));
        assert!(is_empty(&x));
    }
}
