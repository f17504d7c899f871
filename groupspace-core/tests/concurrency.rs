//! Stress tests with plain threads hammering one namespace

use groupspace_core::prelude::*;
use groupspace_core::DirtyFlag;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;
const ROUNDS: usize = 500;

fn path(p: &str) -> GroupPath {
    GroupPath::parse("C", p).unwrap()
}

#[test]
fn test_concurrent_activation_is_counted() {
    for _ in 0..20 {
        let ns = Namespace::new();
        let k1 = NodeId::new("K1");
        let handle = Arc::new(ns.join(&path("A/B"), &k1, &JoinOptions::new()).unwrap());
        let barrier = Arc::new(Barrier::new(2));

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let ns = ns.clone();
                let handle = handle.clone();
                let barrier = barrier.clone();
                let k1 = k1.clone();
                thread::spawn(move || {
                    barrier.wait();
                    ns.set_active(&handle, &k1);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(handle.node().activation(&k1), 2);
        let parent = ns.node(&path("A")).unwrap();
        assert_eq!(parent.active_descendants(&k1).len(), 1);

        ns.set_inactive_by(&handle, &k1, 2);
    }
}

#[test]
fn test_counter_conservation_under_interleaving() {
    let ns = Namespace::new();
    let k1 = NodeId::new("K1");
    let handles: Arc<Vec<NodeHandle>> = Arc::new(
        ["A", "A/B", "A/B/C", "D"]
            .iter()
            .map(|p| ns.join(&path(p), &k1, &JoinOptions::new()).unwrap())
            .collect(),
    );

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let ns = ns.clone();
            let handles = handles.clone();
            let k1 = k1.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let h = &handles[(t + round) % handles.len()];
                    ns.set_active(h, &k1);
                    if round % 3 != 0 {
                        ns.set_inactive(h, &k1);
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Each thread leaves one activation every third round
    let mut expected = vec![0usize; handles.len()];
    for t in 0..THREADS {
        for round in (0..ROUNDS).filter(|r| r % 3 == 0) {
            expected[(t + round) % handles.len()] += 1;
        }
    }
    for (h, want) in handles.iter().zip(&expected) {
        assert_eq!(h.node().activation(&k1), *want, "{}", h.path());
    }

    let subtree = GroupExpr::subtree(path("A"));
    assert_eq!(ns.evaluate(&subtree, &k1).len(), 3);

    for (h, count) in handles.iter().zip(expected) {
        ns.set_inactive_by(h, &k1, count);
    }
    assert!(ns.evaluate(&GroupExpr::Universe, &k1).is_empty());
}

#[test]
fn test_join_leave_churn_keeps_tree_consistent() {
    let ns = Namespace::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let ns = ns.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let k = NodeId::new(format!("K{}", t % 2));
                barrier.wait();
                for round in 0..ROUNDS {
                    let p = match round % 4 {
                        0 => "A",
                        1 => "A/B",
                        2 => "A/B/C",
                        _ => "E/F",
                    };
                    let mut member = ns
                        .membership(&path(p), &k, &JoinOptions::new())
                        .unwrap();
                    member.request_role();
                    if round % 2 == 0 {
                        member.request_role();
                    }
                    // dropped: roles left, reference released
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(ns.communities().is_empty(), "{}", ns.dump());
}

#[test]
fn test_evaluation_never_misses_completed_edge() {
    let ns = Namespace::new();
    let k1 = NodeId::new("K1");
    let expr = GroupExpr::subtree(path("A")).union(&GroupExpr::group(path("Z")));

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let ns = ns.clone();
            let expr = expr.clone();
            let k1 = k1.clone();
            thread::spawn(move || {
                let h = ns
                    .join(&path(&format!("A/N{}", t)), &k1, &JoinOptions::new())
                    .unwrap();
                for _ in 0..ROUNDS {
                    ns.set_active(&h, &k1);
                    let seen = ns.evaluate(&expr, &k1);
                    assert!(seen.iter().any(|n| n.ptr_eq(&h.node())));
                    ns.set_inactive(&h, &k1);
                    let seen = ns.evaluate(&expr, &k1);
                    assert!(!seen.iter().any(|n| n.ptr_eq(&h.node())));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(ns.evaluate(&expr, &k1).is_empty());
}

#[test]
fn test_observers_hear_every_batch() {
    let ns = Namespace::new();
    let k1 = NodeId::new("K1");
    let flag = Arc::new(DirtyFlag::new());
    ns.subscribe(flag.clone());

    let handles: Vec<NodeHandle> = (0..THREADS)
        .map(|t| ns.join(&path(&format!("N{}", t)), &k1, &JoinOptions::new()).unwrap())
        .collect();
    let handles = Arc::new(handles);

    let rounds_before = ns.notifier().rounds();
    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let ns = ns.clone();
            let handles = handles.clone();
            let k1 = k1.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    ns.set_active(&handles[t], &k1);
                    ns.set_inactive(&handles[t], &k1);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(flag.take());
    assert_eq!(ns.notifier().rounds() - rounds_before, (THREADS * 100) as u64);
}
