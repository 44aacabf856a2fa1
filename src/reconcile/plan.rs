//! # Diff and apply.
//!
//! [`compute_plan`] diffs desired roots against the actual roots by name;
//! [`apply_plan`] writes the diff into a [`RootStore`] as one transaction.
//!
//! ```text
//! desired {A: d1, B: d2}        actual {B: d2, C: d3}
//!           │                              │
//!           └────────── compute_plan ──────┘
//!                          │
//!   added [A]  removed [C]  data_changed []  attributes_changed []
//!                          │
//!   transaction: remove C → create A → push data → replace attributes
//! ```
//!
//! ## Rules
//! - `added` and the two `*_changed` lists follow desired order; `removed` follows actual order.
//! - Consistency conflicts on a data push are suppressed: the store's local state wins.
//! - Any other write error aborts the whole transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ReconcileError, RootError};
use crate::events::PlanCounts;
use crate::reconcile::{RootDescriptor, RootStore, RootWriter};

/// Names touched by one reconciliation pass, per class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Desired roots missing from the store.
    pub added: Vec<String>,
    /// Store roots no longer desired.
    pub removed: Vec<String>,
    /// Roots present on both sides whose data differs.
    pub data_changed: Vec<String>,
    /// Roots present on both sides whose attributes differ.
    pub attributes_changed: Vec<String>,
}

impl ReconciliationPlan {
    /// Returns true if the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.data_changed.is_empty()
            && self.attributes_changed.is_empty()
    }

    /// Per-class counts, as published in events.
    pub fn counts(&self) -> PlanCounts {
        let count = |names: &[String]| u32::try_from(names.len()).unwrap_or(u32::MAX);
        PlanCounts {
            added: count(&self.added),
            removed: count(&self.removed),
            data_changed: count(&self.data_changed),
            attributes_changed: count(&self.attributes_changed),
        }
    }
}

/// Outcome of [`apply_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Counts of the applied plan.
    pub counts: PlanCounts,
    /// Roots whose data push was refused as a consistency conflict and skipped.
    pub conflicts: Vec<String>,
}

/// Diffs `desired` against `actual`.
///
/// Fails with [`ReconcileError::DuplicateRoot`] if two desired roots share a name.
pub fn compute_plan<D, A>(
    desired: &[RootDescriptor<D, A>],
    actual: &[RootDescriptor<D, A>],
) -> Result<ReconciliationPlan, ReconcileError>
where
    D: PartialEq,
    A: PartialEq,
{
    let mut seen = HashSet::with_capacity(desired.len());
    for root in desired {
        if !seen.insert(root.name.as_str()) {
            return Err(ReconcileError::DuplicateRoot {
                name: root.name.clone(),
            });
        }
    }

    let current: HashMap<&str, &RootDescriptor<D, A>> =
        actual.iter().map(|r| (r.name.as_str(), r)).collect();
    let mut plan = ReconciliationPlan::default();

    for root in desired {
        match current.get(root.name.as_str()) {
            None => plan.added.push(root.name.clone()),
            Some(existing) => {
                if existing.data != root.data {
                    plan.data_changed.push(root.name.clone());
                }
                if existing.attributes != root.attributes {
                    plan.attributes_changed.push(root.name.clone());
                }
            }
        }
    }
    plan.removed = actual
        .iter()
        .filter(|r| !seen.contains(r.name.as_str()))
        .map(|r| r.name.clone())
        .collect();

    Ok(plan)
}

/// Applies `plan` to `store` in one transaction.
///
/// `desired` must be the root list the plan was computed from. An empty plan
/// does not open a transaction.
pub fn apply_plan<S>(
    plan: &ReconciliationPlan,
    desired: &[RootDescriptor<S::Data, S::Attr>],
    store: &S,
) -> Result<ApplyOutcome, ReconcileError>
where
    S: RootStore + ?Sized,
{
    let mut outcome = ApplyOutcome {
        counts: plan.counts(),
        conflicts: Vec::new(),
    };
    if plan.is_empty() {
        return Ok(outcome);
    }

    let by_name: HashMap<&str, &RootDescriptor<S::Data, S::Attr>> =
        desired.iter().map(|r| (r.name.as_str(), r)).collect();
    let lookup = |name: &str| {
        by_name.get(name).copied().ok_or_else(|| RootError::Rejected {
            root: name.to_string(),
            reason: "not in the desired set".into(),
        })
    };

    let mut conflicts = Vec::new();
    let mut body = |writer: &mut dyn RootWriter<S::Data, S::Attr>| -> Result<(), RootError> {
        conflicts.clear();

        for name in &plan.removed {
            writer.remove_root(name)?;
        }
        for name in &plan.added {
            let root = lookup(name.as_str())?;
            writer.create_root(name, root.data.clone(), root.attributes.clone())?;
        }
        for name in &plan.data_changed {
            let root = lookup(name.as_str())?;
            match writer.set_root_data(name, root.data.clone()) {
                Ok(()) => {}
                Err(err) if err.is_conflict() => {
                    tracing::debug!(
                        root = %name,
                        error = %err,
                        "data push refused; keeping local state"
                    );
                    conflicts.push(name.clone());
                }
                Err(err) => return Err(err),
            }
        }
        for name in &plan.attributes_changed {
            let root = lookup(name.as_str())?;
            // Registration is idempotent; known keys are registered again.
            for key in root.attributes.keys() {
                writer.register_attribute(key)?;
            }
            writer.clear_root_attributes(name)?;
            let attributes: BTreeMap<String, S::Attr> = root.attributes.clone();
            writer.set_root_attributes(name, attributes)?;
        }
        Ok(())
    };
    store.transaction(&mut body)?;

    outcome.conflicts = conflicts;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MemoryRoots;

    type Root = RootDescriptor<&'static str, u32>;

    fn names(roots: &[Root]) -> Vec<&str> {
        roots.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn diff_of_overlapping_sets() {
        let desired = vec![Root::new("A", "data1"), Root::new("B", "data2")];
        let actual = vec![Root::new("B", "data2"), Root::new("C", "data3")];

        let plan = compute_plan(&desired, &actual).expect("plan");
        assert_eq!(plan.added, vec!["A"]);
        assert_eq!(plan.removed, vec!["C"]);
        assert!(plan.data_changed.is_empty());
        assert!(plan.attributes_changed.is_empty());

        let store = MemoryRoots::from_roots(actual);
        apply_plan(&plan, &desired, &store).expect("apply");
        assert_eq!(store.root_names(), vec!["B", "A"]);
    }

    #[test]
    fn data_and_attribute_changes_are_tracked_separately() {
        let desired = vec![
            Root::new("A", "new").with_attribute("width", 2),
            Root::new("B", "same").with_attribute("width", 3),
        ];
        let actual = vec![
            Root::new("A", "old").with_attribute("width", 2),
            Root::new("B", "same").with_attribute("height", 3),
        ];

        let plan = compute_plan(&desired, &actual).expect("plan");
        assert_eq!(plan.data_changed, vec!["A"]);
        assert_eq!(plan.attributes_changed, vec!["B"]);
        assert_eq!(plan.counts().to_string(), "+0 -0 ~data=1 ~attrs=1");

        let store = MemoryRoots::from_roots(actual);
        apply_plan(&plan, &desired, &store).expect("apply");
        assert_eq!(store.snapshot().expect("snapshot"), desired);
        assert!(store.attribute_keys().contains("width"));
    }

    /// Store whose attribute reads fail; writes go through to the inner store.
    struct WriteOnlyAttributes(MemoryRoots<&'static str, u32>);

    impl RootStore for WriteOnlyAttributes {
        type Data = &'static str;
        type Attr = u32;

        fn root_names(&self) -> Vec<String> {
            self.0.root_names()
        }

        fn root_data(&self, name: &str) -> Result<&'static str, RootError> {
            self.0.root_data(name)
        }

        fn root_attributes(&self, name: &str) -> Result<BTreeMap<String, u32>, RootError> {
            Err(RootError::Rejected {
                root: name.to_string(),
                reason: "attribute reads unavailable".into(),
            })
        }

        fn transaction(
            &self,
            body: crate::reconcile::TransactionBody<'_, &'static str, u32>,
        ) -> Result<(), RootError> {
            self.0.transaction(body)
        }
    }

    #[test]
    fn attribute_changes_register_keys_inside_the_transaction() {
        let actual = vec![Root::new("B", "b").with_attribute("height", 3)];
        let desired = vec![
            Root::new("B", "b")
                .with_attribute("height", 4)
                .with_attribute("depth", 1),
        ];
        let plan = compute_plan(&desired, &actual).expect("plan");
        assert_eq!(plan.attributes_changed, vec!["B"]);

        let store = WriteOnlyAttributes(MemoryRoots::from_roots(actual));
        apply_plan(&plan, &desired, &store).expect("apply without reading attributes");

        assert_eq!(store.0.snapshot().expect("snapshot"), desired);
        assert!(store.0.attribute_keys().contains("depth"));
        assert!(store.0.attribute_keys().contains("height"));
        assert_eq!(store.0.transactions(), 1);
    }

    #[test]
    fn applying_then_recomputing_yields_an_empty_plan() {
        let desired = vec![
            Root::new("A", "a").with_attribute("k", 1),
            Root::new("B", "b2"),
            Root::new("D", "d"),
        ];
        let store = MemoryRoots::from_roots(vec![
            Root::new("B", "b1"),
            Root::new("C", "c").with_attribute("k", 9),
        ]);

        let plan = compute_plan(&desired, &store.snapshot().expect("snapshot")).expect("plan");
        apply_plan(&plan, &desired, &store).expect("apply");
        let again = compute_plan(&desired, &store.snapshot().expect("snapshot")).expect("plan");
        assert!(again.is_empty(), "{again:?}");
    }

    #[test]
    fn disjoint_sets_replace_everything() {
        let desired = vec![Root::new("X", "x"), Root::new("Y", "y")];
        let actual = vec![Root::new("A", "a"), Root::new("B", "b")];
        let store = MemoryRoots::from_roots(actual.clone());

        let plan = compute_plan(&desired, &actual).expect("plan");
        assert_eq!(plan.removed, vec!["A", "B"]);
        assert_eq!(plan.added, vec!["X", "Y"]);
        apply_plan(&plan, &desired, &store).expect("apply");

        let mut after = store.root_names();
        after.sort();
        assert_eq!(after, names(&desired));
    }

    #[test]
    fn name_sets_match_after_apply_for_many_shapes() {
        let pool = ["A", "B", "C", "D", "E"];
        for mask_d in 0u8..32 {
            for mask_a in [0u8, 0b00111, 0b11000, 0b10101, 0b11111] {
                let pick = |mask: u8, data: &'static str| -> Vec<Root> {
                    pool.iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, n)| Root::new(*n, data))
                        .collect()
                };
                let desired = pick(mask_d, "desired");
                let store = MemoryRoots::from_roots(pick(mask_a, "actual"));

                let actual = store.snapshot().expect("snapshot");
                let plan = compute_plan(&desired, &actual).expect("plan");
                apply_plan(&plan, &desired, &store).expect("apply");

                let mut got = store.root_names();
                got.sort();
                assert_eq!(got, names(&desired), "desired={mask_d:05b} actual={mask_a:05b}");
            }
        }
    }

    #[test]
    fn conflicts_are_suppressed_and_local_state_wins() {
        let desired = vec![Root::new("A", "mine"), Root::new("B", "mine")];
        let store =
            MemoryRoots::from_roots(vec![Root::new("A", "theirs"), Root::new("B", "theirs")]);
        store.refuse_data_for("A");

        let plan = compute_plan(&desired, &store.snapshot().expect("snapshot")).expect("plan");
        let outcome = apply_plan(&plan, &desired, &store).expect("apply");

        assert_eq!(outcome.conflicts, vec!["A"]);
        assert_eq!(store.root_data("A").expect("A"), "theirs");
        assert_eq!(store.root_data("B").expect("B"), "mine");
    }

    #[test]
    fn other_errors_roll_back_the_whole_transaction() {
        let desired = vec![Root::new("A", "a").with_attribute("k", 1)];
        let store = MemoryRoots::from_roots(vec![Root::new("Z", "z")]);
        store.reject_root("A");

        let plan = compute_plan(&desired, &store.snapshot().expect("snapshot")).expect("plan");
        let err = apply_plan(&plan, &desired, &store).expect_err("rejected");
        assert_eq!(err.as_label(), "reconcile_store_aborted");
        assert_eq!(store.root_names(), vec!["Z"]);
    }

    #[test]
    fn duplicate_desired_names_are_refused() {
        let desired = vec![Root::new("A", "1"), Root::new("A", "2")];
        let err = compute_plan(&desired, &[]).expect_err("duplicate");
        assert_eq!(err, ReconcileError::DuplicateRoot { name: "A".into() });
    }

    #[test]
    fn empty_plan_opens_no_transaction() {
        let roots = vec![Root::new("A", "a")];
        let store = MemoryRoots::from_roots(roots.clone());
        let plan = compute_plan(&roots, &roots).expect("plan");
        apply_plan(&plan, &roots, &store).expect("apply");
        assert_eq!(store.transactions(), 0);
    }
}
