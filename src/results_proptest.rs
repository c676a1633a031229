//! Property-based tests for the ordered result list and the presentation
//! policy.
//!
//! These tests use proptest to generate random transition sequences and
//! repository states and verify that invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    use proptest::prelude::*;

    use crate::cancel::Cancellation;
    use crate::error::{Error, Result};
    use crate::pipeline::results::tests::presented;
    use crate::pipeline::results::RepoList;
    use crate::pipeline::UpdateState;
    use crate::policy::should_present_update;
    use crate::repo::Repo;
    use crate::vcs::{RemoteHead, RemoteVcs};

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Push,
        Updating(usize),
        Updated(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Push),
            (0usize..8).prop_map(Op::Updating),
            (0usize..8).prop_map(Op::Updated),
        ]
    }

    /// Applies `op` to `list`, pushing roots `r0`, `r1`, ... in turn.
    fn apply(list: &mut RepoList, pushed: &mut Vec<String>, op: Op) {
        let pick = |i: usize, pushed: &[String]| pushed[i % pushed.len()].clone();
        let _ = match op {
            Op::Push => {
                let root = format!("r{}", pushed.len());
                list.push(presented(&root)).unwrap();
                pushed.push(root);
                return;
            }
            _ if pushed.is_empty() => return,
            Op::Updating(i) => list.set_updating(&pick(i, pushed)),
            Op::Updated(i) => list.set_updated(&pick(i, pushed)),
        };
    }

    struct NoRemote;

    impl RemoteVcs for NoRemote {
        fn remote_branch_and_revision(&self, _: &str, _: &Cancellation) -> Result<RemoteHead> {
            Err(Error::Cancelled)
        }
    }

    proptest! {
        /// Property: arrivals and transitions in any interleaving never drop
        /// or duplicate entries, arrival order is append-only, and updated
        /// entries always form the trailing block of the display order
        #[test]
        fn transitions_preserve_membership_and_order_blocks(
            ops in prop::collection::vec(op(), 0..48),
        ) {
            let mut list = RepoList::new();
            let mut pushed: Vec<String> = Vec::new();

            for op in ops {
                apply(&mut list, &mut pushed, op);

                prop_assert_eq!(list.arrival_roots(), pushed.iter().map(String::as_str).collect::<Vec<_>>());
                let shown: HashSet<&str> = list.roots().into_iter().collect();
                prop_assert_eq!(shown.len(), pushed.len());
                for root in &pushed {
                    prop_assert!(shown.contains(root.as_str()));
                    prop_assert_eq!(list.get(root).map(|rp| rp.root()), Some(root.as_str()));
                }

                let states: Vec<UpdateState> = list.ordered().iter().map(|rp| rp.state).collect();
                let first_updated = states
                    .iter()
                    .position(|s| *s == UpdateState::Updated)
                    .unwrap_or(states.len());
                prop_assert!(
                    states[first_updated..].iter().all(|s| *s == UpdateState::Updated),
                    "updated entries must trail: {:?}",
                    states
                );
            }
        }

        /// Property: the status of every root only ever moves forward
        #[test]
        fn status_is_monotonic(
            ops in prop::collection::vec(op(), 0..48),
        ) {
            let mut list = RepoList::new();
            let mut pushed: Vec<String> = Vec::new();
            let mut last: HashMap<String, UpdateState> = HashMap::new();

            for op in ops {
                apply(&mut list, &mut pushed, op);
                for rp in list.arrivals() {
                    let previous = last.get(rp.root()).copied().unwrap_or(UpdateState::Available);
                    prop_assert!(rp.state >= previous, "{} went from {} to {}", rp.root(), previous, rp.state);
                    last.insert(rp.root().to_string(), rp.state);
                }
            }
        }

        /// Property: the policy verdict depends only on the record's fields
        #[test]
        fn policy_is_pure(
            local_revision in "[a-f0-9]{0,6}",
            remote_revision in "[a-f0-9]{0,6}",
            repo_url in prop_oneof![Just(String::new()), Just("https://example.com/foo".to_string())],
            local_url in prop_oneof![
                Just(String::new()),
                Just("https://example.com/foo.git".to_string()),
                Just("https://example.com/bar".to_string()),
            ],
        ) {
            let mut repo = Repo::remote("example.com/foo", "https://example.com/foo", Arc::new(NoRemote));
            repo.local.revision = local_revision;
            repo.local.remote_url = local_url;
            repo.remote.revision = remote_revision;
            repo.remote.repo_url = repo_url;
            repo.remote.branch = "main".to_string();

            let first = should_present_update(&repo);
            let second = should_present_update(&repo.clone());
            prop_assert_eq!(first, second);
        }
    }
}
