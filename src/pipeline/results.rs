//! The ordered result list.
//!
//! Holds every presented repository in arrival order, which is what
//! observers replay, plus a separate display order. Status transitions only
//! reorder the display order, keeping pending work above the trailing block
//! of updated entries. Only the orchestrator thread owns a `RepoList`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::presentation::Presentation;
use crate::repo::Repo;

/// Update status of a presented repository. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateState {
    Available,
    Updating,
    Updated,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateState::Available => "available",
            UpdateState::Updating => "updating",
            UpdateState::Updated => "updated",
        })
    }
}

/// A repository joined with its presentation and update status. This is the
/// unit delivered to observers.
#[derive(Debug, Clone)]
pub struct RepoPresentation {
    pub repo: Arc<Repo>,
    pub presentation: Arc<Presentation>,
    pub state: UpdateState,
}

impl RepoPresentation {
    pub fn new(repo: Repo, presentation: Presentation) -> Self {
        Self {
            repo: Arc::new(repo),
            presentation: Arc::new(presentation),
            state: UpdateState::Available,
        }
    }

    pub fn root(&self) -> &str {
        &self.repo.root
    }
}

/// Presented repositories, indexed by root.
///
/// `arrived` is append-only and is what observers replay, so a replay is
/// always a prefix of what earlier observers were sent. `display` holds
/// indices into `arrived` in display order: pending entries first, then the
/// trailing block of updated entries.
#[derive(Debug, Default)]
pub(crate) struct RepoList {
    arrived: Vec<RepoPresentation>,
    display: Vec<usize>,
    index: HashMap<String, usize>,
}

impl RepoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arrived.len()
    }

    /// Every entry in arrival order.
    pub fn arrivals(&self) -> &[RepoPresentation] {
        &self.arrived
    }

    /// Every entry in display order.
    pub fn ordered(&self) -> Vec<RepoPresentation> {
        self.display
            .iter()
            .map(|&i| self.arrived[i].clone())
            .collect()
    }

    pub fn get(&self, root: &str) -> Option<&RepoPresentation> {
        self.index.get(root).map(|&i| &self.arrived[i])
    }

    /// Adds a newly presented repository, displayed just above the updated
    /// entries.
    pub fn push(&mut self, rp: RepoPresentation) -> Result<()> {
        if self.index.contains_key(rp.root()) {
            return Err(Error::DuplicateRoot {
                root: rp.root().to_string(),
            });
        }
        let i = self.arrived.len();
        self.index.insert(rp.root().to_string(), i);
        self.arrived.push(rp);
        let target = self.updated_block_start();
        self.display.insert(target, i);
        self.check_consistency();
        Ok(())
    }

    /// Like `set_updating`, but only for entries that are still available.
    pub fn begin_update(&mut self, root: &str) -> Result<RepoPresentation> {
        let from = self.arrived[self.arrival(root)?].state;
        if from != UpdateState::Available {
            return Err(Error::InvalidTransition {
                root: root.to_string(),
                from,
                to: UpdateState::Updating,
            });
        }
        self.set_updating(root)
    }

    /// Marks `root` as updating and moves it just above the trailing block
    /// of updated entries. A no-op for entries that are already updated.
    pub fn set_updating(&mut self, root: &str) -> Result<RepoPresentation> {
        let i = self.arrival(root)?;
        match self.arrived[i].state {
            UpdateState::Updated => return Ok(self.arrived[i].clone()),
            UpdateState::Updating => {
                return Err(Error::InvalidTransition {
                    root: root.to_string(),
                    from: UpdateState::Updating,
                    to: UpdateState::Updating,
                })
            }
            UpdateState::Available => {}
        }

        let pos = self.display_position(i)?;
        self.display.remove(pos);
        self.arrived[i].state = UpdateState::Updating;
        let target = self.updated_block_start();
        self.display.insert(target, i);
        self.check_consistency();
        Ok(self.arrived[i].clone())
    }

    /// Marks `root` as updated and sinks it past the entries below it that
    /// are not yet updated.
    pub fn set_updated(&mut self, root: &str) -> Result<RepoPresentation> {
        let i = self.arrival(root)?;
        let from = self.arrived[i].state;
        if from == UpdateState::Updated {
            return Err(Error::InvalidTransition {
                root: root.to_string(),
                from,
                to: UpdateState::Updated,
            });
        }

        self.arrived[i].state = UpdateState::Updated;
        let mut pos = self.display_position(i)?;
        while pos + 1 < self.display.len()
            && self.arrived[self.display[pos + 1]].state != UpdateState::Updated
        {
            self.display.swap(pos, pos + 1);
            pos += 1;
        }
        self.check_consistency();
        Ok(self.arrived[i].clone())
    }

    fn arrival(&self, root: &str) -> Result<usize> {
        self.index
            .get(root)
            .copied()
            .ok_or_else(|| Error::UnknownRoot {
                root: root.to_string(),
            })
    }

    fn display_position(&self, i: usize) -> Result<usize> {
        self.display
            .iter()
            .position(|&d| d == i)
            .ok_or_else(|| Error::UnknownRoot {
                root: self.arrived[i].root().to_string(),
            })
    }

    fn updated_block_start(&self) -> usize {
        self.display
            .iter()
            .position(|&i| self.arrived[i].state == UpdateState::Updated)
            .unwrap_or(self.display.len())
    }

    fn check_consistency(&self) {
        debug_assert_eq!(self.arrived.len(), self.index.len());
        debug_assert_eq!(self.arrived.len(), self.display.len());
        debug_assert!(self
            .arrived
            .iter()
            .enumerate()
            .all(|(i, rp)| self.index.get(rp.root()) == Some(&i)));
        debug_assert!({
            let mut seen = self.display.clone();
            seen.sort_unstable();
            seen.into_iter().eq(0..self.arrived.len())
        });
        debug_assert!(self.display[self.updated_block_start()..]
            .iter()
            .all(|&i| self.arrived[i].state == UpdateState::Updated));
    }

    /// Roots in display order.
    #[cfg(test)]
    pub(crate) fn roots(&self) -> Vec<&str> {
        self.display.iter().map(|&i| self.arrived[i].root()).collect()
    }

    /// Roots in arrival order.
    #[cfg(test)]
    pub(crate) fn arrival_roots(&self) -> Vec<&str> {
        self.arrived.iter().map(|rp| rp.root()).collect()
    }
}
