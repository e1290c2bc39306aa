// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::feed::Episode;

/// Rule deciding which feed episodes are processed, and in which order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Only the first episode in feed order
    Latest,
    /// Oldest-first, after dropping the `n` oldest episodes
    SkipFromOldest(usize),
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::SkipFromOldest(0)
    }
}

/// Select the episodes to publish, in publication order
pub fn select(episodes: Vec<Episode>, policy: SelectionPolicy) -> Vec<Episode> {
    match policy {
        SelectionPolicy::Latest => episodes.into_iter().take(1).collect(),
        SelectionPolicy::SkipFromOldest(skip) => episodes.into_iter().rev().skip(skip).collect(),
    }
}
