//! Spork list and range resolution.
//!
//! A query range is mapped onto the access nodes of the sporks it touches.
//! Spork *i* owns heights `[root_height_i, root_height_{i+1})`; the last spork
//! is unbounded above.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;
use crate::types::Spork;
use crate::Result;

/// A maximal sub-range of a query lying entirely within one spork, bound to
/// that spork's access node. Produced transiently by [`SporkList::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccessNode {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    pub access_node: String,
}

/// An immutable snapshot of the spork directory, ordered by feed identifier
/// (root heights are monotone in identifier order). Replaced wholesale on
/// refresh, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SporkList(Vec<Spork>);

impl SporkList {
    /// Wraps an already-sorted spork list.
    pub fn new(sporks: Vec<Spork>) -> Self {
        Self(sporks)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sporks(&self) -> &[Spork] {
        &self.0
    }

    /// The most recent spork; its access node serves the chain head.
    pub fn latest(&self) -> Result<&Spork> {
        self.0.last().ok_or(Error::EmptyDirectory)
    }

    /// Binary search for the spork whose interval contains `height`.
    pub fn locate(&self, height: u64) -> Result<usize> {
        if self.0.is_empty() {
            return Err(Error::EmptyDirectory);
        }
        let idx = self.0.partition_point(|s| s.root_height <= height);
        if idx == 0 {
            return Err(Error::HeightBeforeEarliestSpork(height));
        }
        Ok(idx - 1)
    }

    /// Partitions `[start, end]` into per-spork segments, each bound to its
    /// spork's access node.
    ///
    /// When the range spans two sporks the split point is the end spork's root
    /// height (inclusive boundaries, no gap, no overlap). Ranges spanning
    /// three or more sporks are still resolved to only the first and last
    /// spork, so interior sporks' heights end up queried against the start
    /// spork's node. That case is reported with a warning; with realistic
    /// spork durations, `max_query_blocks` makes such ranges unreachable.
    pub fn resolve(
        &self,
        start: u64,
        end: u64,
        max_query_blocks: u64,
    ) -> Result<Vec<ResolvedAccessNode>> {
        if end < start {
            return Err(Error::InvalidRange { start, end });
        }
        if end - start > max_query_blocks {
            return Err(Error::RangeTooLarge {
                start,
                end,
                max: max_query_blocks,
            });
        }

        let start_idx = self.locate(start)?;
        let end_idx = self.locate(end)?;

        if start_idx == end_idx {
            return Ok(vec![ResolvedAccessNode {
                index: start_idx,
                start,
                end,
                access_node: self.0[start_idx].access_node.clone(),
            }]);
        }

        if end_idx - start_idx > 1 {
            warn!(
                start,
                end,
                start_spork = %self.0[start_idx].name,
                end_spork = %self.0[end_idx].name,
                skipped = end_idx - start_idx - 1,
                "range spans more than two sporks; interior sporks resolve to the start node"
            );
        }

        let boundary = self.0[end_idx].root_height;
        Ok(vec![
            ResolvedAccessNode {
                index: start_idx,
                start,
                end: boundary - 1,
                access_node: self.0[start_idx].access_node.clone(),
            },
            ResolvedAccessNode {
                index: end_idx,
                start: boundary,
                end,
                access_node: self.0[end_idx].access_node.clone(),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spork(id: f64, name: &str, root_height: u64, access_node: &str) -> Spork {
        Spork {
            id,
            name: name.into(),
            root_height,
            access_node: access_node.into(),
        }
    }

    fn two_sporks() -> SporkList {
        SporkList::new(vec![
            spork(1.0, "spork-1", 0, "node-a:9000"),
            spork(2.0, "spork-2", 1000, "node-b:9000"),
        ])
    }

    #[test]
    fn test_locate_picks_owning_spork() {
        let sporks = two_sporks();
        assert_eq!(sporks.locate(0).unwrap(), 0);
        assert_eq!(sporks.locate(999).unwrap(), 0);
        assert_eq!(sporks.locate(1000).unwrap(), 1);
        assert_eq!(sporks.locate(u64::MAX).unwrap(), 1);
    }

    #[test]
    fn test_locate_single_spork() {
        let sporks = SporkList::new(vec![spork(1.0, "only", 500, "node:9000")]);
        assert_eq!(sporks.locate(500).unwrap(), 0);
        assert_eq!(sporks.locate(9999).unwrap(), 0);
        assert!(matches!(
            sporks.locate(499),
            Err(Error::HeightBeforeEarliestSpork(499))
        ));
    }

    #[test]
    fn test_locate_empty_directory() {
        let sporks = SporkList::default();
        assert!(matches!(sporks.locate(0), Err(Error::EmptyDirectory)));
        assert!(matches!(sporks.latest(), Err(Error::EmptyDirectory)));
    }

    #[test]
    fn test_locate_before_earliest() {
        let sporks = SporkList::new(vec![
            spork(1.0, "spork-1", 100, "node-a:9000"),
            spork(2.0, "spork-2", 1000, "node-b:9000"),
        ]);
        assert!(matches!(
            sporks.locate(99),
            Err(Error::HeightBeforeEarliestSpork(99))
        ));
    }

    #[test]
    fn test_resolve_within_one_spork() {
        let sporks = two_sporks();
        let resolved = sporks.resolve(10, 200, 2000).unwrap();
        assert_eq!(
            resolved,
            vec![ResolvedAccessNode {
                index: 0,
                start: 10,
                end: 200,
                access_node: "node-a:9000".into(),
            }]
        );
    }

    #[test]
    fn test_resolve_across_spork_boundary() {
        let sporks = two_sporks();
        let resolved = sporks.resolve(990, 1010, 1000).unwrap();
        assert_eq!(
            resolved,
            vec![
                ResolvedAccessNode {
                    index: 0,
                    start: 990,
                    end: 999,
                    access_node: "node-a:9000".into(),
                },
                ResolvedAccessNode {
                    index: 1,
                    start: 1000,
                    end: 1010,
                    access_node: "node-b:9000".into(),
                },
            ]
        );
    }

    #[test]
    fn test_resolve_range_too_large() {
        let sporks = two_sporks();
        assert!(matches!(
            sporks.resolve(0, 2001, 2000),
            Err(Error::RangeTooLarge {
                start: 0,
                end: 2001,
                max: 2000
            })
        ));
        // The cap is inclusive: a range of exactly max_query_blocks passes.
        assert!(sporks.resolve(0, 2000, 2000).is_ok());
    }

    #[test]
    fn test_resolve_inverted_range() {
        let sporks = two_sporks();
        assert!(matches!(
            sporks.resolve(100, 10, 2000),
            Err(Error::InvalidRange { start: 100, end: 10 })
        ));
    }

    // Documents the two-segment limitation: a range spanning three sporks
    // resolves to only the first and last, and the middle spork's heights are
    // queried against the start node.
    #[test]
    fn test_resolve_three_sporks_keeps_first_and_last() {
        let sporks = SporkList::new(vec![
            spork(1.0, "spork-1", 0, "node-a:9000"),
            spork(2.0, "spork-2", 100, "node-b:9000"),
            spork(3.0, "spork-3", 200, "node-c:9000"),
        ]);
        let resolved = sporks.resolve(50, 250, 1000).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].access_node, "node-a:9000");
        assert_eq!((resolved[0].start, resolved[0].end), (50, 199));
        assert_eq!(resolved[1].access_node, "node-c:9000");
        assert_eq!((resolved[1].start, resolved[1].end), (200, 250));
    }
}
