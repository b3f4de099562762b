//! 森林不变量检查.

use super::LineageStore;
use crate::SpotIndex;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// 违反森林不变量的情况. 正常使用 `LineageStore` 的 API 不会产生它们;
/// 它们只可能来自被手工修改或损坏的记录文件.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum InvariantViolation {
    /// 多个未删除的 spot 共享同一索引.
    #[error("{count} live spots share index {index}")]
    DuplicateIndex {
        /// 重复的索引.
        index: SpotIndex,
        /// 共享该索引的 spot 个数.
        count: usize,
    },

    /// 父节点索引不对应任何 spot.
    #[error("spot {spot} refers to missing parent {parent}")]
    DanglingParent {
        /// 子节点.
        spot: SpotIndex,
        /// 不存在的父节点索引.
        parent: SpotIndex,
    },

    /// spot 位于父节点链构成的环上.
    #[error("spot {0} lies on a lineage cycle")]
    Cycle(SpotIndex),

    /// 已有索引达到 `SpotIndex::MAX`, 无法再分配新索引.
    #[error("spot index {0} exhausts the index space")]
    IndexExhausted(SpotIndex),
}

impl LineageStore {
    /// 检查森林不变量, 返回全部违规情况. 结果为空表示森林是良构的.
    pub fn audit(&self) -> Vec<InvariantViolation> {
        let mut ans = Vec::new();

        let mut counts: HashMap<SpotIndex, usize> = HashMap::new();
        for s in self.live() {
            *counts.entry(s.index).or_default() += 1;
        }
        let mut dups: Vec<_> = counts.iter().filter(|&(_, &c)| c > 1).collect();
        dups.sort();
        ans.extend(
            dups.into_iter()
                .map(|(&index, &count)| InvariantViolation::DuplicateIndex { index, count }),
        );

        let known: HashSet<SpotIndex> = self.spots.iter().map(|s| s.index).collect();
        for s in self.live() {
            if let Some(parent) = s.parent.filter(|p| !known.contains(p)) {
                ans.push(InvariantViolation::DanglingParent {
                    spot: s.index,
                    parent,
                });
            }
        }

        // 第一个未删除的同索引 spot 的父节点.
        let mut parent_of: HashMap<SpotIndex, Option<SpotIndex>> = HashMap::new();
        for s in self.live() {
            parent_of.entry(s.index).or_insert(s.parent);
        }
        let mut on_cycle: Vec<SpotIndex> = parent_of
            .keys()
            .copied()
            .filter(|&start| {
                let mut seen = HashSet::new();
                let mut cur = parent_of[&start];
                while let Some(p) = cur {
                    if p == start {
                        return true;
                    }
                    if !seen.insert(p) {
                        return false;
                    }
                    cur = parent_of.get(&p).copied().flatten();
                }
                false
            })
            .collect();
        on_cycle.sort_unstable();
        ans.extend(on_cycle.into_iter().map(InvariantViolation::Cycle));

        if self.next_index.is_none() {
            ans.push(InvariantViolation::IndexExhausted(SpotIndex::MAX));
        }

        ans
    }
}
