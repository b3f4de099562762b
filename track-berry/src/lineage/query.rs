//! 谱系查询.
//!
//! 所有查询只考虑未删除的 spot. 查询失败时返回空集合或 `None`, 从不 panic.
//! 向上/向下的遍历都以已访问集合为界, 即使森林中意外出现环也会终止.

use super::{LineageStore, Spot};
use crate::{SpotIndex, Tcz};
use either::Either;
use itertools::Itertools;
use std::collections::HashSet;

/// spot 在谱系中的角色, 决定绘制样式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LineageRole {
    /// 没有父节点.
    Root,

    /// 有父节点, 也有子节点.
    Internal,

    /// 有父节点, 没有子节点.
    Leaf,
}

impl LineageStore {
    /// 按索引查找未删除的 spot.
    ///
    /// 若多个未删除的 spot 共享同一索引 (不应发生), 记录错误日志,
    /// 并返回插入顺序中的第一个.
    pub fn find_spot_by_index(&self, index: SpotIndex) -> Option<&Spot> {
        let mut hits = self.live().filter(|s| s.index == index);
        let first = hits.next()?;
        if hits.next().is_some() {
            log::error!("Multiple spots have the same index {index}. Using the first spot.");
        }
        Some(first)
    }

    /// 沿父节点向上走到根. 父节点缺失或已删除时, 视当前 spot 为根.
    ///
    /// `index` 不对应未删除的 spot 时返回 `None`.
    pub fn find_root(&self, index: SpotIndex) -> Option<&Spot> {
        let spot = self.find_spot_by_index(index)?;
        Some(self.ancestor_chain(spot).pop().unwrap_or(spot))
    }

    /// `spot` 的全部直接子节点, 按插入顺序. `spot` 为 `None` 时返回空列表.
    pub fn find_children(&self, spot: Option<&Spot>) -> Vec<&Spot> {
        let it = match spot {
            None => Either::Left(std::iter::empty()),
            Some(s) => Either::Right(self.children_of(s.index)),
        };
        it.collect()
    }

    /// 从直接父节点到根的有序列表, 不含 `spot` 本身.
    #[inline]
    pub fn find_ancestors<'a>(&'a self, spot: &'a Spot) -> Vec<&'a Spot> {
        self.ancestor_chain(spot)
    }

    /// 前序遍历的全部后代, 不含 `spot` 本身.
    pub fn find_descendants(&self, spot: &Spot) -> Vec<&Spot> {
        let mut ans = Vec::new();
        let mut seen = HashSet::from([spot.index]);
        let mut stack: Vec<&Spot> = self.children_of(spot.index).rev().collect();

        while let Some(s) = stack.pop() {
            if !seen.insert(s.index) {
                log::error!("Lineage cycle detected at spot {}", s.index);
                continue;
            }
            ans.push(s);
            stack.extend(self.children_of(s.index).rev());
        }
        ans
    }

    /// 恰好位于平面 `tcz` 的全部 spot.
    pub fn find_spots_in_plane(&self, tcz: Tcz) -> Vec<&Spot> {
        self.live().filter(|s| s.is_in_plane(tcz)).collect()
    }

    /// 平面 `tcz` 内, 落在以 `(x, y)` 为中心, 半宽 `radius` 的轴对齐方框
    /// (含边界) 中的 spot, 按索引升序.
    ///
    /// 注意这里不是圆形半径.
    pub fn find_spots_near(&self, x: f64, y: f64, tcz: Tcz, radius: f64) -> Vec<&Spot> {
        let rx = (x - radius)..=(x + radius);
        let ry = (y - radius)..=(y + radius);
        self.live()
            .filter(|s| s.is_in_plane(tcz) && rx.contains(&s.x) && ry.contains(&s.y))
            .sorted_by_key(|s| s.index)
            .collect()
    }

    /// `(x, y)` 处最新创建的 spot (即 `find_spots_near` 的最后一个).
    #[inline]
    pub fn select_topmost_at(&self, x: f64, y: f64, tcz: Tcz, radius: f64) -> Option<&Spot> {
        self.find_spots_near(x, y, tcz, radius).pop()
    }

    /// spot 的谱系角色.
    pub fn role(&self, spot: &Spot) -> LineageRole {
        if spot.is_root() {
            LineageRole::Root
        } else if self.children_of(spot.index).next().is_some() {
            LineageRole::Internal
        } else {
            LineageRole::Leaf
        }
    }

    /// 直接子节点个数.
    #[inline]
    pub fn child_count(&self, index: SpotIndex) -> usize {
        self.children_of(index).count()
    }

    /// 全部未删除的根节点. 每个根节点对应一条轨迹.
    pub fn roots(&self) -> Vec<&Spot> {
        self.live().filter(|s| s.is_root()).collect()
    }

    /// 子节点多于一个的 spot (分支点).
    pub fn branch_points(&self) -> Vec<&Spot> {
        self.live().filter(|s| self.child_count(s.index) > 1).collect()
    }

    pub(super) fn children_of(
        &self,
        index: SpotIndex,
    ) -> impl DoubleEndedIterator<Item = &Spot> + '_ {
        self.live().filter(move |s| s.parent == Some(index))
    }

    /// 从直接父节点到根. 父节点无法解析或出现环时停止.
    fn ancestor_chain<'a>(&'a self, spot: &'a Spot) -> Vec<&'a Spot> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([spot.index]);
        let mut cur = spot;

        while let Some(p) = cur.parent {
            let Some(parent) = self.find_spot_by_index(p) else {
                log::warn!("Spot {} refers to unresolved parent {p}; treated as root", cur.index);
                break;
            };
            if !seen.insert(parent.index) {
                log::error!("Lineage cycle detected at spot {}", parent.index);
                break;
            }
            chain.push(parent);
            cur = parent;
        }
        chain
    }
}
