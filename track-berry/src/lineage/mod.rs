//! 谱系森林 (lineage store).
//!
//! 保存一次追踪会话中创建过的全部 spot (包括被软删除的 spot),
//! 并提供创建, 移动, 修改标签, 软删除以及谱系查询等操作.
//!
//! 所有 "指针" (父节点, 当前选中, 待放置的准星) 都以 [`SpotIndex`] 保存,
//! 需要时再经由本结构解析. 因此删除操作不会使调用者持有失效数据.

mod audit;
mod query;
mod spot;

pub use audit::InvariantViolation;
pub use query::LineageRole;
pub use spot::Spot;

pub(crate) use spot::now;

use crate::{SpotIndex, Tcz};

/// 尚未提交的候选 spot ("准星"). 仅用于预览下一个子节点的放置位置.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PendingSpot {
    /// 横坐标.
    pub x: f64,
    /// 纵坐标.
    pub y: f64,
    /// 所在平面.
    pub tcz: Tcz,
}

/// spot 森林. 独占全部 `Spot` 记录.
#[derive(Clone, Debug)]
pub struct LineageStore {
    /// 按插入顺序保存.
    spots: Vec<Spot>,
    /// `None`: 索引空间已耗尽, 不能再创建 spot.
    next_index: Option<SpotIndex>,
    current: Option<SpotIndex>,
    pending: Option<PendingSpot>,
    modified: bool,
}

impl Default for LineageStore {
    fn default() -> Self {
        Self {
            spots: Vec::new(),
            next_index: Some(0),
            current: None,
            pending: None,
            modified: false,
        }
    }
}

impl LineageStore {
    /// 创建空森林.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有 spot 列表 (通常来自记录文件) 整体构建森林. 结果处于 "未修改" 状态.
    ///
    /// 若列表违反森林不变量, 每条违规都会以 `error` 级别记录日志,
    /// 但构建照常完成.
    pub fn from_spots(spots: Vec<Spot>) -> Self {
        let next_index = match spots.iter().map(|s| s.index).max() {
            None => Some(0),
            Some(max) => max.checked_add(1),
        };
        let store = Self {
            spots,
            next_index,
            current: None,
            pending: None,
            modified: false,
        };
        for v in store.audit() {
            log::error!("Invariant violation in loaded records: {v}");
        }
        store
    }

    /// 全部 spot (含已删除), 按插入顺序.
    #[inline]
    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    /// 迭代所有未删除的 spot.
    #[inline]
    pub fn live(&self) -> impl DoubleEndedIterator<Item = &Spot> + '_ {
        self.spots.iter().filter(|s| s.is_live())
    }

    /// 未删除的 spot 个数.
    #[inline]
    pub fn live_len(&self) -> usize {
        self.live().count()
    }

    /// 森林中是否没有任何 spot 记录 (包括已删除的).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// 下一个将被分配的索引. 索引空间耗尽时为 `None`.
    #[inline]
    pub fn next_index(&self) -> Option<SpotIndex> {
        self.next_index
    }

    /// 自上次保存 (或加载, 清空) 以来是否被修改过.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// 标记为已保存.
    #[inline]
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// 清空森林, 回到空的, 未修改的状态.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 在平面 `tcz` 的 `(x, y)` 处创建新 spot, 并返回它.
    ///
    /// 新索引为 "已有最大索引 + 1" (空森林时为 0); 已删除的索引不会被复用.
    /// 不检查 `(x, y)` 是否越界.
    ///
    /// 索引空间已耗尽 (已有索引 `SpotIndex::MAX`) 时记录错误日志, 不创建 spot, 返回 `None`.
    ///
    /// 若 `parent` 不对应任何已有 spot, 则记录错误日志并以根节点创建.
    pub fn add_spot(
        &mut self,
        x: f64,
        y: f64,
        tcz: Tcz,
        parent: Option<SpotIndex>,
    ) -> Option<&Spot> {
        let Some(index) = self.next_index else {
            log::error!("Spot index space exhausted; no spot added");
            return None;
        };
        let parent = parent.filter(|&p| {
            let known = self.spots.iter().any(|s| s.index == p);
            if !known {
                log::error!("Parent spot {p} does not exist; new spot becomes a root");
            }
            known
        });

        self.next_index = index.checked_add(1);
        self.spots.push(Spot::new(index, (x, y), tcz, parent));
        self.modified = true;
        log::debug!("Spot {index} added at ({x:.2}, {y:.2}) in {tcz:?}, parent {parent:?}");

        self.spots.last()
    }

    /// 将 spot `index` 移到平面 `tcz` 的 `(x, y)` 处. 不改变父节点.
    ///
    /// `index` 不对应未删除的 spot 时不做任何事, 返回 `false`.
    pub fn move_spot(&mut self, index: SpotIndex, x: f64, y: f64, tcz: Tcz) -> bool {
        let Some(spot) = self.live_mut(index) else {
            return false;
        };
        (spot.x, spot.y) = (x, y);
        (spot.time, spot.channel, spot.z) = tcz;
        spot.touch();
        self.modified = true;
        true
    }

    /// 设置 (或用 `None` 清除) spot `index` 的标签.
    pub fn set_label(&mut self, index: SpotIndex, label: Option<String>) -> bool {
        let Some(spot) = self.live_mut(index) else {
            return false;
        };
        spot.label = label;
        spot.touch();
        self.modified = true;
        true
    }

    /// 软删除 spot `index`. 它的直接子节点成为根节点 (不级联删除).
    ///
    /// `index` 不对应未删除的 spot 时不做任何事, 返回 `false`.
    pub fn remove_spot(&mut self, index: SpotIndex) -> bool {
        let Some(spot) = self.live_mut(index) else {
            return false;
        };
        spot.deleted = true;
        spot.touch();

        for child in self
            .spots
            .iter_mut()
            .filter(|s| s.is_live() && s.parent == Some(index))
        {
            child.parent = None;
            child.touch();
        }

        if self.current == Some(index) {
            self.current = None;
        }
        self.modified = true;
        log::debug!("Spot {index} removed");
        true
    }

    /// 软删除 spot `index` 及其全部后代. 子节点先于父节点被删除.
    ///
    /// 返回被删除的 spot 个数. `index` 不对应未删除的 spot 时返回 0.
    pub fn remove_subtree(&mut self, index: SpotIndex) -> usize {
        let Some(spot) = self.find_spot_by_index(index) else {
            return 0;
        };

        // 前序的逆序: 任何后代都排在其祖先之前.
        let mut doomed: Vec<SpotIndex> = self
            .find_descendants(spot)
            .iter()
            .map(|s| s.index)
            .collect();
        doomed.reverse();
        doomed.push(index);

        doomed
            .into_iter()
            .filter(|&i| self.remove_spot(i))
            .count()
    }

    /// 删除 `index` 所在的整条轨迹 (从其根节点出发的整棵树).
    pub fn remove_track(&mut self, index: SpotIndex) -> usize {
        match self.find_root(index).map(Spot::index) {
            Some(root) => self.remove_subtree(root),
            None => 0,
        }
    }

    /// 当前选中的 spot. 若选中的 spot 已被删除, 则返回 `None`.
    #[inline]
    pub fn current_spot(&self) -> Option<&Spot> {
        self.current.and_then(|i| self.find_spot_by_index(i))
    }

    /// 当前选中 spot 的索引 (仅当其仍未被删除).
    #[inline]
    pub fn current_index(&self) -> Option<SpotIndex> {
        self.current_spot().map(Spot::index)
    }

    /// 设置当前选中的 spot.
    #[inline]
    pub fn set_current(&mut self, index: Option<SpotIndex>) {
        self.current = index;
    }

    /// 待放置的准星.
    #[inline]
    pub fn pending(&self) -> Option<PendingSpot> {
        self.pending
    }

    /// 设置准星位置.
    #[inline]
    pub fn set_pending(&mut self, pending: Option<PendingSpot>) {
        self.pending = pending;
    }

    fn live_mut(&mut self, index: SpotIndex) -> Option<&mut Spot> {
        self.spots
            .iter_mut()
            .find(|s| s.is_live() && s.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::LineageStore;

    #[test]
    fn test_add_spot_index_monotonic() {
        let mut store = LineageStore::new();
        assert!(!store.is_modified());
        for i in 0..10usize {
            let parent = i.checked_sub(1);
            assert_eq!(store.add_spot(i as f64, 0.0, (i, 0, 0), parent).unwrap().index(), i);
        }
        assert!(store.is_modified());
        assert!(store.audit().is_empty());

        // 删除的索引不会被复用.
        store.remove_spot(9);
        assert_eq!(store.add_spot(0.0, 0.0, (0, 0, 0), None).unwrap().index(), 10);
    }

    #[test]
    fn test_add_spot_unknown_parent_becomes_root() {
        let mut store = LineageStore::new();
        let s = store.add_spot(1.0, 1.0, (0, 0, 0), Some(42)).unwrap();
        assert!(s.is_root());
    }

    #[test]
    fn test_remove_spot_orphans_children() {
        let mut store = LineageStore::new();
        let a = store.add_spot(0.0, 0.0, (0, 0, 0), None).unwrap().index();
        let b = store.add_spot(1.0, 0.0, (1, 0, 0), Some(a)).unwrap().index();
        let c = store.add_spot(2.0, 0.0, (1, 0, 0), Some(a)).unwrap().index();

        assert!(store.remove_spot(a));
        assert!(!store.remove_spot(a));

        assert!(store.find_spot_by_index(a).is_none());
        assert!(store.spots()[a].is_deleted());
        for i in [b, c] {
            let s = store.find_spot_by_index(i).unwrap();
            assert!(s.is_live());
            assert_eq!(s.parent(), None);
        }
        assert!(store.find_children(Some(&store.spots()[a])).is_empty());
        assert!(store.audit().is_empty());
    }

    #[test]
    fn test_remove_subtree_chain() {
        let mut store = LineageStore::new();
        let a = store.add_spot(0.0, 0.0, (0, 0, 0), None).unwrap().index();
        let b = store.add_spot(0.0, 0.0, (1, 0, 0), Some(a)).unwrap().index();
        let c = store.add_spot(0.0, 0.0, (2, 0, 0), Some(b)).unwrap().index();
        let other = store.add_spot(5.0, 5.0, (0, 0, 0), None).unwrap().index();

        assert_eq!(store.remove_subtree(a), 3);
        for i in [a, b, c] {
            assert!(store.spots()[i].is_deleted());
        }
        assert!(store.find_descendants(&store.spots()[a]).is_empty());
        assert!(store.find_spot_by_index(other).is_some());
        assert_eq!(store.remove_subtree(a), 0);
    }

    #[test]
    fn test_remove_subtree_middle_keeps_ancestors() {
        let mut store = LineageStore::new();
        let a = store.add_spot(0.0, 0.0, (0, 0, 0), None).unwrap().index();
        let b = store.add_spot(0.0, 0.0, (1, 0, 0), Some(a)).unwrap().index();
        let c = store.add_spot(0.0, 0.0, (2, 0, 0), Some(b)).unwrap().index();
        let d = store.add_spot(0.0, 0.0, (2, 0, 0), Some(b)).unwrap().index();

        assert_eq!(store.remove_subtree(b), 3);
        assert!(store.find_spot_by_index(a).is_some());
        for i in [b, c, d] {
            assert!(store.find_spot_by_index(i).is_none());
        }
    }

    #[test]
    fn test_remove_track_from_leaf() {
        let mut store = LineageStore::new();
        let a = store.add_spot(0.0, 0.0, (0, 0, 0), None).unwrap().index();
        let b = store.add_spot(0.0, 0.0, (1, 0, 0), Some(a)).unwrap().index();
        let c = store.add_spot(0.0, 0.0, (2, 0, 0), Some(b)).unwrap().index();
        let d = store.add_spot(0.0, 0.0, (1, 0, 0), Some(a)).unwrap().index();

        assert_eq!(store.remove_track(c), 4);
        assert_eq!(store.live_len(), 0);
        assert!(store.spots().iter().all(|s| s.is_deleted()));
        assert_eq!(store.remove_track(d), 0);
    }

    #[test]
    fn test_move_and_label() {
        let mut store = LineageStore::new();
        let a = store.add_spot(0.0, 0.0, (0, 0, 0), None).unwrap().index();
        let b = store.add_spot(0.0, 0.0, (0, 0, 0), Some(a)).unwrap().index();
        store.mark_saved();

        assert!(store.move_spot(b, 3.0, 4.0, (2, 1, 3)));
        assert!(store.is_modified());
        let s = store.find_spot_by_index(b).unwrap();
        assert_eq!(s.pos(), (3.0, 4.0));
        assert_eq!(s.tcz(), (2, 1, 3));
        assert_eq!(s.parent(), Some(a));

        assert!(store.set_label(b, Some("A".to_string())));
        assert_eq!(store.find_spot_by_index(b).unwrap().label(), Some("A"));
        assert!(store.set_label(b, None));
        assert_eq!(store.find_spot_by_index(b).unwrap().label(), None);

        store.remove_spot(b);
        assert!(!store.move_spot(b, 0.0, 0.0, (0, 0, 0)));
        assert!(!store.set_label(b, None));
    }

    #[test]
    fn test_current_spot_resolves_by_index() {
        let mut store = LineageStore::new();
        let a = store.add_spot(0.0, 0.0, (0, 0, 0), None).unwrap().index();
        store.set_current(Some(a));
        assert_eq!(store.current_index(), Some(a));
        store.remove_spot(a);
        assert!(store.current_spot().is_none());
    }

    #[test]
    fn test_clear() {
        let mut store = LineageStore::new();
        store.add_spot(0.0, 0.0, (0, 0, 0), None);
        store.clear();
        assert!(store.is_empty());
        assert!(!store.is_modified());
        assert_eq!(store.next_index(), Some(0));
    }
}
