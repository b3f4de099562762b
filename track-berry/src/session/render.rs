//! 场景图元: 外壳按顺序绘制 `list_visible_items` 返回的图元即可.

use super::TrackingSession;
use crate::consts::color::{self, Rgb};
use crate::consts::{GHOST_SCALE, GHOST_SELECTED_SCALE, RELATION_SCALE, RETICLE_SCALE, SELECTED_SCALE};
use crate::lineage::{LineageRole, Spot};
use crate::{SpotIndex, Tcz};

/// spot 的绘制样式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SpotStyle {
    /// 位于当前平面.
    Plain,
    /// 位于邻近 z 平面, 缩小并变暗.
    Ghost,
    /// 当前选中, 放大.
    Selected,
    /// 当前选中但位于邻近 z 平面.
    GhostSelected,
}

/// 相对于选中 spot 的谱系关系.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Relation {
    /// 祖先.
    Ancestor,
    /// 后代.
    Descendant,
}

/// 关系标记所在的角.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Corner {
    /// 左上.
    UpperLeft,
    /// 右下.
    LowerRight,
}

impl Relation {
    /// 祖先画在左上角, 后代画在右下角.
    #[inline]
    pub fn corner(self) -> Corner {
        match self {
            Relation::Ancestor => Corner::UpperLeft,
            Relation::Descendant => Corner::LowerRight,
        }
    }
}

/// 谱系角色对应的颜色.
#[inline]
pub fn role_color(role: LineageRole) -> Rgb {
    match role {
        LineageRole::Root => color::ROOT,
        LineageRole::Internal => color::INTERNAL,
        LineageRole::Leaf => color::LEAF,
    }
}

/// 一个待绘制的图元. 坐标为图像像素坐标.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneItem {
    /// spot 圆圈.
    Spot {
        /// spot 索引.
        index: SpotIndex,
        /// 圆心横坐标.
        x: f64,
        /// 圆心纵坐标.
        y: f64,
        /// 半径.
        radius: f64,
        /// 谱系角色.
        role: LineageRole,
        /// 样式.
        style: SpotStyle,
        /// 颜色.
        color: Rgb,
    },

    /// 分支点上的子节点个数.
    BranchMarker {
        /// spot 索引.
        index: SpotIndex,
        /// 横坐标.
        x: f64,
        /// 纵坐标.
        y: f64,
        /// 子节点个数.
        count: usize,
    },

    /// 标签文字.
    Label {
        /// spot 索引.
        index: SpotIndex,
        /// 横坐标.
        x: f64,
        /// 纵坐标.
        y: f64,
        /// 文字.
        text: String,
    },

    /// 与选中 spot 有谱系关系的 spot 旁的小圆环.
    Relation {
        /// spot 索引.
        index: SpotIndex,
        /// 所标记 spot 的横坐标.
        x: f64,
        /// 所标记 spot 的纵坐标.
        y: f64,
        /// 圆环半径.
        radius: f64,
        /// 关系.
        relation: Relation,
        /// 圆环画在哪个角.
        corner: Corner,
        /// 直接父子关系时实心, 否则空心.
        direct: bool,
    },

    /// 待放置位置的十字准星.
    Reticle {
        /// 横坐标.
        x: f64,
        /// 纵坐标.
        y: f64,
        /// 半臂长.
        size: f64,
    },

    /// 与谱系无关的圆点 (Demo 插件).
    Dot {
        /// 横坐标.
        x: f64,
        /// 纵坐标.
        y: f64,
        /// 半径.
        radius: f64,
        /// 颜色.
        color: Rgb,
    },
}

impl TrackingSession {
    /// `spot` 相对平面 `tcz` 的可见性: `Some(false)` 在平面内,
    /// `Some(true)` 是幽灵, `None` 不可见.
    fn visibility(&self, spot: &Spot, tcz: Tcz) -> Option<bool> {
        if spot.is_in_plane(tcz) {
            Some(false)
        } else {
            spot.ghost_distance(tcz)
                .filter(|&d| d <= self.config.ghost_z_range)
                .map(|_| true)
        }
    }

    fn spot_item(&self, spot: &Spot, style: SpotStyle) -> SceneItem {
        let scale = match style {
            SpotStyle::Plain => 1.0,
            SpotStyle::Ghost => GHOST_SCALE,
            SpotStyle::Selected => SELECTED_SCALE,
            SpotStyle::GhostSelected => GHOST_SELECTED_SCALE,
        };
        let role = self.store.role(spot);
        SceneItem::Spot {
            index: spot.index(),
            x: spot.x(),
            y: spot.y(),
            radius: self.config.spot_radius * scale,
            role,
            style,
            color: role_color(role),
        }
    }

    fn branch_item(&self, spot: &Spot) -> Option<SceneItem> {
        let count = self.store.child_count(spot.index());
        (count > 1).then(|| SceneItem::BranchMarker {
            index: spot.index(),
            x: spot.x(),
            y: spot.y(),
            count,
        })
    }

    /// 平面 `tcz` 上需要绘制的图元, 依次为:
    ///
    /// 1. 平面内除选中 spot 外的全部 spot, 按谱系角色着色;
    /// 2. 平面内分支点的子节点个数;
    /// 3. 幽灵 spot 及其分支点标记;
    /// 4. 选中 spot (放大), 其分支点标记和标签;
    /// 5. 选中 spot 的祖先 (左上) 和后代 (右下) 标记, 直接关系为实心;
    /// 6. 待放置的准星.
    ///
    /// 隐藏全部轨迹时返回空列表.
    pub fn list_visible_items(&self, tcz: Tcz) -> Vec<SceneItem> {
        if self.hidden {
            return Vec::new();
        }

        let current = self.store.current_spot();
        let current_index = current.map(Spot::index);
        let others: Vec<(&Spot, bool)> = self
            .store
            .live()
            .filter(|s| Some(s.index()) != current_index)
            .filter_map(|s| self.visibility(s, tcz).map(|ghost| (s, ghost)))
            .collect();

        let mut items = Vec::new();

        let in_plane = others.iter().filter(|(_, ghost)| !ghost).map(|&(s, _)| s);
        items.extend(in_plane.clone().map(|s| self.spot_item(s, SpotStyle::Plain)));
        items.extend(in_plane.filter_map(|s| self.branch_item(s)));

        for (s, _) in others.iter().filter(|(_, ghost)| *ghost) {
            items.push(self.spot_item(s, SpotStyle::Ghost));
            items.extend(self.branch_item(s));
        }

        let Some(current) = current else {
            items.extend(self.reticle(tcz));
            return items;
        };

        match self.visibility(current, tcz) {
            Some(false) => {
                items.push(self.spot_item(current, SpotStyle::Selected));
                items.extend(self.branch_item(current));
                if let Some(text) = current.label().filter(|_| self.config.show_labels) {
                    items.push(SceneItem::Label {
                        index: current.index(),
                        x: current.x(),
                        y: current.y(),
                        text: text.to_string(),
                    });
                }
            }
            Some(true) => items.push(self.spot_item(current, SpotStyle::GhostSelected)),
            None => {}
        }

        let ancestors = self
            .store
            .find_ancestors(current)
            .into_iter()
            .map(|s| (s, Relation::Ancestor, current.parent() == Some(s.index())));
        let descendants = self
            .store
            .find_descendants(current)
            .into_iter()
            .map(|s| (s, Relation::Descendant, s.parent() == Some(current.index())));
        for (s, relation, direct) in ancestors.chain(descendants) {
            if self.visibility(s, tcz).is_some() {
                items.push(SceneItem::Relation {
                    index: s.index(),
                    x: s.x(),
                    y: s.y(),
                    radius: self.config.spot_radius * RELATION_SCALE,
                    relation,
                    corner: relation.corner(),
                    direct,
                });
            }
        }

        items.extend(self.reticle(tcz));
        items
    }

    fn reticle(&self, tcz: Tcz) -> Option<SceneItem> {
        self.store
            .pending()
            .filter(|p| p.tcz == tcz)
            .map(|p| SceneItem::Reticle {
                x: p.x,
                y: p.y,
                size: self.config.spot_radius * RETICLE_SCALE,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::PendingSpot;
    use crate::session::SessionConfig;

    /// ```text
    /// 0 (z0) ─ 1 (z0) ─ 2 (z1) ─ 4 (z3)
    ///        └ 3 (z0)
    /// 5 (z0), 另一条轨迹
    /// ```
    fn session() -> TrackingSession {
        let mut session = TrackingSession::new(SessionConfig::default());
        let store = session.store_mut();
        store.add_spot(10.0, 10.0, (0, 0, 0), None);
        store.add_spot(20.0, 10.0, (0, 0, 0), Some(0));
        store.add_spot(30.0, 10.0, (0, 0, 1), Some(1));
        store.add_spot(40.0, 10.0, (0, 0, 0), Some(0));
        store.add_spot(50.0, 10.0, (0, 0, 3), Some(2));
        store.add_spot(60.0, 10.0, (0, 0, 0), None);
        session
    }

    fn spot_indices(items: &[SceneItem], style: SpotStyle) -> Vec<SpotIndex> {
        items
            .iter()
            .filter_map(|it| match it {
                SceneItem::Spot { index, style: s, .. } if *s == style => Some(*index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_items_without_selection() {
        let session = session();
        let items = session.list_visible_items((0, 0, 0));
        assert_eq!(spot_indices(&items, SpotStyle::Plain), vec![0, 1, 3, 5]);
        assert_eq!(spot_indices(&items, SpotStyle::Ghost), vec![2]);

        let branches: Vec<_> = items
            .iter()
            .filter_map(|it| match it {
                SceneItem::BranchMarker { index, count, .. } => Some((*index, *count)),
                _ => None,
            })
            .collect();
        assert_eq!(branches, vec![(0, 2)]);

        let role_of = |i| {
            items.iter().find_map(|it| match it {
                SceneItem::Spot { index, role, color, .. } if *index == i => Some((*role, *color)),
                _ => None,
            })
        };
        assert_eq!(role_of(0), Some((LineageRole::Root, color::ROOT)));
        assert_eq!(role_of(1), Some((LineageRole::Internal, color::INTERNAL)));
        assert_eq!(role_of(3), Some((LineageRole::Leaf, color::LEAF)));

        // 顺序: 平面内 spot 先于分支标记, 分支标记先于幽灵.
        let first_branch = items
            .iter()
            .position(|it| matches!(it, SceneItem::BranchMarker { .. }))
            .unwrap();
        let first_ghost = items
            .iter()
            .position(|it| matches!(it, SceneItem::Spot { style: SpotStyle::Ghost, .. }))
            .unwrap();
        assert!(first_branch == 4 && first_branch < first_ghost);
    }

    #[test]
    fn test_selected_and_relations() {
        let mut session = session();
        session.store_mut().set_current(Some(1));
        session.store_mut().set_label(1, Some("a".to_string()));
        session.store_mut().set_pending(Some(PendingSpot {
            x: 5.0,
            y: 6.0,
            tcz: (0, 0, 0),
        }));

        let items = session.list_visible_items((0, 0, 0));
        assert_eq!(spot_indices(&items, SpotStyle::Plain), vec![0, 3, 5]);
        assert_eq!(spot_indices(&items, SpotStyle::Selected), vec![1]);
        match items.iter().find(|it| matches!(it, SceneItem::Spot { index: 1, .. })) {
            Some(SceneItem::Spot { radius, .. }) => assert_eq!(*radius, 8.0),
            other => panic!("unexpected {other:?}"),
        }
        assert!(items.contains(&SceneItem::Label {
            index: 1,
            x: 20.0,
            y: 10.0,
            text: "a".to_string()
        }));

        let relations: Vec<_> = items
            .iter()
            .filter_map(|it| match it {
                SceneItem::Relation {
                    index,
                    relation,
                    corner,
                    direct,
                    ..
                } => Some((*index, *relation, *corner, *direct)),
                _ => None,
            })
            .collect();
        // 4 位于 z3, 超出幽灵范围.
        assert_eq!(
            relations,
            vec![
                (0, Relation::Ancestor, Corner::UpperLeft, true),
                (2, Relation::Descendant, Corner::LowerRight, true),
            ]
        );

        assert_eq!(
            items.last(),
            Some(&SceneItem::Reticle {
                x: 5.0,
                y: 6.0,
                size: 6.0
            })
        );
    }

    #[test]
    fn test_ghost_selected_and_transitive() {
        let mut session = session();
        session.store_mut().set_current(Some(4));
        let items = session.list_visible_items((0, 0, 2));
        assert_eq!(spot_indices(&items, SpotStyle::GhostSelected), vec![4]);
        assert_eq!(spot_indices(&items, SpotStyle::Ghost), vec![2]);

        let relations: Vec<_> = items
            .iter()
            .filter_map(|it| match it {
                SceneItem::Relation { index, direct, .. } => Some((*index, *direct)),
                _ => None,
            })
            .collect();
        assert_eq!(relations, vec![(2, true)]);

        let items = session.list_visible_items((0, 0, 0));
        let relations: Vec<_> = items
            .iter()
            .filter_map(|it| match it {
                SceneItem::Relation { index, direct, .. } => Some((*index, *direct)),
                _ => None,
            })
            .collect();
        // 4 的祖先依次为 2, 1, 0; 在 z0 平面上 2 是幽灵.
        assert_eq!(relations, vec![(2, true), (1, false), (0, false)]);
        assert!(spot_indices(&items, SpotStyle::Selected).is_empty());
    }
}
