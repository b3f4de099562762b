//! 单个点标注.

use crate::{SpotIndex, Tcz, Timestamp};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// 当前本地时间 (带时区偏移).
#[inline]
pub(crate) fn now() -> Timestamp {
    Local::now().fixed_offset()
}

/// 一个点标注 (spot). 它属于 `(time, channel, z)` 所确定的某一张平面,
/// 并通过 `parent` 与森林中的其它 spot 形成谱系.
///
/// 字段顺序即记录文件中 `spot_list` 每一项的字段顺序.
/// 旧文件可能缺少 `label`, `deleted` 和时间戳字段, 反序列化时以默认值补齐
/// (`label = None`, `deleted = false`, 时间戳取当前时刻).
///
/// `Spot` 只能由 [`LineageStore`](super::LineageStore) 创建和修改.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub(crate) index: SpotIndex,
    pub(crate) time: usize,
    pub(crate) channel: usize,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) z: usize,
    #[serde(default)]
    pub(crate) parent: Option<SpotIndex>,
    #[serde(default)]
    pub(crate) label: Option<String>,
    #[serde(default)]
    pub(crate) deleted: bool,
    #[serde(default = "now")]
    pub(crate) created_at: Timestamp,
    #[serde(default = "now")]
    pub(crate) updated_at: Timestamp,
}

impl Spot {
    pub(crate) fn new(
        index: SpotIndex,
        (x, y): (f64, f64),
        (time, channel, z): Tcz,
        parent: Option<SpotIndex>,
    ) -> Self {
        let t = now();
        Self {
            index,
            time,
            channel,
            x,
            y,
            z,
            parent,
            label: None,
            deleted: false,
            created_at: t,
            updated_at: t,
        }
    }

    /// 唯一索引.
    #[inline]
    pub fn index(&self) -> SpotIndex {
        self.index
    }

    /// 时间索引.
    #[inline]
    pub fn time(&self) -> usize {
        self.time
    }

    /// 通道索引.
    #[inline]
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// z 索引.
    #[inline]
    pub fn z(&self) -> usize {
        self.z
    }

    /// 所在平面 `(time, channel, z)`.
    #[inline]
    pub fn tcz(&self) -> Tcz {
        (self.time, self.channel, self.z)
    }

    /// 平面内横坐标 (像素).
    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// 平面内纵坐标 (像素).
    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// `(x, y)`.
    #[inline]
    pub fn pos(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 父节点索引.
    #[inline]
    pub fn parent(&self) -> Option<SpotIndex> {
        self.parent
    }

    /// 用户标签.
    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// 是否已被软删除.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// 是否未被删除.
    #[inline]
    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// 是否没有父节点.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// 创建时间.
    #[inline]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// 最近一次修改时间.
    #[inline]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// 是否恰好位于平面 `tcz`.
    #[inline]
    pub fn is_in_plane(&self, tcz: Tcz) -> bool {
        self.tcz() == tcz
    }

    /// 与平面 `(time, channel, _)` 相同且 z 不同时, 返回 z 方向距离, 否则返回 `None`.
    #[inline]
    pub fn ghost_distance(&self, (time, channel, z): Tcz) -> Option<usize> {
        (self.time == time && self.channel == channel && self.z != z).then(|| self.z.abs_diff(z))
    }

    #[inline]
    pub(crate) fn touch(&mut self) {
        self.updated_at = now();
    }
}
