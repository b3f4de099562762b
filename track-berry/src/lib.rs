#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 为多维 (时间/通道/z) 显微图像栈提供单颗粒追踪 (SPT) 人工标注的数据模型与交互逻辑.
//!
//! 该 crate 不包含任何 GUI 代码. 外壳负责把鼠标键盘事件翻译为 [`session`] 中的输入类型,
//! 并按顺序处理返回的 [`SessionEvent`], 再按 [`SceneItem`] 绘制场景.
//!
//! # 注意
//!
//! 1. TIFF 解析不属于本 crate. [`ImageStack`] 只需要一个 `[t, c, z, y, x]` 数组和少量元数据;
//!   这里提供 `.npy` 读取器作为具体实现.
//! 2. 森林不变量被破坏 (重复索引, 悬空父节点, 环) 时只记录 `error` 日志并尽力继续,
//!   不会 panic.
//!
//! # 开发计划
//!
//! ### 谱系森林 ✅
//!
//! spot 的创建, 移动, 标签, 软删除 (单个/子树/整条轨迹) 和谱系查询.
//!
//! 实现位于 `track-berry/src/lineage`.
//!
//! ### 追踪会话 ✅
//!
//! 手势到森林操作的翻译, 自动前进到下一时间点, ESC 回到追踪起点, 幽灵 spot 与谱系标记.
//!
//! 实现位于 `track-berry/src/session`.
//!
//! ### 记录文件 ✅
//!
//! JSON 记录的保存 (临时文件 + 重命名) 与读取, 来源检查, 旧文档字段补齐.
//!
//! 实现位于 `track-berry/src/record`.
//!
//! ### 显示 LUT ✅
//!
//! 色带, 位深推断, 百分位窗口, 灰度/彩色映射与多通道合成.
//!
//! 实现位于 `track-berry/src/image/lut.rs`.
//!
//! ### 高斯拟合光斑定位 ✅
//!
//! LoG 滤波, 局部极大值, 3x3 对数二次拟合. 多平面并行 (`rayon` feature).
//!
//! 实现位于 `track-berry/src/image/gaussian8.rs`.
//!
//! ### 插件 ✅
//!
//! `Demo`, `Particle Tracking`, `Particle Tracking with Gaussian Fit`.
//!
//! 实现位于 `track-berry/src/plugin`.

/// 平面索引 `(time, channel, z)`.
pub type Tcz = (usize, usize, usize);

/// spot 的唯一索引.
pub type SpotIndex = usize;

/// 带时区偏移的时间戳, 序列化为 ISO-8601.
pub type Timestamp = chrono::DateTime<chrono::FixedOffset>;

pub mod consts;

pub mod image;

pub mod lineage;

pub mod plugin;

pub mod prelude;

pub mod record;

pub mod session;

pub use crate::image::{ImageStack, Lut};
pub use crate::lineage::{LineageStore, Spot};
pub use crate::plugin::Plugin;
pub use crate::session::{SceneItem, SessionEvent, TrackingSession};
