//! 追踪会话控制器.
//!
//! 把离散的用户手势 (点击, 拖动, 按键, 右键菜单) 翻译为谱系森林上的操作,
//! 同时维护森林之外的会话状态: 是否正在追踪, 追踪起点平面, 是否隐藏全部轨迹等.
//!
//! 会话从不长期持有 `&Spot`: 每次需要时都通过索引向 [`LineageStore`] 重新解析.
//! 每个手势方法都返回本次产生的 [`SessionEvent`] 列表, 由外壳按顺序处理.

mod event;
mod render;

pub use event::{
    ContextAction, CursorKind, Key, Modifiers, MouseButton, PointerEvent, SessionEvent,
};
pub use render::{Corner, Relation, SceneItem, SpotStyle};

use crate::consts::{GHOST_Z_RANGE, SPOT_RADIUS};
use crate::image::{Gaussian8, ImageStack, StackBounds};
use crate::lineage::{LineageStore, PendingSpot, Spot};
use crate::{SpotIndex, Tcz};
use serde::{Deserialize, Serialize};

/// 会话配置. 随记录文件的查看器设置一起保存.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 提交新 spot 后是否自动前进到下一个时间点.
    pub auto_advance: bool,
    /// 幽灵 spot 的最大 z 距离.
    pub ghost_z_range: usize,
    /// spot 绘制半径, 同时是点击命中测试的方框半宽.
    pub spot_radius: f64,
    /// 是否绘制选中 spot 的标签.
    pub show_labels: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_advance: true,
            ghost_z_range: GHOST_Z_RANGE,
            spot_radius: SPOT_RADIUS,
            show_labels: true,
        }
    }
}

/// 追踪会话. 独占一个 [`LineageStore`].
#[derive(Clone, Debug, Default)]
pub struct TrackingSession {
    store: LineageStore,
    config: SessionConfig,
    bounds: StackBounds,
    is_tracking: bool,
    track_origin: Option<Tcz>,
    hidden: bool,
    adding_spot: bool,
    cursor: CursorKind,
    refiner: Option<Gaussian8>,
}

impl TrackingSession {
    /// 以空森林创建会话.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// 提交 spot 时先用 `refiner` 在点击处附近做高斯拟合,
    /// 并吸附到 `spot_radius` 内最近的拟合结果; 没有结果时使用原始点击位置.
    pub fn with_refiner(mut self, refiner: Gaussian8) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// 谱系森林.
    #[inline]
    pub fn store(&self) -> &LineageStore {
        &self.store
    }

    /// 可变谱系森林. 直接修改森林不会产生会话事件.
    #[inline]
    pub fn store_mut(&mut self) -> &mut LineageStore {
        &mut self.store
    }

    /// 整体替换森林 (通常在载入记录后), 并重置会话状态.
    pub fn replace_store(&mut self, store: LineageStore) {
        self.store = store;
        self.end_tracking();
    }

    /// 清空森林和会话状态.
    pub fn clear(&mut self) {
        self.store.clear();
        self.end_tracking();
    }

    /// 会话配置.
    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 替换会话配置.
    #[inline]
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// 当前已知的图像栈尺寸.
    #[inline]
    pub fn bounds(&self) -> StackBounds {
        self.bounds
    }

    /// 图像栈改变时由外壳调用. 每个手势也会从传入的图像栈刷新尺寸.
    #[inline]
    pub fn set_bounds(&mut self, bounds: StackBounds) {
        self.bounds = bounds;
    }

    /// 是否正在追踪.
    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.is_tracking
    }

    /// 本次追踪的起点平面.
    #[inline]
    pub fn track_origin(&self) -> Option<Tcz> {
        self.track_origin
    }

    /// 是否隐藏了全部轨迹.
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// 当前选中的 spot.
    #[inline]
    pub fn selected(&self) -> Option<&Spot> {
        self.store.current_spot()
    }

    /// 应显示的指针形状.
    pub fn cursor(&self) -> CursorKind {
        if self.adding_spot || self.store.current_index().is_some() {
            CursorKind::Cross
        } else {
            CursorKind::Arrow
        }
    }

    /// 状态栏文字.
    pub fn status_message(&self) -> String {
        if self.hidden {
            "Spots not shown.".to_string()
        } else {
            match self.store.current_index() {
                None => "Ctrl + click to start tracking.".to_string(),
                Some(i) => format!("Spot = {i}. Click or hit ESC."),
            }
        }
    }

    /// 隐藏或显示全部轨迹. 隐藏时清除选择和追踪状态.
    pub fn set_hidden(&mut self, hidden: bool) -> Vec<SessionEvent> {
        self.hidden = hidden;
        if hidden {
            self.store.set_current(None);
            self.adding_spot = false;
        }
        self.finish(vec![SessionEvent::ViewInvalidated])
    }

    /// 鼠标按下.
    pub fn mouse_pressed(
        &mut self,
        ev: &PointerEvent,
        stack: &ImageStack,
        tcz: Tcz,
    ) -> Vec<SessionEvent> {
        self.bounds = stack.bounds();
        let mut events = Vec::new();

        if self.hidden {
            self.store.set_current(None);
            return self.finish(events);
        }

        let (x, y) = (ev.x, ev.y);
        match ev.button {
            Some(MouseButton::Secondary) => {
                let had_selection = self.store.current_index().is_some();
                if self.select_at(x, y, tcz).is_some() {
                    events.push(SessionEvent::ViewInvalidated);
                    events.push(SessionEvent::ContextMenuRequested(ContextAction::ALL.to_vec()));
                } else if had_selection {
                    events.push(SessionEvent::ViewInvalidated);
                }
            }
            Some(MouseButton::Primary) => {
                events.push(SessionEvent::FocusRequested);
                match self.store.current_index() {
                    _ if ev.modifiers.ctrl => {
                        let (x, y) = self.place(x, y, stack, tcz);
                        if self.commit(x, y, tcz, None, &mut events) {
                            self.is_tracking = true;
                            self.track_origin = Some(tcz);
                        }
                    }
                    Some(current) if ev.modifiers.shift => {
                        let (x, y) = self.place(x, y, stack, tcz);
                        self.store.move_spot(current, x, y, tcz);
                        self.store.set_pending(None);
                        log::debug!("Spot {current} jumped to ({x:.2}, {y:.2}) in {tcz:?}");
                    }
                    None => {
                        self.select_at(x, y, tcz);
                    }
                    Some(current) => {
                        let radius = self.config.spot_radius;
                        match self.store.select_topmost_at(x, y, tcz, radius).map(Spot::index) {
                            Some(hit) => {
                                self.store.set_current(Some(hit));
                                self.store.set_pending(None);
                            }
                            None => {
                                let (x, y) = self.place(x, y, stack, tcz);
                                let added = self.commit(x, y, tcz, Some(current), &mut events);
                                if added && !self.is_tracking {
                                    self.is_tracking = true;
                                    self.track_origin = Some(tcz);
                                }
                            }
                        }
                    }
                }
                events.insert(1, SessionEvent::ViewInvalidated);
            }
            Some(MouseButton::Middle) | None => {}
        }
        self.finish(events)
    }

    /// 鼠标移动. 按住主键拖动时, 选中 spot 跟随指针 (保持在其原平面);
    /// 不按键移动时, 准星跟随指针.
    pub fn mouse_moved(
        &mut self,
        ev: &PointerEvent,
        stack: &ImageStack,
        tcz: Tcz,
    ) -> Vec<SessionEvent> {
        self.bounds = stack.bounds();
        if self.hidden {
            return Vec::new();
        }
        let Some(spot) = self.store.current_spot() else {
            return Vec::new();
        };
        let (index, spot_tcz) = (spot.index(), spot.tcz());

        match ev.button {
            Some(MouseButton::Primary) if ev.modifiers.is_empty() => {
                self.store.move_spot(index, ev.x, ev.y, spot_tcz);
            }
            None => {
                self.store.set_pending(Some(PendingSpot {
                    x: ev.x,
                    y: ev.y,
                    tcz,
                }));
            }
            _ => return Vec::new(),
        }
        vec![SessionEvent::ViewInvalidated]
    }

    /// 按键按下.
    pub fn key_pressed(&mut self, key: Key, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent> {
        self.bounds = stack.bounds();
        if self.hidden {
            return Vec::new();
        }

        let mut events = Vec::new();
        match key {
            Key::Control => self.adding_spot = true,
            Key::Escape => {
                if self.is_tracking && self.config.auto_advance {
                    if let Some(origin) = self.track_origin.filter(|&o| o != tcz) {
                        events.push(SessionEvent::PlaneChangeRequested(origin));
                    }
                }
                self.store.set_current(None);
                self.adding_spot = false;
                self.end_tracking();
                events.insert(0, SessionEvent::ViewInvalidated);
                log::debug!("Tracking cancelled");
            }
            Key::Backspace => {
                if let Some(i) = self.store.current_index() {
                    self.store.set_label(i, None);
                    events.push(SessionEvent::ViewInvalidated);
                }
            }
            Key::Char(c) if c.is_alphanumeric() => {
                if let Some(i) = self.store.current_index() {
                    self.store.set_label(i, Some(c.to_string()));
                    events.push(SessionEvent::ViewInvalidated);
                }
            }
            Key::Char(_) | Key::Other => {}
        }
        self.finish(events)
    }

    /// 按键松开.
    pub fn key_released(&mut self, key: Key, stack: &ImageStack, _tcz: Tcz) -> Vec<SessionEvent> {
        self.bounds = stack.bounds();
        if self.hidden {
            return Vec::new();
        }
        if key == Key::Control {
            self.adding_spot = false;
        }
        self.finish(Vec::new())
    }

    /// 执行右键菜单操作. 没有选中 spot 时不做任何事.
    pub fn context_action(&mut self, action: ContextAction) -> Vec<SessionEvent> {
        let Some(spot) = self.store.current_spot() else {
            return Vec::new();
        };
        let (index, (x, y), (t, c, z)) = (spot.index(), spot.pos(), spot.tcz());

        match action {
            // 超出范围的 z (来自其它尺寸的图像栈) 不会被 "增加" 反向移动.
            ContextAction::IncrementZ => {
                if z < self.bounds.z_max() {
                    self.store.move_spot(index, x, y, (t, c, z + 1));
                }
            }
            ContextAction::DecrementZ => {
                let z = z.saturating_sub(1).min(self.bounds.z_max());
                self.store.move_spot(index, x, y, (t, c, z));
            }
            ContextAction::RemoveSpot => {
                self.store.remove_spot(index);
            }
            ContextAction::RemoveSubtree => {
                self.store.remove_subtree(index);
            }
            ContextAction::RemoveTrack => {
                self.store.remove_track(index);
            }
        }
        if matches!(
            action,
            ContextAction::RemoveSpot | ContextAction::RemoveSubtree | ContextAction::RemoveTrack
        ) {
            self.store.set_current(None);
        }
        log::debug!("Context action {action:?} on spot {index}");
        self.finish(vec![SessionEvent::ViewInvalidated])
    }

    /// 选中 `(x, y)` 处最新的 spot; 没有命中时清除选择.
    fn select_at(&mut self, x: f64, y: f64, tcz: Tcz) -> Option<SpotIndex> {
        let hit = self
            .store
            .select_topmost_at(x, y, tcz, self.config.spot_radius)
            .map(Spot::index);
        self.store.set_current(hit);
        self.store.set_pending(None);
        hit
    }

    /// 提交位置: 配置了拟合器时吸附到附近的拟合光斑.
    fn place(&self, x: f64, y: f64, stack: &ImageStack, tcz: Tcz) -> (f64, f64) {
        let fit = self.refiner.as_ref().and_then(|g| {
            let plane = stack.plane(tcz)?;
            g.locate_near(plane, x, y, self.config.spot_radius)
        });
        match fit {
            Some(f) => {
                log::debug!("Click ({x:.2}, {y:.2}) refined to ({:.2}, {:.2})", f.x, f.y);
                (f.x, f.y)
            }
            None => (x, y),
        }
    }

    fn commit(
        &mut self,
        x: f64,
        y: f64,
        (t, c, z): Tcz,
        parent: Option<SpotIndex>,
        events: &mut Vec<SessionEvent>,
    ) -> bool {
        let Some(index) = self.store.add_spot(x, y, (t, c, z), parent).map(Spot::index) else {
            return false;
        };
        self.store.set_current(Some(index));
        self.store.set_pending(None);

        if self.config.auto_advance {
            let next = (t + 1).min(self.bounds.t_max());
            if next != t {
                events.push(SessionEvent::PlaneChangeRequested((next, c, z)));
            }
        }
        true
    }

    fn end_tracking(&mut self) {
        self.is_tracking = false;
        self.track_origin = None;
        self.store.set_pending(None);
    }

    /// 选择被清除时结束追踪; 指针形状变化时追加事件.
    fn finish(&mut self, mut events: Vec<SessionEvent>) -> Vec<SessionEvent> {
        if self.store.current_index().is_none() && (self.is_tracking || self.store.pending().is_some()) {
            self.end_tracking();
        }
        let cursor = self.cursor();
        if cursor != self.cursor {
            self.cursor = cursor;
            events.push(SessionEvent::CursorChanged(cursor));
        }
        events
    }
}
