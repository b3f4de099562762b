//! 输入手势和会话事件.
//!
//! 会话不依赖任何 GUI 工具包: 外壳把鼠标/键盘事件翻译为这里的类型,
//! 再按顺序消费返回的 [`SessionEvent`].

use crate::Tcz;

/// 鼠标按键.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MouseButton {
    /// 主键 (通常为左键).
    Primary,
    /// 副键 (通常为右键).
    Secondary,
    /// 中键.
    Middle,
}

/// 键盘修饰键状态.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Modifiers {
    /// Ctrl (macOS 上为 Command).
    pub ctrl: bool,
    /// Shift.
    pub shift: bool,
    /// Alt.
    pub alt: bool,
}

impl Modifiers {
    /// 没有修饰键.
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
    };

    /// 仅 Ctrl.
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
        alt: false,
    };

    /// 仅 Shift.
    pub const SHIFT: Modifiers = Modifiers {
        ctrl: false,
        shift: true,
        alt: false,
    };

    /// 是否没有任何修饰键.
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// 指针事件. 坐标为图像像素坐标 (场景坐标).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerEvent {
    /// 横坐标.
    pub x: f64,
    /// 纵坐标.
    pub y: f64,
    /// 按下的按键; 悬停移动时为 `None`.
    pub button: Option<MouseButton>,
    /// 修饰键.
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// 在 `(x, y)` 处按下 `button`, 没有修饰键.
    #[inline]
    pub fn new(x: f64, y: f64, button: MouseButton) -> Self {
        Self {
            x,
            y,
            button: Some(button),
            modifiers: Modifiers::NONE,
        }
    }

    /// 主键单击.
    #[inline]
    pub fn click(x: f64, y: f64) -> Self {
        Self::new(x, y, MouseButton::Primary)
    }

    /// 副键单击.
    #[inline]
    pub fn right_click(x: f64, y: f64) -> Self {
        Self::new(x, y, MouseButton::Secondary)
    }

    /// 未按任何键的移动.
    #[inline]
    pub fn hover(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            button: None,
            modifiers: Modifiers::NONE,
        }
    }

    /// 设置修饰键.
    #[inline]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// 会话关心的按键.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    /// 可打印字符.
    Char(char),
    /// Escape.
    Escape,
    /// Backspace.
    Backspace,
    /// Ctrl.
    Control,
    /// 其他按键.
    Other,
}

/// 鼠标指针形状.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum CursorKind {
    /// 普通箭头.
    #[default]
    Arrow,
    /// 十字, 表示下一次点击会放置 spot.
    Cross,
}

/// 右键菜单中的操作.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ContextAction {
    /// 选中 spot 的 z 加一.
    IncrementZ,
    /// 选中 spot 的 z 减一.
    DecrementZ,
    /// 删除选中 spot.
    RemoveSpot,
    /// 删除选中 spot 及其全部后代.
    RemoveSubtree,
    /// 删除选中 spot 所在的整条轨迹.
    RemoveTrack,
}

impl ContextAction {
    /// 菜单中的全部操作, 按显示顺序.
    pub const ALL: [ContextAction; 5] = [
        ContextAction::IncrementZ,
        ContextAction::DecrementZ,
        ContextAction::RemoveSpot,
        ContextAction::RemoveSubtree,
        ContextAction::RemoveTrack,
    ];

    /// 菜单文字.
    pub fn label(self) -> &'static str {
        match self {
            ContextAction::IncrementZ => "Increment Z index",
            ContextAction::DecrementZ => "Decrement Z index",
            ContextAction::RemoveSpot => "Remove this spot",
            ContextAction::RemoveSubtree => "Remove this and linked spots",
            ContextAction::RemoveTrack => "Remove the entire track",
        }
    }
}

/// 会话向外壳发出的通知, 外壳应按顺序同步处理.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SessionEvent {
    /// 场景需要重绘.
    ViewInvalidated,
    /// 指针形状改变.
    CursorChanged(CursorKind),
    /// 图像视图应获得键盘焦点.
    FocusRequested,
    /// 请求切换到另一平面.
    PlaneChangeRequested(Tcz),
    /// 在指针处弹出右键菜单.
    ContextMenuRequested(Vec<ContextAction>),
}
