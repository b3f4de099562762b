//! 标注插件.
//!
//! 插件集合是封闭的: [`Demo`], [`Spt`] (及其高斯拟合变体) 在 [`PLUGINS`] 中显式注册,
//! 启动时按名称选择.

mod demo;
mod spt;

pub use demo::Demo;
pub use spt::Spt;

use crate::image::{with_suffix, ImageStack, PathError};
use crate::record::{RecordResult, ViewerSettings};
use crate::session::{ContextAction, Key, PointerEvent, SceneItem, SessionEvent, TrackingSession};
use crate::Tcz;
use std::path::{Path, PathBuf};

/// 插件的能力集合: 绘制, 手势, 记录读写和帮助文字.
///
/// 所有手势方法都返回本次产生的会话事件, 外壳应按顺序处理.
pub trait Plugin {
    /// 插件名. 同时写入记录文件的 `summary.plugin_name`.
    fn name(&self) -> &'static str;

    /// 记录文件名后缀, 如 `_track.json`.
    fn record_suffix(&self) -> &'static str;

    /// 优先级. 数值越小越优先, 用于选择默认插件.
    fn priority(&self) -> i32;

    /// 帮助文字.
    fn help_message(&self) -> &'static str;

    /// 状态栏文字.
    fn status_message(&self) -> String;

    /// 平面 `tcz` 上需要绘制的图元.
    fn list_scene_items(&self, tcz: Tcz) -> Vec<SceneItem>;

    /// 按键按下.
    fn key_pressed(&mut self, key: Key, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent>;

    /// 按键松开.
    fn key_released(&mut self, key: Key, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent>;

    /// 鼠标按下.
    fn mouse_pressed(&mut self, ev: &PointerEvent, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent>;

    /// 鼠标移动.
    fn mouse_moved(&mut self, _ev: &PointerEvent, _stack: &ImageStack, _tcz: Tcz) -> Vec<SessionEvent> {
        Vec::new()
    }

    /// 右键菜单操作.
    fn context_action(&mut self, _action: ContextAction) -> Vec<SessionEvent> {
        Vec::new()
    }

    /// 当前关联的记录文件.
    fn record_path(&self) -> Option<&Path> {
        None
    }

    /// 读取记录文件. 来源不符时返回错误, 内存状态不变.
    fn load_records(&mut self, path: &Path) -> RecordResult<ViewerSettings>;

    /// 读取记录文件, 忽略来源检查 (用户确认后).
    fn load_records_anyway(&mut self, path: &Path) -> RecordResult<ViewerSettings>;

    /// 把记录与 `settings` 写入 `path`, 并把它作为关联的记录文件.
    fn save_records(&mut self, path: &Path, settings: &ViewerSettings) -> RecordResult<()>;

    /// 丢弃内存中的记录和关联的文件名.
    fn clear_records(&mut self);

    /// 是否有未保存的修改.
    fn is_modified(&self) -> bool {
        false
    }

    /// 追踪会话 (如果插件有的话).
    fn session(&self) -> Option<&TrackingSession> {
        None
    }

    /// 图像 `image_path` 对应的默认记录路径.
    fn default_record_path(&self, image_path: &Path) -> Result<PathBuf, PathError> {
        with_suffix(image_path, self.record_suffix())
    }
}

/// 注册表中的一项.
#[derive(Copy, Clone)]
pub struct PluginEntry {
    /// 插件名.
    pub name: &'static str,
    /// 优先级.
    pub priority: i32,
    /// 记录文件名后缀.
    pub record_suffix: &'static str,
    ctor: fn() -> Box<dyn Plugin>,
}

impl PluginEntry {
    /// 创建插件实例.
    #[inline]
    pub fn create(&self) -> Box<dyn Plugin> {
        (self.ctor)()
    }
}

impl std::fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("record_suffix", &self.record_suffix)
            .finish()
    }
}

fn new_demo() -> Box<dyn Plugin> {
    Box::new(Demo::new())
}

fn new_spt() -> Box<dyn Plugin> {
    Box::new(Spt::new())
}

fn new_spt_gfit() -> Box<dyn Plugin> {
    Box::new(Spt::with_gaussian_fit())
}

/// 全部已注册插件.
pub static PLUGINS: &[PluginEntry] = &[
    PluginEntry {
        name: demo::PLUGIN_NAME,
        priority: demo::PRIORITY,
        record_suffix: demo::RECORD_SUFFIX,
        ctor: new_demo,
    },
    PluginEntry {
        name: spt::PLUGIN_NAME,
        priority: spt::PRIORITY,
        record_suffix: spt::RECORD_SUFFIX,
        ctor: new_spt,
    },
    PluginEntry {
        name: spt::GFIT_PLUGIN_NAME,
        priority: spt::GFIT_PRIORITY,
        record_suffix: spt::RECORD_SUFFIX,
        ctor: new_spt_gfit,
    },
];

/// 按名称 (忽略大小写) 查找插件.
pub fn find_plugin(name: &str) -> Option<&'static PluginEntry> {
    PLUGINS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// 优先级数值最小的插件.
pub fn default_plugin() -> &'static PluginEntry {
    PLUGINS
        .iter()
        .min_by_key(|p| p.priority)
        .unwrap_or(&PLUGINS[0])
}

/// 按优先级排序的插件名.
pub fn plugin_names() -> Vec<&'static str> {
    let mut entries: Vec<_> = PLUGINS.iter().collect();
    entries.sort_by_key(|p| p.priority);
    entries.into_iter().map(|p| p.name).collect()
}
