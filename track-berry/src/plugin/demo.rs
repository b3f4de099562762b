//! 演示插件: 每次点击在图像上随机散布一些彩色圆点.

use super::Plugin;
use crate::consts::color::DEMO_PALETTE;
use crate::consts::{DEMO_DIAMETER, DEMO_DOTS};
use crate::image::ImageStack;
use crate::record::{RecordResult, ViewerSettings};
use crate::session::{CursorKind, Key, PointerEvent, SceneItem, SessionEvent};
use crate::Tcz;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

pub(super) const PLUGIN_NAME: &str = "Demo";
pub(super) const PRIORITY: i32 = 100;
pub(super) const RECORD_SUFFIX: &str = "_demo.json";

/// 演示插件. 没有任何需要保存的记录.
#[derive(Debug)]
pub struct Demo {
    rng: StdRng,
    dots: Vec<SceneItem>,
    message: String,
}

impl Default for Demo {
    fn default() -> Self {
        Self::new()
    }
}

impl Demo {
    /// 以随机种子创建.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// 以固定种子创建, 圆点位置可复现.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            dots: Vec::new(),
            message: String::new(),
        }
    }

    fn scatter(&mut self, width: usize, height: usize) {
        let radius = DEMO_DIAMETER / 2.0;
        let rng = &mut self.rng;
        self.dots = (0..DEMO_DOTS)
            .map(|i| SceneItem::Dot {
                x: width as f64 * rng.gen::<f64>(),
                y: height as f64 * rng.gen::<f64>(),
                radius,
                color: DEMO_PALETTE[i % DEMO_PALETTE.len()],
            })
            .collect();
    }
}

impl Plugin for Demo {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn record_suffix(&self) -> &'static str {
        RECORD_SUFFIX
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn help_message(&self) -> &'static str {
        "Demo class for plugin."
    }

    fn status_message(&self) -> String {
        self.message.clone()
    }

    fn list_scene_items(&self, _tcz: Tcz) -> Vec<SceneItem> {
        self.dots.clone()
    }

    fn key_pressed(&mut self, key: Key, _stack: &ImageStack, _tcz: Tcz) -> Vec<SessionEvent> {
        match key {
            Key::Control => vec![SessionEvent::CursorChanged(CursorKind::Cross)],
            _ => Vec::new(),
        }
    }

    fn key_released(&mut self, key: Key, _stack: &ImageStack, _tcz: Tcz) -> Vec<SessionEvent> {
        match key {
            Key::Control => vec![SessionEvent::CursorChanged(CursorKind::Arrow)],
            _ => Vec::new(),
        }
    }

    fn mouse_pressed(&mut self, ev: &PointerEvent, stack: &ImageStack, _tcz: Tcz) -> Vec<SessionEvent> {
        self.message = format!("Mouse clicked: ({:.2}, {:.2})", ev.x, ev.y);
        self.scatter(stack.width(), stack.height());
        vec![SessionEvent::ViewInvalidated]
    }

    fn load_records(&mut self, _path: &Path) -> RecordResult<ViewerSettings> {
        Ok(ViewerSettings::default())
    }

    fn load_records_anyway(&mut self, path: &Path) -> RecordResult<ViewerSettings> {
        self.load_records(path)
    }

    fn save_records(&mut self, _path: &Path, _settings: &ViewerSettings) -> RecordResult<()> {
        Ok(())
    }

    fn clear_records(&mut self) {
        self.dots.clear();
        self.message.clear();
    }
}
