//! 单颗粒追踪插件, 以及提交位置时做高斯拟合的变体.

use super::Plugin;
use crate::image::{Gaussian8, ImageStack};
use crate::lineage::LineageStore;
use crate::record::{self, RecordResult, ViewerSettings};
use crate::session::{
    ContextAction, Key, PointerEvent, SceneItem, SessionConfig, SessionEvent, TrackingSession,
};
use crate::Tcz;
use std::path::{Path, PathBuf};

pub(super) const PLUGIN_NAME: &str = "Particle Tracking";
pub(super) const PRIORITY: i32 = 10;
pub(super) const GFIT_PLUGIN_NAME: &str = "Particle Tracking with Gaussian Fit";
pub(super) const GFIT_PRIORITY: i32 = 20;
pub(super) const RECORD_SUFFIX: &str = "_track.json";

const HELP: &str = "\
Single-particle tracking
  Ctrl + click      start a new track at the clicked position
  Click             add a child of the selected spot, or select a spot
  Shift + click     move the selected spot to the clicked position
  Drag              move the selected spot within its plane
  Right click       spot menu (z index, removal)
  Alphanumeric key  set the label of the selected spot
  Backspace         clear the label
  ESC               finish tracking and return to the first plane";

const GFIT_HELP: &str = "\
Single-particle tracking with Gaussian fitting
  Same gestures as Particle Tracking. Placed spots snap to the nearest
  fitted spot within the spot radius; the clicked position is used
  when no spot is fitted.";

/// 单颗粒追踪插件.
#[derive(Debug)]
pub struct Spt {
    name: &'static str,
    priority: i32,
    help: &'static str,
    session: TrackingSession,
    record_path: Option<PathBuf>,
}

impl Default for Spt {
    fn default() -> Self {
        Self::new()
    }
}

impl Spt {
    /// 按原样放置点击位置.
    pub fn new() -> Self {
        Self {
            name: PLUGIN_NAME,
            priority: PRIORITY,
            help: HELP,
            session: TrackingSession::new(SessionConfig::default()),
            record_path: None,
        }
    }

    /// 放置前用 [`Gaussian8`] 精化点击位置.
    pub fn with_gaussian_fit() -> Self {
        Self {
            name: GFIT_PLUGIN_NAME,
            priority: GFIT_PRIORITY,
            help: GFIT_HELP,
            session: TrackingSession::new(SessionConfig::default())
                .with_refiner(Gaussian8::default()),
            record_path: None,
        }
    }

    /// 可变追踪会话.
    #[inline]
    pub fn session_mut(&mut self) -> &mut TrackingSession {
        &mut self.session
    }

    /// 隐藏或显示全部轨迹.
    #[inline]
    pub fn set_hidden(&mut self, hidden: bool) -> Vec<SessionEvent> {
        self.session.set_hidden(hidden)
    }

    fn adopt(&mut self, path: &Path, loaded: (LineageStore, ViewerSettings)) -> ViewerSettings {
        let (store, settings) = loaded;
        self.session.replace_store(store);
        if let Some(config) = &settings.session {
            self.session.set_config(config.clone());
        }
        self.record_path = Some(path.to_path_buf());
        settings
    }
}

impl Plugin for Spt {
    fn name(&self) -> &'static str {
        self.name
    }

    fn record_suffix(&self) -> &'static str {
        RECORD_SUFFIX
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn help_message(&self) -> &'static str {
        self.help
    }

    fn status_message(&self) -> String {
        self.session.status_message()
    }

    fn list_scene_items(&self, tcz: Tcz) -> Vec<SceneItem> {
        self.session.list_visible_items(tcz)
    }

    fn key_pressed(&mut self, key: Key, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent> {
        self.session.key_pressed(key, stack, tcz)
    }

    fn key_released(&mut self, key: Key, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent> {
        self.session.key_released(key, stack, tcz)
    }

    fn mouse_pressed(&mut self, ev: &PointerEvent, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent> {
        self.session.mouse_pressed(ev, stack, tcz)
    }

    fn mouse_moved(&mut self, ev: &PointerEvent, stack: &ImageStack, tcz: Tcz) -> Vec<SessionEvent> {
        self.session.mouse_moved(ev, stack, tcz)
    }

    fn context_action(&mut self, action: ContextAction) -> Vec<SessionEvent> {
        self.session.context_action(action)
    }

    fn record_path(&self) -> Option<&Path> {
        self.record_path.as_deref()
    }

    fn load_records(&mut self, path: &Path) -> RecordResult<ViewerSettings> {
        let loaded = record::load(path, self.name)?;
        Ok(self.adopt(path, loaded))
    }

    fn load_records_anyway(&mut self, path: &Path) -> RecordResult<ViewerSettings> {
        let loaded = record::load_anyway(path, self.name)?;
        Ok(self.adopt(path, loaded))
    }

    fn save_records(&mut self, path: &Path, settings: &ViewerSettings) -> RecordResult<()> {
        let settings = ViewerSettings {
            session: Some(self.session.config().clone()),
            ..settings.clone()
        };
        record::save(path, self.name, self.session.store(), &settings)?;
        self.session.store_mut().mark_saved();
        self.record_path = Some(path.to_path_buf());
        Ok(())
    }

    fn clear_records(&mut self) {
        self.session.clear();
        self.record_path = None;
    }

    fn is_modified(&self) -> bool {
        self.session.store().is_modified()
    }

    fn session(&self) -> Option<&TrackingSession> {
        Some(&self.session)
    }
}
