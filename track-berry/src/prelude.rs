//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{SpotIndex, Tcz, Timestamp};

pub use crate::image::{
    luts_for_stack, BitMode, Gaussian8, ImageStack, ImgWriteVis, Lut, LutPlane, SpotFit,
    StackBounds,
};
pub use crate::lineage::{LineageRole, LineageStore, PendingSpot, Spot};

pub use crate::session::{
    ContextAction, CursorKind, Key, Modifiers, MouseButton, PointerEvent, SceneItem,
    SessionConfig, SessionEvent, TrackingSession,
};

pub use crate::record::{RecordError, RecordResult, ViewerSettings};

pub use crate::plugin::{default_plugin, find_plugin, Plugin};

pub use crate::consts::color::Rgb;
