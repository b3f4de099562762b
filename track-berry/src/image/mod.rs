//! 图像栈, 显示 LUT, 光斑定位与图像导出.

use ordered_float::OrderedFloat;

pub mod gaussian8;
pub mod lut;
pub mod path;
mod save;
mod stack;

pub use gaussian8::{DropReport, Gaussian8, SpotFit};
pub use lut::{
    composite_rgb, find_lut, infer_bit_mode, luts_for_stack, restore_lut_settings, BitMode, Lut,
    LutSettings,
};
pub use path::{stem, with_suffix, PathError};
pub use save::{ImgWriteRaw, ImgWriteVis, LutPlane};
pub use stack::{ChunkedRead, ImageStack, StackBounds, StackError, StackProperties, StackResult};

/// 线性插值的百分位数 (`p` 以百分比计). `sorted` 必须非空且升序.
pub(crate) fn percentile(sorted: &[OrderedFloat<f32>], p: f64) -> f64 {
    let pos = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (a, b) = (sorted[lo].0 as f64, sorted[hi].0 as f64);
    a + (b - a) * (pos - lo as f64)
}
