//! 显示查找表 (LUT): 把原始像素值经截断窗口和可选反相后,
//! 映射为灰度或彩色显示值. 每个通道各持有一个 [`Lut`].

use super::{percentile, ImageStack};
use crate::consts::color::{self, Rgb};
use ndarray::{Array2, Array3, ArrayView2, Axis, Dimension};
use num::ToPrimitive;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 命名色带, 值为满强度时的 RGB.
pub static LUT_RAMPS: [(&str, Rgb); 7] = [
    ("Gray", color::WHITE),
    ("Red", color::RED),
    ("Green", color::GREEN),
    ("Blue", color::BLUE),
    ("Magenta", color::MAGENTA),
    ("Yellow", color::YELLOW),
    ("Cyan", color::CYAN),
];

/// 默认的自动窗口截断百分比.
pub const AUTO_CUTOFF: f64 = 0.1;

/// 大小写不敏感地查找色带, 返回其规范名称.
pub fn find_lut(name: &str) -> Option<&'static str> {
    LUT_RAMPS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(n, _)| n)
}

fn ramp_color(name: &str) -> Rgb {
    match LUT_RAMPS.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(&(_, rgb)) => rgb,
        None => {
            log::warn!("Unknown LUT `{name}`, falling back to Gray");
            color::WHITE
        }
    }
}

/// 像素位深.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BitMode {
    /// `[0, 255]`
    Bit8,
    /// `[0, 1023]`
    Bit10,
    /// `[0, 4095]`
    Bit12,
    /// `[0, 16383]`
    Bit14,
    /// `[0, 65535]`
    Bit16,
    /// 浮点数据, 范围取样本的最小/最大值.
    Float,
}

impl BitMode {
    /// 全部整数位深, 从小到大.
    pub const INTEGRAL: [BitMode; 5] = [
        BitMode::Bit8,
        BitMode::Bit10,
        BitMode::Bit12,
        BitMode::Bit14,
        BitMode::Bit16,
    ];

    /// 位数. `Float` 返回 `None`.
    pub fn bits(self) -> Option<u32> {
        match self {
            BitMode::Bit8 => Some(8),
            BitMode::Bit10 => Some(10),
            BitMode::Bit12 => Some(12),
            BitMode::Bit14 => Some(14),
            BitMode::Bit16 => Some(16),
            BitMode::Float => None,
        }
    }

    /// 整数位深的取值范围 `[0, 2^n - 1]`. `Float` 返回 `None`.
    pub fn range(self) -> Option<(f64, f64)> {
        self.bits().map(|b| (0.0, ((1u32 << b) - 1) as f64))
    }
}

impl fmt::Display for BitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bits() {
            Some(b) => write!(f, "{b}-bit"),
            None => f.write_str("Float"),
        }
    }
}

/// 根据像素样本推断位深: 能容纳 `max` 的最小整数位深.
/// 非整数数据, 负值或超过 16 位的数据视为 `Float`.
pub fn infer_bit_mode(min: f64, max: f64, integral: bool) -> BitMode {
    if !integral || min < 0.0 || !max.is_finite() {
        return BitMode::Float;
    }
    BitMode::INTEGRAL
        .into_iter()
        .find(|m| m.range().is_some_and(|(_, hi)| max <= hi))
        .unwrap_or(BitMode::Float)
}

/// 可序列化的 LUT 设置, 随记录文件保存.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LutSettings {
    /// 色带名称.
    pub lut_name: String,
    /// 窗口下限.
    pub lut_lower: f64,
    /// 窗口上限.
    pub lut_upper: f64,
    /// 是否反相.
    pub lut_invert: bool,
    /// 位深.
    pub bit_mode: BitMode,
    /// 是否按当前平面自动调整窗口.
    pub auto_lut: bool,
    /// 自动窗口两端截断的百分比.
    pub auto_cutoff: f64,
}

/// 一个通道的 LUT.
#[derive(Clone, Debug, PartialEq)]
pub struct Lut {
    /// 色带名称.
    pub lut_name: String,
    /// 窗口下限.
    pub lut_lower: f64,
    /// 窗口上限.
    pub lut_upper: f64,
    /// 是否反相.
    pub lut_invert: bool,
    /// 位深.
    pub bit_mode: BitMode,
    /// 是否按当前平面自动调整窗口.
    pub auto_lut: bool,
    /// 自动窗口两端截断的百分比.
    pub auto_cutoff: f64,

    pixel_min: f64,
    pixel_max: f64,
    integral: bool,
}

impl Default for Lut {
    fn default() -> Self {
        let mut lut = Self {
            lut_name: "Gray".to_string(),
            lut_lower: 0.0,
            lut_upper: 255.0,
            lut_invert: false,
            bit_mode: BitMode::Bit8,
            auto_lut: false,
            auto_cutoff: AUTO_CUTOFF,
            pixel_min: 0.0,
            pixel_max: 255.0,
            integral: true,
        };
        lut.reset_cutoff();
        lut
    }
}

impl Lut {
    /// 由像素样本构建 LUT. 位深由样本推断, 窗口为整个位深范围.
    ///
    /// 样本中的 NaN/inf 被忽略; 没有有效像素时退化为默认 8 位 LUT.
    pub fn new<'a, I>(lut_name: &str, pixels: I, integral: bool) -> Self
    where
        I: IntoIterator<Item = &'a f32>,
    {
        let (min, max) = pixels
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .map_or((0.0, 255.0), |(lo, hi)| (lo as f64, hi as f64));

        let mut lut = Self {
            lut_name: find_lut(lut_name).unwrap_or("Gray").to_string(),
            pixel_min: min,
            pixel_max: max,
            integral,
            ..Default::default()
        };
        lut.reset_bit_mode();
        lut.reset_cutoff();
        lut
    }

    /// 当前位深对应的取值范围.
    pub fn bit_range(&self) -> (f64, f64) {
        self.bit_mode
            .range()
            .unwrap_or((self.pixel_min, self.pixel_max))
    }

    /// 重新根据样本推断位深.
    pub fn reset_bit_mode(&mut self) {
        self.bit_mode = infer_bit_mode(self.pixel_min, self.pixel_max, self.integral);
    }

    /// 窗口重置为整个位深范围.
    pub fn reset_cutoff(&mut self) {
        (self.lut_lower, self.lut_upper) = self.bit_range();
    }

    /// 依据 `image` 的百分位数设置窗口: 下限为第 `cutoff_percent` 百分位,
    /// 上限为第 `100 - cutoff_percent` 百分位. 图像没有有效像素时不变.
    pub fn set_range_by_image(&mut self, image: ArrayView2<f32>, cutoff_percent: f64) {
        let mut values: Vec<OrderedFloat<f32>> = image
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| OrderedFloat(v))
            .collect();
        if values.is_empty() {
            return;
        }
        values.sort_unstable();
        let cutoff = cutoff_percent.clamp(0.0, 50.0);
        self.lut_lower = percentile(&values, cutoff);
        self.lut_upper = percentile(&values, 100.0 - cutoff);
        self.auto_cutoff = cutoff;
    }

    /// 求像素值 `v` 在窗口中的相对位置 (0.0 <= value <= 1.0), 已考虑反相.
    ///
    /// `v` 无意义 (如 NaN) 时返回 `None`.
    pub fn eval<T: ToPrimitive>(&self, v: T) -> Option<f64> {
        let v = v.to_f64().filter(|v| !v.is_nan())?;
        let width = self.lut_upper - self.lut_lower;
        let ratio = if width <= 0.0 {
            if v > self.lut_lower {
                1.0
            } else {
                0.0
            }
        } else {
            ((v - self.lut_lower) / width).clamp(0.0, 1.0)
        };
        Some(if self.lut_invert { 1.0 - ratio } else { ratio })
    }

    /// 灰度值 (0 <= value <= 255). 无意义的像素映射为 0.
    #[inline]
    pub fn eval_gray<T: ToPrimitive>(&self, v: T) -> u8 {
        // 255, not 256.
        self.eval(v).map_or(0, |r| (r * 255.0) as u8)
    }

    /// 灰度映射整个平面.
    pub fn apply_gray(&self, image: ArrayView2<f32>) -> Array2<u8> {
        #[cfg(feature = "rayon")]
        let ans = ndarray::Zip::from(&image).par_map_collect(|&v| self.eval_gray(v));
        #[cfg(not(feature = "rayon"))]
        let ans = image.mapv(|v| self.eval_gray(v));
        ans
    }

    /// 按色带映射整个平面, 结果形状为 `(h, w, 3)`.
    pub fn apply_rgb(&self, image: ArrayView2<f32>) -> Array3<u8> {
        let ramp = ramp_color(&self.lut_name);
        let (h, w) = image.dim();
        let mut ans = Array3::<u8>::zeros((h, w, 3));
        for (mut px, &v) in ans.lanes_mut(Axis(2)).into_iter().zip(image.iter()) {
            let ratio = self.eval(v).unwrap_or(0.0);
            for (dst, &m) in px.iter_mut().zip(ramp.iter()) {
                *dst = (ratio * m as f64) as u8;
            }
        }
        ans
    }

    /// 当前位深范围上的直方图, 共 `bins` 个等宽区间. 最后一个区间包含上边界,
    /// 范围之外的像素不计入.
    pub fn histogram<T, D>(&self, image: ndarray::ArrayView<T, D>, bins: usize) -> Vec<usize>
    where
        T: ToPrimitive,
        D: Dimension,
    {
        let mut ans = vec![0; bins];
        if bins == 0 {
            return ans;
        }
        let (mut lo, mut hi) = self.bit_range();
        if hi <= lo {
            lo -= 0.5;
            hi += 0.5;
        }
        let step = (hi - lo) / bins as f64;
        for v in image.iter().filter_map(|v| v.to_f64()) {
            if !(lo..=hi).contains(&v) {
                continue;
            }
            let k = (((v - lo) / step) as usize).min(bins - 1);
            ans[k] += 1;
        }
        ans
    }

    /// 导出设置.
    pub fn settings(&self) -> LutSettings {
        LutSettings {
            lut_name: self.lut_name.clone(),
            lut_lower: self.lut_lower,
            lut_upper: self.lut_upper,
            lut_invert: self.lut_invert,
            bit_mode: self.bit_mode,
            auto_lut: self.auto_lut,
            auto_cutoff: self.auto_cutoff,
        }
    }

    /// 载入设置. 未知的色带名称回退到 Gray.
    pub fn load_settings(&mut self, settings: &LutSettings) {
        self.lut_name = match find_lut(&settings.lut_name) {
            Some(n) => n.to_string(),
            None => {
                log::warn!("Unknown LUT `{}` in settings, using Gray", settings.lut_name);
                "Gray".to_string()
            }
        };
        self.lut_lower = settings.lut_lower;
        self.lut_upper = settings.lut_upper;
        self.lut_invert = settings.lut_invert;
        self.bit_mode = settings.bit_mode;
        self.auto_lut = settings.auto_lut;
        self.auto_cutoff = settings.auto_cutoff;
    }
}

/// 为图像栈的每个通道建立 LUT. 单通道使用 Gray; 多通道依次轮换色带.
pub fn luts_for_stack(stack: &ImageStack) -> Vec<Lut> {
    let c_count = stack.c_count();
    (0..c_count)
        .map(|c| {
            let name = if c_count == 1 {
                "Gray"
            } else {
                LUT_RAMPS[c % LUT_RAMPS.len()].0
            };
            match stack.channel(c) {
                Some(view) => Lut::new(name, view.iter(), stack.is_integral()),
                None => Lut::default(),
            }
        })
        .collect()
}

/// 把若干通道的平面按各自 LUT 着色, 再逐像素取最大值合成.
///
/// `planes` 为空或形状不一致时返回 `None`.
pub fn composite_rgb(planes: &[ArrayView2<f32>], luts: &[Lut]) -> Option<Array3<u8>> {
    let dim = planes.first()?.dim();
    if planes.iter().any(|p| p.dim() != dim) {
        return None;
    }
    let mut ans = Array3::<u8>::zeros((dim.0, dim.1, 3));
    for (plane, lut) in planes.iter().zip(luts) {
        let rgb = lut.apply_rgb(plane.view());
        ans.zip_mut_with(&rgb, |a, &b| *a = (*a).max(b));
    }
    Some(ans)
}

/// 依次把 `settings` 载入 `luts`, 多余的一方被忽略.
pub fn restore_lut_settings(luts: &mut [Lut], settings: &[LutSettings]) {
    for (lut, s) in luts.iter_mut().zip(settings) {
        lut.load_settings(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    #[test]
    fn test_find_lut() {
        assert_eq!(find_lut("magenta"), Some("Magenta"));
        assert_eq!(find_lut("GRAY"), Some("Gray"));
        assert_eq!(find_lut("Fire"), None);
    }

    #[test]
    fn test_infer_bit_mode() {
        assert_eq!(infer_bit_mode(0.0, 200.0, true), BitMode::Bit8);
        assert_eq!(infer_bit_mode(0.0, 255.0, true), BitMode::Bit8);
        assert_eq!(infer_bit_mode(0.0, 256.0, true), BitMode::Bit10);
        assert_eq!(infer_bit_mode(3.0, 4000.0, true), BitMode::Bit12);
        assert_eq!(infer_bit_mode(0.0, 65535.0, true), BitMode::Bit16);
        assert_eq!(infer_bit_mode(0.0, 70000.0, true), BitMode::Float);
        assert_eq!(infer_bit_mode(-1.0, 10.0, true), BitMode::Float);
        assert_eq!(infer_bit_mode(0.0, 10.0, false), BitMode::Float);
        assert_eq!(BitMode::Bit12.to_string(), "12-bit");
    }

    #[test]
    fn test_lut_window_eval() {
        let mut lut = Lut::new("Gray", [0.0f32, 1000.0].iter(), true);
        assert_eq!(lut.bit_mode, BitMode::Bit10);
        assert_eq!(lut.bit_range(), (0.0, 1023.0));

        lut.lut_lower = 100.0;
        lut.lut_upper = 200.0;
        assert_eq!(lut.eval(f32::NAN), None);
        assert_eq!(lut.eval_gray(50.0f32), 0);
        assert_eq!(lut.eval_gray(100.0f32), 0);
        assert_eq!(lut.eval_gray(150.0f32), (255.0 * 0.5) as u8);
        assert_eq!(lut.eval_gray(200.0f32), 255);
        assert_eq!(lut.eval_gray(1e9f32), 255);
        assert!(float_eq(lut.eval(125u16).unwrap(), 0.25));

        lut.lut_invert = true;
        assert_eq!(lut.eval_gray(100.0f32), 255);
        assert!(float_eq(lut.eval(125u16).unwrap(), 0.75));

        lut.reset_cutoff();
        assert_eq!((lut.lut_lower, lut.lut_upper), (0.0, 1023.0));
    }

    #[test]
    fn test_float_lut_uses_sample_range() {
        let lut = Lut::new("Red", [0.5f32, f32::NAN, 2.5].iter(), false);
        assert_eq!(lut.bit_mode, BitMode::Float);
        assert_eq!(lut.bit_range(), (0.5, 2.5));
    }

    #[test]
    fn test_set_range_by_image() {
        let image = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f32);
        let mut lut = Lut::default();
        lut.set_range_by_image(image.view(), 10.0);
        assert!(float_eq(lut.lut_lower, 9.9));
        assert!(float_eq(lut.lut_upper, 89.1));
        assert!(float_eq(lut.auto_cutoff, 10.0));

        let empty = Array2::<f32>::from_elem((2, 2), f32::NAN);
        lut.set_range_by_image(empty.view(), 1.0);
        assert!(float_eq(lut.lut_lower, 9.9));
    }

    #[test]
    fn test_apply_gray_and_rgb() {
        let image = arr2(&[[0.0f32, 255.0], [f32::NAN, 127.5]]);
        let lut = Lut::default();
        assert_eq!(lut.apply_gray(image.view()), arr2(&[[0u8, 255], [0, 127]]));

        let yellow = Lut {
            lut_name: "Yellow".to_string(),
            ..Default::default()
        };
        let rgb = yellow.apply_rgb(image.view());
        assert_eq!(rgb.dim(), (2, 2, 3));
        assert_eq!(rgb.slice(ndarray::s![0, 1, ..]).to_vec(), vec![255, 255, 0]);
        assert_eq!(rgb.slice(ndarray::s![1, 1, ..]).to_vec(), vec![127, 127, 0]);
    }

    #[test]
    fn test_composite_takes_max() {
        let a = arr2(&[[255.0f32, 0.0]]);
        let b = arr2(&[[0.0f32, 255.0]]);
        let red = Lut {
            lut_name: "Red".to_string(),
            ..Default::default()
        };
        let green = Lut {
            lut_name: "Green".to_string(),
            ..Default::default()
        };
        let out = composite_rgb(&[a.view(), b.view()], &[red, green]).unwrap();
        assert_eq!(out.slice(ndarray::s![0, 0, ..]).to_vec(), vec![255, 0, 0]);
        assert_eq!(out.slice(ndarray::s![0, 1, ..]).to_vec(), vec![0, 255, 0]);

        let c = arr2(&[[1.0f32]]);
        assert!(composite_rgb(&[a.view(), c.view()], &[]).is_none());
        assert!(composite_rgb(&[], &[]).is_none());
    }

    #[test]
    fn test_histogram() {
        let image = arr2(&[[0.0f32, 127.0, 128.0, 255.0, 300.0]]);
        let lut = Lut::default();
        assert_eq!(lut.histogram(image.view(), 2), vec![2, 2]);
        assert!(lut.histogram(image.view(), 0).is_empty());
    }

    #[test]
    fn test_luts_for_stack_and_restore() {
        let stack = ImageStack::zeros((1, 3, 1, 4, 4));
        let mut luts = luts_for_stack(&stack);
        let names: Vec<_> = luts.iter().map(|l| l.lut_name.as_str()).collect();
        assert_eq!(names, vec!["Gray", "Red", "Green"]);

        let single = luts_for_stack(&ImageStack::zeros((1, 1, 1, 4, 4)));
        assert_eq!(single[0].lut_name, "Gray");

        let mut saved = luts[1].settings();
        saved.lut_name = "cyan".to_string();
        saved.lut_upper = 42.0;
        saved.lut_invert = true;
        let json = serde_json::to_string(&vec![saved]).unwrap();
        let settings: Vec<LutSettings> = serde_json::from_str(&json).unwrap();
        restore_lut_settings(&mut luts, &settings);
        assert_eq!(luts[0].lut_name, "Cyan");
        assert_eq!(luts[0].lut_upper, 42.0);
        assert!(luts[0].lut_invert);
        assert_eq!(luts[1].lut_name, "Red");
    }
}
