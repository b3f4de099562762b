//! 亚像素高斯光斑定位.
//!
//! 流程: 截断像素值 -> 标准化并反相 -> 高斯-拉普拉斯 (LoG) 滤波 -> 寻找局部极大值 ->
//! 在每个极大值的 3x3 邻域上对 `ln(响应)` 做二次拟合, 得到亚像素坐标和直径.
//! 拟合结果不合理 (偏移过大, 坐标越界或为 NaN, 直径过大, 与更亮的光斑重复) 的
//! 候选点被丢弃, 并计入 [`DropReport`].

use super::percentile;
use ndarray::{s, Array2, ArrayView, ArrayView2, Dimension};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
    }
}

/// 一个拟合得到的光斑.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotFit {
    /// 所在平面的序号 (在 [`Gaussian8::fit_planes`] 的输入中).
    pub plane: usize,
    /// 平面内的序号.
    pub index: usize,
    /// 亚像素 x 坐标 (列).
    pub x: f64,
    /// 亚像素 y 坐标 (行).
    pub y: f64,
    /// 直径 (像素).
    pub diameter: f64,
    /// 极大值像素处的原始强度.
    pub intensity: f64,
    /// 拟合残差平方和.
    pub fit_error: f64,
    /// 以 `|ln f|` 归一化的残差平方和.
    pub chi_square: f64,
}

/// 各原因丢弃的候选点个数.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DropReport {
    /// 亚像素修正量不小于 1 像素 (或为 NaN).
    pub large_subpixel_shift: usize,
    /// 坐标落在图像之外或为 NaN.
    pub nan_coordinate: usize,
    /// 直径大于上限 (或为 NaN).
    pub large_diameter: usize,
    /// 距离更亮的已接受光斑过近.
    pub duplicate: usize,
}

impl DropReport {
    /// 丢弃总数.
    #[inline]
    pub fn total(&self) -> usize {
        self.large_subpixel_shift + self.nan_coordinate + self.large_diameter + self.duplicate
    }
}

impl fmt::Display for DropReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "large_subpixel_shift: {}, nan_coordinate: {}, large_diameter: {}, duplicate: {}",
            self.large_subpixel_shift, self.nan_coordinate, self.large_diameter, self.duplicate
        )
    }
}

/// 定位器参数.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gaussian8 {
    /// LoG 滤波的 σ, 约为光斑直径.
    pub laplace: f64,
    /// 局部极大值的邻域半宽 (通常为 1).
    pub min_distance: usize,
    /// 局部极大值的响应阈值.
    pub threshold_abs: f64,
    /// 直径上限.
    pub max_diameter: f64,
    /// 重复判定距离.
    pub dup_threshold: f64,
    /// 像素截断下限.
    pub image_clip_min: f64,
    /// 像素截断上限.
    pub image_clip_max: f64,
}

impl Default for Gaussian8 {
    fn default() -> Self {
        Self {
            laplace: 2.0,
            min_distance: 1,
            threshold_abs: 0.006,
            max_diameter: 10.0,
            dup_threshold: 3.0,
            image_clip_min: 0.0,
            image_clip_max: i32::MAX as f64,
        }
    }
}

impl Gaussian8 {
    /// 以全部有效像素的 0.1% 和 99.9% 百分位设置截断窗口.
    pub fn set_image_clip<D: Dimension>(&mut self, pixels: ArrayView<f32, D>) {
        let mut values: Vec<OrderedFloat<f32>> = pixels
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| OrderedFloat(v))
            .collect();
        if values.is_empty() {
            return;
        }
        values.sort_unstable();
        self.image_clip_min = percentile(&values, 0.1);
        self.image_clip_max = percentile(&values, 99.9);
    }

    /// 把像素截断到 `[image_clip_min, image_clip_max]`.
    pub fn clip_array(&self, image: ArrayView2<f32>) -> Array2<f64> {
        let (lo, hi) = (self.image_clip_min, self.image_clip_max.max(self.image_clip_min));
        image.mapv(|v| (v as f64).clamp(lo, hi))
    }

    /// 标准化为 `-(v - max) / ptp` (亮光斑变为 0 附近的谷), 再做 LoG 滤波.
    /// 光斑处的响应为正. 图像恒定时返回全零.
    pub fn standardize_and_filter_image(&self, image: Array2<f64>) -> Array2<f64> {
        let (min, max) = image
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let ptp = max - min;
        if !(ptp > 0.0 && ptp.is_finite()) {
            return Array2::zeros(image.dim());
        }
        let standardized = image.mapv_into(|v| -(v - max) / ptp);
        gaussian_laplace(&standardized, self.laplace)
    }

    /// 在滤波后的图像 `filtered` 上寻找并拟合光斑. `input` 只用于读取强度.
    pub fn gaussian_fitting(
        &self,
        input: ArrayView2<f32>,
        filtered: ArrayView2<f64>,
    ) -> (Vec<SpotFit>, DropReport) {
        let (h, w) = filtered.dim();
        let mut report = DropReport::default();
        let mut accepted = Vec::new();

        for (r, c) in peak_local_max(filtered, self.min_distance, self.threshold_abs) {
            let Some(fit) = fit_log_quadratic(filtered, r, c) else {
                report.large_subpixel_shift += 1;
                continue;
            };
            let (shift_x, shift_y) = fit.shift();
            if !(shift_x.abs() < 1.0 && shift_y.abs() < 1.0) {
                report.large_subpixel_shift += 1;
                continue;
            }
            let x = c as f64 - shift_x;
            let y = r as f64 - shift_y;
            if !((0.0..=w as f64).contains(&x) && (0.0..=h as f64).contains(&y)) {
                report.nan_coordinate += 1;
                continue;
            }
            let diameter = fit.diameter();
            if !(diameter <= self.max_diameter) {
                report.large_diameter += 1;
                continue;
            }
            accepted.push(SpotFit {
                plane: 0,
                index: 0,
                x,
                y,
                diameter,
                intensity: input[(r, c)] as f64,
                fit_error: fit.fit_error,
                chi_square: fit.chi_square,
            });
        }

        let (mut ans, duplicate) = drop_duplicates(accepted, self.dup_threshold);
        report.duplicate = duplicate;
        for (i, f) in ans.iter_mut().enumerate() {
            f.index = i;
        }
        (ans, report)
    }

    fn fit(&self, input: ArrayView2<f32>) -> (Vec<SpotFit>, DropReport) {
        let filtered = self.standardize_and_filter_image(self.clip_array(input));
        self.gaussian_fitting(input, filtered.view())
    }

    /// 定位一个平面中的全部光斑, 按强度降序.
    pub fn fitting_image(&self, input: ArrayView2<f32>) -> (Vec<SpotFit>, DropReport) {
        let (ans, report) = self.fit(input);
        log::info!("Found {} spots. Dropped spots: {report}", ans.len());
        (ans, report)
    }

    /// 定位多个平面. 结果中 `SpotFit::plane` 为平面在 `planes` 中的序号.
    pub fn fit_planes(&self, planes: &[ArrayView2<f32>]) -> Vec<(Vec<SpotFit>, DropReport)> {
        let op = |(k, plane): (usize, &ArrayView2<f32>)| {
            let (mut fits, report) = self.fit(plane.view());
            fits.iter_mut().for_each(|f| f.plane = k);
            (fits, report)
        };

        #[cfg(feature = "rayon")]
        let ans: Vec<_> = planes.par_iter().enumerate().map(op).collect();
        #[cfg(not(feature = "rayon"))]
        let ans: Vec<_> = planes.iter().enumerate().map(op).collect();

        let found: usize = ans.iter().map(|(f, _)| f.len()).sum();
        let dropped: usize = ans.iter().map(|(_, r)| r.total()).sum();
        log::info!(
            "Found {found} spots in {} planes, dropped {dropped}",
            planes.len()
        );
        ans
    }

    /// 在 `(x, y)` 附近的窗口内定位光斑, 返回距离 `(x, y)` 不超过 `radius`
    /// 的最近光斑 (坐标已换算回整个平面).
    pub fn locate_near(&self, plane: ArrayView2<f32>, x: f64, y: f64, radius: f64) -> Option<SpotFit> {
        let (h, w) = plane.dim();
        let margin = radius.max(0.0) + (4.0 * self.laplace).ceil() + 2.0;
        let bound = |v: f64, n: usize| v.floor().clamp(0.0, n as f64) as usize;
        let (r0, r1) = (bound(y - margin, h), bound(y + margin + 1.0, h));
        let (c0, c1) = (bound(x - margin, w), bound(x + margin + 1.0, w));
        if r1 < r0 + 3 || c1 < c0 + 3 {
            return None;
        }

        let (fits, report) = self.fit(plane.slice(s![r0..r1, c0..c1]));
        log::debug!(
            "Localized {} spots around ({x:.2}, {y:.2}), dropped {}",
            fits.len(),
            report.total()
        );
        fits.into_iter()
            .map(|mut f| {
                f.x += c0 as f64;
                f.y += r0 as f64;
                f
            })
            .map(|f| (OrderedFloat((f.x - x).hypot(f.y - y)), f))
            .filter(|(d, _)| d.0 <= radius)
            .min_by_key(|(d, _)| *d)
            .map(|(_, f)| f)
    }
}

/// 3x3 邻域上 `ln f` 的二次模型
/// `c00 + c10 dx + c20 dx^2 + c01 dy + c02 dy^2`.
#[derive(Copy, Clone, Debug)]
struct QuadFit {
    c10: f64,
    c01: f64,
    c20: f64,
    c02: f64,
    fit_error: f64,
    chi_square: f64,
}

impl QuadFit {
    /// 亚像素修正量 `(x, y)`, 坐标为像素中心减去修正量.
    #[inline]
    fn shift(&self) -> (f64, f64) {
        (0.5 * self.c10 / self.c20, 0.5 * self.c01 / self.c02)
    }

    #[inline]
    fn diameter(&self) -> f64 {
        2.0 * (-(0.5 / self.c20 + 0.5 / self.c02) / 2.0).sqrt()
    }
}

/// `(r, c)` 必须不在图像边缘. 任一对数不是有限值时返回 `None`.
fn fit_log_quadratic(f: ArrayView2<f64>, r: usize, c: usize) -> Option<QuadFit> {
    // l[dy + 1][dx + 1] = ln f[r + dy, c + dx]
    let mut l = [[0.0; 3]; 3];
    for (dy, row) in l.iter_mut().enumerate() {
        for (dx, v) in row.iter_mut().enumerate() {
            *v = f[(r + dy - 1, c + dx - 1)].ln();
        }
    }
    if l.iter().flatten().any(|v| !v.is_finite()) {
        return None;
    }

    let col = |dx: usize| l[0][dx] + l[1][dx] + l[2][dx];
    let row = |dy: usize| l[dy][0] + l[dy][1] + l[dy][2];
    let c10 = (col(2) - col(0)) / 6.0;
    let c01 = (row(2) - row(0)) / 6.0;
    let c20 = (col(0) - 2.0 * col(1) + col(2)) / 6.0;
    let c02 = (row(0) - 2.0 * row(1) + row(2)) / 6.0;
    let corners = l[0][0] + l[0][2] + l[2][0] + l[2][2];
    let edges = l[0][1] + l[1][0] + l[1][2] + l[2][1];
    let c00 = (-corners + 2.0 * edges + 5.0 * l[1][1]) / 9.0;

    let mut fit_error = 0.0;
    let mut chi_square = 0.0;
    for (dy, row) in l.iter().enumerate() {
        for (dx, &v) in row.iter().enumerate() {
            let (fx, fy) = (dx as f64 - 1.0, dy as f64 - 1.0);
            let model = c00 + c10 * fx + c20 * fx * fx + c01 * fy + c02 * fy * fy;
            let e2 = (model - v).powi(2);
            fit_error += e2;
            chi_square += e2 / v.abs();
        }
    }

    Some(QuadFit {
        c10,
        c01,
        c20,
        c02,
        fit_error,
        chi_square,
    })
}

/// 按强度从高到低依次接受光斑, 与已接受光斑距离小于 `threshold` 的被丢弃.
fn drop_duplicates(mut fits: Vec<SpotFit>, threshold: f64) -> (Vec<SpotFit>, usize) {
    fits.sort_by_key(|f| std::cmp::Reverse(OrderedFloat(f.intensity)));
    let total = fits.len();
    let mut accepted: Vec<SpotFit> = Vec::with_capacity(total);
    for f in fits {
        if accepted
            .iter()
            .all(|a| (a.x - f.x).hypot(a.y - f.y) >= threshold)
        {
            accepted.push(f);
        }
    }
    let dropped = total - accepted.len();
    (accepted, dropped)
}

/// 局部极大值 `(row, col)`: 等于其 `(2 * min_distance + 1)^2` 邻域的最大值,
/// 严格大于 `threshold`, 且不在宽度为 `min_distance` 的边框内. 按响应降序.
fn peak_local_max(image: ArrayView2<f64>, min_distance: usize, threshold: f64) -> Vec<(usize, usize)> {
    let (h, w) = image.dim();
    let d = min_distance.max(1);
    if h <= 2 * d || w <= 2 * d {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    for r in d..h - d {
        for c in d..w - d {
            let v = image[(r, c)];
            if !(v > threshold) {
                continue;
            }
            let window = image.slice(s![r - d..=r + d, c - d..=c + d]);
            if window.iter().all(|&u| u <= v) {
                peaks.push((r, c));
            }
        }
    }
    peaks.sort_by_key(|&(r, c)| std::cmp::Reverse(OrderedFloat(image[(r, c)])));
    peaks
}

/// 一维高斯核 (0 阶或 2 阶导数), 半径为 `4σ`.
fn gaussian_kernel(sigma: f64, order: usize) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as isize;
    let s2 = sigma * sigma;
    let phi: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / s2).exp())
        .collect();
    let sum: f64 = phi.iter().sum();
    (-radius..=radius)
        .zip(phi)
        .map(|(x, p)| {
            let p = p / sum;
            match order {
                0 => p,
                _ => p * ((x * x) as f64 / (s2 * s2) - 1.0 / s2),
            }
        })
        .collect()
}

/// 半采样对称反射 (`d c b a | a b c d | d c b a`).
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let m = i.rem_euclid(2 * n);
    (if m >= n { 2 * n - 1 - m } else { m }) as usize
}

/// 沿 `axis` (0 为行方向, 1 为列方向) 做一维相关.
fn correlate1d(image: &Array2<f64>, kernel: &[f64], axis: usize) -> Array2<f64> {
    let (h, w) = image.dim();
    let radius = (kernel.len() / 2) as isize;
    Array2::from_shape_fn((h, w), |(r, c)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, &wt)| {
                let off = k as isize - radius;
                let px = if axis == 0 {
                    image[(reflect(r as isize + off, h), c)]
                } else {
                    image[(r, reflect(c as isize + off, w))]
                };
                wt * px
            })
            .sum()
    })
}

/// 高斯-拉普拉斯滤波: 两个方向二阶高斯导数之和.
fn gaussian_laplace(image: &Array2<f64>, sigma: f64) -> Array2<f64> {
    let k0 = gaussian_kernel(sigma, 0);
    let k2 = gaussian_kernel(sigma, 2);
    let dyy = correlate1d(&correlate1d(image, &k2, 0), &k0, 1);
    let dxx = correlate1d(&correlate1d(image, &k0, 0), &k2, 1);
    dyy + dxx
}
