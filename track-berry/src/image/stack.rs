//! 5 维图像栈 `[time, channel, z, y, x]`.
//!
//! TIFF 解析不属于本 crate; 外部读取器只需提供一个 5 维数组和像素尺寸等元数据.
//! 这里提供一个 `.npy` 读取器作为具体实现, 便于命令行工具和测试使用.

use crate::consts::{CHUNK_SIZE, DEFAULT_PLANE_SHAPE, FINTERVAL_SEC, PIXELS_UM, Z_STEP_UM};
use crate::Tcz;
use ndarray::{Array5, ArrayD, ArrayView2, ArrayView4, Axis, Ix5};
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 读取图像栈时的错误.
#[derive(Debug, Error)]
pub enum StackError {
    /// 底层 I/O 错误.
    #[error("cannot read image file `{}`: {source}", path.display())]
    Io {
        /// 文件路径.
        path: PathBuf,
        /// 原因.
        source: io::Error,
    },

    /// npy 格式解析错误.
    #[error("cannot decode npy array: {0}")]
    Npy(#[from] ReadNpyError),

    /// 不支持的元素类型.
    #[error("unsupported npy element type")]
    UnsupportedDtype,

    /// 数组维数不在 2 到 5 之间.
    #[error("expected a 2- to 5-dimensional array, got {0} dimensions")]
    Dimensionality(usize),
}

/// 图像栈操作结果.
pub type StackResult<T> = Result<T, StackError>;

/// 图像栈各维度的大小.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StackBounds {
    /// 时间点个数.
    pub t_count: usize,
    /// 通道个数.
    pub c_count: usize,
    /// z 层数.
    pub z_count: usize,
    /// 平面高度.
    pub height: usize,
    /// 平面宽度.
    pub width: usize,
}

impl Default for StackBounds {
    fn default() -> Self {
        let (height, width) = DEFAULT_PLANE_SHAPE;
        Self {
            t_count: 1,
            c_count: 1,
            z_count: 1,
            height,
            width,
        }
    }
}

impl StackBounds {
    /// 最大合法时间索引.
    #[inline]
    pub fn t_max(&self) -> usize {
        self.t_count.saturating_sub(1)
    }

    /// 最大合法 z 索引.
    #[inline]
    pub fn z_max(&self) -> usize {
        self.z_count.saturating_sub(1)
    }

    /// 平面索引是否合法.
    #[inline]
    pub fn contains(&self, (t, c, z): Tcz) -> bool {
        t < self.t_count && c < self.c_count && z < self.z_count
    }
}

/// 归档到记录文件中的图像栈属性.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackProperties {
    /// 像素尺寸 (微米), `[x, y]`.
    pub pixels_um: [f64; 2],
    /// z 步长 (微米).
    pub z_step_um: f64,
    /// 帧间隔 (秒).
    pub finterval_sec: f64,
    /// z 层数.
    pub z_count: usize,
    /// 时间点个数.
    pub t_count: usize,
    /// 通道个数.
    pub c_count: usize,
    /// 平面高度.
    pub height: usize,
    /// 平面宽度.
    pub width: usize,
    /// 轴顺序, 始终为 `TCZYX`.
    pub axes: String,
}

/// 5 维图像栈. 像素值统一以 `f32` 保存, `integral` 记录原始数据是否为整数类型.
#[derive(Clone, Debug)]
pub struct ImageStack {
    data: Array5<f32>,
    integral: bool,
    pixels_um: [f64; 2],
    z_step_um: f64,
    finterval_sec: f64,
}

impl Default for ImageStack {
    fn default() -> Self {
        let (h, w) = DEFAULT_PLANE_SHAPE;
        Self::zeros((1, 1, 1, h, w))
    }
}

impl ImageStack {
    /// 由 `[t, c, z, y, x]` 数组构建, 元数据取默认值.
    pub fn new(data: Array5<f32>, integral: bool) -> Self {
        Self {
            data,
            integral,
            pixels_um: PIXELS_UM,
            z_step_um: Z_STEP_UM,
            finterval_sec: FINTERVAL_SEC,
        }
    }

    /// 全零的 (整数) 图像栈. `shape` 为 `(t, c, z, h, w)`.
    #[inline]
    pub fn zeros(shape: (usize, usize, usize, usize, usize)) -> Self {
        Self::new(Array5::zeros(shape), true)
    }

    /// 设置元数据.
    pub fn with_metadata(mut self, pixels_um: [f64; 2], z_step_um: f64, finterval_sec: f64) -> Self {
        self.pixels_um = pixels_um;
        self.z_step_um = z_step_um;
        self.finterval_sec = finterval_sec;
        self
    }

    /// 重置为默认的 1x1x1x256x256 空图像栈.
    pub fn set_defaults(&mut self) {
        *self = Self::default();
    }

    /// 打开 `.npy` 文件.
    ///
    /// 数组按 `TCZYX` 解释; 维数不足 5 时, 在前面补长度为 1 的轴
    /// (例如 3 维数组被视为 `ZYX`).
    pub fn open_npy<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let mut chunks = Self::read_by_chunk(path, CHUNK_SIZE)?;
        for progress in chunks.by_ref() {
            progress?;
        }
        chunks.finish()
    }

    /// 分块读取 `.npy` 文件. 返回的迭代器每读完一块就给出累计字节数,
    /// 迭代结束后调用 [`ChunkedRead::finish`] 完成解码.
    pub fn read_by_chunk<P: AsRef<Path>>(path: P, chunk_size: usize) -> StackResult<ChunkedRead> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path).map_err(|source| StackError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(ChunkedRead {
            file,
            path,
            buf: Vec::new(),
            chunk_size: chunk_size.max(1),
        })
    }

    /// 从内存中的 `.npy` 字节流解码.
    pub fn from_npy_bytes(bytes: &[u8]) -> StackResult<Self> {
        macro_rules! try_decode {
            ($($t: ty => $integral: expr),+ $(,)?) => {
                $(
                    match ArrayD::<$t>::read_npy(bytes) {
                        Ok(a) => return Self::from_dyn(a.mapv(|v| v as f32), $integral),
                        Err(ReadNpyError::WrongDescriptor(_)) => {}
                        Err(e) => return Err(e.into()),
                    }
                )+
            };
        }

        try_decode!(
            u8 => true,
            u16 => true,
            u32 => true,
            i8 => true,
            i16 => true,
            i32 => true,
            f32 => false,
            f64 => false,
        );
        Err(StackError::UnsupportedDtype)
    }

    fn from_dyn(mut data: ArrayD<f32>, integral: bool) -> StackResult<Self> {
        let ndim = data.ndim();
        if !(2..=5).contains(&ndim) {
            return Err(StackError::Dimensionality(ndim));
        }
        while data.ndim() < 5 {
            data = data.insert_axis(Axis(0));
        }
        let data = data
            .into_dimensionality::<Ix5>()
            .map_err(|_| StackError::Dimensionality(ndim))?;
        Ok(Self::new(data, integral))
    }

    /// 底层数组.
    #[inline]
    pub fn data(&self) -> &Array5<f32> {
        &self.data
    }

    /// 原始像素是否为整数类型.
    #[inline]
    pub fn is_integral(&self) -> bool {
        self.integral
    }

    /// 各维度大小.
    pub fn bounds(&self) -> StackBounds {
        let (t_count, c_count, z_count, height, width) = self.data.dim();
        StackBounds {
            t_count,
            c_count,
            z_count,
            height,
            width,
        }
    }

    /// 时间点个数.
    #[inline]
    pub fn t_count(&self) -> usize {
        self.data.dim().0
    }

    /// 通道个数.
    #[inline]
    pub fn c_count(&self) -> usize {
        self.data.dim().1
    }

    /// z 层数.
    #[inline]
    pub fn z_count(&self) -> usize {
        self.data.dim().2
    }

    /// 平面高度.
    #[inline]
    pub fn height(&self) -> usize {
        self.data.dim().3
    }

    /// 平面宽度.
    #[inline]
    pub fn width(&self) -> usize {
        self.data.dim().4
    }

    /// 像素尺寸 (微米).
    #[inline]
    pub fn pixels_um(&self) -> [f64; 2] {
        self.pixels_um
    }

    /// z 步长 (微米).
    #[inline]
    pub fn z_step_um(&self) -> f64 {
        self.z_step_um
    }

    /// 帧间隔 (秒).
    #[inline]
    pub fn finterval_sec(&self) -> f64 {
        self.finterval_sec
    }

    /// 平面 `tcz` 的二维视图. 越界时返回 `None`.
    pub fn plane(&self, tcz @ (t, c, z): Tcz) -> Option<ArrayView2<'_, f32>> {
        self.bounds().contains(tcz).then(|| {
            self.data
                .index_axis(Axis(0), t)
                .index_axis_move(Axis(0), c)
                .index_axis_move(Axis(0), z)
        })
    }

    /// 通道 `c` 的全部像素 `[t, z, y, x]`. 越界时返回 `None`.
    pub fn channel(&self, c: usize) -> Option<ArrayView4<'_, f32>> {
        (c < self.c_count()).then(|| self.data.index_axis(Axis(1), c))
    }

    /// 需要随记录文件保存的属性.
    pub fn archive_properties(&self) -> StackProperties {
        let b = self.bounds();
        StackProperties {
            pixels_um: self.pixels_um,
            z_step_um: self.z_step_um,
            finterval_sec: self.finterval_sec,
            z_count: b.z_count,
            t_count: b.t_count,
            c_count: b.c_count,
            height: b.height,
            width: b.width,
            axes: "TCZYX".to_string(),
        }
    }
}

/// 分块读取进度. 每次迭代给出目前已读取的累计字节数.
#[derive(Debug)]
pub struct ChunkedRead {
    file: File,
    path: PathBuf,
    buf: Vec<u8>,
    chunk_size: usize,
}

impl Iterator for ChunkedRead {
    type Item = StackResult<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.buf.len();
        self.buf.resize(start + self.chunk_size, 0);
        match self.file.read(&mut self.buf[start..]) {
            Ok(0) => {
                self.buf.truncate(start);
                None
            }
            Ok(n) => {
                self.buf.truncate(start + n);
                Some(Ok(self.buf.len()))
            }
            Err(source) => {
                self.buf.truncate(start);
                Some(Err(StackError::Io {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}

impl ChunkedRead {
    /// 已读取的字节数.
    #[inline]
    pub fn bytes_read(&self) -> usize {
        self.buf.len()
    }

    /// 读完剩余部分并解码.
    pub fn finish(mut self) -> StackResult<ImageStack> {
        self.file
            .read_to_end(&mut self.buf)
            .map_err(|source| StackError::Io {
                path: self.path.clone(),
                source,
            })?;
        ImageStack::from_npy_bytes(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageStack, StackError};
    use ndarray::{Array2, Array3};
    use ndarray_npy::write_npy;

    #[test]
    fn test_default_stack() {
        let s = ImageStack::default();
        let b = s.bounds();
        assert_eq!((b.t_count, b.c_count, b.z_count), (1, 1, 1));
        assert_eq!((b.height, b.width), (256, 256));
        assert!(s.is_integral());
        assert_eq!(s.archive_properties().axes, "TCZYX");
    }

    #[test]
    fn test_plane_view() {
        let mut s = ImageStack::zeros((2, 1, 3, 4, 5));
        let (h, w) = (s.height(), s.width());
        assert_eq!((h, w), (4, 5));
        assert!(s.plane((1, 0, 2)).is_some());
        assert!(s.plane((2, 0, 0)).is_none());
        assert!(s.plane((0, 1, 0)).is_none());
        s.set_defaults();
        assert_eq!(s.width(), 256);
    }

    #[test]
    fn test_read_npy_u16_zyx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.npy");
        let arr = Array3::<u16>::from_shape_fn((3, 4, 5), |(z, y, x)| (z * 100 + y * 10 + x) as u16);
        write_npy(&path, &arr).unwrap();

        let s = ImageStack::open_npy(&path).unwrap();
        assert!(s.is_integral());
        let b = s.bounds();
        assert_eq!((b.t_count, b.c_count, b.z_count, b.height, b.width), (1, 1, 3, 4, 5));
        assert_eq!(s.plane((0, 0, 2)).unwrap()[(3, 4)], 234.0);
    }

    #[test]
    fn test_read_by_chunk_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plane.npy");
        let arr = Array2::<f32>::from_elem((32, 32), 1.5);
        write_npy(&path, &arr).unwrap();

        let mut chunks = ImageStack::read_by_chunk(&path, 1000).unwrap();
        let progress: Vec<usize> = chunks.by_ref().map(|r| r.unwrap()).collect();
        assert!(progress.len() > 1);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*progress.last().unwrap(), chunks.bytes_read());

        let s = chunks.finish().unwrap();
        assert!(!s.is_integral());
        assert_eq!(s.plane((0, 0, 0)).unwrap()[(0, 0)], 1.5);
    }

    #[test]
    fn test_read_missing_file() {
        let err = ImageStack::open_npy("/definitely/not/here.npy").unwrap_err();
        assert!(matches!(err, StackError::Io { .. }));
    }
}
