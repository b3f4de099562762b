//! 平面图像的持久化存储.

use super::Lut;
use image::ImageResult;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 原始像素值 (任意位深或浮点) 会先经过 LUT 映射为显示值, 再保存.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
/// 仅适用于已经是显示值 (`u8`) 的图像.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 一个平面和用于显示它的 LUT.
#[derive(Copy, Clone, Debug)]
pub struct LutPlane<'a> {
    plane: ArrayView2<'a, f32>,
    lut: &'a Lut,
    color: bool,
}

impl<'a> LutPlane<'a> {
    /// 以灰度保存.
    #[inline]
    pub fn gray(plane: ArrayView2<'a, f32>, lut: &'a Lut) -> Self {
        Self {
            plane,
            lut,
            color: false,
        }
    }

    /// 以 LUT 的色带着色保存.
    #[inline]
    pub fn color(plane: ArrayView2<'a, f32>, lut: &'a Lut) -> Self {
        Self {
            plane,
            lut,
            color: true,
        }
    }
}

impl ImgWriteVis for LutPlane<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        if self.color {
            self.lut.apply_rgb(self.plane).save_raw(path)
        } else {
            self.lut.apply_gray(self.plane).save_raw(path)
        }
    }
}

macro_rules! impl_gray_raw {
    ($($img: ty),+) => {
        $(
            /// 按原样存储为 8 位灰度图.
            impl ImgWriteRaw for $img {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.dim();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

macro_rules! impl_rgb_raw {
    ($($img: ty),+) => {
        $(
            /// 按原样存储为 RGB 图, 形状为 `(h, w, 3)`.
            impl ImgWriteRaw for $img {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width, _) = self.dim();
                    let mut buf = image::RgbImage::new(width as u32, height as u32);
                    for (x, y, px) in buf.enumerate_pixels_mut() {
                        let (h, w) = (y as usize, x as usize);
                        *px = image::Rgb([self[(h, w, 0)], self[(h, w, 1)], self[(h, w, 2)]]);
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_gray_raw!(Array2<u8>, ArrayView2<'_, u8>);
impl_rgb_raw!(Array3<u8>, ArrayView3<'_, u8>);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_save_lut_plane() {
        let dir = tempfile::tempdir().unwrap();
        let plane = arr2(&[[0.0f32, 255.0, 127.5], [255.0, 0.0, 0.0]]);
        let lut = Lut::default();

        let gray_path = dir.path().join("gray.png");
        LutPlane::gray(plane.view(), &lut).save(&gray_path).unwrap();
        let img = image::open(&gray_path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 0).0, [255]);
        assert_eq!(img.get_pixel(2, 0).0, [127]);

        let mut red = Lut::default();
        red.lut_name = "Red".to_string();
        let rgb_path = dir.path().join("red.png");
        LutPlane::color(plane.view(), &red).save(&rgb_path).unwrap();
        let img = image::open(&rgb_path).unwrap().into_rgb8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 1).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0]);
    }
}
