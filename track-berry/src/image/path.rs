//! 记录文件命名约定: 记录文件与图像文件位于同一目录,
//! 文件名为图像文件名主干加上插件后缀.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// 文件名推导错误.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PathError {
    /// 后缀为空, 推导出的文件名会覆盖图像文件.
    #[error("empty suffix for `{0}`; the image file may be overwritten")]
    EmptySuffix(PathBuf),
}

/// 去掉扩展名以及随后 (大小写不敏感) 的 `.ome` 的文件名主干.
///
/// ```
/// use track_berry::image::stem;
/// assert_eq!(stem("/data/cell.OME.tif"), "cell");
/// assert_eq!(stem("cell.npy"), "cell");
/// ```
pub fn stem<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.len().checked_sub(4) {
        Some(k) if name.is_char_boundary(k) && name[k..].eq_ignore_ascii_case(".ome") => {
            name[..k].to_string()
        }
        _ => name,
    }
}

/// 记录文件路径: 与 `image_path` 同目录, 文件名为 `stem + suffix`.
pub fn with_suffix<P: AsRef<Path>>(image_path: P, suffix: &str) -> Result<PathBuf, PathError> {
    let image_path = image_path.as_ref();
    if suffix.is_empty() {
        return Err(PathError::EmptySuffix(image_path.to_owned()));
    }
    let name = format!("{}{suffix}", stem(image_path));
    Ok(match image_path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    })
}
