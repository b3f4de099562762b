//! 记录文件读写错误.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 读写记录文件时的错误. 均可恢复: 读失败时内存中的森林保持不变,
/// 写失败时森林保持 "未保存" 状态.
#[derive(Debug, Error)]
pub enum RecordError {
    /// 无法读取文件.
    #[error("cannot read record file `{}`: {source}", path.display())]
    Read {
        /// 文件路径.
        path: PathBuf,
        /// 原因.
        source: io::Error,
    },

    /// 文件内容不是合法的记录文档.
    #[error("malformed record file `{}`: {source}", path.display())]
    Malformed {
        /// 文件路径.
        path: PathBuf,
        /// 原因.
        source: serde_json::Error,
    },

    /// 无法写入文件.
    #[error("cannot write record file `{}`: {source}", path.display())]
    Write {
        /// 文件路径.
        path: PathBuf,
        /// 原因.
        source: io::Error,
    },

    /// 序列化失败.
    #[error("cannot serialize records: {0}")]
    Serialize(#[source] serde_json::Error),

    /// 记录由另一插件写入. 调用者可以询问用户后用 [`load_anyway`](super::load_anyway) 继续.
    #[error("record file `{}` was written by `{found}`, not `{expected}`", path.display())]
    ProvenanceMismatch {
        /// 文件路径.
        path: PathBuf,
        /// 期望的插件名.
        expected: String,
        /// 文件中的插件名.
        found: String,
    },
}

impl RecordError {
    /// 是否为来源不符. 这种错误可以在用户确认后忽略.
    #[inline]
    pub fn is_provenance_mismatch(&self) -> bool {
        matches!(self, RecordError::ProvenanceMismatch { .. })
    }
}
