//! 记录文件 (JSON) 的保存与读取.
//!
//! 文档结构:
//!
//! ```text
//! {
//!   "summary": {"plugin_name": ..., "last_update": ...},
//!   "spot_list": [{index, time, channel, x, y, z, parent, label, deleted, created_at, updated_at}, ...],
//!   "viewer_settings": {...}
//! }
//! ```
//!
//! `spot_list` 包含被软删除的 spot. 旧文档中缺失的 spot 字段以默认值补齐.

mod error;

pub use error::RecordError;

use crate::image::{LutSettings, StackProperties};
use crate::lineage::{self, LineageStore, Spot};
use crate::session::SessionConfig;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// 记录文件读写结果.
pub type RecordResult<T> = Result<T, RecordError>;

/// 文档摘要.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// 写入此文件的插件名.
    pub plugin_name: String,
    /// 写入时刻.
    #[serde(default = "lineage::now")]
    pub last_update: Timestamp,
}

/// 查看器设置. 未识别的键原样保留, 以便其它插件写入的设置不会在读写之间丢失.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// 追踪会话配置.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,
    /// 每个通道的 LUT 设置.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub luts: Vec<LutSettings>,
    /// 图像栈属性.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackProperties>,
    /// 其它设置.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// 完整的记录文档.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordDocument {
    /// 摘要.
    pub summary: Summary,
    /// 全部 spot, 含已删除的.
    pub spot_list: Vec<Spot>,
    /// 查看器设置.
    #[serde(default)]
    pub viewer_settings: ViewerSettings,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    summary: Summary,
    spot_list: &'a [Spot],
    viewer_settings: &'a ViewerSettings,
}

impl RecordDocument {
    /// 检查文档是否由 `expected` 插件写入.
    pub fn check_provenance(&self, path: &Path, expected: &str) -> RecordResult<()> {
        if self.summary.plugin_name == expected {
            Ok(())
        } else {
            Err(RecordError::ProvenanceMismatch {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                found: self.summary.plugin_name.clone(),
            })
        }
    }

    /// 拆分为森林和查看器设置.
    pub fn into_parts(self) -> (LineageStore, ViewerSettings) {
        (LineageStore::from_spots(self.spot_list), self.viewer_settings)
    }
}

/// 把森林和设置写入 `path`.
///
/// 先写入同目录下的临时文件再重命名, 失败时目标文件保持原样.
/// 成功后调用者应自行 [`LineageStore::mark_saved`].
pub fn save<P: AsRef<Path>>(
    path: P,
    plugin_name: &str,
    store: &LineageStore,
    settings: &ViewerSettings,
) -> RecordResult<()> {
    let path = path.as_ref();
    let doc = DocumentRef {
        summary: Summary {
            plugin_name: plugin_name.to_string(),
            last_update: lineage::now(),
        },
        spot_list: store.spots(),
        viewer_settings: settings,
    };
    let bytes = serde_json::to_vec_pretty(&doc).map_err(RecordError::Serialize)?;

    let write_err = |source| RecordError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    log::info!(
        "Saved {} spots ({} live) to {}",
        store.spots().len(),
        store.live_len(),
        path.display()
    );
    Ok(())
}

/// 读取并解析记录文档, 不检查来源.
pub fn read_document<P: AsRef<Path>>(path: P) -> RecordResult<RecordDocument> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| RecordError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| RecordError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// 读取由插件 `expected` 写入的记录.
///
/// 来源不符时返回 [`RecordError::ProvenanceMismatch`]; 调用者可在用户确认后改用 [`load_anyway`].
pub fn load<P: AsRef<Path>>(path: P, expected: &str) -> RecordResult<(LineageStore, ViewerSettings)> {
    let path = path.as_ref();
    let doc = read_document(path)?;
    doc.check_provenance(path, expected)?;
    Ok(loaded(path, doc))
}

/// 读取记录, 来源不符时仅记录警告.
pub fn load_anyway<P: AsRef<Path>>(
    path: P,
    expected: &str,
) -> RecordResult<(LineageStore, ViewerSettings)> {
    let path = path.as_ref();
    let doc = read_document(path)?;
    if let Err(e) = doc.check_provenance(path, expected) {
        log::warn!("{e}; loading anyway");
    }
    Ok(loaded(path, doc))
}

fn loaded(path: &Path, doc: RecordDocument) -> (LineageStore, ViewerSettings) {
    let parts = doc.into_parts();
    log::info!(
        "Loaded {} spots ({} live) from {}",
        parts.0.spots().len(),
        parts.0.live_len(),
        path.display()
    );
    parts
}

/// 记录文件的默认路径: 图像路径去掉扩展名 (以及 `.ome`) 后追加 `suffix`.
#[inline]
pub fn default_record_path<P: AsRef<Path>>(
    image_path: P,
    suffix: &str,
) -> Result<PathBuf, crate::image::PathError> {
    crate::image::with_suffix(image_path, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Lut;
    use tempfile::tempdir;

    type Tuple = (usize, usize, usize, f64, f64, usize, Option<usize>, Option<String>, bool);

    fn tuples(store: &LineageStore) -> Vec<Tuple> {
        let mut v: Vec<Tuple> = store
            .spots()
            .iter()
            .map(|s| {
                let (t, c, z) = s.tcz();
                let label = s.label().map(str::to_string);
                (s.index(), t, c, s.x(), s.y(), z, s.parent(), label, s.is_deleted())
            })
            .collect();
        v.sort_by_key(|t| t.0);
        v
    }

    /// 两棵树, 含分支, 标签和被删除的 spot.
    fn forest() -> LineageStore {
        let mut store = LineageStore::new();
        store.add_spot(10.0, 20.0, (0, 0, 0), None);
        store.add_spot(15.0, 22.0, (1, 0, 0), Some(0));
        store.add_spot(16.5, 23.25, (1, 0, 1), Some(0));
        store.add_spot(17.0, 24.0, (2, 0, 1), Some(2));
        store.add_spot(50.0, 50.0, (0, 1, 2), None);
        store.add_spot(51.0, 49.0, (1, 1, 2), Some(4));
        store.set_label(2, Some("b".to_string()));
        store.remove_spot(5);
        store.remove_spot(1);
        store
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cell_track.json");
        let store = forest();

        let mut settings = ViewerSettings {
            session: Some(SessionConfig {
                ghost_z_range: 2,
                ..Default::default()
            }),
            luts: vec![Lut::default().settings()],
            ..Default::default()
        };
        settings
            .extra
            .insert("marker".to_string(), serde_json::json!({"width": 2}));

        save(&path, "Particle Tracking", &store, &settings).unwrap();
        let (loaded, loaded_settings) = load(&path, "Particle Tracking").unwrap();

        assert_eq!(tuples(&loaded), tuples(&store));
        assert_eq!(loaded_settings, settings);
        assert!(!loaded.is_modified());
        assert!(loaded.audit().is_empty());
        assert_eq!(loaded.next_index(), Some(6));
        assert_eq!(loaded.spots()[3].created_at(), store.spots()[3].created_at());
    }

    #[test]
    fn test_overwrite_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a_track.json");
        fs::write(&path, "old").unwrap();

        let mut store = LineageStore::new();
        store.add_spot(1.0, 2.0, (0, 0, 0), None);
        save(&path, "Demo", &store, &ViewerSettings::default()).unwrap();

        let doc = read_document(&path).unwrap();
        assert_eq!(doc.summary.plugin_name, "Demo");
        assert_eq!(doc.spot_list.len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_schema_tolerance() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old_track.json");
        let text = r#"{
            "summary": {"plugin_name": "Particle Tracking", "last_update": "2020-01-02T03:04:05+09:00"},
            "spot_list": [
                {"index": 0, "time": 0, "channel": 0, "x": 1.5, "y": 2.5, "z": 0, "parent": null},
                {"index": 3, "time": 1, "channel": 0, "x": 2.0, "y": 3.0, "z": 0, "parent": 0}
            ]
        }"#;
        fs::write(&path, text).unwrap();

        let (store, settings) = load(&path, "Particle Tracking").unwrap();
        assert_eq!(settings, ViewerSettings::default());
        assert_eq!(store.live_len(), 2);
        let s = store.find_spot_by_index(3).unwrap();
        assert_eq!(s.label(), None);
        assert!(!s.is_deleted());
        assert_eq!(s.parent(), Some(0));
        assert_eq!(store.next_index(), Some(4));
    }

    #[test]
    fn test_provenance_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x_track.json");
        save(&path, "Demo", &forest(), &ViewerSettings::default()).unwrap();

        let err = load(&path, "Particle Tracking").unwrap_err();
        assert!(err.is_provenance_mismatch());
        match err {
            RecordError::ProvenanceMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "Particle Tracking");
                assert_eq!(found, "Demo");
            }
            e => panic!("unexpected error {e}"),
        }

        let (store, _) = load_anyway(&path, "Particle Tracking").unwrap();
        assert_eq!(store.spots().len(), 6);
    }

    #[test]
    fn test_read_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load(&missing, "Demo"),
            Err(RecordError::Read { .. })
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{\"summary\": ").unwrap();
        assert!(matches!(load(&bad, "Demo"), Err(RecordError::Malformed { .. })));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("a_track.json");
        let err = save(&path, "Demo", &forest(), &ViewerSettings::default()).unwrap_err();
        assert!(matches!(err, RecordError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_default_record_path() {
        let p = default_record_path("/data/cell.ome.tif", "_track.json").unwrap();
        assert_eq!(p, PathBuf::from("/data/cell_track.json"));
    }
}
