//! 스테이지 상태 저장소 — 작업 디렉토리 단위 영속 값
//!
//! 레이아웃:
//! ```text
//! <stages_dir>/<test_case>/.test-data/<key>.json
//! ```
//!
//! 모든 값은 JSON으로 저장됩니다. 쓰기는 같은 디렉토리의 임시 파일에 기록하고
//! fsync 후 rename 하므로, 저장이 반환되면 이후 스테이지의 읽기는 완전한 값을 봅니다.
//! 저장된 적 없는 키를 읽으면 [`StoreError::NotFound`]를 돌려줍니다.
//! 기본값으로 대체하지 않습니다.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::StoreError;
use crate::types::OptionsBundle;
use crate::workdir::{WorkingDir, validate_segment};

/// 영속 값이 저장되는 하위 디렉토리
pub const TEST_DATA_DIR: &str = ".test-data";

/// 옵션 번들 저장 키
pub const OPTIONS_KEY: &str = "TerraformOptions";

const VALUE_EXTENSION: &str = "json";

/// 작업 디렉토리 하나에 묶인 상태 저장소
#[derive(Debug, Clone)]
pub struct StateStore {
    working_dir: PathBuf,
    data_dir: PathBuf,
}

impl StateStore {
    /// 작업 디렉토리의 저장소를 엽니다. 디렉토리는 첫 저장 시 생성됩니다.
    pub fn new(working_dir: &WorkingDir) -> Self {
        Self::at(working_dir.path())
    }

    /// 임의 경로를 작업 디렉토리로 사용하는 저장소
    pub fn at(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_path_buf();
        let data_dir = working_dir.join(TEST_DATA_DIR);
        Self {
            working_dir,
            data_dir,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// 값 파일이 저장되는 디렉토리
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 키에 해당하는 파일 경로
    pub fn value_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_segment("store key", key)?;
        Ok(self.data_dir.join(format!("{key}.{VALUE_EXTENSION}")))
    }

    // ─── 문자열 ─────────────────────────────────────────────────────

    pub fn save_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.save_json(key, &value)
    }

    pub fn load_string(&self, key: &str) -> Result<String, StoreError> {
        self.load_json(key)
    }

    // ─── 옵션 번들 ──────────────────────────────────────────────────

    pub fn save_options(&self, options: &OptionsBundle) -> Result<(), StoreError> {
        self.save_json(OPTIONS_KEY, options)
    }

    pub fn load_options(&self) -> Result<OptionsBundle, StoreError> {
        self.load_json(OPTIONS_KEY)
    }

    // ─── 일반 JSON ──────────────────────────────────────────────────

    /// 값을 직렬화하여 저장합니다. 같은 키의 기존 값은 덮어씁니다.
    pub fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.value_path(key)?;
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;

        fs::create_dir_all(&self.data_dir).map_err(|source| StoreError::Io {
            path: self.data_dir.clone(),
            source,
        })?;
        write_durably(&self.data_dir, &path, &bytes)?;

        debug!(
            working_dir = %self.working_dir.display(),
            key,
            bytes = bytes.len(),
            "value saved"
        );
        Ok(())
    }

    /// 저장된 값을 읽어 역직렬화합니다.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let path = self.value_path(key)?;
        let bytes = fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    working_dir: self.working_dir.clone(),
                    key: key.to_owned(),
                }
            } else {
                StoreError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;

        debug!(working_dir = %self.working_dir.display(), key, "value loaded");
        Ok(value)
    }

    // ─── 조회/정리 ──────────────────────────────────────────────────

    /// 키가 저장되어 있는지 확인합니다.
    pub fn contains(&self, key: &str) -> bool {
        self.value_path(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// 저장된 키 목록 (정렬됨)
    ///
    /// 저장소가 아직 생성되지 않았다면 빈 목록입니다.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.data_dir.clone(),
                    source,
                });
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.data_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// 저장된 값을 원본 JSON으로 읽습니다 (조회용).
    pub fn load_raw(&self, key: &str) -> Result<serde_json::Value, StoreError> {
        self.load_json(key)
    }

    /// 저장된 모든 값을 삭제합니다.
    ///
    /// 운영자가 명시적으로 호출하는 정리 작업이며 드라이버는 호출하지 않습니다.
    /// 삭제했다면 `true`를 돌려줍니다.
    pub fn clear(&self) -> Result<bool, StoreError> {
        match fs::remove_dir_all(&self.data_dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io {
                path: self.data_dir.clone(),
                source,
            }),
        }
    }
}

/// 임시 파일에 기록 → fsync → rename
fn write_durably(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
