//! 可寻址的资源句柄。
//!
//! `exists` 是一个纯查询，与读取内容分开，流式传输逻辑在处理请求前
//! 只依赖它判断资源是否存在。

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use bytes::Bytes;

#[cfg_attr(test, mockall::automock)]
pub trait Resource: Send + Sync {
    /// 资源标识，同时作为缓存键与 URL 中的路径部分
    fn path(&self) -> String;

    fn exists(&self) -> bool;

    fn last_modified(&self) -> io::Result<SystemTime>;

    fn read(&self) -> io::Result<Bytes>;
}

/// 位于本地文件系统中、相对某个根目录的资源
#[derive(Debug, Clone)]
pub struct FileResource {
    relative: String,
    full_path: PathBuf,
}

impl FileResource {
    pub fn new(root: impl AsRef<Path>, relative: &str) -> Self {
        let relative = relative.trim_start_matches('/').to_string();
        let full_path = root.as_ref().join(&relative);
        Self {
            relative,
            full_path,
        }
    }
}

impl Resource for FileResource {
    fn path(&self) -> String {
        self.relative.clone()
    }

    // 目录不是可流式传输的资源
    fn exists(&self) -> bool {
        self.full_path.is_file()
    }

    fn last_modified(&self) -> io::Result<SystemTime> {
        fs::metadata(&self.full_path)?.modified()
    }

    fn read(&self) -> io::Result<Bytes> {
        Ok(Bytes::from(fs::read(&self.full_path)?))
    }
}

impl fmt::Display for FileResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative)
    }
}
