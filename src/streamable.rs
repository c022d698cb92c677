use std::io::{self, Write};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// 资源的处理模式：是否允许交付压缩后的变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamableResourceProcessing {
    CompressionEnabled,
    CompressionDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStatus {
    /// 内容可以压缩，但当前变体未压缩
    Compressable,
    /// 内容本身已是压缩格式（图片、字体等），不再压缩
    NotCompressable,
    /// 内容已经过 gzip 压缩
    Compressed,
}

/// 资源在某一处理模式下的计算结果：内容、校验和与元数据。
///
/// 构造完成后不可变；校验和由交付的字节决定，
/// 同一份内容在同一处理模式下总是得到相同的校验和。
#[derive(Debug, Clone)]
pub struct StreamableResource {
    description: String,
    content_type: String,
    compression: CompressionStatus,
    last_modified: DateTime<Utc>,
    checksum: String,
    content: Bytes,
}

impl StreamableResource {
    pub fn new(
        description: &str,
        content_type: &str,
        compression: CompressionStatus,
        last_modified: DateTime<Utc>,
        content: Bytes,
    ) -> Self {
        let checksum = checksum(&content);
        Self::from_parts(
            description,
            content_type,
            compression,
            last_modified,
            &checksum,
            content,
        )
    }

    /// 使用预先计算好的校验和构造
    pub fn from_parts(
        description: &str,
        content_type: &str,
        compression: CompressionStatus,
        last_modified: DateTime<Utc>,
        checksum: &str,
        content: Bytes,
    ) -> Self {
        Self {
            description: description.to_string(),
            content_type: content_type.to_string(),
            compression,
            last_modified,
            checksum: checksum.to_string(),
            content,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn compression(&self) -> CompressionStatus {
        self.compression
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn stream_to<W: Write>(&self, os: &mut W) -> io::Result<()> {
        os.write_all(&self.content)
    }
}

/// 内容摘要：SHA-256 的小写十六进制表示
pub fn checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_checksum_is_hex_sha256() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(checksum(b"abc").len(), 64);
        assert_ne!(checksum(b"abc"), checksum(b"abd"));
    }

    #[test]
    fn test_new_computes_checksum_and_size() {
        let modified = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let streamable = StreamableResource::new(
            "app.js",
            "text/javascript;charset=utf-8",
            CompressionStatus::Compressable,
            modified,
            Bytes::from("abc"),
        );
        assert_eq!(streamable.checksum(), checksum(b"abc"));
        assert_eq!(streamable.size(), 3);
        assert_eq!(streamable.last_modified(), modified);
        assert_eq!(streamable.description(), "app.js");
    }

    #[test]
    fn test_stream_to_writes_all_bytes() {
        let streamable = StreamableResource::from_parts(
            "a.txt",
            "text/plain",
            CompressionStatus::Compressable,
            Utc::now(),
            "abc123",
            Bytes::from("hello world"),
        );
        let mut out = Vec::new();
        streamable.stream_to(&mut out).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(streamable.checksum(), "abc123");
    }
}
