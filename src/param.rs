// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义了资源流式传输所依赖的 HTTP 协议常量，包括：
//! - 状态码及其原因短语（Reason Phrase）。
//! - 资源流式传输使用到的标头名称与固定取值。
//! - 文件后缀名到 MIME 类型的映射表。
//! - HTTP 方法、版本及编码格式的强类型枚举。

use chrono::Duration;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "asset-streamer";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 校验和前缀标记：客户端希望获取压缩后的资源变体
pub const COMPRESSED_CHECKSUM_MARKER: char = 'z';

/// 带校验和的资源 URL 前缀，形如 `/assets/<checksum>/<path>`
pub const ASSET_PATH_PREFIX: &str = "/assets/";

/// 模块资源 URL 前缀。模块地址中不含校验和，因此每次都需要重新验证。
pub const MODULE_PATH_PREFIX: &str = "/modules/";

pub const IF_MODIFIED_SINCE_HEADER: &str = "If-Modified-Since";
pub const IF_NONE_MATCH_HEADER: &str = "If-None-Match";
pub const ETAG_HEADER: &str = "ETag";
pub const LAST_MODIFIED_HEADER: &str = "Last-Modified";
pub const EXPIRES_HEADER: &str = "Expires";
pub const CACHE_CONTROL_HEADER: &str = "Cache-Control";
pub const CONTENT_ENCODING_HEADER: &str = "Content-Encoding";
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const LOCATION_HEADER: &str = "Location";

/// 模块资源使用的缓存策略：不设置过期时间，每次都由 ETag 重新验证
pub const MUST_REVALIDATE: &str = "max-age=0, must-revalidate";

/// gzip 对应的 `Content-Encoding` 取值
pub const GZIP_CONTENT_ENCODING: &str = "gzip";

/// 生产模式下 `Expires` 相对于最后修改时间的偏移量
pub fn ten_years() -> Duration {
    Duration::days(365 * 10)
}

lazy_static! {
    /// 服务器当前允许处理的 HTTP 方法列表，同时用于 `Allow` 响应头。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> = {
        vec![
            HttpRequestMethod::Get,
            HttpRequestMethod::Head,
            HttpRequestMethod::Options,
        ]
    };
}

lazy_static! {
    /// 本服务器可能产生的状态码与原因短语。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(304, "Not Modified");
        map.insert(400, "Bad Request");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(500, "Internal Server Error");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表，决定 `Content-Type` 以及资源是否值得压缩。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        // 文本类资源
        map.insert("css", "text/css;charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("htm", "text/html;charset=utf-8");
        map.insert("html", "text/html;charset=utf-8");
        map.insert("js", "text/javascript;charset=utf-8");
        map.insert("mjs", "text/javascript;charset=utf-8");
        map.insert("json", "application/json");
        map.insert("map", "application/json");
        map.insert("svg", "image/svg+xml");
        map.insert("txt", "text/plain");
        map.insert("xhtml", "application/xhtml+xml");
        map.insert("xml", "text/xml");
        map.insert("wasm", "application/wasm");
        // 图像
        map.insert("avif", "image/avif");
        map.insert("bmp", "image/bmp");
        map.insert("gif", "image/gif");
        map.insert("ico", "image/x-icon");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("webp", "image/webp");
        // 字体
        map.insert("eot", "application/vnd.ms-fontobject");
        map.insert("otf", "font/otf");
        map.insert("ttf", "font/ttf");
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        // 音视频与归档
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("webm", "video/webm");
        map.insert("gz", "application/gzip");
        map.insert("zip", "application/zip");
        map.insert("pdf", "application/pdf");
        map
    };
}

/// 无法识别后缀时使用的兜底类型
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
}

/// 客户端可声明接受的内容编码，服务端只产出 gzip
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    Gzip,
}

use std::fmt;

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
        }
    }
}
