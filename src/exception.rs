// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 定义请求处理过程中可预期的失败情况。
//!
//! 这些变体只描述"请求本身有问题"的情形，上层据此生成 400/404 等响应。
//! 读写文件或 Socket 时发生的 I/O 错误不在此列，它们以 `std::io::Error`
//! 的形式直接向调用方传播。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Exception {
    /// 请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行缺失或使用了不认识的方法。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求的资源在根目录下不存在。对应 `404 Not Found`。
    FileNotFound,
    /// 请求路径包含越权片段（如 `..`）或非法字符。对应 `400 Bad Request`。
    InvalidPath,
    /// 日期类标头（如 `If-Modified-Since`）无法解析为 HTTP 日期。
    /// 调用方通常将其视为标头缺失，而不是让请求失败。
    MalformedDateHeader,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            MalformedDateHeader => write!(f, "Malformed HTTP date header"),
        }
    }
}

impl std::error::Error for Exception {}
