// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. 全部标头按小写名称保存，供条件请求（`If-Modified-Since`、
//!    `If-None-Match`）等逻辑按名称查询。
//! 3. 内容协商相关的 `Accept-Encoding` 解析。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::error;

use crate::{exception::Exception, param::*, util::parse_http_date};

/// 表示一个 HTTP 请求的元数据（不包含请求体）。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    version: HttpVersion,
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// 标头名称统一转为小写；重复出现的标头以最后一次为准
    headers: HashMap<String, String>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        // 读缓冲区末尾可能残留未使用的 0 字节
        let end = buffer
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        let request_string = match std::str::from_utf8(&buffer[..end]) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);

        // 请求行，例如 "GET /assets/abc/app.js HTTP/1.1"
        let first_line = request_lines.next().unwrap_or_default();
        let first_line_parts: Vec<&str> = first_line.split(' ').collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::UnSupportedRequestMethod);
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中出现空格虽然不规范，但仍尝试拼接恢复
        let path = first_line_parts[1..first_line_parts.len() - 1].join(" ");

        let mut headers = HashMap::new();
        for line in request_lines {
            if line.is_empty() {
                break;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_lowercase(), value.trim().to_string());
                }
                None => {
                    error!("[ID{}]忽略格式不正确的标头：{}", id, line);
                }
            }
        }

        let user_agent = headers.get("user-agent").cloned().unwrap_or_default();

        // 只要包含关键词即视为支持，不处理 q 值
        let mut accept_encoding = vec![];
        if let Some(encoding) = headers.get("accept-encoding") {
            if encoding.contains("gzip") {
                accept_encoding.push(HttpEncoding::Gzip);
            }
        }

        Ok(Self {
            method,
            path,
            version,
            user_agent,
            accept_encoding,
            headers,
        })
    }

    /// 构造一个不经过字节解析的请求，主要用于在进程内直接驱动流式传输逻辑。
    pub fn with_headers(method: HttpRequestMethod, path: &str, headers: &[(&str, &str)]) -> Self {
        let mut request = Self {
            method,
            path: path.to_string(),
            version: HttpVersion::V1_1,
            user_agent: String::new(),
            accept_encoding: vec![],
            headers: HashMap::new(),
        };
        for (name, value) in headers {
            request
                .headers
                .insert(name.to_lowercase(), value.to_string());
            if name.eq_ignore_ascii_case("accept-encoding") && value.contains("gzip") {
                request.accept_encoding.push(HttpEncoding::Gzip);
            }
        }
        request
    }
}

impl Request {
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    pub fn accepts_gzip(&self) -> bool {
        self.accept_encoding.contains(&HttpEncoding::Gzip)
    }

    /// 按名称（大小写不敏感）查询标头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// 以 HTTP 日期读取标头。
    ///
    /// 标头缺失时返回 `Ok(None)`；存在但无法解析时返回
    /// `Err(Exception::MalformedDateHeader)`，由调用方决定如何处理。
    pub fn date_header(&self, name: &str) -> Result<Option<DateTime<Utc>>, Exception> {
        match self.header(name) {
            None => Ok(None),
            Some(value) => match parse_http_date(value) {
                Some(date) => Ok(Some(date)),
                None => Err(Exception::MalformedDateHeader),
            },
        }
    }
}
