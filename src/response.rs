use crate::{
    param::*,
    request::Request,
    util::{format_http_date, gzip, HtmlBuilder},
};

use bytes::Bytes;
use chrono::prelude::*;
use log::{debug, error};

use std::io::{self, Write};

/// 小于该大小的生成内容不值得压缩
const MIN_COMPRESS_SIZE: usize = 256;

/// 一次请求对应的响应。
///
/// 流式传输逻辑通过 `set_status`、`set_header` 等方法修改它，
/// 最终由连接处理器调用 `as_bytes` 序列化后写入 Socket。
#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    date: DateTime<Utc>,
    server_name: String,
    content: Option<Bytes>,
    error_message: Option<String>,
    accept_gzip: bool,
    headonly: bool,
    compression_disabled: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            headers: Vec::new(),
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            content: None,
            error_message: None,
            accept_gzip: false,
            headonly: false,
            compression_disabled: false,
        }
    }

    /// 根据请求的方法与 `Accept-Encoding` 构造响应
    pub fn for_request(request: &Request) -> Self {
        let mut response = Self::new();
        response.accept_gzip = request.accepts_gzip();
        response.headonly = request.method() == HttpRequestMethod::Head;
        response
    }

    pub fn set_status(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&reason) => reason.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown Status".to_string()
            }
        };
        self
    }

    /// 以错误页面作为响应体发送指定状态码
    pub fn send_error(&mut self, code: u16, message: &str) -> &mut Self {
        self.set_status(code);
        let page = HtmlBuilder::from_status_code(code, Some(message)).build();
        self.content = Some(Bytes::from(page));
        self.content_type = Some("text/html;charset=utf-8".to_string());
        self.error_message = Some(message.to_string());
        self
    }

    /// 设置标头，同名（大小写不敏感）标头会被替换
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn set_date_header(&mut self, name: &str, date: DateTime<Utc>) -> &mut Self {
        self.set_header(name, &format_http_date(&date))
    }

    pub fn set_content_length(&mut self, length: u64) -> &mut Self {
        self.set_header(CONTENT_LENGTH_HEADER, &length.to_string())
    }

    /// 阻止序列化阶段对响应体做自动压缩。
    /// 资源流式传输自行管理压缩，已压缩的内容不能再被处理一次。
    pub fn disable_compression(&mut self) -> &mut Self {
        self.compression_disabled = true;
        self
    }

    /// 打开指定内容类型的响应体。
    ///
    /// 返回的 `ResponseBody` 在 `close` 或离开作用域时关闭，
    /// 因此即使写入中途出错，已写入的内容也会被提交。
    pub fn body(&mut self, content_type: &str) -> ResponseBody<'_> {
        self.content_type = Some(content_type.to_string());
        ResponseBody {
            response: self,
            buffer: Vec::new(),
        }
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let mut content_encoding = self.header(CONTENT_ENCODING_HEADER).map(str::to_string);
        let mut content = self.content.clone();

        // 生成内容（如错误页面）按客户端能力做一次 gzip
        if !self.compression_disabled && self.accept_gzip && content_encoding.is_none() {
            if let Some(c) = &content {
                if c.len() >= MIN_COMPRESS_SIZE {
                    match gzip(c) {
                        Ok(compressed) => {
                            content = Some(Bytes::from(compressed));
                            content_encoding = Some(GZIP_CONTENT_ENCODING.to_string());
                        }
                        Err(e) => {
                            error!("压缩响应内容失败: {}，返回未压缩内容", e);
                        }
                    }
                }
            }
        }

        let mut header = String::new();
        header.push_str(&format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        ));
        if let Some(t) = &self.content_type {
            header.push_str(&format!("{}: {}{}", CONTENT_TYPE_HEADER, t, CRLF));
        }
        if let Some(e) = &content_encoding {
            header.push_str(&format!("{}: {}{}", CONTENT_ENCODING_HEADER, e, CRLF));
        }
        let bodyless_status = self.status_code == 204 || self.status_code == 304;
        match self.header(CONTENT_LENGTH_HEADER) {
            // 流式传输显式给出的长度描述的是资源本身（HEAD 请求同样适用）
            Some(length) if content_encoding.as_deref() == self.header(CONTENT_ENCODING_HEADER) => {
                header.push_str(&format!("{}: {}{}", CONTENT_LENGTH_HEADER, length, CRLF));
            }
            _ if !bodyless_status => {
                let length = content.as_ref().map_or(0, |c| c.len());
                header.push_str(&format!("{}: {}{}", CONTENT_LENGTH_HEADER, length, CRLF));
            }
            _ => {}
        }
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(CONTENT_LENGTH_HEADER)
                || name.eq_ignore_ascii_case(CONTENT_ENCODING_HEADER)
            {
                continue;
            }
            header.push_str(&format!("{}: {}{}", name, value, CRLF));
        }
        header.push_str(&format!("Date: {}{}", format_http_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        header.push_str(CRLF);

        let mut bytes = header.into_bytes();
        if !self.headonly && !bodyless_status {
            if let Some(c) = &content {
                bytes.extend_from_slice(c);
            }
        }
        bytes
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_compression_disabled(&self) -> bool {
        self.compression_disabled
    }
}

/// 响应体写入器。
///
/// 写入的字节先进入缓冲区，关闭时整体提交给所属的 `Response`。
pub struct ResponseBody<'a> {
    response: &'a mut Response,
    buffer: Vec<u8>,
}

impl ResponseBody<'_> {
    pub fn close(self) {
        // 提交逻辑在 Drop 中完成
    }
}

impl Write for ResponseBody<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ResponseBody<'_> {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        debug!("响应体已关闭，共 {} bytes", buffer.len());
        self.response.content = Some(Bytes::from(buffer));
    }
}
