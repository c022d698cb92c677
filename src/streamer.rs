// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 资源流式传输模块
//!
//! 负责把一个资源写入响应，并处理 HTTP 缓存验证：
//! - 校验 URL 中携带的校验和，不匹配时返回 `false`，由调用方另行处理；
//! - 处理 `If-Modified-Since` 与 `If-None-Match` 条件请求，命中时返回 304；
//! - 否则写出 `ETag`、`Last-Modified`、`Expires`/`Cache-Control` 等标头与内容。
//!
//! 可预期的结果（资源不存在、校验和不匹配、条件请求命中）都通过返回值与
//! 状态码表达，只有读写过程中的 I/O 错误才以 `Err` 向上传播。
//!
//! 同一个 `ResourceStreamer` 实例在所有请求之间共享，自身不保存任何请求状态。

use std::{io, sync::Arc};

use log::{debug, error};

use crate::{
    exception::Exception,
    param::*,
    request::Request,
    resource::Resource,
    response::Response,
    source::StreamableResourceSource,
    streamable::{CompressionStatus, StreamableResource, StreamableResourceProcessing},
};

/// 流式传输的行为选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOption {
    /// 不设置远期 `Expires`，改为要求客户端每次重新验证。
    /// 用于地址中不含校验和的资源（例如模块）。
    OmitExpiration,
}

pub const DEFAULT_OPTIONS: &[StreamOption] = &[];

pub struct ResourceStreamer {
    source: Arc<StreamableResourceSource>,
    production_mode: bool,
}

impl ResourceStreamer {
    pub fn new(source: Arc<StreamableResourceSource>, production_mode: bool) -> Self {
        Self {
            source,
            production_mode,
        }
    }

    /// 流式传输一个资源。
    ///
    /// `provided_checksum` 为空表示不校验；以 `z` 开头表示客户端需要压缩变体，
    /// 比较前会去掉该标记。返回 `Ok(false)` 表示校验和不匹配，响应未被修改。
    pub fn stream_resource(
        &self,
        request: &Request,
        response: &mut Response,
        resource: &dyn Resource,
        provided_checksum: &str,
        options: &[StreamOption],
    ) -> io::Result<bool> {
        if !resource.exists() {
            response.send_error(
                404,
                &format!(
                    "Unable to locate asset '{}' (the file does not exist).",
                    resource.path()
                ),
            );
            return Ok(true);
        }

        let (compress, checksum) = match provided_checksum.strip_prefix(COMPRESSED_CHECKSUM_MARKER) {
            Some(stripped) => (true, stripped),
            None => (false, provided_checksum),
        };
        let processing = match compress {
            true => StreamableResourceProcessing::CompressionEnabled,
            false => StreamableResourceProcessing::CompressionDisabled,
        };

        let operation = format!(
            "Streaming {}{}",
            resource.path(),
            if compress { " (compressed)" } else { "" }
        );
        debug!("{}", operation);

        let result = self
            .source
            .get_streamable_resource(resource, processing)
            .and_then(|streamable| {
                self.stream_streamable(request, response, &streamable, checksum, options)
            });
        if let Err(e) = &result {
            error!("{} 失败：{}", operation, e);
        }
        result
    }

    /// 流式传输一个已经加工好的资源，`provided_checksum` 不再带压缩标记。
    pub fn stream_streamable(
        &self,
        request: &Request,
        response: &mut Response,
        streamable: &StreamableResource,
        provided_checksum: &str,
        options: &[StreamOption],
    ) -> io::Result<bool> {
        let actual_checksum = streamable.checksum();

        if !provided_checksum.is_empty() && provided_checksum != actual_checksum {
            debug!(
                "{} 的校验和不匹配：请求 {}，实际 {}",
                streamable.description(),
                provided_checksum,
                actual_checksum
            );
            return Ok(false);
        }

        let last_modified = streamable.last_modified();

        // 格式错误的日期等同于标头缺失
        let if_modified_since = match request.date_header(IF_MODIFIED_SINCE_HEADER) {
            Ok(date) => date,
            Err(Exception::MalformedDateHeader) => {
                debug!("忽略格式错误的 {} 标头", IF_MODIFIED_SINCE_HEADER);
                None
            }
            Err(_) => None,
        };

        // 两种 304 响应都带 ETag
        let token = format!("\"{}\"", actual_checksum);
        response.set_header(ETAG_HEADER, &token);

        if let Some(since) = if_modified_since {
            if since.timestamp() > 0 && since >= last_modified {
                response.set_status(304);
                return Ok(true);
            }
        }

        if request.header(IF_NONE_MATCH_HEADER) == Some(token.as_str()) {
            response.set_status(304);
            return Ok(true);
        }

        response.disable_compression();
        response.set_date_header(LAST_MODIFIED_HEADER, last_modified);

        let omit_expiration = options.contains(&StreamOption::OmitExpiration);

        if self.production_mode && !omit_expiration {
            response.set_date_header(EXPIRES_HEADER, last_modified + ten_years());
        }

        if omit_expiration {
            response.set_header(CACHE_CONTROL_HEADER, MUST_REVALIDATE);
        }

        response.set_content_length(streamable.size());

        if streamable.compression() == CompressionStatus::Compressed {
            response.set_header(CONTENT_ENCODING_HEADER, GZIP_CONTENT_ENCODING);
        }

        let mut body = response.body(streamable.content_type());
        streamable.stream_to(&mut body)?;
        body.close();

        Ok(true)
    }
}
