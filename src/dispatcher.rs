// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 资源请求分发模块
//!
//! 将 URL 映射到资源根目录下的文件，并交给 `ResourceStreamer` 处理。
//!
//! ## 路由规则：
//! 1. `/assets/<checksum>/<path>` -> 带校验和的资源。校验和不匹配时
//!    重定向到资源当前的地址。
//! 2. `/modules/<path>` -> 地址中不含校验和的模块，不设置远期过期时间，
//!    每次都通过 ETag 重新验证。
//! 3. 其余路径 -> 404。

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};
use regex::Regex;

use crate::{
    exception::Exception,
    param::*,
    request::Request,
    resource::{FileResource, Resource},
    response::Response,
    source::StreamableResourceSource,
    streamable::{CompressionStatus, StreamableResourceProcessing},
    streamer::{ResourceStreamer, StreamOption, DEFAULT_OPTIONS},
};

pub struct AssetDispatcher {
    root: PathBuf,
    source: Arc<StreamableResourceSource>,
    streamer: ResourceStreamer,
    asset_pattern: Regex,
}

impl AssetDispatcher {
    pub fn new(root: impl AsRef<Path>, source: Arc<StreamableResourceSource>, production_mode: bool) -> Self {
        let streamer = ResourceStreamer::new(Arc::clone(&source), production_mode);
        let asset_pattern = match Regex::new(r"^/assets/([^/]+)/(.+)$") {
            Ok(re) => re,
            Err(e) => panic!("资源路径正则表达式非法：{}", e),
        };
        Self {
            root: root.as_ref().to_path_buf(),
            source,
            streamer,
            asset_pattern,
        }
    }

    /// 处理一次请求并生成响应。只有读取资源时的 I/O 错误会以 `Err` 返回。
    pub fn dispatch(&self, request: &Request, id: u128) -> io::Result<Response> {
        let mut response = Response::for_request(request);

        match request.method() {
            HttpRequestMethod::Get | HttpRequestMethod::Head => {}
            HttpRequestMethod::Options => {
                debug!("[ID{}]请求方法为OPTIONS", id);
                response.set_status(204).set_header("Allow", &allow_header());
                return Ok(response);
            }
            method => {
                warn!("[ID{}]不支持的请求方法{}，返回405", id, method);
                response
                    .send_error(405, &format!("Method {} is not supported.", method))
                    .set_header("Allow", &allow_header());
                return Ok(response);
            }
        }

        // 查询字符串不参与资源定位
        let path = request.path().split('?').next().unwrap_or_default();

        if let Some(captures) = self.asset_pattern.captures(path) {
            let checksum = &captures[1];
            let relative = &captures[2];
            if let Err(e) = validate_path(relative) {
                warn!("[ID{}]请求的路径：{} 包含非法字符，返回400", id, path);
                response.send_error(400, &e.to_string());
                return Ok(response);
            }

            let resource = FileResource::new(&self.root, relative);
            let handled = self.streamer.stream_resource(
                request,
                &mut response,
                &resource,
                checksum,
                DEFAULT_OPTIONS,
            )?;
            if !handled {
                let compress = checksum.starts_with(COMPRESSED_CHECKSUM_MARKER);
                let location = self.asset_url(&resource, compress)?;
                debug!("[ID{}]校验和{}已过期，重定向到{}", id, checksum, location);
                response.set_status(302).set_header(LOCATION_HEADER, &location);
            }
            return Ok(response);
        }

        if let Some(relative) = path.strip_prefix(MODULE_PATH_PREFIX) {
            if let Err(e) = validate_path(relative) {
                warn!("[ID{}]请求的路径：{} 包含非法字符，返回400", id, path);
                response.send_error(400, &e.to_string());
                return Ok(response);
            }

            let resource = FileResource::new(&self.root, relative);
            // 模块地址不带校验和，只用标记表达是否需要压缩变体
            let provided = match request.accepts_gzip() {
                true => COMPRESSED_CHECKSUM_MARKER.to_string(),
                false => String::new(),
            };
            self.streamer.stream_resource(
                request,
                &mut response,
                &resource,
                &provided,
                &[StreamOption::OmitExpiration],
            )?;
            return Ok(response);
        }

        warn!("[ID{}]请求的路径：{} 不存在，返回404", id, path);
        response.send_error(404, &format!("No asset is mapped to '{}'.", path));
        Ok(response)
    }

    /// 构造资源当前的访问地址：`/assets/[z]<checksum>/<path>`。
    ///
    /// 只有实际交付的变体是压缩后的内容时才带 `z` 标记。
    pub fn asset_url(&self, resource: &dyn Resource, compress: bool) -> io::Result<String> {
        let processing = match compress {
            true => StreamableResourceProcessing::CompressionEnabled,
            false => StreamableResourceProcessing::CompressionDisabled,
        };
        let streamable = self.source.get_streamable_resource(resource, processing)?;
        let marker = match streamable.compression() {
            CompressionStatus::Compressed => COMPRESSED_CHECKSUM_MARKER.to_string(),
            _ => String::new(),
        };
        Ok(format!(
            "{}{}{}/{}",
            ASSET_PATH_PREFIX,
            marker,
            streamable.checksum(),
            resource.path()
        ))
    }

    /// 以根目录下的相对路径构造资源地址
    pub fn asset_url_for(&self, relative: &str, compress: bool) -> io::Result<String> {
        validate_path(relative).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let resource = FileResource::new(&self.root, relative);
        if !resource.exists() {
            return Err(io::Error::new(io::ErrorKind::NotFound, Exception::FileNotFound));
        }
        self.asset_url(&resource, compress)
    }
}

fn allow_header() -> String {
    ALLOWED_METHODS
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 拒绝可能越出资源根目录的路径
fn validate_path(relative: &str) -> Result<(), Exception> {
    if relative.is_empty()
        || relative.starts_with('/')
        || relative.contains('\\')
        || relative.contains('\0')
        || relative.split('/').any(|segment| segment == "..")
    {
        return Err(Exception::InvalidPath);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("js/app.js").is_ok());
        assert!(validate_path("a..b.js").is_ok());
        assert_eq!(validate_path(""), Err(Exception::InvalidPath));
        assert_eq!(validate_path("../etc/passwd"), Err(Exception::InvalidPath));
        assert_eq!(validate_path("js/../../secret"), Err(Exception::InvalidPath));
        assert_eq!(validate_path("/etc/passwd"), Err(Exception::InvalidPath));
        assert_eq!(validate_path("..\\windows"), Err(Exception::InvalidPath));
        assert_eq!(validate_path("a\0b"), Err(Exception::InvalidPath));
    }

    #[test]
    fn test_allow_header() {
        assert_eq!(allow_header(), "GET, HEAD, OPTIONS");
    }
}
