use std::{io, path::Path, sync::Arc};

use log::debug;

use crate::{
    cache::{CacheKey, StreamableCache},
    config::Config,
    resource::Resource,
    streamable::{CompressionStatus, StreamableResource, StreamableResourceProcessing},
    util::{get_mime, gzip, is_compressable, to_http_time},
};

/// 把资源加工为可直接交付的 `StreamableResource`，并按处理模式缓存结果。
pub struct StreamableResourceSource {
    cache: StreamableCache,
    compression_threshold: u64,
}

impl StreamableResourceSource {
    pub fn new(cache_size: usize, compression_threshold: u64) -> Self {
        Self {
            cache: StreamableCache::from_capacity(cache_size),
            compression_threshold,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_size(), config.compression_threshold())
    }

    /// 获取资源在指定处理模式下的表示。
    ///
    /// 缓存以资源当前的修改时间校验，文件被修改后会重新计算。
    pub fn get_streamable_resource(
        &self,
        resource: &dyn Resource,
        processing: StreamableResourceProcessing,
    ) -> io::Result<Arc<StreamableResource>> {
        let modified_time = resource.last_modified()?;
        let path = resource.path();
        self.cache
            .get_or_compute(CacheKey::new(&path, processing), modified_time, || {
                self.build(resource, processing, &path, modified_time)
            })
    }

    fn build(
        &self,
        resource: &dyn Resource,
        processing: StreamableResourceProcessing,
        path: &str,
        modified_time: std::time::SystemTime,
    ) -> io::Result<StreamableResource> {
        let content = resource.read()?;
        let content_type = get_mime(Path::new(path).extension());
        let last_modified = to_http_time(modified_time);

        if !is_compressable(content_type) {
            debug!("{} 的类型 {} 不需要压缩", path, content_type);
            return Ok(StreamableResource::new(
                path,
                content_type,
                CompressionStatus::NotCompressable,
                last_modified,
                content,
            ));
        }

        let wants_compression = processing == StreamableResourceProcessing::CompressionEnabled
            && content.len() as u64 >= self.compression_threshold;
        if !wants_compression {
            return Ok(StreamableResource::new(
                path,
                content_type,
                CompressionStatus::Compressable,
                last_modified,
                content,
            ));
        }

        debug!("压缩资源 {}，原始大小: {} bytes", path, content.len());
        let compressed = gzip(&content)?;
        Ok(StreamableResource::new(
            path,
            content_type,
            CompressionStatus::Compressed,
            last_modified,
            compressed.into(),
        ))
    }
}
