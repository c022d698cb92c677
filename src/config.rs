use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_local")]
    local: bool,
    // 仅在生产模式下为带校验和的资源设置远期 Expires
    #[serde(default)]
    production_mode: bool,
    #[serde(default = "default_compression_threshold")]
    compression_threshold: u64,
}

fn default_www_root() -> String {
    "static".to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_cache_size() -> usize {
    64
}

fn default_local() -> bool {
    true
}

fn default_compression_threshold() -> u64 {
    512
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: default_www_root(),
            port: default_port(),
            worker_threads: 0,
            cache_size: default_cache_size(),
            local: default_local(),
            production_mode: false,
            compression_threshold: default_compression_threshold(),
        }
    }

    pub fn from_toml(filename: impl AsRef<Path>) -> io::Result<Self> {
        let str_val = fs::read_to_string(filename)?;
        Ok(Self::from_toml_str(&str_val))
    }

    // 配置内容无法解析时回退到默认配置，而不是拒绝启动
    pub fn from_toml_str(str_val: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(str_val) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.cache_size == 0 {
            warn!(
                "cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为{}。",
                default_cache_size()
            );
            raw_config.cache_size = default_cache_size();
        }
        raw_config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn production_mode(&self) -> bool {
        self.production_mode
    }

    pub fn compression_threshold(&self) -> u64 {
        self.compression_threshold
    }
}
