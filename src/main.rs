// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 资源服务器
//!
//! 基于 Tokio 运行时的多线程资源服务器：
//! - 以 `/assets/<checksum>/<path>` 形式提供带校验和的静态资源
//! - 条件请求（If-Modified-Since / If-None-Match）返回 304
//! - 按处理模式缓存计算后的资源（可选 gzip 压缩）
//! - 后台管理控制台（CLI 指令交互）

use asset_streamer::{AssetDispatcher, Config, Request, Response, StreamableResourceSource};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Instant,
};

const CONFIG_FILE: &str = "config/development.toml";
const LOG_CONFIG_FILE: &str = "config/log4rs.yaml";
const READ_BUFFER_SIZE: usize = 8192;

fn main() {
    // 1. 日志系统：log4rs 通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file(LOG_CONFIG_FILE, Default::default()) {
        eprintln!("无法加载日志配置{}：{}", LOG_CONFIG_FILE, e);
    }

    // 2. 运行参数
    let config = match Config::from_toml(CONFIG_FILE) {
        Ok(config) => {
            info!("配置文件已载入");
            config
        }
        Err(e) => {
            warn!("无法读取配置文件{}：{}，使用默认配置", CONFIG_FILE, e);
            Config::from_toml_str("")
        }
    };
    info!("www root: {}", config.www_root());
    info!("生产模式: {}", config.production_mode());

    // 3. 根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        error!("服务器异常退出：{}", e);
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> std::io::Result<()> {
    // 共享资源：缓存与分发器在所有连接之间共享，自身保证线程安全
    let source = Arc::new(StreamableResourceSource::from_config(&config));
    let dispatcher = Arc::new(AssetDispatcher::new(
        config.www_root(),
        source,
        config.production_mode(),
    ));

    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return Err(e);
        }
    };
    info!("服务端将在{}上监听Socket连接", socket);

    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(AtomicU32::new(0));

    tokio::spawn(console(
        Arc::clone(&shutdown),
        Arc::clone(&active_connection),
        Arc::clone(&dispatcher),
    ));

    let mut id: u128 = 0;

    loop {
        let (mut stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let dispatcher = Arc::clone(&dispatcher);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(&mut stream, id, &dispatcher).await;
            active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }
    Ok(())
}

/// # 管理控制台
///
/// 从标准输入读取运维指令，不阻塞监听循环。
async fn console(
    shutdown: Arc<Notify>,
    active_connection: Arc<AtomicU32>,
    dispatcher: Arc<AssetDispatcher>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(input)) = lines.next_line().await {
        let mut parts = input.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("stop"), _) => {
                println!("停机指令已激活，服务器将停止接受新连接...");
                shutdown.notify_one();
                break;
            }
            (Some("status"), _) => {
                println!("== Asset Streamer 状态 ===");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("==========================");
            }
            (Some("url"), Some(path)) => match dispatcher.asset_url_for(path, true) {
                Ok(url) => println!("{}", url),
                Err(e) => println!("无法生成{}的地址：{}", path, e),
            },
            (Some("help"), _) => {
                println!("== Asset Streamer Help ==");
                println!("stop       - 发出停机信号");
                println!("status     - 查看当前服务器运行状态");
                println!("url <path> - 查看资源当前的访问地址");
                println!("help       - 显示此帮助信息");
                println!("=========================");
            }
            (None, _) => {}
            _ => println!("无效的命令：{}", input.trim()),
        }
    }
}

/// # 连接处理器
///
/// 读取并解析请求，交给分发器生成响应，然后写回客户端。
async fn handle_connection(stream: &mut TcpStream, id: u128, dispatcher: &AssetDispatcher) {
    let mut buffer = vec![0; READ_BUFFER_SIZE];

    let n = match stream.read(&mut buffer).await {
        Ok(0) => return, // 客户端主动关闭连接
        Ok(n) => n,
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    };
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    let request = match Request::try_from(&buffer[..n], id) {
        Ok(req) => req,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}，返回400", id, e);
            let mut response = Response::new();
            response.send_error(400, &e.to_string());
            if let Err(e) = stream.write_all(&response.as_bytes()).await {
                warn!("[ID{}]发送400响应失败: {}", id, e);
            }
            return;
        }
    };

    let response = match dispatcher.dispatch(&request, id) {
        Ok(response) => response,
        Err(e) => {
            error!("[ID{}]处理请求{}时发生I/O错误: {}", id, request.path(), e);
            let mut response = Response::for_request(&request);
            response.send_error(500, "The asset could not be read.");
            response
        }
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, response_bytes.len());
    if let Err(e) = stream.write_all(&response_bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    if let Err(e) = stream.flush().await {
        warn!("[ID{}]刷新TCPStream失败: {}", id, e);
    }
}
