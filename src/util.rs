use std::{
    ffi::OsStr,
    io::{self, Write},
    time::SystemTime,
};

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use flate2::{write::GzEncoder, Compression};
use log::{debug, error};

use crate::param::{DEFAULT_MIME_TYPE, MIME_TYPES, STATUS_CODES};

/// IMF-fixdate，HTTP 标头中唯一推荐生成的日期格式
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// 已废弃的 RFC 850 格式，接收时仍需兼容
const RFC_850_DATE: &str = "%A, %d-%b-%y %H:%M:%S GMT";
/// C 语言 asctime() 格式
const ASCTIME_DATE: &str = "%a %b %e %H:%M:%S %Y";

pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => escape_html(n),
            None => match STATUS_CODES.get(&code) {
                Some(d) => d.to_string(),
                None => {
                    error!("非法的状态码：{}", code);
                    "Unknown Status".to_string()
                }
            },
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

// 错误信息中可能带有客户端提供的路径，写入页面前必须转义
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format(IMF_FIXDATE).to_string()
}

/// 解析 HTTP 日期。依次尝试 IMF-fixdate、RFC 850 与 asctime 三种格式，
/// 全部失败时返回 `None`。
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    [IMF_FIXDATE, RFC_850_DATE, ASCTIME_DATE]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// HTTP 日期只精确到秒，比较前先截掉亚秒部分
pub fn to_http_time(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time).trunc_subsecs(0)
}

pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;

    let ratio = if data.is_empty() {
        0.0
    } else {
        (1.0 - compressed.len() as f64 / data.len() as f64) * 100.0
    };
    debug!(
        "gzip压缩完成，原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
        data.len(),
        compressed.len(),
        ratio
    );
    Ok(compressed)
}

/// 已经是压缩格式的资源（图片、音视频、字体、归档）再次 gzip 没有收益
pub fn is_compressable(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/avif",
        "image/bmp",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/gzip",
        "application/pdf",
        "font/woff",
        "font/woff2",
        "application/vnd.ms-fontobject",
        "application/octet-stream",
    ];

    !skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

pub fn get_mime(extension: Option<&OsStr>) -> &'static str {
    let extension = match extension.and_then(|e| e.to_str()) {
        Some(e) => e.to_ascii_lowercase(),
        None => return DEFAULT_MIME_TYPE,
    };
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v,
        None => DEFAULT_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404, Some("测试404")).build();
        assert!(html.contains("404"));
        assert!(html.contains("测试404"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_from_status_code_no_note() {
        let html = HtmlBuilder::from_status_code(304, None).build();
        assert!(html.contains("Not Modified"));
    }

    #[test]
    fn test_html_builder_unknown_code_does_not_panic() {
        let html = HtmlBuilder::from_status_code(599, None).build();
        assert!(html.contains("599"));
    }

    #[test]
    fn test_html_builder_escapes_note() {
        let html = HtmlBuilder::from_status_code(404, Some("<script>alert(1)</script>")).build();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_format_http_date() {
        let date = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(format_http_date(&date), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_parse_http_date_all_formats() {
        let expected = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(expected));
        assert_eq!(parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"), Some(expected));
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), Some(expected));
    }

    #[test]
    fn test_parse_http_date_malformed() {
        assert_eq!(parse_http_date("yesterday"), None);
        assert_eq!(parse_http_date(""), None);
        assert_eq!(parse_http_date("Sun, 32 Nov 1994 08:49:37 GMT"), None);
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        let date = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let parsed = parse_http_date(&format_http_date(&date)).unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.second(), 59);
        assert_eq!(parsed, date);
    }

    #[test]
    fn test_to_http_time_truncates_subseconds() {
        let time = UNIX_EPOCH + Duration::from_millis(1_700_000_000_750);
        let truncated = to_http_time(time);
        assert_eq!(truncated.timestamp(), 1_700_000_000);
        assert_eq!(truncated.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_gzip_magic_bytes() {
        let data = b"Hello, World! This is a test string for compression.".to_vec();
        let result = gzip(&data).unwrap();
        assert_ne!(result, data);
        assert_eq!(&result[0..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_gzip_is_deterministic() {
        let data = vec![b'A'; 10000];
        let first = gzip(&data).unwrap();
        let second = gzip(&data).unwrap();
        assert_eq!(first, second);
        assert!(first.len() < data.len());
    }

    #[test]
    fn test_is_compressable() {
        assert!(is_compressable("text/css;charset=utf-8"));
        assert!(is_compressable("text/javascript;charset=utf-8"));
        assert!(is_compressable("image/svg+xml"));
        assert!(!is_compressable("image/png"));
        assert!(!is_compressable("video/mp4"));
        assert!(!is_compressable("font/woff2"));
    }

    #[test]
    fn test_get_mime() {
        assert_eq!(get_mime(Some(OsStr::new("html"))), "text/html;charset=utf-8");
        assert_eq!(get_mime(Some(OsStr::new("JS"))), "text/javascript;charset=utf-8");
        assert_eq!(get_mime(Some(OsStr::new("png"))), "image/png");
        assert_eq!(get_mime(Some(OsStr::new("unknown_extension"))), DEFAULT_MIME_TYPE);
        assert_eq!(get_mime(None), DEFAULT_MIME_TYPE);
    }
}
