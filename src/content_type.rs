//! 下载响应的内容类型判定（有限集合，其余一律按纯文本处理）。

const KNOWN_TYPES: [(&str, &str); 3] = [
    (".pdf", "application/pdf"),
    (".html", "text/html"),
    (".jpeg", "image/jpeg"),
];

pub const FALLBACK_TYPE: &str = "text/plain";

/// 按文件名后缀（不区分大小写）返回内容类型。
pub fn classify(name: &str) -> &'static str {
    KNOWN_TYPES
        .iter()
        .find(|(ext, _)| has_extension(name, ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK_TYPE)
}

fn has_extension(name: &str, ext: &str) -> bool {
    name.len() >= ext.len()
        && name
            .get(name.len() - ext.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(ext))
}
