//! 日志初始化：默认 info，可通过 RUST_LOG 覆盖。
//!
//! 请求级日志（上传、下载、删除的开始与结果）位于 info/warn；
//! 逐块的 `chunk stored` / `chunk sent` 与接收超时重试位于 debug，
//! 需要时以 `RUST_LOG=nano_drive=debug` 打开。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 安装全局 tracing 订阅者。不输出 target，span 中已带有方法、路径与客户端 IP。
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_debug_directive_parses() {
        assert_eq!(env!("CARGO_CRATE_NAME"), "nano_drive");
        assert!(EnvFilter::try_new("nano_drive=debug").is_ok());
    }
}
