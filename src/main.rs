use anyhow::Result;
use std::path::Path;

use csat_item_gen::utils::logging::init_tracing;
use csat_item_gen::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    init_tracing();

    // 加载配置：指定 CONFIG_FILE 时先读文件，环境变量始终覆盖
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => Config::from_toml_file(Path::new(&path))?,
        Err(_) => Config::from_env(),
    };

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
