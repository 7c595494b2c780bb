//! Herald 命令行入口
//!
//! 加载 .env 与配置、校验 API Key（缺失即退出），然后进入 REPL：
//! 每行输入交给 Agent 处理一轮，回答打印到 stdout。
//! 命令：/clear 清空记忆，/history 查看记忆，quit / exit / /quit 或 EOF 退出。

use std::path::PathBuf;

use anyhow::Context;
use herald::agent::build_agent;
use herald::config::{load_config, ApiKeys};
use herald::observability;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    observability::init();

    let config_path = std::env::var("HERALD_CONFIG").ok().map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;
    let keys = ApiKeys::from_env();
    tracing::debug!(?keys, "api keys");
    let mut agent = build_agent(&cfg, &keys).context("Failed to start agent")?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Herald is ready. Ask about the time, the weather or the news (type 'quit' to exit).\n")
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" | "/quit" => break,
            "/clear" => {
                agent.clear_memory();
                stdout.write_all(b"Memory cleared.\n").await?;
            }
            "/history" => {
                let history = agent.memory().context();
                stdout.write_all(format!("{}\n", history).as_bytes()).await?;
            }
            _ => {
                let answer = agent.handle(input).await;
                stdout.write_all(format!("{}\n", answer).as_bytes()).await?;
            }
        }
    }

    stdout.write_all(b"Goodbye.\n").await?;
    stdout.flush().await?;
    Ok(())
}
