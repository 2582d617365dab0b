//! Evolver 命令行入口
//!
//! 用法：evolver <项目描述> [代数]
//! 加载配置、初始化日志，组装 general 流水线后依次运行 init_project → compile → evolve。

use anyhow::{bail, Context};
use evolver::config::load_config;
use evolver::{observability, EnvironmentBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args = std::env::args().skip(1);
    let Some(prompt) = args.next() else {
        bail!("usage: evolver <project prompt> [generations]");
    };

    let config = load_config(None).context("Failed to load config")?;
    let generations = match args.next() {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("Invalid generation count: {raw}"))?,
        None => config.evolution.generations,
    };

    let finalists = config.evolution.finalists;
    let mut env = EnvironmentBuilder::new(config)
        .build()
        .context("Failed to assemble environment")?;

    // Ctrl-C 在当前层结束后生效
    let cancel = env.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current layer");
            cancel.cancel();
        }
    });

    env.init_project(&prompt)
        .await
        .context("Project initialization failed")?;
    env.compile().context("Pipeline compilation failed")?;

    let history = env
        .evolve(generations)
        .await
        .context("Evolution failed")?
        .to_vec();

    for (generation, best) in history.iter().enumerate() {
        println!("generation {}: best fitness {best:.4}", generation + 1);
    }
    if let Some(champion) = env.champion(finalists).await {
        println!(
            "champion: {} fitness {:.4} ({})",
            champion.id(),
            champion.fitness(),
            champion.directory().display()
        );
    }
    println!("history saved to {}", env.layout().history_path().display());

    let (prompt_tokens, completion_tokens, total_tokens) = env.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total_tokens, "token usage");

    Ok(())
}
