//! 执行上下文：每个个体独占一个沙箱目录，依赖安装与 harness 运行都在其中进行
//!
//! `ExecutionContext` 以沙箱目录为键，暴露 create / install_dependencies / run_harness / destroy；
//! 可以用本地进程、容器或远程沙箱实现。`VenvContext` 是基于 Python venv + 子进程的默认实现。
//! 所有子进程都带超时，超时后随 future 一起 drop 并被杀死（kill_on_drop）。

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::SandboxSection;
use crate::core::SandboxError;

#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// 在沙箱目录中构建全新的隔离运行时
    async fn create(&self, sandbox: &Path) -> Result<(), SandboxError>;

    /// 安装清单中声明的依赖
    async fn install_dependencies(&self, sandbox: &Path, manifest: &Path) -> Result<(), SandboxError>;

    /// 以无参数方式运行 harness；返回即表示进程成功退出
    async fn run_harness(&self, sandbox: &Path, harness: &Path) -> Result<(), SandboxError>;

    /// 释放运行时资源（目录本身由 kill 迁移到冷存储，不在这里删除）
    async fn destroy(&self, _sandbox: &Path) -> Result<(), SandboxError> {
        Ok(())
    }
}

/// 运行命令（带超时），非零退出码转为 NonZeroExit
pub(crate) async fn run_command(
    mut cmd: Command,
    step: &str,
    timeout: Duration,
) -> Result<Output, SandboxError> {
    let program = format!("{:?}", cmd.as_std().get_program());
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| SandboxError::Timeout {
            step: step.to_string(),
            timeout,
        })?
        .map_err(|source| SandboxError::Spawn { program, source })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        tracing::debug!(step, stdout = %stdout.trim(), "sandbox process output");
    }

    if !output.status.success() {
        return Err(SandboxError::NonZeroExit {
            step: step.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// 每个个体一个 Python 虚拟环境（<sandbox>/venv）
#[derive(Debug, Clone)]
pub struct VenvContext {
    python: String,
    upgrade_pip: bool,
    install_timeout: Duration,
    evaluation_timeout: Duration,
}

impl VenvContext {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            upgrade_pip: true,
            install_timeout: Duration::from_secs(600),
            evaluation_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_upgrade_pip(mut self, upgrade_pip: bool) -> Self {
        self.upgrade_pip = upgrade_pip;
        self
    }

    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout = timeout;
        self
    }

    /// venv 内的解释器路径
    pub fn interpreter(sandbox: &Path) -> PathBuf {
        if cfg!(target_os = "windows") {
            sandbox.join("venv").join("Scripts").join("python.exe")
        } else {
            sandbox.join("venv").join("bin").join("python")
        }
    }

    fn venv_python(&self, sandbox: &Path) -> Result<PathBuf, SandboxError> {
        let python = Self::interpreter(sandbox);
        if python.exists() {
            Ok(python)
        } else {
            Err(SandboxError::Missing(python))
        }
    }
}

impl From<&SandboxSection> for VenvContext {
    fn from(section: &SandboxSection) -> Self {
        VenvContext::new(section.python.clone())
            .with_upgrade_pip(section.upgrade_pip)
            .with_install_timeout(Duration::from_secs(section.install_timeout_secs))
            .with_evaluation_timeout(Duration::from_secs(section.evaluation_timeout_secs))
    }
}

#[async_trait]
impl ExecutionContext for VenvContext {
    async fn create(&self, sandbox: &Path) -> Result<(), SandboxError> {
        tracing::debug!(sandbox = %sandbox.display(), "creating virtual environment");
        let mut cmd = Command::new(&self.python);
        cmd.args(["-m", "venv", "venv"]).current_dir(sandbox);
        run_command(cmd, "venv", self.install_timeout).await?;

        let python = self.venv_python(sandbox)?;
        if self.upgrade_pip {
            let mut cmd = Command::new(&python);
            cmd.args(["-m", "pip", "install", "--upgrade", "pip"])
                .current_dir(sandbox);
            // pip 升级失败不致命，旧版 pip 通常仍可用
            if let Err(e) = run_command(cmd, "pip upgrade", self.install_timeout).await {
                tracing::warn!(sandbox = %sandbox.display(), error = %e, "pip upgrade failed, continuing");
            }
        }
        Ok(())
    }

    async fn install_dependencies(&self, sandbox: &Path, manifest: &Path) -> Result<(), SandboxError> {
        let python = self.venv_python(sandbox)?;
        if !manifest.exists() {
            return Err(SandboxError::Missing(manifest.to_path_buf()));
        }
        let mut cmd = Command::new(&python);
        cmd.args(["-m", "pip", "install", "-r"])
            .arg(manifest)
            .current_dir(sandbox);
        run_command(cmd, "pip install", self.install_timeout).await?;
        tracing::debug!(sandbox = %sandbox.display(), "dependencies installed");
        Ok(())
    }

    async fn run_harness(&self, sandbox: &Path, harness: &Path) -> Result<(), SandboxError> {
        let python = self.venv_python(sandbox)?;
        let mut cmd = Command::new(&python);
        cmd.arg(harness).current_dir(sandbox);
        run_command(cmd, "harness", self.evaluation_timeout).await?;
        Ok(())
    }
}
