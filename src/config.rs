//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `EVOLVER__*` 覆盖（双下划线表示嵌套，如 `EVOLVER__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub evolution: EvolutionSection,
    pub sandbox: SandboxSection,
}

/// [app] 段：工作目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 进化工作目录（其下创建 environment/），未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 协作者系统提示词目录；同名文件存在时覆盖内置提示词
    pub prompts_dir: Option<PathBuf>,
}

impl AppSection {
    pub fn workspace(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }
}

/// [llm] 段：后端选择、超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai（任意 OpenAI 兼容端点）/ mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

/// [evolution] 段：种群规模、流水线参数、随机种子与并发
#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionSection {
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// general 预设的缩放系数（>1 会显著增加 token 消耗与耗时）
    #[serde(default = "default_scale")]
    pub scale: usize,
    /// 掩码变异：每个单位被掩码的概率
    #[serde(default = "default_mutation_mask_rate")]
    pub mutation_mask_rate: f64,
    /// 交叉前置掩码的概率
    #[serde(default = "default_crossover_mask_rate")]
    pub crossover_mask_rate: f64,
    /// 掩码连续长度范围 [min, max)
    #[serde(default = "default_mask_size_min")]
    pub mask_size_min: usize,
    #[serde(default = "default_mask_size_max")]
    pub mask_size_max: usize,
    /// 固定种子便于复现选择与掩码（生成内容本身不可复现）
    pub random_seed: Option<u64>,
    /// 同时进行的沙箱构建 / 评估数
    #[serde(default = "default_max_concurrent_evaluations")]
    pub max_concurrent_evaluations: usize,
    /// 每个协作者保留的对话轮数
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// Populate 的尝试预算 = target_size * 该倍数
    #[serde(default = "default_populate_attempt_factor")]
    pub populate_attempt_factor: usize,
    /// 进化结束后交给评审协作者的前 N 名（1 表示直接取适应度最高者）
    #[serde(default = "default_finalists")]
    pub finalists: usize,
}

impl Default for EvolutionSection {
    fn default() -> Self {
        Self {
            generations: default_generations(),
            scale: default_scale(),
            mutation_mask_rate: default_mutation_mask_rate(),
            crossover_mask_rate: default_crossover_mask_rate(),
            mask_size_min: default_mask_size_min(),
            mask_size_max: default_mask_size_max(),
            random_seed: None,
            max_concurrent_evaluations: default_max_concurrent_evaluations(),
            history_turns: default_history_turns(),
            populate_attempt_factor: default_populate_attempt_factor(),
            finalists: default_finalists(),
        }
    }
}

fn default_generations() -> usize {
    1
}

fn default_scale() -> usize {
    1
}

fn default_mutation_mask_rate() -> f64 {
    0.3
}

fn default_crossover_mask_rate() -> f64 {
    0.3
}

fn default_mask_size_min() -> usize {
    1
}

fn default_mask_size_max() -> usize {
    10
}

fn default_max_concurrent_evaluations() -> usize {
    4
}

fn default_history_turns() -> usize {
    4
}

fn default_populate_attempt_factor() -> usize {
    4
}

fn default_finalists() -> usize {
    3
}

/// [sandbox] 段：每个个体的隔离执行环境
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSection {
    /// 用于创建 venv 的解释器
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_install_timeout_secs")]
    pub install_timeout_secs: u64,
    /// 单次适应度评估超时；超时视为评估失败并杀死子进程
    #[serde(default = "default_evaluation_timeout_secs")]
    pub evaluation_timeout_secs: u64,
    /// 每个依赖清单最前面固定追加的包（harness 运行前置依赖）
    #[serde(default = "default_harness_prerequisite")]
    pub harness_prerequisite: String,
    /// 自定义 harness 模板路径，未设置时使用内置模板
    pub harness_template: Option<PathBuf>,
    #[serde(default = "default_upgrade_pip")]
    pub upgrade_pip: bool,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            python: default_python(),
            install_timeout_secs: default_install_timeout_secs(),
            evaluation_timeout_secs: default_evaluation_timeout_secs(),
            harness_prerequisite: default_harness_prerequisite(),
            harness_template: None,
            upgrade_pip: default_upgrade_pip(),
        }
    }
}

fn default_python() -> String {
    if cfg!(target_os = "windows") {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

fn default_install_timeout_secs() -> u64 {
    600
}

fn default_evaluation_timeout_secs() -> u64 {
    120
}

fn default_harness_prerequisite() -> String {
    "pytest".to_string()
}

fn default_upgrade_pip() -> bool {
    true
}

/// 从 config 目录加载配置，环境变量 EVOLVER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 EVOLVER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("EVOLVER")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
