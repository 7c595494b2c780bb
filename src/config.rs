//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HERALD__*` 覆盖（双下划线表示嵌套，如 `HERALD__LLM__PROVIDER=openai`）。
//! API Key 不进配置文件，单独由 ApiKeys 从进程环境（含 .env）读取，并在启动时统一校验。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;
use crate::memory::DEFAULT_MEMORY_CAPACITY;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、对话记忆容量、可选的 system prompt 文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 记忆保留条数（用户输入与回答各占一条）
    pub memory_capacity: usize,
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "herald".to_string(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            system_prompt_path: None,
        }
    }
}

/// LLM 后端
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Groq,
    OpenAi,
    /// 脚本化 Mock，离线调试用
    Mock,
}

/// [llm] 段：Agent 决策 / 汇总所用模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: LlmProvider,
    /// 为空时：groq 用 llama3-8b-8192，openai 用 gpt-4o-mini
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            model: None,
            base_url: None,
            max_tokens: 150,
            temperature: 0.7,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次 LLM 请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [tools] 段：工具超时与各工具开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub time: TimeSection,
    pub weather: WeatherSection,
    pub news: NewsSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 90,
            time: TimeSection::default(),
            weather: WeatherSection::default(),
            news: NewsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeSection {
    pub enabled: bool,
}

impl Default for TimeSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// [tools.weather] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub enabled: bool,
    pub base_url: String,
    /// metric / imperial
    pub units: String,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: crate::tools::weather::OPENWEATHERMAP_BASE_URL.to_string(),
            units: "metric".to_string(),
            timeout_secs: 10,
        }
    }
}

/// [tools.news] 段：缓存、搜索回退、正文提取与合成模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSection {
    pub enabled: bool,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    /// 每个搜索提供方的尝试次数
    pub max_retries: usize,
    /// 参与合成的搜索结果条数
    pub top_k: usize,
    /// 每个来源正文的最大字符数
    pub max_source_chars: usize,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// 搜索与网页抓取超时（秒）
    pub timeout_secs: u64,
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from(".cache/news_tool"),
            cache_ttl_secs: crate::tools::news::DEFAULT_CACHE_TTL_SECS,
            max_retries: crate::tools::news::DEFAULT_MAX_RETRIES,
            top_k: crate::tools::news::DEFAULT_TOP_K,
            max_source_chars: 4000,
            model: None,
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 15,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HERALD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HERALD__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
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
        config::Environment::with_prefix("HERALD")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 各提供方的 API Key（来自进程环境或 .env）
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub openweathermap: Option<String>,
    pub groq: Option<String>,
    pub google_search: Option<String>,
    pub google_cx: Option<String>,
    pub rapidapi: Option<String>,
    pub serp_api: Option<String>,
    pub serp_stack: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "set" } else { "unset" };
        f.debug_struct("ApiKeys")
            .field("openai", &mask(&self.openai))
            .field("openweathermap", &mask(&self.openweathermap))
            .field("groq", &mask(&self.groq))
            .field("google_search", &mask(&self.google_search))
            .field("google_cx", &mask(&self.google_cx))
            .field("rapidapi", &mask(&self.rapidapi))
            .field("serp_api", &mask(&self.serp_api))
            .field("serp_stack", &mask(&self.serp_stack))
            .finish()
    }
}

impl ApiKeys {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 用任意查找函数构建（空白值视为未设置）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            openai: get("OPENAI_API_KEY"),
            openweathermap: get("OPENWEATHERMAP_API_KEY"),
            groq: get("GROQ_API_KEY"),
            google_search: get("GOOGLE_CUSTOM_SEARCH_JSON_API"),
            google_cx: get("GOOGLE_CX"),
            rapidapi: get("RAPIDAPI_KEY"),
            serp_api: get("SERP_API_KEY"),
            serp_stack: get("SERP_STACK_API_KEY"),
        }
    }

    /// 已配置凭据的搜索提供方，按回退顺序
    pub fn search_providers(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.rapidapi.is_some() {
            out.push("bing");
        }
        if self.google_search.is_some() && self.google_cx.is_some() {
            out.push("google");
        }
        if self.serp_api.is_some() {
            out.push("serpapi");
        }
        if self.serp_stack.is_some() {
            out.push("serpstack");
        }
        out
    }

    /// 启动时校验：列出当前配置所需但缺失的全部 Key
    pub fn validate(&self, cfg: &AppConfig) -> Result<(), AgentError> {
        let mut missing: Vec<&str> = Vec::new();
        match cfg.llm.provider {
            LlmProvider::Groq if self.groq.is_none() => missing.push("GROQ_API_KEY (llm.provider = groq)"),
            LlmProvider::OpenAi if self.openai.is_none() => missing.push("OPENAI_API_KEY (llm.provider = openai)"),
            _ => {}
        }
        if cfg.tools.weather.enabled && self.openweathermap.is_none() {
            missing.push("OPENWEATHERMAP_API_KEY (weather tool)");
        }
        if cfg.tools.news.enabled {
            if self.groq.is_none() && cfg.llm.provider != LlmProvider::Groq {
                missing.push("GROQ_API_KEY (news tool synthesis)");
            }
            if self.search_providers().is_empty() {
                missing.push(
                    "one of RAPIDAPI_KEY, GOOGLE_CUSTOM_SEARCH_JSON_API + GOOGLE_CX, SERP_API_KEY, SERP_STACK_API_KEY (news tool search)",
                );
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Config(format!(
                "missing required API key(s): {}. Set them in the environment or a .env file, or disable the tool in config/default.toml",
                missing.join("; ")
            )))
        }
    }
}
