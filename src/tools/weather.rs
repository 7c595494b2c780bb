//! Weather 工具：调用 OpenWeatherMap 当前天气接口
//!
//! GET {base_url}/data/2.5/weather?q=<location>&appid=<key>&units=<metric|imperial>。
//! 404（city not found）与 400（Nothing to geocode）视为参数错误；其它非 2xx、网络错误与格式错误视为外部服务错误。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::ToolError;
use crate::tools::Tool;

pub const OPENWEATHERMAP_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Deserialize)]
struct OwmResponse {
    name: String,
    #[serde(default)]
    sys: OwmSys,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: OwmWind,
}

#[derive(Debug, Default, Deserialize)]
struct OwmSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: Option<f64>,
    humidity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
}

/// 温度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Metric,
    Imperial,
}

impl Units {
    pub fn parse(s: &str) -> Result<Self, ToolError> {
        match s.trim().to_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(Units::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(Units::Imperial),
            other => Err(ToolError::InvalidArgument(format!(
                "unsupported units '{}' (use metric or imperial)",
                other
            ))),
        }
    }

    fn as_query(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    fn temp_suffix(self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    fn speed_suffix(self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

/// 将 OpenWeatherMap JSON 解析为可读文本
pub fn format_weather(body: &str, units: Units) -> Result<String, ToolError> {
    let data: OwmResponse = serde_json::from_str(body)
        .map_err(|e| ToolError::ExternalService(format!("malformed weather response: {}", e)))?;

    let place = match data.sys.country.as_deref() {
        Some(country) if !country.is_empty() => format!("{}, {}", data.name, country),
        _ => data.name.clone(),
    };
    let condition = data
        .weather
        .first()
        .map(|w| w.description.as_str())
        .unwrap_or("unknown conditions");

    let mut out = format!(
        "Weather in {}: {:.1}{}, {}",
        place,
        data.main.temp,
        units.temp_suffix(),
        condition
    );
    if let Some(feels) = data.main.feels_like {
        out.push_str(&format!(", feels like {:.1}{}", feels, units.temp_suffix()));
    }
    if let Some(h) = data.main.humidity {
        out.push_str(&format!(", humidity {}%", h));
    }
    if let Some(speed) = data.wind.speed {
        out.push_str(&format!(", wind {:.1} {}", speed, units.speed_suffix()));
    }
    Ok(out)
}

/// Weather 工具：持有 HTTP 客户端、API Key 与默认单位
pub struct WeatherTool {
    client: Client,
    api_key: String,
    base_url: String,
    default_units: Units,
}

impl WeatherTool {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            base_url: OPENWEATHERMAP_BASE_URL.to_string(),
            default_units: Units::Metric,
        }
    }

    /// 覆盖接口地址（自建代理或测试）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_units(mut self, units: Units) -> Self {
        self.default_units = units;
        self
    }

    async fn fetch(&self, location: &str, units: Units) -> Result<String, ToolError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", units.as_query()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::ExternalService(format!("weather request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ToolError::ExternalService(format!("read weather body: {}", e)))?;

        // 404 city not found / 400 Nothing to geocode：地点无法解析
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            let reason = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ToolError::InvalidArgument(format!(
                "location '{}' could not be found ({})",
                location, reason
            )));
        }
        if !status.is_success() {
            return Err(ToolError::ExternalService(format!("weather provider HTTP {}", status)));
        }
        format_weather(&body, units)
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Get current weather (temperature and conditions) for a city. Args: {\"location\": \"city or city,country e.g. Paris,FR\", \"units\": \"metric|imperial (optional)\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name, optionally with ISO country code: \"London\" or \"London,GB\""
                },
                "units": {
                    "type": "string",
                    "enum": ["metric", "imperial"],
                    "description": "Temperature units (default: metric)"
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let location = args
            .get("location")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArgument("missing 'location'".to_string()))?;
        let units = match args.get("units").and_then(|v| v.as_str()) {
            Some(u) => Units::parse(u)?,
            None => self.default_units,
        };
        tracing::info!(location = %location, "weather tool fetch");
        self.fetch(location, units).await
    }
}
