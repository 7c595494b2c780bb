//! Time 工具：查询 IANA 时区的当前本地时间

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};

use crate::core::ToolError;
use crate::tools::Tool;

/// Time 工具：参数 timezone（如 America/New_York、Asia/Tokyo、UTC）
#[derive(Debug, Default)]
pub struct TimeTool;

impl TimeTool {
    pub fn new() -> Self {
        Self
    }
}

/// 解析时区名；未知时区返回 InvalidArgument
pub fn parse_timezone(name: &str) -> Result<Tz, ToolError> {
    let name = name.trim();
    name.parse::<Tz>().map_err(|_| {
        ToolError::InvalidArgument(format!(
            "unknown timezone '{}' (expected an IANA name such as Europe/London)",
            name
        ))
    })
}

/// 将 UTC 时刻格式化为指定时区的本地时间
pub fn format_local_time(tz: Tz, now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&tz);
    format!(
        "Current time in {}: {}",
        tz.name(),
        local.format("%Y-%m-%d %H:%M:%S %Z (UTC%:z), %A")
    )
}

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "time"
    }

    fn description(&self) -> &str {
        "Get the current local time in a timezone. Args: {\"timezone\": \"IANA timezone name, e.g. America/New_York\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timezone": {
                    "type": "string",
                    "description": "IANA timezone name such as America/New_York, Asia/Tokyo or UTC"
                }
            },
            "required": ["timezone"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let name = args
            .get("timezone")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgument("missing 'timezone'".to_string()))?;
        let tz = parse_timezone(name)?;
        Ok(format_local_time(tz, Utc::now()))
    }
}
