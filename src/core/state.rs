//! 单轮对话的阶段状态机
//!
//! Idle -> AwaitingDecision -> {DirectAnswer | ExecutingTools} -> AwaitingSynthesis -> Idle。
//! Agent 每次切换阶段都会记录一条 debug 日志；不在上述路径中的跳转只记录 warn，不会中断本轮。

use std::fmt;

use serde::Serialize;

/// Agent 所处阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    /// 正在请求 LLM 决定是否调用工具
    AwaitingDecision,
    /// LLM 直接给出回答，无需工具
    DirectAnswer,
    /// 按顺序执行工具
    ExecutingTools,
    /// 正在请求 LLM 汇总工具结果
    AwaitingSynthesis,
}

impl TurnPhase {
    /// 是否允许从当前阶段进入 next；任何阶段都可以回到 Idle（出错终止本轮）
    pub fn can_transition_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (_, Idle)
                | (Idle, AwaitingDecision)
                | (AwaitingDecision, DirectAnswer)
                | (AwaitingDecision, ExecutingTools)
                | (ExecutingTools, AwaitingSynthesis)
        )
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::AwaitingDecision => "awaiting_decision",
            TurnPhase::DirectAnswer => "direct_answer",
            TurnPhase::ExecutingTools => "executing_tools",
            TurnPhase::AwaitingSynthesis => "awaiting_synthesis",
        };
        f.write_str(s)
    }
}
