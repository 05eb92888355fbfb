//! The canonical business-analysis team.
//!
//! Five agents covering the standard consulting flow: a business analyst
//! fans out to commercial and market specialists, a financial analyst builds
//! on the analyst and the commercial strategy, and an executive reviewer
//! consolidates everything. The resolved plan is
//! `[analyst] -> [commercial, market] -> [financial] -> [reviewer]`.
//!
//! Each builder embeds its predecessors' outputs directly and falls back to
//! a short "not available" phrase when a predecessor produced nothing, so a
//! degraded upstream never yields an empty downstream prompt.

use std::time::Duration;

use crate::agentdag::agent::Agent;
use crate::agentdag::context::ExecutionContext;

fn output_or(context: &ExecutionContext, name: &str, fallback: &str) -> String {
    context
        .output(name)
        .filter(|o| !o.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Build the five-agent team. Prompt references equal the agent names, so a
/// prompt store needs entries for `analyst`, `commercial`, `market`,
/// `financial`, and `reviewer`.
pub fn business_analysis_team() -> Vec<Agent> {
    vec![
        analyst_agent(),
        commercial_agent(),
        market_agent(),
        financial_agent(),
        reviewer_agent(),
    ]
}

fn analyst_agent() -> Agent {
    Agent::new("analyst")
        .with_max_tokens(1024)
        .with_message_builder(|context| {
            format!(
                "Analyze the following business problem:\n\n{}\n\n\
                 Provide a structured analysis following the specified format.",
                context.problem_description()
            )
        })
}

fn commercial_agent() -> Agent {
    Agent::new("commercial")
        .with_dependencies(vec!["analyst"])
        .with_max_tokens(1024)
        .with_message_builder(|context| {
            let analysis = output_or(context, "analyst", "Analysis not available");
            format!(
                "Based on the following business analysis:\n\n{}\n\n\
                 And considering the original problem:\n\n{}\n\n\
                 Develop a detailed commercial strategy following the specified format.",
                analysis,
                context.problem_description()
            )
        })
}

fn market_agent() -> Agent {
    Agent::new("market")
        .with_dependencies(vec!["analyst"])
        .with_max_tokens(2048)
        .with_message_builder(|context| {
            let analysis = output_or(context, "analyst", "Analysis not available");
            format!(
                "Based on the following business analysis:\n\n{}\n\n\
                 And considering the original problem:\n\n{}\n\n\
                 Provide a market context validation following the specified format.",
                analysis,
                context.problem_description()
            )
        })
}

fn financial_agent() -> Agent {
    Agent::new("financial")
        .with_dependencies(vec!["analyst", "commercial"])
        .with_max_tokens(2048)
        .with_timeout(Duration::from_secs(45))
        .with_message_builder(|context| {
            let analysis = output_or(context, "analyst", "Analysis not available");
            let strategy = output_or(context, "commercial", "Strategy not available");
            format!(
                "Based on the following business analysis:\n\n{}\n\n\
                 And the following commercial strategy:\n\n{}\n\n\
                 Considering the original problem:\n\n{}\n\n\
                 Provide a detailed financial assessment following the specified format.",
                analysis,
                strategy,
                context.problem_description()
            )
        })
}

fn reviewer_agent() -> Agent {
    Agent::new("reviewer")
        .with_dependencies(vec!["analyst", "commercial", "financial", "market"])
        .with_max_tokens(4096)
        .with_timeout(Duration::from_secs(60))
        .with_message_builder(|context| {
            let mut sections = vec![format!(
                "ORIGINAL PROBLEM:\n{}",
                context.problem_description()
            )];
            if let Some(analysis) = context.output("analyst").filter(|o| !o.is_empty()) {
                sections.push(format!("BUSINESS ANALYST ANALYSIS:\n{}", analysis));
            }
            if let Some(strategy) = context.output("commercial").filter(|o| !o.is_empty()) {
                sections.push(format!("COMMERCIAL STRATEGY:\n{}", strategy));
            }
            if let Some(financials) = context.output("financial").filter(|o| !o.is_empty()) {
                sections.push(format!("FINANCIAL ANALYSIS:\n{}", financials));
            }
            if let Some(market) = context.output("market").filter(|o| !o.is_empty()) {
                sections.push(format!("MARKET CONTEXT:\n{}", market));
            }
            format!(
                "You received the following analyses from a team of specialists:\n\n{}\n\n\
                 Consolidate all of these analyses into a coherent executive diagnosis, \
                 following the specified format.",
                sections.join("\n\n")
            )
        })
}
