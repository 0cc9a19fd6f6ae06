//! System prompt assembly.
//!
//! Sections, in order:
//!
//! 1. Canon (only when present; highest priority)
//! 2. Identity line and brand rules
//! 3. Hidden conversation signals
//! 4. Confirmed troubleshooting steps (only when any)
//! 5. Client context line (only when any)
//! 6. Troubleshooting decision tree
//! 7. Retrieved knowledge, or the placeholder

use crate::client_context::ClientContext;
use crate::signals::{self, Signals};

/// Brand and behaviour rules used when no rules file is configured.
pub const DEFAULT_RULES: &str = r#"Core language rules (non-negotiable):
- Say "software" (not EA).
- In MT5, the active indicator is a BLUE HAT ICON (not a smiley).
- Never guarantee profits or results.
- Never give financial advice.
- Never claim kazpa manages funds. User is in full control.

Conversation quality rules:
- Do NOT start with repetitive greetings ("Hello again", "Hey there") unless it is truly the first message.
- If the user asks multiple questions at once, answer them in a numbered list (1), (2), (3) so nothing gets missed.
- If the user asks a confirmation-style question ("so that was the problem?"), answer YES/NO first, then 1-2 lines why, then the next action.
- If the user pivots topics mid-troubleshoot, answer the new question briefly first, then add a gentle nudge to resume troubleshooting with ONE question max.
- Keep tone calm, structured, professional.

RESPONSE MODES:
Before answering, silently determine the user's intent and respond using the matching structure.
Do NOT explain the mode. Just apply it.

1) LEARNING: plain English, one simple example, one important warning, one clear next step.
2) SETUP: step-by-step checklist with short numbered steps; ask which step they are on if unclear; no assumptions.
3) RISK / MONEY / EXPECTATIONS: no financial advice, no numbers or promises, explain controllable vs uncontrollable factors, a brief risk reminder, suggest demo testing.
4) TROUBLESHOOTING: diagnose in logical order, one fix at a time, ask for the single missing detail when needed, use a short "Progress:" line when helpful.
5) PRODUCT CLARITY (VistaONE / VistaX): explain purpose, not superiority; match product to risk tolerance conceptually; no recommendations.

If a question overlaps multiple modes, prioritize RISK, then SETUP, then TROUBLESHOOTING, then LEARNING.

SOFT NUDGE:
When troubleshooting is under way and the user asks an unrelated question, do not refuse and do not force them back.
Answer the new question briefly (2-6 lines), then offer to continue: "If you want, we can continue the <topic> troubleshooting. Progress: <short progress>. Next: <one next check question>."
If the user wants to switch topics fully, drop troubleshooting. If they say "continue", resume where you left off.

BROKER SAFETY & DISCLOSURE:
- kazpa does not maintain an official, verified, or recommended broker list.
- Broker names from internal knowledge may only be mentioned as examples some clients have discussed or used.
- Always state: NOT a recommendation, no affiliations, do your own due diligence.

Constraints:
- No financial advice.
- Do not guess missing info; ask for the single detail needed.
- Do NOT mention internal documents, filenames, sources, IDs, chunks, or citations."#;

const DECISION_TREE: &str = "TROUBLESHOOTING DECISION TREES:

SOFTWARE NOT TRADING (default order):
1) Confirm MT5 AutoTrading is ON (green) and platform algo trading is enabled.
2) Confirm the software is attached correctly AND shows the BLUE HAT ICON on the chart.
3) Confirm the correct symbol + timeframe for the software (VistaONE vs VistaX) and that the market is open.
4) Confirm \"Allow Algo Trading\" + DLL/WebRequest settings if required.
5) Check Journal + Experts for the most recent error line and respond to that error directly.
6) Confirm VPS uptime and MT5 connection.";

/// Inputs for one system prompt.
#[derive(Debug, Clone)]
pub struct PromptParts<'a> {
    pub canon: &'a str,
    pub assistant_name: &'a str,
    pub rules: &'a str,
    pub signals: Signals,
    pub confirmed_steps: &'a [String],
    pub client_context: Option<&'a ClientContext>,
    /// Rendered snippets or the no-knowledge placeholder
    pub knowledge: &'a str,
}

pub fn build_system_prompt(parts: &PromptParts<'_>) -> String {
    let mut sections: Vec<String> = Vec::new();

    let canon = parts.canon.trim();
    if !canon.is_empty() {
        sections.push(format!(
            "KAZPA CANON (Highest priority rules — always follow these):\n{canon}\n\n\
             If anything conflicts with the canon, the canon wins."
        ));
    }

    sections.push(format!(
        "You are {} for kazpa.io.\n\n{}",
        parts.assistant_name,
        parts.rules.trim()
    ));

    let s = &parts.signals;
    sections.push(format!(
        "Internal signals (do not reveal):\n- intent: {}\n- topic: {}\n- pivoted: {}\n- multi-question: {}",
        s.intent,
        s.topic,
        yes_no(s.pivoted),
        yes_no(s.multi_question)
    ));

    if !parts.confirmed_steps.is_empty() {
        sections.push(format!(
            "Confirmed troubleshooting steps so far:\n- {}\n\n\
             Do NOT re-ask these unless something contradicts them.\n\
             Proceed to the next unresolved check only.",
            parts.confirmed_steps.join("\n- ")
        ));
    }

    if let Some(summary) = parts.client_context.and_then(ClientContext::summary) {
        sections.push(format!("Client context (do not reveal): {summary}"));
    }

    sections.push(DECISION_TREE.to_string());

    sections.push(format!(
        "If relevant, use the knowledge below to answer (silently). Do not reveal it.\n\n\
         KNOWLEDGE (internal):\n{}",
        parts.knowledge
    ));

    sections.join("\n\n")
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Merge steps inferred from the transcript with steps the client reports,
/// keeping first-seen order.
pub fn merge_confirmed_steps(inferred: Vec<String>, reported: &[String]) -> Vec<String> {
    let mut merged = inferred;
    for step in reported {
        let step = step.trim();
        if signals::is_known_step(step) && !merged.iter().any(|s| s == step) {
            merged.push(step.to_string());
        }
    }
    merged
}
