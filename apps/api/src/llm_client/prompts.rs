// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Instruction that suppresses chatty framing around the requested output.
pub const NO_PREAMBLE_INSTRUCTION: &str = "Respond with the captions only. \
    Do NOT include any introduction, explanation, or closing remarks. \
    Do NOT wrap the output in quotes or code fences.";
