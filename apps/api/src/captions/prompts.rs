//! Prompt construction for caption generation.
//! Reuses cross-cutting fragments from llm_client::prompts.

use crate::captions::language::Language;
use crate::llm_client::prompts::NO_PREAMBLE_INSTRUCTION;

/// Number of captions requested from the model.
pub const CAPTION_COUNT: usize = 3;

/// Style used when the caller sends an empty `type` field.
const DEFAULT_STYLE: &str = "engaging";

/// Caption prompt template.
/// Replace: {count}, {style_clause}, {language}, {no_preamble}
const CAPTION_PROMPT_TEMPLATE: &str = "Generate exactly {count} {style_clause} captions in {language} for this image.
Format each caption like this:
1. <caption>
#hashtag1 #hashtag2 #hashtag3

Number every caption (1., 2., 3.) and put 2-3 relevant hashtags on the line directly below it.
Write every caption and hashtag in {language}.
{no_preamble}";

/// Builds the instruction sent alongside the image.
///
/// Pure: identical inputs always produce the identical string.
pub fn build_prompt(style: &str, language_code: &str, context: &str) -> String {
    let language = Language::from_code(language_code).display_name();

    let mut prompt = CAPTION_PROMPT_TEMPLATE
        .replace("{count}", &CAPTION_COUNT.to_string())
        .replace("{language}", language)
        .replace("{no_preamble}", NO_PREAMBLE_INSTRUCTION)
        // Caller-supplied text goes in last so it is never re-substituted.
        .replace("{style_clause}", &style_clause(style));

    let context = context.trim();
    if !context.is_empty() {
        prompt.push_str("\nAdditional context: ");
        prompt.push_str(context);
    }

    prompt
}

fn style_clause(style: &str) -> String {
    let style = style.trim();
    if style.is_empty() {
        DEFAULT_STYLE.to_string()
    } else if style.eq_ignore_ascii_case("random") {
        // The front end's "Random" button; let the model vary the tone.
        "distinct (each in a different tone of your choosing)".to_string()
    } else {
        style.to_string()
    }
}
