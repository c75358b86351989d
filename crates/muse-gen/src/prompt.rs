//! Prompt construction.
//!
//! Every request carries a style-specific system instruction, a short user
//! prompt next to the image, and a strict response schema.

use muse_core::{CaptionStyle, Persona};
use serde_json::{Value, json};

pub const TEMPERATURE: f64 = 0.9;
pub const MAX_OUTPUT_TOKENS: u32 = 4000;

/// Harm categories relaxed to `BLOCK_NONE`; captions for ordinary photos
/// trip the default thresholds far too often.
pub const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// The text part sent alongside the image.
pub fn user_prompt(style: CaptionStyle) -> String {
    format!(
        "Generate 10 captions in the requested style ({style}). Return strictly valid JSON \
         with English text and Chinese translation. Do not use Markdown formatting."
    )
}

/// System instruction for `style`, written in `persona`'s voice.
///
/// The One-Liner style deliberately ignores the persona.
pub fn system_instruction(style: CaptionStyle, persona: &Persona) -> String {
    match style {
        CaptionStyle::Social => social_instruction(persona),
        CaptionStyle::OneLiner => ONE_LINER_INSTRUCTION.to_string(),
        CaptionStyle::Interactive => interactive_instruction(persona),
    }
}

fn persona_header(p: &Persona) -> String {
    format!(
        "You are {name}, a {age}-year-old {occupation} based in {location}.\n\
         Your Bio/Vibe: \"{bio}\".\n\
         Your Aesthetic: \"{aesthetic}\".\n\
         Your Speaking Style: \"{tone}\".\n",
        name = p.name,
        age = p.age,
        occupation = p.occupation,
        location = p.location,
        bio = p.bio,
        aesthetic = p.aesthetic,
        tone = p.voice_tone,
    )
}

fn emoji_rule(p: &Persona) -> String {
    format!(
        "EMOJI RULE: Select exactly one matching emoji per caption.\n\
         - Place this emoji ONLY in the 'emoji' JSON field, never in 'text'.\n\
         - PREFERRED STYLE: \"{style}\". Treat listed examples as inspiration only.\n\
         - Use a DIVERSE range of emojis; do not repeat the same one 10 times.\n",
        style = p.emoji_style,
    )
}

const HASHTAG_RULES: &str = "HASHTAG STRATEGY:\n\
1. PRIORITIZE TRENDS: Use hashtags popular in the last 6 months.\n\
2. AVOID GENERIC: Do NOT use generic tags like #love, #happy.\n\
3. RELEVANCE: Ensure tags strictly relate to the visual content.\n";

fn social_instruction(p: &Persona) -> String {
    format!(
        "{header}\n\
         Your Task:\n\
         1. Write exactly 10 captions for the user's photo.\n\
         2. Generate 5-8 relevant, aesthetic hashtags.\n\n\
         CRITICAL CAPTION RULES:\n\
         1. LENGTH: Ultra-short. 2-8 words max.\n\
         2. AESTHETIC: Lowercase only. Minimalist.\n\
         3. TONE: {tone} (Mix of witty, confident, mysterious).\n\
         4. NO CLICHÉS: No \"vibes\", \"goals\", or influencer speak.\n\
         5. TRANSLATION: Provide a Chinese translation for each caption that sounds \
         like a cool Chinese netizen (Xiaohongshu style), casual rather than literal.\n\
         6. {emoji}\n\
         {hashtags}",
        header = persona_header(p),
        tone = p.voice_tone,
        emoji = emoji_rule(p),
        hashtags = HASHTAG_RULES,
    )
}

fn interactive_instruction(p: &Persona) -> String {
    format!(
        "{header}\n\
         Your Task:\n\
         1. Write exactly 10 captions for the user's photo that invite the audience to respond.\n\
         2. Generate 5-8 relevant, aesthetic hashtags.\n\n\
         CRITICAL CAPTION RULES:\n\
         1. ENGAGEMENT: Each caption is a question, a playful challenge or a \
         fill-in-the-blank the audience can answer in the comments.\n\
         2. LENGTH: Short. 4-12 words max.\n\
         3. AESTHETIC: Lowercase only. No engagement-bait phrases like \"comment below\".\n\
         4. TONE: {tone}.\n\
         5. TRANSLATION: Provide a natural Chinese translation for each caption.\n\
         6. {emoji}\n\
         {hashtags}",
        header = persona_header(p),
        tone = p.voice_tone,
        emoji = emoji_rule(p),
        hashtags = HASHTAG_RULES,
    )
}

const ONE_LINER_INSTRUCTION: &str = "You are a sharp, intelligent observer with a confident, slightly dry wit.\n\
Ignore the user's specific \"Persona\" details. In this mode, you embody pure \"Observational Wit\".\n\n\
Your Task:\n\
Generate 10 \"One-Liner\" captions based on the provided image.\n\n\
CORE PHILOSOPHY:\n\
1. One-liner & Witty: Captions must be sharp, intelligent, and punchy.\n\
2. Observational Wit: Make a clever or unexpected observation about the scene instead of describing feelings.\n\
3. Confidence is Key: Confident, sometimes a bit sarcastic or dry. Said with a smirk.\n\
4. Subtext over Text: Hint at a bigger story.\n\n\
FORMATTING RULES:\n\
1. Lowercase Aesthetic: All captions must be lowercase.\n\
2. No Periods: Do not end lines with a period.\n\
3. TRANSLATION: Provide a poetic, cinematic Chinese translation. Short, punchy, abstract.\n\
4. Emoji Variety: Select a unique emoji for EACH caption that matches that line. \
Do not repeat emojis. Place the emoji ONLY in the 'emoji' field, NOT in the 'text' field.\n\n\
TONE EXAMPLES:\n\
- \"elevator pitch for my ego\"\n\
- \"texture as a love language\"\n\
- \"waiting for the doors to open on a better timeline\"\n\
- \"vanity is just visual journaling\"\n";

/// JSON schema the backend must follow.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "captions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "tone": { "type": "STRING", "description": "The tone label for this caption (e.g. 'witty', 'confident')" },
                        "text": { "type": "STRING", "description": "The caption text ONLY. Do NOT include the emoji here." },
                        "translation": { "type": "STRING", "description": "A concise, natural Chinese translation of the caption." },
                        "emoji": { "type": "STRING", "description": "A single matching emoji" }
                    },
                    "required": ["tone", "text", "translation", "emoji"]
                }
            },
            "hashtags": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            }
        },
        "required": ["captions", "hashtags"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_uses_persona_details() {
        let persona = Persona::default();
        let text = system_instruction(CaptionStyle::Social, &persona);
        assert!(text.contains("You are Gigi, a 28-year-old Creative Director based in Los Angeles."));
        assert!(text.contains("Minimalist (🖤, 🌫, ⚓️)"));
    }

    #[test]
    fn one_liner_ignores_persona() {
        let mut persona = Persona::default();
        persona.name = "Zed".into();
        let text = system_instruction(CaptionStyle::OneLiner, &persona);
        assert!(!text.contains("Zed"));
        assert!(text.contains("Observational Wit"));
    }

    #[test]
    fn interactive_is_distinct() {
        let persona = Persona::default();
        let social = system_instruction(CaptionStyle::Social, &persona);
        let interactive = system_instruction(CaptionStyle::Interactive, &persona);
        assert_ne!(social, interactive);
        assert!(interactive.contains("invite the audience"));
    }

    #[test]
    fn user_prompt_names_style_tag() {
        assert!(user_prompt(CaptionStyle::OneLiner).contains("(One-Liner)"));
    }

    #[test]
    fn schema_requires_captions_and_hashtags() {
        let schema = response_schema();
        assert_eq!(schema["required"], json!(["captions", "hashtags"]));
        assert_eq!(schema["properties"]["captions"]["items"]["required"][3], "emoji");
    }
}
