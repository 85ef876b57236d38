use crate::core::story::{GenerationRequest, Scene};
use once_cell::sync::Lazy;
use regex::Regex;

/// Opening token of every scene marker, e.g. `[SCENE 1]` or `[SCENE1]`.
pub const SCENE_MARKER: &str = "[SCENE";

// Matches "~(30 words)", "(~30 words)", "(approximately 50 words)", "~30 words" and friends.
static WORD_COUNT_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)~?\s*\(\s*(?:~|approx(?:imately|\.)?|about)?\s*\d+\s*words?\s*\)|~\s*\d+\s*words?\b")
        .expect("word-count pattern is valid")
});

// The rest of a marker after "[SCENE": a scene number, then `]` on the same line with no `[` before it.
static SCENE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+[^\[\]\n]*\]").expect("scene header pattern is valid"));

pub fn compose_story_prompt(request: &GenerationRequest) -> String {
    let words = request.target_words_per_page();
    let pages = request.desired_page_count;
    format!(
        "Write a children's story for {name}, who is {age} years old and loves {interests}. \
        The story should be about {theme}. Make it educational and engaging for a {age}-year-old.\n\
        The story should be exactly {pages} pages long, with approximately {words} words per page.\n\
        Format your response exactly as follows, with each scene introduced by its marker:\n\
        [SCENE 1]\n\
        The first scene, about {words} words.\n\
        [SCENE 2]\n\
        The second scene, about {words} words.\n\
        ...and so on for exactly {pages} scenes.\n\
        Do not write anything before [SCENE 1]. Do not add a word count or any other annotation to a scene.",
        name = request.child_name,
        age = request.age,
        interests = request.interests.join(", "),
        theme = request.theme,
        pages = pages,
        words = words,
    )
}

/// Illustration prompt for one scene. The first scene fixes the style, later
/// scenes are told to match it.
pub fn compose_image_prompt(request: &GenerationRequest, scene: &Scene) -> String {
    let style = if scene.index == 0 {
        format!(
            "Establish a distinctive illustration style suitable for a {}-year-old who loves {}: \
            choose a color palette and a character design that will be reused for every following \
            page of this book. Child-friendly, colorful, whimsical, safe for children.",
            request.age,
            request.interests.join(", ")
        )
    } else {
        "Keep exactly the same illustration style, color palette and character design as the \
        previous illustrations in this book, so the pages look consistent. \
        Child-friendly and safe for children."
            .to_string()
    };
    format!(
        "Create an illustration for a children's book scene: {}\n\nStyle: {}",
        scene.content, style
    )
}

pub fn strip_word_count_annotations(text: &str) -> String {
    WORD_COUNT_ANNOTATION.replace_all(text.trim(), "").trim().to_string()
}

/// Splits generator output into ordered scenes, keeping at most `max_scenes`.
///
/// Text before the first marker is ignored. A chunk whose marker is not a
/// number followed by `]` on the same line is skipped, and empty chunks are
/// dropped. Fewer scenes than requested is not an error.
pub fn parse_scenes(raw: &str, max_scenes: usize) -> Vec<Scene> {
    raw.split(SCENE_MARKER)
        .skip(1)
        .filter_map(|chunk| match SCENE_HEADER.find(chunk) {
            Some(header) => Some(&chunk[header.end()..]),
            None => {
                log::warn!("Skipping scene with malformed marker: {:.40}", chunk.trim());
                None
            }
        })
        .map(strip_word_count_annotations)
        .filter(|content| !content.is_empty())
        .take(max_scenes)
        .enumerate()
        .map(|(index, content)| Scene { index, content })
        .collect()
}
