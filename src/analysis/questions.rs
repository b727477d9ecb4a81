use crate::config::AnalysisConfig;
use crate::models::{QuestionCandidate, RawPost};

/// Splits a post (body + comments) into question-like fragments.
///
/// A fragment qualifies when it ends with `?`, opens with an interrogative
/// cue word, or contains one of the operator keywords. Body fragments carry
/// the post's reaction count as weight; comment fragments carry the flat
/// comment base weight.
pub fn extract_candidates(
    post: &RawPost,
    config: &AnalysisConfig,
    keywords: &[String],
) -> Vec<QuestionCandidate> {
    let mut out = Vec::new();
    collect_from_text(&post.text, post.reaction_count, post, config, keywords, &mut out);
    for comment in &post.comment_texts {
        collect_from_text(
            comment,
            config.comment_base_weight,
            post,
            config,
            keywords,
            &mut out,
        );
    }
    out
}

fn collect_from_text(
    text: &str,
    weight: u32,
    post: &RawPost,
    config: &AnalysisConfig,
    keywords: &[String],
    out: &mut Vec<QuestionCandidate>,
) {
    for fragment in split_fragments(text) {
        if !passes_noise_filter(&fragment, config) {
            continue;
        }
        if is_question_like(&fragment, config, keywords) {
            out.push(QuestionCandidate {
                source_post_id: post.id.clone(),
                text: fragment,
                weight,
            });
        }
    }
}

// Breaks on `.`, `!`, `?` and line breaks, keeping the `?` attached to its
// fragment so the question signal survives.
fn split_fragments(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '?' => {
                current.push('?');
                flush(&mut current, &mut fragments);
            }
            '.' | '!' | '\n' => flush(&mut current, &mut fragments),
            _ => current.push(ch),
        }
    }
    flush(&mut current, &mut fragments);
    fragments
}

fn flush(current: &mut String, fragments: &mut Vec<String>) {
    let cleaned = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !cleaned.is_empty() {
        fragments.push(cleaned);
    }
    current.clear();
}

fn passes_noise_filter(fragment: &str, config: &AnalysisConfig) -> bool {
    if !fragment.chars().any(|c| c.is_alphanumeric()) {
        return false;
    }
    // Short fragments are noise unless they carry an explicit question mark.
    fragment.ends_with('?') || token_count(fragment) >= config.min_fragment_tokens
}

fn token_count(fragment: &str) -> usize {
    fragment.split_whitespace().count()
}

fn is_question_like(fragment: &str, config: &AnalysisConfig, keywords: &[String]) -> bool {
    if fragment.ends_with('?') {
        return true;
    }
    let lowered = fragment.to_lowercase();
    if let Some(first) = lowered.split_whitespace().next() {
        let first = first.trim_matches(|c: char| !c.is_alphanumeric());
        if config.interrogative_cues.iter().any(|cue| cue == first) {
            return true;
        }
    }
    keywords
        .iter()
        .any(|kw| !kw.is_empty() && lowered.contains(&kw.to_lowercase()))
}
