//! Reply segmentation

use unicode_segmentation::UnicodeSegmentation;

/// Split reply text into spoken sentences
///
/// Each sentence becomes its own synthesis request, so the first one can
/// start playing while later ones are still being synthesized.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();

    for sentence in text.split_sentence_bounds() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        // Fold stray punctuation into the previous sentence
        let has_words = sentence.chars().any(char::is_alphanumeric);
        match sentences.last_mut() {
            Some(last) if !has_words => last.push_str(sentence),
            _ => sentences.push(sentence.to_string()),
        }
    }

    sentences
}
