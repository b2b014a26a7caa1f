//! Shared test helpers for building small WordLevel tokenizers

use std::path::{Path, PathBuf};

/// Write a WordLevel tokenizer JSON with the given whole-word vocab.
///
/// Uses a whitespace-split pre-tokenizer and no normalizer so that
/// encode/decode round-trips words exactly. [PAD]=0, [UNK]=1.
pub(crate) fn write_word_level_tokenizer(dir: &Path, words: &[&str]) -> PathBuf {
    let mut vocab = serde_json::Map::new();
    vocab.insert("[PAD]".to_string(), serde_json::json!(0));
    vocab.insert("[UNK]".to_string(), serde_json::json!(1));

    let mut next_id = 2u32;
    for word in words {
        if !vocab.contains_key(*word) {
            vocab.insert((*word).to_string(), serde_json::json!(next_id));
            next_id += 1;
        }
    }

    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "[PAD]", "single_word": false, "lstrip": false,
             "rstrip": false, "normalized": false, "special": true},
            {"id": 1, "content": "[UNK]", "single_word": false, "lstrip": false,
             "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": {"type": "WhitespaceSplit"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": serde_json::Value::Object(vocab),
            "unk_token": "[UNK]"
        }
    });

    let path = dir.join("tokenizer.json");
    std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json).unwrap()).unwrap();
    path
}

/// Build a tokenizer whose vocab covers every whitespace-separated word in
/// the given texts
pub(crate) fn write_tokenizer_for_texts(dir: &Path, texts: &[&str]) -> PathBuf {
    let mut words: Vec<&str> = Vec::new();
    for text in texts {
        for word in text.split_whitespace() {
            if !words.contains(&word) {
                words.push(word);
            }
        }
    }
    write_word_level_tokenizer(dir, &words)
}
