//! Vocabulary filter stage
//!
//! Tokenizes subtitle segments, resolves each distinct token's lemma and
//! tier, and partitions tokens into known / learning / blocking relative to
//! one user. A segment containing at least one blocking token is blocking at
//! the segment level, independent of its learning tokens.

use crate::subtitle::SubtitleSegment;
use crate::vocab::classifier::{LemmaClassifier, Tier};
use crate::vocab::knowledge::KnowledgeStore;
use lexisub_common::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Knowledge status of a token relative to the requesting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// User marked the lemma known
    Known,
    /// Within the user's level: vocabulary to learn
    Learning,
    /// Above the user's level
    Blocking,
}

/// One classified word occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedToken {
    pub surface: String,
    pub lemma: String,
    pub tier: Tier,
    pub status: TokenStatus,
}

/// A subtitle segment with its classification annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Classified tokens in order of appearance (excluded tokens omitted)
    pub tokens: Vec<ClassifiedToken>,
    /// Lemmas the user should learn from this segment
    pub learning_lemmas: Vec<String>,
    /// True when the segment contains at least one blocking token
    pub blocking: bool,
}

/// Aggregate classification statistics for one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStatistics {
    /// Token occurrences classified (excluded tokens not counted)
    pub total_tokens: usize,
    pub known_lemmas: usize,
    pub learning_lemmas: usize,
    pub blocking_lemmas: usize,
    pub known_segments: usize,
    pub learning_segments: usize,
    pub blocking_segments: usize,
}

/// Output of the filter stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    /// Blocking lemmas, deduplicated and sorted for determinism
    pub blocking_words: Vec<String>,
    pub segments: Vec<AnnotatedSegment>,
    pub statistics: ChunkStatistics,
}

/// A candidate word produced by the tokenizer
#[derive(Debug, Clone, PartialEq)]
pub struct RawToken {
    pub surface: String,
    /// First word of the text, or first after sentence punctuation
    pub sentence_initial: bool,
}

/// Pluggable tokenization capability
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<RawToken>;
}

/// Default whitespace/punctuation-aware tokenizer.
///
/// Words are maximal runs of alphanumeric characters; apostrophes and
/// hyphens are kept when they sit between two word characters.
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<RawToken> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut word = String::new();
        let mut sentence_initial = true;
        let mut word_initial = sentence_initial;

        let flush = |word: &mut String, initial: bool, tokens: &mut Vec<RawToken>| {
            if !word.is_empty() {
                tokens.push(RawToken {
                    surface: std::mem::take(word),
                    sentence_initial: initial,
                });
            }
        };

        for (i, &c) in chars.iter().enumerate() {
            let is_word_char = c.is_alphanumeric()
                || ((c == '\'' || c == '-')
                    && i > 0
                    && chars[i - 1].is_alphanumeric()
                    && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric()));

            if is_word_char {
                if word.is_empty() {
                    word_initial = sentence_initial;
                }
                word.push(c);
            } else {
                flush(&mut word, word_initial, &mut tokens);
                if matches!(c, '.' | '!' | '?' | '\n' | '…') {
                    sentence_initial = true;
                } else if !c.is_whitespace() && !matches!(c, '"' | '\'' | '«' | '»' | '„' | '“') {
                    sentence_initial = false;
                }
            }
            if is_word_char {
                sentence_initial = false;
            }
        }
        flush(&mut word, word_initial, &mut tokens);
        tokens
    }
}

/// Whether a token is excluded from classification entirely:
/// numeric/punctuation-only tokens and proper-noun candidates
/// (capitalized away from a sentence start) are rendered as-is.
fn is_excluded(token: &RawToken) -> bool {
    if !token.surface.chars().any(|c| c.is_alphabetic()) {
        return true;
    }
    let capitalized = token
        .surface
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase());
    capitalized && !token.sentence_initial
}

/// The filter stage: classifier + knowledge store + tokenizer
pub struct VocabularyFilter {
    classifier: Arc<LemmaClassifier>,
    store: Arc<dyn KnowledgeStore>,
    tokenizer: Box<dyn Tokenizer>,
}

impl VocabularyFilter {
    pub fn new(classifier: Arc<LemmaClassifier>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            classifier,
            store,
            tokenizer: Box::new(WordTokenizer),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Classify every token of `segments` for `user_id`.
    ///
    /// `on_progress` is called at stage boundaries (not per token) with a
    /// percentage and a step label. Knowledge-store failures fail the whole
    /// stage; there is no unknown-by-default fallback.
    pub async fn classify(
        &self,
        segments: &[SubtitleSegment],
        user_id: &str,
        language: &str,
        on_progress: &(dyn Fn(u8, &str) + Send + Sync),
    ) -> Result<ChunkAnalysis> {
        let user_level = self.store.level_of(user_id).await?;

        // Tokenize everything up front; lemma resolution hits the
        // process-wide cache for repeated surfaces.
        let tokenized: Vec<Vec<RawToken>> = segments
            .iter()
            .map(|s| self.tokenizer.tokenize(&s.text))
            .collect();

        let mut lemma_of: HashMap<String, String> = HashMap::new();
        for token in tokenized.iter().flatten() {
            if is_excluded(token) {
                continue;
            }
            let folded = token.surface.to_lowercase();
            lemma_of
                .entry(folded.clone())
                .or_insert_with(|| self.classifier.lemmatize(&folded, language));
        }
        on_progress(60, "Looking up vocabulary");

        // One store round-trip pair per distinct lemma. BTreeMap keeps the
        // lookup order deterministic.
        let mut verdicts: BTreeMap<String, (Tier, TokenStatus)> = BTreeMap::new();
        for lemma in lemma_of.values() {
            if verdicts.contains_key(lemma) {
                continue;
            }
            let known = self.store.is_known(user_id, lemma, language).await?;
            let tier = self.store.tier_of(lemma, language).await?;
            let status = if known {
                TokenStatus::Known
            } else if tier <= user_level {
                TokenStatus::Learning
            } else {
                TokenStatus::Blocking
            };
            verdicts.insert(lemma.clone(), (tier, status));
        }
        on_progress(90, "Annotating segments");

        let mut statistics = ChunkStatistics::default();
        let mut annotated = Vec::with_capacity(segments.len());

        for (segment, raw_tokens) in segments.iter().zip(&tokenized) {
            let mut tokens = Vec::new();
            let mut learning_lemmas = Vec::new();
            let mut blocking = false;
            let mut has_learning = false;

            for raw in raw_tokens {
                if is_excluded(raw) {
                    continue;
                }
                let folded = raw.surface.to_lowercase();
                let lemma = &lemma_of[&folded];
                let (tier, status) = verdicts[lemma];
                match status {
                    TokenStatus::Blocking => blocking = true,
                    TokenStatus::Learning => {
                        has_learning = true;
                        if !learning_lemmas.contains(lemma) {
                            learning_lemmas.push(lemma.clone());
                        }
                    }
                    TokenStatus::Known => {}
                }
                statistics.total_tokens += 1;
                tokens.push(ClassifiedToken {
                    surface: raw.surface.clone(),
                    lemma: lemma.clone(),
                    tier,
                    status,
                });
            }

            if blocking {
                statistics.blocking_segments += 1;
            } else if has_learning {
                statistics.learning_segments += 1;
            } else {
                statistics.known_segments += 1;
            }
            annotated.push(AnnotatedSegment {
                start: segment.start,
                end: segment.end,
                text: segment.text.clone(),
                translation: segment.translation.clone(),
                tokens,
                learning_lemmas,
                blocking,
            });
        }

        let mut blocking_words = Vec::new();
        for (lemma, (_, status)) in &verdicts {
            match status {
                TokenStatus::Known => statistics.known_lemmas += 1,
                TokenStatus::Learning => statistics.learning_lemmas += 1,
                TokenStatus::Blocking => {
                    statistics.blocking_lemmas += 1;
                    blocking_words.push(lemma.clone());
                }
            }
        }
        // BTreeMap iteration already yields sorted order
        debug_assert!(blocking_words.windows(2).all(|w| w[0] <= w[1]));

        debug!(
            user_id = %user_id,
            segments = segments.len(),
            tokens = statistics.total_tokens,
            blocking = statistics.blocking_lemmas,
            "Vocabulary classification complete"
        );

        Ok(ChunkAnalysis {
            blocking_words,
            segments: annotated,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::knowledge::MemoryKnowledgeStore;
    use lexisub_common::Error;

    fn no_progress() -> impl Fn(u8, &str) + Send + Sync {
        |_, _| {}
    }

    fn filter_with(store: MemoryKnowledgeStore) -> VocabularyFilter {
        VocabularyFilter::new(Arc::new(LemmaClassifier::new()), Arc::new(store))
    }

    #[test]
    fn tokenizer_splits_on_punctuation() {
        let tokens = WordTokenizer.tokenize("Ich gehe, du bleibst!");
        let surfaces: Vec<_> = tokens.iter().map(|t| t.surface.as_str()).collect();
        assert_eq!(surfaces, vec!["Ich", "gehe", "du", "bleibst"]);
    }

    #[test]
    fn tokenizer_keeps_inner_apostrophes_and_hyphens() {
        let tokens = WordTokenizer.tokenize("don't re-run 'quoted'");
        let surfaces: Vec<_> = tokens.iter().map(|t| t.surface.as_str()).collect();
        assert_eq!(surfaces, vec!["don't", "re-run", "quoted"]);
    }

    #[test]
    fn tokenizer_marks_sentence_initial() {
        let tokens = WordTokenizer.tokenize("Heute regnet es. Morgen auch");
        assert!(tokens[0].sentence_initial);
        assert!(!tokens[1].sentence_initial);
        assert!(tokens[3].sentence_initial); // "Morgen" follows a period
        assert!(!tokens[4].sentence_initial);
    }

    #[test]
    fn proper_nouns_and_numbers_are_excluded() {
        let initial = RawToken {
            surface: "Heute".to_string(),
            sentence_initial: true,
        };
        let proper = RawToken {
            surface: "Berlin".to_string(),
            sentence_initial: false,
        };
        let number = RawToken {
            surface: "42".to_string(),
            sentence_initial: false,
        };
        assert!(!is_excluded(&initial));
        assert!(is_excluded(&proper));
        assert!(is_excluded(&number));
    }

    #[tokio::test]
    async fn classifies_known_learning_blocking() {
        // User knows "ich", does not know "gehen" (A2) and is level A1
        let store = MemoryKnowledgeStore::new()
            .with_known("42", "ich", "de")
            .with_tier("gehen", "de", Tier::A2)
            .with_level("42", Tier::A1);
        let filter = filter_with(store);

        let segments = vec![SubtitleSegment::new(0.0, 2.0, "Ich gehe")];
        let analysis = filter
            .classify(&segments, "42", "de", &no_progress())
            .await
            .unwrap();

        assert_eq!(analysis.blocking_words, vec!["gehen".to_string()]);
        assert!(analysis.segments[0].blocking);
        assert_eq!(analysis.statistics.blocking_lemmas, 1);
        assert_eq!(analysis.statistics.known_lemmas, 1);
        assert_eq!(analysis.statistics.blocking_segments, 1);
        assert_eq!(analysis.statistics.total_tokens, 2);
    }

    #[tokio::test]
    async fn lemma_within_level_is_learning() {
        let store = MemoryKnowledgeStore::new()
            .with_tier("ich", "de", Tier::A1)
            .with_tier("gehen", "de", Tier::A2)
            .with_level("42", Tier::B1);
        let filter = filter_with(store);

        let segments = vec![SubtitleSegment::new(0.0, 2.0, "ich gehe")];
        let analysis = filter
            .classify(&segments, "42", "de", &no_progress())
            .await
            .unwrap();

        assert!(analysis.blocking_words.is_empty());
        assert!(!analysis.segments[0].blocking);
        assert_eq!(analysis.statistics.learning_lemmas, 2);
        assert_eq!(
            analysis.segments[0].learning_lemmas,
            vec!["ich".to_string(), "gehen".to_string()]
        );
        assert_eq!(analysis.statistics.learning_segments, 1);
    }

    #[tokio::test]
    async fn unclassified_lemma_blocks() {
        // No tier entry -> Unknown, which sorts above every level
        let store = MemoryKnowledgeStore::new().with_level("42", Tier::C2);
        let filter = filter_with(store);
        let segments = vec![SubtitleSegment::new(0.0, 2.0, "xylophon")];
        let analysis = filter
            .classify(&segments, "42", "de", &no_progress())
            .await
            .unwrap();
        assert!(analysis.segments[0].blocking);
    }

    #[tokio::test]
    async fn classification_is_deterministic() {
        let store = MemoryKnowledgeStore::new()
            .with_known("42", "ich", "de")
            .with_tier("gehen", "de", Tier::B2)
            .with_tier("haus", "de", Tier::C1)
            .with_level("42", Tier::A2);
        let filter = filter_with(store);
        let segments = vec![
            SubtitleSegment::new(0.0, 2.0, "Ich gehe nach Haus"),
            SubtitleSegment::new(2.0, 4.0, "ich ging"),
        ];

        let first = filter
            .classify(&segments, "42", "de", &no_progress())
            .await
            .unwrap();
        let second = filter
            .classify(&segments, "42", "de", &no_progress())
            .await
            .unwrap();
        assert_eq!(first, second);
        // Sorted, deduplicated: "gehe" and "ging" share the lemma "gehen"
        assert!(first.blocking_words.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(
            first.blocking_words.iter().filter(|w| *w == "gehen").count(),
            1
        );
    }

    #[tokio::test]
    async fn unreachable_store_fails_the_stage() {
        let filter = filter_with(MemoryKnowledgeStore::new().unreachable());
        let segments = vec![SubtitleSegment::new(0.0, 2.0, "Ich gehe")];
        let err = filter
            .classify(&segments, "42", "de", &no_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn progress_reported_at_stage_boundaries() {
        let store = MemoryKnowledgeStore::new().with_tier("ich", "de", Tier::A1);
        let filter = filter_with(store);
        let seen = std::sync::Mutex::new(Vec::new());
        let segments = vec![SubtitleSegment::new(0.0, 1.0, "ich")];
        filter
            .classify(&segments, "42", "de", &|p, step| {
                seen.lock().unwrap().push((p, step.to_string()));
            })
            .await
            .unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 60);
        assert_eq!(seen[1].0, 90);
    }
}
