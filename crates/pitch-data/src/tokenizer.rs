//! Pitcher-relative tokenization of arsenals and pitch sequences.
//!
//! Vocabulary layout:
//!
//! ```text
//! 0            PAD
//! 1            BOS
//! 2            SEP
//! 3            UNK   (pitch outside the pitcher's arsenal, or unseen type)
//! 4 .. 4+A     slot tokens, A = max arsenal size
//! 4+A .. V     global pitch-type tokens, sorted by code
//! ```
//!
//! An encoded row interleaves each arsenal slot with its pitch type, then
//! lists the thrown pitches as slot tokens:
//!
//! ```text
//! BOS slot_0 type_0 slot_1 type_1 ... SEP s_1 s_2 ... s_{n-1}   → target s_n
//! └──────────────── segment 0 ──────────┘ └──── segment 1 ────┘
//! ```

use std::collections::HashMap;

use crate::arsenal::PitchArsenalLookupTable;

pub const PAD_TOKEN: i64 = 0;
pub const BOS_TOKEN: i64 = 1;
pub const SEP_TOKEN: i64 = 2;
pub const UNK_TOKEN: i64 = 3;
pub const NUM_SPECIAL_TOKENS: usize = 4;

pub const ARSENAL_SEGMENT: i64 = 0;
pub const SEQUENCE_SEGMENT: i64 = 1;

/// Number of segment ids the model must embed.
pub const NUM_SEGMENTS: usize = 2;

/// Default cap on the number of context pitches fed to the model.
pub const DEFAULT_MAX_PITCH_COUNT_SEQ_LEN: usize = 63;

/// A single (input, target) pair before batching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedSample {
    /// Interleaved token ids, unpadded.
    pub tokens: Vec<i64>,
    /// Segment id per token; same length as `tokens`.
    pub segments: Vec<i64>,
    /// Token id of the pitch to predict.
    pub target: i64,
}

impl TokenizedSample {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Converts a pitcher's arsenal plus a pitch sequence into token ids.
#[derive(Debug, Clone)]
pub struct ArsenalSequenceTokenizer {
    max_arsenal_size: usize,
    max_pitch_count_seq_len: usize,
    type_tokens: HashMap<String, i64>,
}

impl ArsenalSequenceTokenizer {
    /// Build a tokenizer whose vocabulary covers every pitch type in `table`.
    pub fn new(table: &PitchArsenalLookupTable, max_pitch_count_seq_len: usize) -> Self {
        let first_type = (NUM_SPECIAL_TOKENS + table.max_arsenal_size()) as i64;
        let type_tokens = table
            .pitch_types()
            .enumerate()
            .map(|(i, code)| (code.to_string(), first_type + i as i64))
            .collect();
        Self {
            max_arsenal_size: table.max_arsenal_size(),
            max_pitch_count_seq_len,
            type_tokens,
        }
    }

    pub fn vocab_size(&self) -> usize {
        NUM_SPECIAL_TOKENS + self.max_arsenal_size + self.type_tokens.len()
    }

    /// Longest encoded input: BOS + two tokens per slot + SEP + context pitches.
    pub fn max_input_len(&self) -> usize {
        2 + 2 * self.max_arsenal_size + self.max_pitch_count_seq_len
    }

    pub fn max_arsenal_size(&self) -> usize {
        self.max_arsenal_size
    }

    pub fn max_pitch_count_seq_len(&self) -> usize {
        self.max_pitch_count_seq_len
    }

    /// Token for a pitcher-relative arsenal slot; `UNK` past the vocabulary.
    pub fn slot_token(&self, slot: usize) -> i64 {
        if slot < self.max_arsenal_size {
            (NUM_SPECIAL_TOKENS + slot) as i64
        } else {
            UNK_TOKEN
        }
    }

    /// Token for a global pitch-type code; `UNK` if the code was never seen.
    pub fn type_token(&self, pitch_type: &str) -> i64 {
        self.type_tokens.get(pitch_type).copied().unwrap_or(UNK_TOKEN)
    }

    fn pitch_token(&self, arsenal: &[String], pitch: &str) -> i64 {
        arsenal
            .iter()
            .position(|p| p == pitch)
            .map(|slot| self.slot_token(slot))
            .unwrap_or(UNK_TOKEN)
    }

    /// Encode one pitch sequence against the pitcher's arsenal.
    ///
    /// Returns `None` when fewer than two pitches are available, since there
    /// is then nothing to condition on.
    pub fn encode(&self, arsenal: &[String], pitches: &[&str]) -> Option<TokenizedSample> {
        let (last, context) = pitches.split_last()?;
        if context.is_empty() {
            return None;
        }
        let context = &context[context.len().saturating_sub(self.max_pitch_count_seq_len)..];

        let arsenal_len = 2 + 2 * arsenal.len().min(self.max_arsenal_size);
        let mut tokens = Vec::with_capacity(arsenal_len + context.len());
        tokens.push(BOS_TOKEN);
        for (slot, pitch_type) in arsenal.iter().take(self.max_arsenal_size).enumerate() {
            tokens.push(self.slot_token(slot));
            tokens.push(self.type_token(pitch_type));
        }
        tokens.push(SEP_TOKEN);
        let mut segments = vec![ARSENAL_SEGMENT; tokens.len()];

        for pitch in context {
            tokens.push(self.pitch_token(arsenal, pitch));
            segments.push(SEQUENCE_SEGMENT);
        }

        Some(TokenizedSample {
            tokens,
            segments,
            target: self.pitch_token(arsenal, last),
        })
    }
}
