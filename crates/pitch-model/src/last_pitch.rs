use burn::nn::transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput};
use burn::nn::{
    Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
    LinearConfig,
};
use burn::prelude::*;
use pitch_data::tokenizer::NUM_SEGMENTS;
use pitch_data::PitchSequenceInput;

use crate::SequenceModel;

/// Configuration for the LastPitchTransformer.
///
/// ```text
/// tokens, segments, positions       (batch, len)
///   → token + segment + position embeddings → Dropout
///   → TransformerEncoder (padding-masked)
///   → LayerNorm
///   → gather hidden state at last_index     (batch, d_model)
///   → Linear(d_model → vocab_size)          (batch, vocab_size)
/// ```
#[derive(Config, Debug)]
pub struct LastPitchTransformerConfig {
    /// Size of the pitcher-relative vocabulary.
    pub vocab_size: usize,
    /// Longest input sequence the position embedding supports.
    pub max_len: usize,
    /// Hidden dimension.
    #[config(default = 64)]
    pub d_model: usize,
    /// Attention heads per encoder layer. Must divide `d_model`.
    #[config(default = 4)]
    pub n_heads: usize,
    /// Number of stacked encoder layers.
    #[config(default = 2)]
    pub n_layers: usize,
    /// Inner dimension of the feed-forward block.
    #[config(default = 256)]
    pub d_ff: usize,
    /// Dropout probability used in embeddings and encoder layers.
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl LastPitchTransformerConfig {
    /// Reject configurations burn would otherwise panic on during init.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.vocab_size > 0, "vocab_size must be positive");
        anyhow::ensure!(self.max_len > 0, "max_len must be positive");
        anyhow::ensure!(
            self.n_heads > 0 && self.d_model % self.n_heads == 0,
            "d_model ({}) must be divisible by n_heads ({})",
            self.d_model,
            self.n_heads
        );
        anyhow::ensure!(
            (0.0..1.0).contains(&self.dropout),
            "dropout must be in [0, 1), got {}",
            self.dropout
        );
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LastPitchTransformer<B> {
        LastPitchTransformer {
            token_embedding: EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            segment_embedding: EmbeddingConfig::new(NUM_SEGMENTS, self.d_model).init(device),
            position_embedding: EmbeddingConfig::new(self.max_len, self.d_model).init(device),
            encoder: TransformerEncoderConfig::new(self.d_model, self.d_ff, self.n_heads, self.n_layers)
                .with_dropout(self.dropout)
                .init(device),
            norm: LayerNormConfig::new(self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.d_model, self.vocab_size).init(device),
        }
    }
}

/// Transformer encoder that predicts the next pitch from the hidden state
/// of the last real token.
#[derive(Module, Debug)]
pub struct LastPitchTransformer<B: Backend> {
    token_embedding: Embedding<B>,
    segment_embedding: Embedding<B>,
    position_embedding: Embedding<B>,
    encoder: TransformerEncoder<B>,
    norm: LayerNorm<B>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> LastPitchTransformer<B> {
    /// Input `(batch, len)` fields → logits `(batch, vocab_size)`.
    pub fn forward(&self, input: PitchSequenceInput<B>) -> Tensor<B, 2> {
        let [batch, len] = input.tokens().dims();
        let device = input.tokens().device();

        let positions = Tensor::<B, 1, Int>::arange(0..len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch, len]);

        let x = self.token_embedding.forward(input.tokens().clone())
            + self.segment_embedding.forward(input.segments().clone())
            + self.position_embedding.forward(positions);
        let x = self.dropout.forward(x);

        let x = self.encoder.forward(
            TransformerEncoderInput::new(x).mask_pad(input.padding_mask().clone()),
        );
        let x = self.norm.forward(x); // (batch, len, d_model)

        let [_, _, d_model] = x.dims();
        let index = input
            .last_index()
            .clone()
            .reshape([batch, 1, 1])
            .expand([batch, 1, d_model]);
        let last = x.gather(1, index).reshape([batch, d_model]);

        self.output.forward(last)
    }
}

impl<B: Backend> SequenceModel<B> for LastPitchTransformer<B> {
    fn forward(&self, input: PitchSequenceInput<B>) -> Tensor<B, 2> {
        LastPitchTransformer::forward(self, input)
    }
}
