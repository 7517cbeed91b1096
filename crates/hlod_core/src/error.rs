//! Error types for the bake pipeline.

use std::fmt;

use thiserror::Error;

/// Error type returned by collaborators (strategies, asset stores).
pub type StageError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline stage an error originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
  Refresh,
  Split,
  BuildInfo,
  Simplify,
  Batch,
  Stream,
  Destroy,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Refresh => "refresh",
      Stage::Split => "split",
      Stage::BuildInfo => "build info",
      Stage::Simplify => "simplify",
      Stage::Batch => "batch",
      Stage::Stream => "stream",
      Stage::Destroy => "destroy",
    };
    f.write_str(name)
  }
}

/// Kind of pluggable strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
  Simplifier,
  Batcher,
  StreamingBuilder,
}

impl fmt::Display for StrategyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      StrategyKind::Simplifier => "simplifier",
      StrategyKind::Batcher => "batcher",
      StrategyKind::StreamingBuilder => "streaming builder",
    };
    f.write_str(name)
  }
}

/// Terminal failure of a single branch.
#[derive(Debug, Error)]
pub enum BranchError {
  /// The branch's work returned an error.
  #[error("branch {index} ({name}) failed: {source}")]
  Failed {
    index: usize,
    name: String,
    #[source]
    source: StageError,
  },

  /// The branch's work panicked.
  #[error("branch {index} ({name}) panicked: {message}")]
  Panicked {
    index: usize,
    name: String,
    message: String,
  },
}

impl BranchError {
  /// Launch index of the failed branch.
  pub fn index(&self) -> usize {
    match self {
      BranchError::Failed { index, .. } | BranchError::Panicked { index, .. } => *index,
    }
  }
}

/// A combined mesh no longer fits 32-bit indices.
#[derive(Debug, Error)]
#[error("combined mesh exceeds the 32-bit index range ({vertices} vertices)")]
pub struct MeshIndexOverflow {
  pub vertices: usize,
}

/// Errors surfaced by [`HlodCreator`](crate::HlodCreator).
#[derive(Debug, Error)]
pub enum HlodError {
  #[error("no {kind} registered as \"{type_id}\"")]
  UnknownStrategy { kind: StrategyKind, type_id: String },

  #[error("{kind} \"{type_id}\" rejected its options: {source}")]
  InvalidStrategyOptions {
    kind: StrategyKind,
    type_id: String,
    #[source]
    source: StageError,
  },

  #[error("target \"{0}\" is already baked; destroy it first")]
  AlreadyBaked(String),

  #[error("{stage} stage failed: {source}")]
  Stage {
    stage: Stage,
    #[source]
    source: StageError,
  },

  #[error("simplify stage failed: {0}")]
  Branch(#[from] BranchError),

  #[error("asset store failed during {stage}: {source}")]
  AssetStore {
    stage: Stage,
    #[source]
    source: StageError,
  },

  #[error("destroy left {} artifact(s) behind: {}", .remaining.len(), .remaining.join(", "))]
  DestroyIncomplete {
    remaining: Vec<String>,
    #[source]
    source: StageError,
  },
}

impl HlodError {
  pub(crate) fn stage(stage: Stage, source: StageError) -> Self {
    HlodError::Stage { stage, source }
  }

  pub(crate) fn assets(stage: Stage, source: StageError) -> Self {
    HlodError::AssetStore { stage, source }
  }
}
