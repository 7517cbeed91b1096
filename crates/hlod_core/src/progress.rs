//! Progress sink contract.
//!
//! The bake reports through one injected [`ProgressSink`]. Each stage maps its
//! own [0, 1] progress into a slice of the overall bar via [`StageProgress`].

/// Receiver of progress updates, typically a progress bar.
pub trait ProgressSink {
  /// Show `progress` (in [0, 1]) under `title`, with `info` naming the step.
  fn display(&mut self, title: &str, info: &str, progress: f32);

  /// Remove the progress display.
  fn clear(&mut self);
}

/// Sink that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
  fn display(&mut self, _title: &str, _info: &str, _progress: f32) {}

  fn clear(&mut self) {}
}

/// Clears the wrapped sink when dropped.
pub struct ProgressScope<'a> {
  sink: &'a mut dyn ProgressSink,
}

impl<'a> ProgressScope<'a> {
  pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
    Self { sink }
  }

  pub fn sink(&mut self) -> &mut dyn ProgressSink {
    &mut *self.sink
  }
}

impl Drop for ProgressScope<'_> {
  fn drop(&mut self) {
    self.sink.clear();
  }
}

/// Maps a stage's local progress onto `[start, start + span]` of the overall
/// bar.
#[derive(Clone, Copy, Debug)]
pub struct StageProgress {
  pub title: &'static str,
  pub info: &'static str,
  pub start: f32,
  pub span: f32,
}

impl StageProgress {
  pub const fn new(title: &'static str, info: &'static str, start: f32, span: f32) -> Self {
    Self {
      title,
      info,
      start,
      span,
    }
  }

  /// Overall progress for a local value in [0, 1].
  pub fn map(&self, local: f32) -> f32 {
    let local = if local.is_nan() { 0.0 } else { local.clamp(0.0, 1.0) };
    self.start + local * self.span
  }

  pub fn report(&self, sink: &mut dyn ProgressSink, local: f32) {
    sink.display(self.title, self.info, self.map(local));
  }
}
