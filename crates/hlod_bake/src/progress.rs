//! Progress sink that logs through tracing.

use hlod_core::ProgressSink;
use tracing::info;

/// Percent steps between two log lines of the same step.
const LOG_STEP: u32 = 10;

/// Logs a line whenever the step changes or progress crosses a
/// [`LOG_STEP`] boundary.
#[derive(Debug, Default)]
pub struct LogProgress {
	info: String,
	logged_percent: Option<u32>,
}

impl LogProgress {
	fn should_log(&mut self, info: &str, percent: u32) -> bool {
		if self.info != info {
			self.info = info.to_owned();
			self.logged_percent = Some(percent);
			return true;
		}
		match self.logged_percent {
			Some(last) if percent / LOG_STEP <= last / LOG_STEP => false,
			_ => {
				self.logged_percent = Some(percent);
				true
			}
		}
	}
}

impl ProgressSink for LogProgress {
	fn display(&mut self, title: &str, info: &str, progress: f32) {
		let percent = (progress.clamp(0.0, 1.0) * 100.0).round() as u32;
		if self.should_log(info, percent) {
			info!(target: "hlod_bake::progress", "{title}: {info} {percent}%");
		}
	}

	fn clear(&mut self) {
		self.info.clear();
		self.logged_percent = None;
	}
}
