//! A minimal spinner phase for the CLI's stderr progress reporting: a
//! name, a start message, and a completion message, without a
//! multi-progress shell's bookkeeping, which this crate has no use for.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::OnceLock;

fn spinner_style() -> &'static ProgressStyle {
    static STYLE: OnceLock<ProgressStyle> = OnceLock::new();
    STYLE.get_or_init(|| {
        ProgressStyle::with_template("{prefix:.bold.dim} {spinner} {wide_msg} {elapsed:>.italic}")
            .expect("valid spinner style")
    })
}

/// An in-progress CLI phase with an unknown completion time. Hidden
/// entirely when `quiet` is set, matching `--quiet`'s documented effect
/// of silencing progress reporting (§6).
pub struct Phase {
    name: String,
    bar: ProgressBar,
}

impl Phase {
    pub fn start(name: impl Into<String>, quiet: bool) -> Self {
        let name = name.into();
        let bar = if quiet {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        } else {
            let bar = ProgressBar::new_spinner().with_style(spinner_style().clone());
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            bar
        };
        bar.set_prefix(style("=>").bold().to_string());
        bar.set_message(name.clone());
        Phase { name, bar }
    }

    pub fn finish(self) {
        self.bar
            .finish_with_message(format!("{} {}", style(&self.name).green(), style("done").dim()));
    }

    pub fn fail(self, reason: &str) {
        self.bar.finish_with_message(format!(
            "{} {}",
            style(&self.name).red(),
            style(format!("failed: {reason}")).dim()
        ));
    }
}
