//! Stderr progress indicators. Hidden when stderr is not a terminal or
//! `--quiet` is set, so piped JSON output stays clean.

use std::io::IsTerminal;
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::cli::GlobalFlags;

static DRAW_TARGET: OnceLock<Option<MultiProgress>> = OnceLock::new();

const BAR_TEMPLATE: &str = "{msg:>10} [{elapsed_precise}] {wide_bar:.green/white} {pos}/{len} eta {eta}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed}]";

pub fn init(flags: &GlobalFlags) {
    let visible = !flags.quiet && std::io::stderr().is_terminal();
    let _ = DRAW_TARGET.set(visible.then(MultiProgress::new));
}

fn attach(bar: ProgressBar, template: &str, message: &str) -> Progress {
    let Some(Some(multi)) = DRAW_TARGET.get() else {
        return Progress { bar: None };
    };
    let bar = multi.add(bar);
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    Progress { bar: Some(bar) }
}

/// A bar or spinner; every method is a no-op when progress is hidden.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    #[must_use]
    pub fn spinner(message: &str) -> Self {
        let progress = attach(ProgressBar::new_spinner(), SPINNER_TEMPLATE, message);
        if let Some(bar) = &progress.bar {
            bar.enable_steady_tick(Duration::from_millis(120));
        }
        progress
    }

    #[must_use]
    pub fn bar(total: u64, message: &str) -> Self {
        attach(ProgressBar::new(total), BAR_TEMPLATE, message)
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    pub fn finish_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
