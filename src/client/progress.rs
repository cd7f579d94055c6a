//! Progress bar styling

use indicatif::{ProgressBar, ProgressStyle};

/// Maximum update frequency we will use for the progress display
pub(crate) const MAX_UPDATE_FPS: u8 = 20;

/// Single-line style, used when the filename fits.
///
/// ```text
/// x.txt [==========================            ] 2s @ 123.4MB/s [1.24GB]
/// ```
const PROGRESS_STYLE_COMPACT: &str =
    "{msg:.dim} {wide_bar:.cyan} {eta} @ {decimal_bytes_per_sec} [{decimal_total_bytes:.dim}]";

/// Room needed for the byte readout plus a useful bar
const DATA_AND_PROGRESS: usize = 55;

/// Two-line style for when the filename is too long to share a line with the bar
const PROGRESS_STYLE_OVERLONG: &str = "{wide_msg:.dim} [{decimal_total_bytes:.dim}]\n{wide_bar:.cyan} {eta} @ {decimal_bytes_per_sec}";

/// Picks the progress style for a message of the given length
fn style_for(msg_size: usize) -> &'static str {
    let term_width = console::Term::stderr().size().1 as usize; // this returns a reasonable default if it can't detect
    if msg_size + DATA_AND_PROGRESS > term_width {
        PROGRESS_STYLE_OVERLONG
    } else {
        PROGRESS_STYLE_COMPACT
    }
}

/// Creates a progress bar for receiving the named file.
/// Its length is set once the server announces the file size.
pub(crate) fn file_progress_bar(name: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(style_for(name.len()))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(0)
        .with_style(style)
        .with_message(name.to_owned())
}
