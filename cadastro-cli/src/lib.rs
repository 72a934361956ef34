pub use anyhow::Result;
use cadastro::{Error, Notice, NoticeLevel, Notifier};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub mod pretty;

/// Color when the stream is a terminal, plain text when piped.
pub fn color_choice(stream: atty::Stream) -> ColorChoice {
    if atty::is(stream) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Prints notices to stderr as they happen, so stdout stays clean for the page itself.
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    color: ColorChoice,
    errors_shown: Arc<AtomicUsize>,
}

impl TerminalNotifier {
    pub fn new() -> Self {
        Self::with_color(color_choice(atty::Stream::Stderr))
    }

    pub fn with_color(color: ColorChoice) -> Self {
        TerminalNotifier {
            color,
            errors_shown: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Error notices printed so far, across all clones.
    pub fn errors_shown(&self) -> usize {
        self.errors_shown.load(Ordering::SeqCst)
    }

    fn write(&self, notice: &Notice) -> std::io::Result<()> {
        let mut stderr = StandardStream::stderr(self.color);
        let (label, color) = match notice.level {
            NoticeLevel::Success => ("ok", Color::Green),
            NoticeLevel::Info => ("info", Color::Cyan),
            NoticeLevel::Error => ("error", Color::Red),
        };
        stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(&mut stderr, "{label}: ")?;
        stderr.reset()?;
        writeln!(&mut stderr, "{}", notice.message)
    }
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: &Notice) {
        if notice.level == NoticeLevel::Error {
            self.errors_shown.fetch_add(1, Ordering::SeqCst);
        }
        if let Err(e) = self.write(notice) {
            log::warn!("could not write notice to stderr: {}", e);
        }
    }
}

/// Whether the operator has already seen this failure as an error notice. The library reports
/// its own failures through the notifier; anything else still needs printing.
pub fn already_reported(err: &anyhow::Error, notifier: &TerminalNotifier) -> bool {
    err.downcast_ref::<Error>().is_some() && notifier.errors_shown() > 0
}

#[test]
fn test_already_reported() {
    let notifier = TerminalNotifier::with_color(ColorChoice::Never);
    let decode = anyhow::Error::new(Error::Decode(
        serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
    ));
    let storage = anyhow::Error::new(Error::Storage(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "denied",
    )));
    // nothing shown yet: every error still gets printed
    assert!(!already_reported(&decode, &notifier));
    assert!(!already_reported(&storage, &notifier));

    notifier.notify(&Notice::info("Logged in"));
    assert!(!already_reported(&decode, &notifier));

    notifier.clone().notify(&Notice::error(Error::AuthorizationExpired.notice_message()));
    assert_eq!(notifier.errors_shown(), 1);
    assert!(already_reported(&decode, &notifier));
    assert!(already_reported(&anyhow::Error::new(Error::AuthorizationExpired), &notifier));
    assert!(!already_reported(&anyhow::anyhow!("not logged in"), &notifier));
}
