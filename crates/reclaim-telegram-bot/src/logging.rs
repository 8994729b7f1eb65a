//! Log output with bot credentials masked.

use regex::Regex;
use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "reclaim_core=info,reclaim_transport_telegram=info,\
reclaim_telegram_bot=info,teloxide=warn,hyper=warn,h2=error,reqwest=warn,tokio=warn";

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

/// Masks Bot API tokens in formatted log lines.
pub struct Redactor {
    rules: Vec<Rule>,
}

impl Redactor {
    /// Compile the masking rules.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        let rules = [
            // Token inside a Bot API URL
            (
                r"(https?://[^/]+/bot)[0-9]+:[A-Za-z0-9_-]+(/['\s]*)",
                "${1}[TELEGRAM_TOKEN]${2}",
            ),
            (r"bot([0-9]{8,10}:)[A-Za-z0-9_-]+", "bot${1}[TELEGRAM_TOKEN]"),
            (r"[0-9]{8,10}:[A-Za-z0-9_-]{35}", "[TELEGRAM_TOKEN]"),
            (r"((?:TELEGRAM|BOT)_TOKEN=)[^\s&]+", "${1}[MASKED]"),
        ];

        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| {
                Ok(Rule {
                    pattern: Regex::new(pattern)?,
                    replacement,
                })
            })
            .collect::<Result<_, regex::Error>>()?;

        Ok(Self { rules })
    }

    /// Apply every rule in order; borrows the input when nothing matches.
    pub fn redact<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut text = Cow::Borrowed(input);
        for rule in &self.rules {
            if rule.pattern.is_match(&text) {
                text = Cow::Owned(rule.pattern.replace_all(&text, rule.replacement).into_owned());
            }
        }
        text
    }
}

/// Writer that masks each chunk before handing it to the inner writer.
pub struct RedactingWriter<W> {
    inner: W,
    redactor: Arc<Redactor>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(self.redactor.redact(&text).as_bytes())?;
        // The caller tracks progress in its own bytes
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Wraps any `MakeWriter` so every event it produces is masked.
pub struct Redacting<M> {
    inner: M,
    redactor: Arc<Redactor>,
}

impl<M> Redacting<M> {
    /// Wrap `inner`
    pub const fn new(inner: M, redactor: Arc<Redactor>) -> Self {
        Self { inner, redactor }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for Redacting<M> {
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            redactor: Arc::clone(&self.redactor),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `DEBUG_MODE=true|1` switches to debug
/// for everything.
pub fn init(redactor: Arc<Redactor>) {
    let debug_mode = std::env::var("DEBUG_MODE").is_ok_and(|v| v == "true" || v == "1");
    let fallback = if debug_mode { "debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(Redacting::new(io::stderr, redactor)))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const TOKEN: &str = "1234567890:AAbbCCddEEffGGhhIIjjKKllMMnnOOppQQr";

    fn redactor() -> Arc<Redactor> {
        Arc::new(Redactor::new().expect("valid patterns"))
    }

    #[test]
    fn test_api_url_keeps_host_and_method() {
        let line = format!("POST https://api.telegram.org/bot{TOKEN}/sendMessage failed");
        assert_eq!(
            redactor().redact(&line),
            "POST https://api.telegram.org/bot[TELEGRAM_TOKEN]/sendMessage failed"
        );
    }

    #[test]
    fn test_env_assignment_is_masked() {
        assert_eq!(
            redactor().redact("env BOT_TOKEN=secret-value loaded"),
            "env BOT_TOKEN=[MASKED] loaded"
        );
        assert_eq!(
            redactor().redact("TELEGRAM_TOKEN=abc&x=1"),
            "TELEGRAM_TOKEN=[MASKED]&x=1"
        );
    }

    #[test]
    fn test_clean_line_is_borrowed() {
        let line = "Resolver initialized with 3 strategies.";
        assert!(matches!(redactor().redact(line), Cow::Borrowed(_)));
    }

    #[test]
    fn test_writer_masks_bytes_and_reports_input_length() {
        let mut writer = RedactingWriter {
            inner: Vec::new(),
            redactor: redactor(),
        };
        let line = format!("token {TOKEN} leaked\n");

        let written = writer.write(line.as_bytes()).expect("write");

        assert_eq!(written, line.len());
        let out = String::from_utf8(writer.inner).expect("utf8");
        assert_eq!(out, "token [TELEGRAM_TOKEN] leaked\n");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_subscriber_output_is_masked() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(Redacting::new(move || sink.clone(), redactor()))
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("calling https://api.telegram.org/bot{TOKEN}/getMe");
        });

        let out = String::from_utf8(captured.0.lock().expect("lock").clone()).expect("utf8");
        assert!(out.contains("bot[TELEGRAM_TOKEN]/getMe"), "{out}");
        assert!(!out.contains(TOKEN));
    }
}
