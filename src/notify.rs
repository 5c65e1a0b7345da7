use crate::error::AppError;

/// Sink for user-facing status messages.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Prints notifications on stderr so table output on stdout stays clean.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn success(&self, message: &str) {
        eprintln!("✔ {}", message);
    }

    fn info(&self, message: &str) {
        eprintln!("ℹ {}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("⚠ {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("✖ {}", message);
    }
}

/// Logs a failure with its category and shows the localized message.
pub fn report(notifier: &dyn Notifier, context: &str, err: &AppError) {
    tracing::error!(
        "{}: kind={}, code={}, error={}",
        context,
        err.kind(),
        err.code().unwrap_or_default(),
        err
    );
    notifier.error(&err.user_message());
}

/// Same as [`report`] but with a fixed headline before the backend message.
pub fn report_with(notifier: &dyn Notifier, headline: &str, err: &AppError) {
    tracing::error!("{}: kind={}, error={}", headline, err.kind(), err);
    notifier.error(&format!("{}: {}", headline, err.user_message()));
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::Notifier;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Level {
        Success,
        Info,
        Warning,
        Error,
    }

    /// Keeps every notification for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub messages: Mutex<Vec<(Level, String)>>,
    }

    impl RecordingNotifier {
        pub fn of_level(&self, level: Level) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }

        fn push(&self, level: Level, message: &str) {
            self.messages.lock().unwrap().push((level, message.to_string()));
        }
    }

    impl Notifier for RecordingNotifier {
        fn success(&self, message: &str) {
            self.push(Level::Success, message);
        }

        fn info(&self, message: &str) {
            self.push(Level::Info, message);
        }

        fn warning(&self, message: &str) {
            self.push(Level::Warning, message);
        }

        fn error(&self, message: &str) {
            self.push(Level::Error, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Level, RecordingNotifier};
    use super::*;

    #[test]
    fn test_report_shows_localized_message() {
        let notifier = RecordingNotifier::default();
        let err = AppError::Database(sqlx::Error::RowNotFound);
        report(&notifier, "Error al cargar", &err);
        assert_eq!(notifier.of_level(Level::Error), vec!["No se encontró el registro."]);
    }

    #[test]
    fn test_report_with_headline() {
        let notifier = RecordingNotifier::default();
        let err = AppError::InvalidInput("Stock insuficiente".to_string());
        report_with(&notifier, "Error al registrar el movimiento técnico", &err);
        assert_eq!(
            notifier.of_level(Level::Error),
            vec!["Error al registrar el movimiento técnico: Stock insuficiente"]
        );
    }
}
