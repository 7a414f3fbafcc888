use std::fmt;

#[derive(Debug)]
pub enum CertificateError {
    FontFetch { url: String, message: String },
    InvalidFont(String),
    MissingField(String),
    InvalidTheme(String),
    InvalidConfiguration(String),
    Conversion(String),
    Io(std::io::Error),
}

impl fmt::Display for CertificateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateError::FontFetch { url, message } => {
                write!(f, "failed to load font {}: {}", url, message)
            }
            CertificateError::InvalidFont(message) => write!(f, "invalid font: {}", message),
            CertificateError::MissingField(selector) => {
                write!(f, "certificate field not found: {}", selector)
            }
            CertificateError::InvalidTheme(message) => write!(f, "invalid theme: {}", message),
            CertificateError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            CertificateError::Conversion(message) => {
                write!(f, "pdf conversion failed: {}", message)
            }
            CertificateError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for CertificateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CertificateError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CertificateError {
    fn from(value: std::io::Error) -> Self {
        CertificateError::Io(value)
    }
}

impl From<serde_json::Error> for CertificateError {
    fn from(value: serde_json::Error) -> Self {
        CertificateError::InvalidConfiguration(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_url() {
        let err = CertificateError::FontFetch {
            url: "/fonts/Inter-Regular.ttf".to_string(),
            message: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to load font /fonts/Inter-Regular.ttf: not found"
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error;
        let err: CertificateError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(CertificateError::MissingField("header p".into()).source().is_none());
    }
}
