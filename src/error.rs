use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid DOCX package: {0}")]
    Package(String),

    #[error("malformed document XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Package(err.to_string())
    }
}

/// Failure to read one metadata source (core or app properties).
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("malformed {part}: {source}")]
    Malformed {
        part: &'static str,
        #[source]
        source: roxmltree::Error,
    },

    #[error("unexpected root element <{found}> in {part}")]
    UnexpectedRoot { part: &'static str, found: String },
}
