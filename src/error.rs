use thiserror::Error;

pub type Result<T> = std::result::Result<T, BannerError>;

/// Top-level failure returned by the engine.
#[derive(Debug, Error)]
pub enum BannerError {
    #[error("invalid design document: {0}")]
    Validation(#[from] ValidationError),

    #[error("text layout failed: {0}")]
    Layout(#[from] LayoutError),

    /// Every rasterization or persistence failure collapses into this kind.
    #[error("failed to generate banner: {0}")]
    GenerationFailed(#[from] RenderFailure),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("canvas size {width}x{height} must be positive")]
    InvalidCanvas { width: i64, height: i64 },

    #[error("duplicate id '{id}' in {collection}")]
    DuplicateId { collection: &'static str, id: String },

    #[error("font size {value} for {target} must be positive")]
    InvalidFontSize { target: String, value: f64 },

    #[error("no element with id '{id}'")]
    UnknownElement { id: String },

    #[error("malformed document json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("font size {0} must be greater than zero")]
    NonPositiveFontSize(f32),

    #[error("no usable font for family '{family}' (sans-serif fallback also missing)")]
    NoFont { family: String },
}

#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("render did not finish within {ms}ms")]
    Timeout { ms: u64 },

    #[error("render backend error: {0}")]
    Backend(String),

    #[error("no render backend became available within {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("render cancelled")]
    Cancelled,

    #[error("could not persist banner: {0}")]
    Persist(#[from] std::io::Error),
}

/// Background image could not be loaded. Always recovered by the caller.
#[derive(Debug, Error)]
pub enum ResourceFetchError {
    #[error("fetching {url} exceeded {ms}ms")]
    Timeout { url: String, ms: u64 },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("could not decode image from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("unsupported image source {url}")]
    Unsupported { url: String },

    #[error("reading {url} failed: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failures_surface_as_generation_failed() {
        let err: BannerError = RenderFailure::Timeout { ms: 30_000 }.into();
        assert!(matches!(err, BannerError::GenerationFailed(_)));
        assert_eq!(
            err.to_string(),
            "failed to generate banner: render did not finish within 30000ms"
        );
    }

    #[test]
    fn layout_errors_keep_their_own_kind() {
        let err: BannerError = LayoutError::NonPositiveFontSize(0.0).into();
        assert!(matches!(err, BannerError::Layout(_)));
    }
}
