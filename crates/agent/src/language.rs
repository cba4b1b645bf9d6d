use selma_core::Language;
use tracing::warn;

/// Best-effort language classification over the supported routing set.
///
/// Detection runs on every inbound message; there is no stickiness. Both
/// failure modes resolve to the default tag: a recognized-but-unsupported
/// language and an undetectable input are logged as distinct observations,
/// never surfaced as errors.
pub fn classify(text: &str) -> Language {
    match whatlang::detect(text) {
        Some(info) => match info.lang() {
            whatlang::Lang::Eng => Language::En,
            whatlang::Lang::Rus => Language::Ru,
            other => {
                warn!(
                    event_name = "classifier.unsupported_language",
                    detected = other.code(),
                    fallback = Language::default().as_tag(),
                    "detected language is outside the supported set"
                );
                Language::default()
            }
        },
        None => {
            warn!(
                event_name = "classifier.detection_failed",
                fallback = Language::default().as_tag(),
                "language detection produced no result"
            );
            Language::default()
        }
    }
}
