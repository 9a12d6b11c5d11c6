//! Lighthouse report (LHR) extraction.

use serde_json::Value;

use crate::models::{PageMetrics, PageScores};

const CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

/// Pull the four category scores and five display metrics out of a raw
/// Lighthouse result. Any missing piece makes the report malformed.
pub fn parse_report(lhr: &Value) -> Result<PageScores, String> {
    if let Some(err) = lhr.get("runtimeError") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown runtime error");
        return Err(format!("runtime error: {}", message));
    }

    let [performance, accessibility, best_practices, seo] = CATEGORIES.map(|c| category_score(lhr, c));

    Ok(PageScores {
        performance: performance?,
        accessibility: accessibility?,
        best_practices: best_practices?,
        seo: seo?,
        metrics: PageMetrics {
            fcp: display_value(lhr, "first-contentful-paint")?,
            lcp: display_value(lhr, "largest-contentful-paint")?,
            tbt: display_value(lhr, "total-blocking-time")?,
            cls: display_value(lhr, "cumulative-layout-shift")?,
            speed_index: display_value(lhr, "speed-index")?,
        },
    })
}

/// Normalize a 0.0–1.0 category score to a whole number in 0–100.
pub fn normalize_score(raw: f64) -> u8 {
    (raw * 100.0).round().clamp(0.0, 100.0) as u8
}

fn category_score(lhr: &Value, category: &str) -> Result<u8, String> {
    lhr.pointer(&format!("/categories/{}/score", category))
        .and_then(Value::as_f64)
        .map(normalize_score)
        .ok_or_else(|| format!("missing score for category '{}'", category))
}

fn display_value(lhr: &Value, audit: &str) -> Result<String, String> {
    lhr.pointer(&format!("/audits/{}/displayValue", audit))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("missing displayValue for audit '{}'", audit))
}

#[cfg(test)]
pub(crate) fn sample_lhr(performance: f64) -> Value {
    serde_json::json!({
        "finalUrl": "https://example.com/",
        "categories": {
            "performance": {"score": performance},
            "accessibility": {"score": 1.0},
            "best-practices": {"score": 0.78},
            "seo": {"score": 0.9}
        },
        "audits": {
            "first-contentful-paint": {"displayValue": "0.8 s"},
            "largest-contentful-paint": {"displayValue": "1.9 s"},
            "total-blocking-time": {"displayValue": "30 ms"},
            "cumulative-layout-shift": {"displayValue": "0.01"},
            "speed-index": {"displayValue": "1.2 s"}
        }
    })
}
