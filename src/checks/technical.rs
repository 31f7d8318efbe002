//! Technical health checks

use crate::checks::types::{
    Category, CheckContext, CheckDefinition, CheckError, CheckOutcome, Priority, Scope,
};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Responses faster than this pass
const FAST_RESPONSE_MS: u64 = 1000;
/// Responses slower than this fail
const SLOW_RESPONSE_MS: u64 = 3000;

/// Content modified within this many days is fresh
const FRESH_DAYS: i64 = 365;
/// Content older than this many days is stale
const STALE_DAYS: i64 = 730;

const fn check(
    name: &'static str,
    priority: Priority,
    scope: Scope,
    requires_html: bool,
    run: crate::checks::CheckFn,
) -> CheckDefinition {
    CheckDefinition {
        name,
        category: Category::Technical,
        priority,
        scope,
        requires_html,
        time_variant: false,
        run,
    }
}

pub(crate) const CHECKS: &[CheckDefinition] = &[
    check("https", Priority::Critical, Scope::SiteWide, false, https),
    check("robots-txt", Priority::Recommended, Scope::SiteWide, false, robots_txt),
    check("xml-sitemap", Priority::Recommended, Scope::SiteWide, false, xml_sitemap),
    check("hsts", Priority::Optional, Scope::SiteWide, false, hsts),
    check("http-status", Priority::Critical, Scope::Page, false, http_status),
    CheckDefinition {
        name: "response-time",
        category: Category::Technical,
        priority: Priority::Recommended,
        scope: Scope::Page,
        requires_html: false,
        // Result depends on network latency
        time_variant: true,
        run: response_time,
    },
    check("mixed-content", Priority::Recommended, Scope::Page, true, mixed_content),
    check("viewport-meta", Priority::Recommended, Scope::Page, true, viewport_meta),
    CheckDefinition {
        name: "content-freshness",
        category: Category::Technical,
        priority: Priority::Optional,
        scope: Scope::Page,
        requires_html: true,
        // Result depends on the evaluation clock
        time_variant: true,
        run: content_freshness,
    },
];

fn https(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let detail = json!({ "scheme": ctx.url.scheme() });
    Ok(if ctx.url.scheme() == "https" {
        CheckOutcome::passed(detail)
    } else {
        CheckOutcome::failed(detail)
    })
}

fn robots_txt(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    Ok(match &ctx.site.robots_txt {
        Some(content) => CheckOutcome::passed(json!({ "bytes": content.len() })),
        None => CheckOutcome::warning(json!({ "reason": "no robots.txt" })),
    })
}

fn xml_sitemap(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let location = ctx.site.sitemap_url.as_deref().unwrap_or("");
    Ok(match &ctx.site.sitemap {
        Some(body) if body.contains("<urlset") || body.contains("<sitemapindex") => {
            CheckOutcome::passed(json!({
                "location": location,
                "urls": body.matches("<loc>").count(),
            }))
        }
        Some(_) => CheckOutcome::warning(json!({
            "location": location,
            "reason": "sitemap is not a urlset or sitemap index",
        })),
        None => CheckOutcome::failed(json!({ "location": location, "reason": "no sitemap" })),
    })
}

fn hsts(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    if ctx.url.scheme() != "https" {
        return Ok(CheckOutcome::failed(json!({ "reason": "site is not served over HTTPS" })));
    }
    Ok(match ctx.facts.header("strict-transport-security") {
        Some(value) => CheckOutcome::passed(json!({ "header": value })),
        None => CheckOutcome::warning(json!({ "reason": "no Strict-Transport-Security header" })),
    })
}

fn http_status(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let Some(code) = ctx.facts.status_code else {
        return Ok(CheckOutcome::failed(json!({
            "error": ctx.facts.fetch_error.as_deref().unwrap_or("no response"),
        })));
    };

    let detail = json!({ "status": code });
    Ok(match code {
        200..=299 => CheckOutcome::passed(detail),
        300..=399 => CheckOutcome::warning(detail),
        _ => CheckOutcome::failed(detail),
    })
}

fn response_time(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let Some(ms) = ctx.facts.response_time_ms else {
        return Ok(CheckOutcome::failed(json!({ "reason": "no response" })));
    };

    let detail = json!({ "ms": ms });
    Ok(if ms < FAST_RESPONSE_MS {
        CheckOutcome::passed(detail)
    } else if ms <= SLOW_RESPONSE_MS {
        CheckOutcome::warning(detail)
    } else {
        CheckOutcome::failed(detail)
    })
}

fn mixed_content(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let document = ctx.document()?;
    if ctx.url.scheme() != "https" {
        return Ok(CheckOutcome::passed(json!({ "applicable": false })));
    }

    let insecure: Vec<&str> = document
        .subresources
        .iter()
        .filter(|src| src.starts_with("http://"))
        .map(String::as_str)
        .collect();

    Ok(if insecure.is_empty() {
        CheckOutcome::passed(json!({ "applicable": true }))
    } else {
        CheckOutcome::failed(json!({ "insecure": insecure }))
    })
}

fn viewport_meta(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    Ok(match &ctx.document()?.viewport {
        Some(content) if content.replace(' ', "").contains("width=device-width") => {
            CheckOutcome::passed(json!({ "viewport": content }))
        }
        Some(content) => CheckOutcome::warning(json!({ "viewport": content })),
        None => CheckOutcome::failed(json!({ "reason": "no viewport meta tag" })),
    })
}

fn content_freshness(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let Some(raw) = ctx.facts.last_modified.as_deref() else {
        return Ok(CheckOutcome::warning(json!({ "reason": "no Last-Modified header" })));
    };

    let modified = DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CheckError::Evaluation(format!("unparseable Last-Modified '{}': {}", raw, e)))?;

    let age_days = (ctx.now - modified).num_days();
    let detail = json!({ "last_modified": raw, "age_days": age_days });
    Ok(if age_days <= FRESH_DAYS {
        CheckOutcome::passed(detail)
    } else if age_days <= STALE_DAYS {
        CheckOutcome::warning(detail)
    } else {
        CheckOutcome::failed(detail)
    })
}
