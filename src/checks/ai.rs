//! AI-readiness checks
//!
//! Signals that help language-model crawlers and answer engines understand
//! a site: machine-readable structure, well-formed outlines, enough prose to
//! quote, an `llms.txt`, and robots.txt access for the major AI crawlers.

use crate::checks::types::{
    Category, CheckContext, CheckDefinition, CheckError, CheckOutcome, Priority, Scope,
};
use crate::robots::ParsedRobots;
use serde_json::{json, Value};

/// Words of body text below which a page is considered thin
const THIN_CONTENT_WORDS: usize = 100;
/// Words of body text at which a page is considered substantive
const DEEP_CONTENT_WORDS: usize = 300;

/// robots.txt product tokens of the AI crawlers checked for access
pub const AI_CRAWLERS: &[&str] = &["GPTBot", "ClaudeBot", "PerplexityBot", "Google-Extended"];

pub(crate) const CHECKS: &[CheckDefinition] = &[
    CheckDefinition {
        name: "structured-data",
        category: Category::AiReadiness,
        priority: Priority::Recommended,
        scope: Scope::Page,
        requires_html: true,
        time_variant: false,
        run: structured_data,
    },
    CheckDefinition {
        name: "heading-hierarchy",
        category: Category::AiReadiness,
        priority: Priority::Recommended,
        scope: Scope::Page,
        requires_html: true,
        time_variant: false,
        run: heading_hierarchy,
    },
    CheckDefinition {
        name: "content-depth",
        category: Category::AiReadiness,
        priority: Priority::Recommended,
        scope: Scope::Page,
        requires_html: true,
        time_variant: false,
        run: content_depth,
    },
    CheckDefinition {
        name: "llms-txt",
        category: Category::AiReadiness,
        priority: Priority::Optional,
        scope: Scope::SiteWide,
        requires_html: false,
        time_variant: false,
        run: llms_txt,
    },
    CheckDefinition {
        name: "ai-crawler-access",
        category: Category::AiReadiness,
        priority: Priority::Critical,
        scope: Scope::SiteWide,
        requires_html: false,
        time_variant: false,
        run: ai_crawler_access,
    },
];

fn structured_data(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let blocks = &ctx.document()?.json_ld;
    if blocks.is_empty() {
        return Ok(CheckOutcome::failed(json!({ "reason": "no JSON-LD found" })));
    }

    let mut types = Vec::new();
    let mut invalid = 0;
    for block in blocks {
        match serde_json::from_str::<Value>(block) {
            Ok(value) => collect_types(&value, &mut types),
            Err(_) => invalid += 1,
        }
    }
    types.sort();
    types.dedup();

    let detail = json!({ "blocks": blocks.len(), "invalid": invalid, "types": types });
    Ok(if invalid == 0 {
        CheckOutcome::passed(detail)
    } else {
        CheckOutcome::warning(detail)
    })
}

/// Collects `@type` values, descending into arrays and `@graph`
fn collect_types(value: &Value, types: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_types(item, types)),
        Value::Object(map) => {
            match map.get("@type") {
                Some(Value::String(t)) => types.push(t.clone()),
                Some(Value::Array(ts)) => types.extend(
                    ts.iter()
                        .filter_map(|t| t.as_str())
                        .map(str::to_string),
                ),
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_types(graph, types);
            }
        }
        _ => {}
    }
}

fn heading_hierarchy(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let headings = &ctx.document()?.headings;
    let Some((first, _)) = headings.first() else {
        return Ok(CheckOutcome::failed(json!({ "reason": "page has no headings" })));
    };

    let skips: Vec<String> = headings
        .windows(2)
        .filter(|pair| pair[1].0 > pair[0].0 + 1)
        .map(|pair| format!("h{} -> h{}", pair[0].0, pair[1].0))
        .collect();

    let detail = json!({ "first": format!("h{}", first), "skips": skips });
    Ok(if *first == 1 && skips.is_empty() {
        CheckOutcome::passed(detail)
    } else {
        CheckOutcome::warning(detail)
    })
}

fn content_depth(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let words = ctx.document()?.word_count;
    let detail = json!({ "words": words });
    Ok(if words >= DEEP_CONTENT_WORDS {
        CheckOutcome::passed(detail)
    } else if words >= THIN_CONTENT_WORDS {
        CheckOutcome::warning(detail)
    } else {
        CheckOutcome::failed(detail)
    })
}

fn llms_txt(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    Ok(match ctx.site.llms_txt.as_deref().map(str::trim) {
        Some(content) if !content.is_empty() => {
            CheckOutcome::passed(json!({ "bytes": content.len() }))
        }
        Some(_) => CheckOutcome::warning(json!({ "reason": "llms.txt is empty" })),
        None => CheckOutcome::failed(json!({ "reason": "no llms.txt" })),
    })
}

fn ai_crawler_access(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let Some(content) = ctx.site.robots_txt.as_deref() else {
        return Ok(CheckOutcome::passed(
            json!({ "reason": "no robots.txt; all crawlers allowed" }),
        ));
    };

    let robots = ParsedRobots::from_content(content);
    let root = ctx
        .url
        .join("/")
        .map_err(|e| CheckError::Evaluation(e.to_string()))?;
    let blocked: Vec<&str> = AI_CRAWLERS
        .iter()
        .copied()
        .filter(|agent| !robots.is_allowed(root.as_str(), agent))
        .collect();

    let detail = json!({ "checked": AI_CRAWLERS, "blocked": blocked });
    Ok(if blocked.is_empty() {
        CheckOutcome::passed(detail)
    } else if blocked.len() < AI_CRAWLERS.len() {
        CheckOutcome::warning(detail)
    } else {
        CheckOutcome::failed(detail)
    })
}

#[cfg(test)]
mod tests {
    use crate::checks::test_support::Fixture;
    use crate::checks::CheckStatus;

    const URL: &str = "https://example.com/";

    fn status(check: &str, html: &str) -> CheckStatus {
        Fixture::html(URL, html).run(check).status
    }

    fn site_status(check: &str, robots: Option<&str>, llms: Option<&str>) -> CheckStatus {
        let mut fixture = Fixture::html(URL, "");
        fixture.site.robots_txt = robots.map(str::to_string);
        fixture.site.llms_txt = llms.map(str::to_string);
        fixture.run(check).status
    }

    #[test]
    fn test_structured_data() {
        let outcome = Fixture::html(
            URL,
            r#"<script type="application/ld+json">{"@graph": [{"@type": "Organization"}, {"@type": ["WebSite", "Thing"]}]}</script>"#,
        )
        .run("structured-data");
        assert_eq!(outcome.status, CheckStatus::Passed);
        assert_eq!(
            outcome.detail["types"],
            serde_json::json!(["Organization", "Thing", "WebSite"])
        );

        assert_eq!(
            status(
                "structured-data",
                r#"<script type="application/ld+json">{not json</script>"#
            ),
            CheckStatus::Warning
        );
        assert_eq!(status("structured-data", "<p></p>"), CheckStatus::Failed);
    }

    #[test]
    fn test_heading_hierarchy() {
        assert_eq!(
            status("heading-hierarchy", "<h1>a</h1><h2>b</h2><h3>c</h3><h2>d</h2>"),
            CheckStatus::Passed
        );
        assert_eq!(
            status("heading-hierarchy", "<h1>a</h1><h3>skipped</h3>"),
            CheckStatus::Warning
        );
        assert_eq!(status("heading-hierarchy", "<h2>a</h2>"), CheckStatus::Warning);
        assert_eq!(status("heading-hierarchy", "<p>none</p>"), CheckStatus::Failed);
    }

    #[test]
    fn test_content_depth() {
        let deep = format!("<p>{}</p>", "word ".repeat(300));
        let thin = format!("<p>{}</p>", "word ".repeat(150));
        assert_eq!(status("content-depth", &deep), CheckStatus::Passed);
        assert_eq!(status("content-depth", &thin), CheckStatus::Warning);
        assert_eq!(status("content-depth", "<p>hello</p>"), CheckStatus::Failed);
    }

    #[test]
    fn test_llms_txt() {
        assert_eq!(site_status("llms-txt", None, Some("# Docs\n")), CheckStatus::Passed);
        assert_eq!(site_status("llms-txt", None, Some("  \n")), CheckStatus::Warning);
        assert_eq!(site_status("llms-txt", None, None), CheckStatus::Failed);
    }

    #[test]
    fn test_ai_crawler_access() {
        assert_eq!(site_status("ai-crawler-access", None, None), CheckStatus::Passed);
        assert_eq!(
            site_status("ai-crawler-access", Some("User-agent: *\nAllow: /"), None),
            CheckStatus::Passed
        );
        assert_eq!(
            site_status(
                "ai-crawler-access",
                Some("User-agent: GPTBot\nDisallow: /\n\nUser-agent: *\nAllow: /"),
                None
            ),
            CheckStatus::Warning
        );
        assert_eq!(
            site_status("ai-crawler-access", Some("User-agent: *\nDisallow: /"), None),
            CheckStatus::Failed
        );
    }
}
