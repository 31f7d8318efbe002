//! SEO checks

use crate::checks::types::{
    Category, CheckContext, CheckDefinition, CheckError, CheckOutcome, Priority, Scope,
};
use serde_json::json;

const TITLE_MIN_CHARS: usize = 30;
const TITLE_MAX_CHARS: usize = 60;
const DESCRIPTION_MIN_CHARS: usize = 70;
const DESCRIPTION_MAX_CHARS: usize = 160;

/// Open Graph properties a share preview needs
const OPEN_GRAPH_REQUIRED: &[&str] = &["og:title", "og:description", "og:image"];

const fn page_check(
    name: &'static str,
    priority: Priority,
    run: crate::checks::CheckFn,
) -> CheckDefinition {
    CheckDefinition {
        name,
        category: Category::Seo,
        priority,
        scope: Scope::Page,
        requires_html: true,
        time_variant: false,
        run,
    }
}

pub(crate) const CHECKS: &[CheckDefinition] = &[
    page_check("title-present", Priority::Critical, title_present),
    page_check("title-length", Priority::Recommended, title_length),
    page_check("meta-description", Priority::Critical, meta_description),
    page_check("single-h1", Priority::Recommended, single_h1),
    page_check("canonical-link", Priority::Recommended, canonical_link),
    page_check("image-alt-text", Priority::Recommended, image_alt_text),
    page_check("html-lang", Priority::Recommended, html_lang),
    page_check("indexable", Priority::Critical, indexable),
    page_check("unique-title", Priority::Recommended, unique_title),
    page_check("open-graph", Priority::Optional, open_graph),
];

fn title_present(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    Ok(match &ctx.document()?.title {
        Some(title) => CheckOutcome::passed(json!({ "title": title })),
        None => CheckOutcome::failed(json!({ "reason": "page has no <title>" })),
    })
}

fn title_length(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let Some(title) = &ctx.document()?.title else {
        return Ok(CheckOutcome::failed(json!({ "reason": "page has no <title>" })));
    };

    let length = title.chars().count();
    let detail = json!({
        "length": length,
        "min": TITLE_MIN_CHARS,
        "max": TITLE_MAX_CHARS,
    });
    Ok(if (TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&length) {
        CheckOutcome::passed(detail)
    } else {
        CheckOutcome::warning(detail)
    })
}

fn meta_description(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let Some(description) = &ctx.document()?.meta_description else {
        return Ok(CheckOutcome::failed(
            json!({ "reason": "page has no meta description" }),
        ));
    };

    let length = description.chars().count();
    let detail = json!({
        "length": length,
        "min": DESCRIPTION_MIN_CHARS,
        "max": DESCRIPTION_MAX_CHARS,
    });
    Ok(
        if (DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&length) {
            CheckOutcome::passed(detail)
        } else {
            CheckOutcome::warning(detail)
        },
    )
}

fn single_h1(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let count = ctx.document()?.h1_count();
    let detail = json!({ "h1_count": count });
    Ok(match count {
        0 => CheckOutcome::failed(detail),
        1 => CheckOutcome::passed(detail),
        _ => CheckOutcome::warning(detail),
    })
}

fn canonical_link(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    Ok(match &ctx.document()?.canonical {
        Some(canonical) => CheckOutcome::passed(json!({
            "canonical": canonical,
            "self_referencing": canonical.trim_end_matches('/') == ctx.url.as_str().trim_end_matches('/'),
        })),
        None => CheckOutcome::warning(json!({ "reason": "no canonical link" })),
    })
}

fn image_alt_text(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let images = &ctx.document()?.images;
    let missing: Vec<&str> = images
        .iter()
        .filter(|image| image.alt.is_none())
        .map(|image| image.src.as_str())
        .collect();

    let detail = json!({ "images": images.len(), "missing_alt": missing });
    Ok(if missing.is_empty() {
        CheckOutcome::passed(detail)
    } else if missing.len() * 2 < images.len() {
        CheckOutcome::warning(detail)
    } else {
        CheckOutcome::failed(detail)
    })
}

fn html_lang(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    Ok(match &ctx.document()?.lang {
        Some(lang) => CheckOutcome::passed(json!({ "lang": lang })),
        None => CheckOutcome::failed(json!({ "reason": "<html> has no lang attribute" })),
    })
}

fn indexable(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let meta = ctx.document()?.meta_robots.as_deref().unwrap_or("");
    let header = ctx.facts.header("x-robots-tag").unwrap_or("");

    let noindex = |value: &str| value.to_ascii_lowercase().contains("noindex");
    Ok(if noindex(meta) || noindex(header) {
        CheckOutcome::failed(json!({ "meta_robots": meta, "x_robots_tag": header }))
    } else {
        CheckOutcome::passed(json!({}))
    })
}

fn unique_title(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let Some(title) = &ctx.document()?.title else {
        return Ok(CheckOutcome::warning(json!({ "reason": "page has no <title>" })));
    };

    let duplicates: Vec<&str> = ctx
        .pages
        .iter()
        .filter(|page| page.url != ctx.url.as_str())
        .filter(|page| page.title.as_deref() == Some(title.as_str()))
        .map(|page| page.url.as_str())
        .collect();

    Ok(if duplicates.is_empty() {
        CheckOutcome::passed(json!({ "title": title }))
    } else {
        CheckOutcome::warning(json!({ "title": title, "duplicates": duplicates }))
    })
}

fn open_graph(ctx: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
    let document = ctx.document()?;
    let missing: Vec<&str> = OPEN_GRAPH_REQUIRED
        .iter()
        .copied()
        .filter(|property| !document.open_graph.contains_key(*property))
        .collect();

    let detail = json!({ "missing": missing });
    Ok(if missing.is_empty() {
        CheckOutcome::passed(detail)
    } else if missing.len() < OPEN_GRAPH_REQUIRED.len() {
        CheckOutcome::warning(detail)
    } else {
        CheckOutcome::failed(detail)
    })
}
