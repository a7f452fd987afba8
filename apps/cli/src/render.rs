//! Plain-text rendering of a finished research run.

use std::fmt::Write;

use deepresearch_shared::{CONTENT_PREVIEW_CHARS, PipelineState, ResearchItem};

/// Final answer first, then one block per source in research order.
pub(crate) fn render_report(state: &PipelineState) -> String {
    let mut out = String::new();

    out.push_str("Final Answer\n");
    out.push_str("============\n");
    match state.final_answer.as_deref() {
        Some(answer) if state.is_complete() => out.push_str(answer.trim()),
        _ => out.push_str("(no final answer)"),
    }
    out.push_str("\n\n");

    out.push_str("Research Data\n");
    out.push_str("=============\n");

    let items = state.research_items();
    if items.is_empty() {
        out.push_str("(no sources found)\n");
    }
    for item in items {
        render_source(&mut out, item);
    }

    out
}

fn render_source(out: &mut String, item: &ResearchItem) {
    let (preview, truncated) = item.content_preview(CONTENT_PREVIEW_CHARS);
    let ellipsis = if truncated { "..." } else { "" };

    let _ = writeln!(out, "Source: {}", item.url);
    if let Some(title) = &item.title {
        let _ = writeln!(out, "  Title:   {title}");
    }
    let _ = writeln!(out, "  Summary: {}", item.summary.trim());
    let _ = writeln!(
        out,
        "  Content: {}{ellipsis} [Read more]({})",
        preview.trim_end(),
        item.url
    );
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(items: Vec<ResearchItem>) -> PipelineState {
        PipelineState::new("q")
            .with_research_data(items)
            .and_then(|s| s.with_draft_answer("draft".into()))
            .and_then(|s| s.with_final_answer("The answer.".into()))
            .expect("complete state")
    }

    fn item(url: &str, content: &str) -> ResearchItem {
        ResearchItem {
            url: url.into(),
            content: content.into(),
            summary: format!("sum-{url}"),
            title: None,
        }
    }

    #[test]
    fn report_lists_answer_then_sources_in_order() {
        let out = render_report(&finished(vec![item("A", "alpha"), item("B", "beta")]));

        let answer = out.find("The answer.").unwrap();
        let a = out.find("Source: A").unwrap();
        let b = out.find("Source: B").unwrap();
        assert!(answer < a && a < b);
        assert!(out.contains("  Summary: sum-A\n"));
        assert!(out.contains("  Content: alpha [Read more](A)\n"));
        assert!(!out.contains("draft"));
    }

    #[test]
    fn long_content_is_previewed() {
        let long = "x".repeat(CONTENT_PREVIEW_CHARS + 50);
        let out = render_report(&finished(vec![item("L", &long)]));

        let expected = format!("  Content: {}... [Read more](L)", "x".repeat(CONTENT_PREVIEW_CHARS));
        assert!(out.contains(&expected));
        assert!(!out.contains(&"x".repeat(CONTENT_PREVIEW_CHARS + 1)));
    }

    #[test]
    fn unfinished_run_has_no_final_answer() {
        let state = PipelineState::new("q")
            .with_research_data(vec![item("A", "alpha")])
            .expect("research only");
        let out = render_report(&state);

        assert!(out.starts_with("Final Answer\n============\n(no final answer)\n\n"));
        assert!(out.contains("Source: A"));
    }

    #[test]
    fn empty_research_is_called_out() {
        let out = render_report(&finished(vec![]));
        assert!(out.contains("(no sources found)"));
    }
}
