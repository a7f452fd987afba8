//! Prompt templates for each pipeline step.

use deepresearch_shared::ResearchItem;

/// Instruction for the research step; also used verbatim as the search query.
pub fn research_prompt(query: &str) -> String {
    format!(
        "You are a research agent. Use the Tavily search tool to gather relevant information \
         for the query: {query}. Summarize the findings in a structured format with source URLs."
    )
}

/// Summarize one retrieved page.
pub fn summarize_prompt(content: &str) -> String {
    format!("Summarize this content in 2-3 sentences: {content}")
}

/// Draft an answer from the collected research, sources in research order.
pub fn draft_prompt(query: &str, items: &[ResearchItem]) -> String {
    let context = items
        .iter()
        .map(|item| {
            format!(
                "Source: {}\nSummary: {}\nContent: {}",
                item.url, item.summary, item.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an answer drafter. Using the following research data, draft a concise and \
         accurate answer to the query: {query}\n\n{context}"
    )
}

/// Polish the draft into the final answer.
pub fn refine_prompt(query: &str, draft: &str) -> String {
    format!(
        "You are a final answer refiner. Review the draft answer and refine it to be clear, \
         concise, and professional: {draft}\n\nQuery: {query}"
    )
}
