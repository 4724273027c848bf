//! Human-readable rendering of command results.

use reel_core::{RerankSignal, ScoreBreakdown, SearchResults};
use reel_embed::{EmbeddingPreview, EmbeddingRole};
use reel_query::{Answer, EvaluationReport};

use crate::app::EmbeddingReport;

fn rank_label(rank: Option<u32>) -> String {
    rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

fn breakdown_line(breakdown: &ScoreBreakdown) -> String {
    match breakdown {
        ScoreBreakdown::Keyword { bm25 } => format!("BM25: {:.4}", bm25),
        ScoreBreakdown::Semantic { cosine, chunk } => format!(
            "Cosine: {:.4} (chunk {}/{})",
            cosine,
            chunk.chunk_index + 1,
            chunk.total_chunks
        ),
        ScoreBreakdown::Document { cosine } => format!("Cosine: {:.4} (whole document)", cosine),
        ScoreBreakdown::Weighted {
            keyword,
            semantic,
            hybrid,
        } => format!(
            "Hybrid: {:.4}, BM25: {:.4}, Semantic: {:.4}",
            hybrid, keyword, semantic
        ),
        ScoreBreakdown::Rrf {
            rrf,
            keyword_rank,
            semantic_rank,
        } => format!(
            "RRF: {:.4}, BM25 rank: {}, Semantic rank: {}",
            rrf,
            rank_label(*keyword_rank),
            rank_label(*semantic_rank)
        ),
    }
}

fn rerank_line(signal: &RerankSignal) -> String {
    match signal {
        RerankSignal::Rating(rating) => format!("Rerank rating: {:.1}/10", rating),
        RerankSignal::ListPosition(position) => format!("Rerank position: {}", position),
        RerankSignal::CrossEncoder(score) => format!("Cross-encoder score: {:.4}", score),
    }
}

pub fn format_results(results: &SearchResults) -> String {
    let mut output = String::new();
    if let Some(enhanced) = &results.enhanced_query {
        output.push_str(&format!("Enhanced query: {:?} -> {:?}\n", results.query, enhanced));
    }
    output.push_str(&format!(
        "Found {} results in {}ms:\n",
        results.total_results, results.latency_ms
    ));

    for result in &results.results {
        output.push_str(&format!(
            "\n{}. {} (id {}, score: {:.4})\n",
            result.rank, result.document.title, result.document.id, result.score
        ));
        output.push_str(&format!("   {}\n", breakdown_line(&result.breakdown)));
        if let Some(signal) = &result.rerank {
            output.push_str(&format!("   {}\n", rerank_line(signal)));
        }
        if !result.snippet.is_empty() {
            output.push_str(&format!("   {}...\n", result.snippet));
        }
    }
    output
}

pub fn format_chunks(chunks: &[String]) -> String {
    let mut output = format!("{} chunks:\n", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, chunk));
    }
    output
}

pub fn format_answer(answer: &Answer) -> String {
    let mut output = String::from("Search results:\n");
    for result in &answer.results.results {
        output.push_str(&format!("  - {}\n", result.document.title));
    }
    output.push_str(&format!("\n{}:\n{}\n", answer.style, answer.answer));
    output
}

pub fn format_report(report: &EvaluationReport) -> String {
    let mut output = format!("k={}\n", report.limit);
    for query in &report.queries {
        output.push_str(&format!("\n- Query: {}\n", query.query));
        output.push_str(&format!(
            "    - Precision@{}: {:.4}\n",
            report.limit, query.score.precision
        ));
        output.push_str(&format!("    - Recall@{}: {:.4}\n", report.limit, query.score.recall));
        output.push_str(&format!("    - F1 Score: {:.4}\n", query.score.f1));
        output.push_str(&format!("    - Retrieved: {}\n", query.retrieved.join(", ")));
        output.push_str(&format!(
            "    - Relevant: {}\n",
            query.relevant_retrieved.join(", ")
        ));
    }
    output.push_str(&format!(
        "\nMean precision {:.4}, recall {:.4}, F1 {:.4}\n",
        report.mean.precision, report.mean.recall, report.mean.f1
    ));
    output
}

pub fn format_preview(preview: &EmbeddingPreview) -> String {
    let label = match preview.role {
        EmbeddingRole::Document => "Text",
        EmbeddingRole::Query => "Query",
    };
    let head: Vec<String> = preview.head.iter().map(|v| format!("{:.6}", v)).collect();
    format!(
        "{}: {}\nFirst {} dimensions: [{}]\nDimensions: {}\n",
        label,
        preview.text,
        preview.head.len(),
        head.join(", "),
        preview.dimension
    )
}

pub fn format_embedding_report(report: &EmbeddingReport) -> String {
    format!(
        "Number of docs:   {}\nDocument embeddings: {} vectors in {} dimensions\nChunk embeddings:    {} vectors in {} dimensions\n",
        report.documents,
        report.document_vectors,
        report.dimension,
        report.chunks,
        report.dimension
    )
}
