use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::{CatalogueRepository, LlmService};
use crate::domain::{Candidate, ClassifyError, ClassifyResult, CodeSummary};

/// Stage 2: have the LLM pick and justify the best codes out of the
/// Stage-1 pool, with one catalogue-wide retry when the pool yields
/// nothing.
pub struct LlmReranker {
    llm: Arc<dyn LlmService>,
    catalogue: Arc<dyn CatalogueRepository>,
}

/// One entry of the model's ranked output, before validation.
#[derive(Debug, Clone)]
struct RankedEntry {
    rank: usize,
    code: String,
    reason: String,
}

fn build_system_prompt(top_k: usize) -> String {
    format!(
        "You are an industry classification assistant. From the numbered list of \
         candidate ANZSIC codes in the user message, select the codes that best \
         match the supplied business or occupation description.\n\
         \n\
         Rules:\n\
         1. Respond with a JSON array only - no prose, no markdown fences.\n\
         2. Each element is an object with fields \"rank\", \"code\" and \"reason\".\n\
         3. Ranks are 1-based and ordered by decreasing confidence.\n\
         4. Return at most {top_k} entries; fewer is fine, and an empty JSON array \
         means none of the candidates fit.\n\
         5. \"reason\" is one short sentence tying the description to the code."
    )
}

/// The retry prompt widens the choice to the whole catalogue, appended as
/// one `code,description` line per entry.
fn build_fallback_system_prompt(top_k: usize, catalogue: &[CodeSummary]) -> String {
    let mut prompt = build_system_prompt(top_k);
    prompt.push_str(
        "\n\nThe candidate list may have missed the right industry. You may rank \
         any code from the full catalogue below; the numbered candidates remain \
         hints. Each line is code,description:\n",
    );
    for summary in catalogue {
        prompt.push_str(summary.code());
        prompt.push(',');
        prompt.push_str(summary.description());
        prompt.push('\n');
    }
    prompt
}

fn build_user_message(query: &str, candidates: &[Candidate]) -> String {
    let mut message = format!("Description: {query}\n\nCandidates:\n");
    for (i, candidate) in candidates.iter().enumerate() {
        message.push_str(&format!(
            "{}. code: {} | description: {} | class: {} | group: {} | division: {}",
            i + 1,
            candidate.code(),
            candidate.description(),
            candidate.class_desc(),
            candidate.group_desc(),
            candidate.division_desc(),
        ));
        if !candidate.class_exclusions().is_empty() {
            message.push_str(&format!(" | exclusions: {}", candidate.class_exclusions()));
        }
        message.push('\n');
    }
    message
}

/// Parse the model output into ranked entries.
///
/// Accepts a bare JSON array or an object whose first array-valued field is
/// taken as the ranking. Entries without a `code` are dropped with a
/// warning; a missing `rank` is filled from the entry's position, a missing
/// `reason` becomes empty. Anything that is not valid JSON is an [`ClassifyError::Llm`].
fn parse_ranked(text: &str) -> Result<Vec<RankedEntry>, ClassifyError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| ClassifyError::llm(format!("response is not valid JSON: {e}")))?;

    let array = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| ClassifyError::llm("response object carries no array field"))?,
        _ => {
            return Err(ClassifyError::llm(
                "response is neither a JSON array nor an object",
            ))
        }
    };

    let mut entries = Vec::with_capacity(array.len());
    for (position, item) in array.iter().enumerate() {
        let Some(object) = item.as_object() else {
            warn!("Dropping non-object ranking entry at position {}", position + 1);
            continue;
        };
        let Some(code) = object.get("code").and_then(Value::as_str) else {
            warn!("Dropping ranking entry without a code at position {}", position + 1);
            continue;
        };
        let rank = object
            .get("rank")
            .and_then(Value::as_u64)
            .map(|r| r as usize)
            .unwrap_or(position + 1);
        let reason = object
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        entries.push(RankedEntry {
            rank,
            code: code.to_string(),
            reason,
        });
    }
    Ok(entries)
}

impl LlmReranker {
    pub fn new(llm: Arc<dyn LlmService>, catalogue: Arc<dyn CatalogueRepository>) -> Self {
        Self { llm, catalogue }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Returns at most `top_k` results with contiguous 1-based ranks.
    /// An empty return means both passes ranked nothing usable; provider
    /// failures propagate instead of triggering the retry.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[Candidate],
        top_k: usize,
    ) -> Result<Vec<ClassifyResult>, ClassifyError> {
        let start_time = Instant::now();
        info!(
            "Re-ranking {} candidates with {}",
            candidates.len(),
            self.llm.model_name()
        );

        let user_message = build_user_message(query, candidates);
        let system_prompt = build_system_prompt(top_k);

        let raw = self.llm.generate_json(&system_prompt, &user_message).await?;
        let entries = parse_ranked(&raw)?;
        let results = self.resolve(entries, candidates, top_k, None).await?;
        if !results.is_empty() {
            info!(
                "Re-ranked to {} results in {:.2}s",
                results.len(),
                start_time.elapsed().as_secs_f64()
            );
            return Ok(results);
        }

        debug!("First pass ranked nothing; retrying with the catalogue-wide reference");
        let summaries = self.catalogue.all_codes().await?;
        let fallback_prompt = build_fallback_system_prompt(top_k, &summaries);

        let raw = self.llm.generate_json(&fallback_prompt, &user_message).await?;
        let entries = parse_ranked(&raw)?;
        let results = self
            .resolve(entries, candidates, top_k, Some(&summaries))
            .await?;

        if results.is_empty() {
            // Empty is a legal business outcome; record it and let the caller decide.
            warn!(
                "{}",
                ClassifyError::rerank(format!(
                    "no ranked codes for \"{query}\" after the catalogue-wide retry"
                ))
            );
        } else {
            info!(
                "Catalogue-wide retry ranked {} results in {:.2}s",
                results.len(),
                start_time.elapsed().as_secs_f64()
            );
        }
        Ok(results)
    }

    /// Validate, dedupe and enrich the model's entries. Codes outside the
    /// candidate pool are only admitted when the catalogue reference was in
    /// play, and are hydrated in one extra round trip with a zero RRF score.
    async fn resolve(
        &self,
        mut entries: Vec<RankedEntry>,
        candidates: &[Candidate],
        top_k: usize,
        catalogue: Option<&[CodeSummary]>,
    ) -> Result<Vec<ClassifyResult>, ClassifyError> {
        let by_code: HashMap<&str, &Candidate> =
            candidates.iter().map(|c| (c.code(), c)).collect();
        let catalogue_codes: Option<HashSet<&str>> =
            catalogue.map(|summaries| summaries.iter().map(CodeSummary::code).collect());

        entries.sort_by_key(|e| e.rank);

        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted: Vec<RankedEntry> = Vec::new();
        for entry in entries {
            if !seen.insert(entry.code.clone()) {
                warn!("Dropping duplicate code {} from model output", entry.code);
                continue;
            }
            let in_candidates = by_code.contains_key(entry.code.as_str());
            let in_catalogue = catalogue_codes
                .as_ref()
                .is_some_and(|codes| codes.contains(entry.code.as_str()));
            if !in_candidates && !in_catalogue {
                warn!("Dropping unknown code {} from model output", entry.code);
                continue;
            }
            accepted.push(entry);
            if accepted.len() == top_k {
                break;
            }
        }

        let outside: Vec<String> = accepted
            .iter()
            .filter(|e| !by_code.contains_key(e.code.as_str()))
            .map(|e| e.code.clone())
            .collect();
        let mut outside_records = if outside.is_empty() {
            HashMap::new()
        } else {
            self.catalogue.fetch_by_codes(&outside).await?
        };

        let mut results = Vec::with_capacity(accepted.len());
        for entry in accepted {
            if let Some(candidate) = by_code.get(entry.code.as_str()) {
                results.push(ClassifyResult::from_candidate(
                    results.len() + 1,
                    candidate,
                    entry.reason,
                ));
            } else if let Some(record) = outside_records.remove(&entry.code) {
                results.push(ClassifyResult::new(
                    results.len() + 1,
                    record.code(),
                    record.description(),
                    record.class_desc(),
                    record.division_desc(),
                    entry.reason,
                    0.0,
                ));
            } else {
                warn!(
                    "Code {} vanished between listing and hydration, dropped",
                    entry.code
                );
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CodeRecord;

    fn candidate(code: &str) -> Candidate {
        let record = CodeRecord::new(code, format!("description of {code}"))
            .with_hierarchy("class", "group", "subdivision", "division");
        Candidate::new(record, 0.1, Some(1), None)
    }

    #[test]
    fn system_prompt_mentions_json() {
        assert!(build_system_prompt(5).contains("JSON"));
    }

    #[test]
    fn fallback_prompt_lists_catalogue_lines() {
        let summaries = vec![
            CodeSummary::new("101010", "Sheep farming"),
            CodeSummary::new("451100", "Motor vehicle repair"),
        ];
        let prompt = build_fallback_system_prompt(3, &summaries);
        assert!(prompt.contains("JSON"));
        assert!(prompt.contains("101010,Sheep farming"));
        assert!(prompt.contains("451100,Motor vehicle repair"));
    }

    #[test]
    fn user_message_numbers_candidates() {
        let candidates = vec![candidate("111111"), candidate("222222")];
        let message = build_user_message("mobile mechanic", &candidates);
        assert!(message.contains("Description: mobile mechanic"));
        assert!(message.contains("1. code: 111111"));
        assert!(message.contains("2. code: 222222"));
        assert!(!message.contains("exclusions:"));
    }

    #[test]
    fn user_message_includes_exclusions_when_present() {
        let record = CodeRecord::new("333333", "Bricklaying")
            .with_class_exclusions("excludes stonemasonry");
        let candidates = vec![Candidate::new(record, 0.2, None, Some(1))];
        let message = build_user_message("bricklayer", &candidates);
        assert!(message.contains("exclusions: excludes stonemasonry"));
    }

    #[test]
    fn parse_accepts_bare_array() {
        let entries = parse_ranked(
            r#"[{"rank":1,"code":"A","reason":"fits"},{"rank":2,"code":"B","reason":"adjacent"}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "A");
        assert_eq!(entries[0].rank, 1);
    }

    #[test]
    fn parse_accepts_wrapped_array() {
        let entries =
            parse_ranked(r#"{"results":[{"rank":1,"code":"A","reason":"fits"}]}"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "A");
    }

    #[test]
    fn parse_fills_missing_rank_from_position() {
        let entries = parse_ranked(r#"[{"code":"A"},{"code":"B"}]"#).unwrap();
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].rank, 2);
        assert_eq!(entries[0].reason, "");
    }

    #[test]
    fn parse_drops_entries_without_code() {
        let entries = parse_ranked(r#"[{"rank":1,"reason":"no code"},{"code":"B"}]"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "B");
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = parse_ranked("the best code is A").unwrap_err();
        assert!(matches!(err, ClassifyError::Llm(_)));
    }

    #[test]
    fn parse_rejects_scalar_json() {
        assert!(parse_ranked("42").is_err());
        assert!(parse_ranked(r#"{"answer":"A"}"#).is_err());
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let entries = parse_ranked("\n  [{\"code\":\"A\"}]  \n").unwrap();
        assert_eq!(entries.len(), 1);
    }
}
