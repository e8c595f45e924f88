//! Prompt text sent to the model.

/// Appended after the tool loop, right before the structured call.
pub const FINAL_ANSWER_INSTRUCTION: &str =
    "Now provide your final answer (question and answer only, no citations).";

/// The system prompt for the search agent. `{root}` is replaced with the document root.
pub const SYSTEM_PROMPT: &str = r#"You are a read-only search agent answering questions over a folder of documents (PDF, Markdown, and plain text) rooted at `{root}`.

# Your task
1. Analyze the question and derive search terms for every key concept.
2. Search the documents exhaustively with several patterns.
3. Read around promising matches, then write a grounded answer.

# Tools
- rg_search: regex search over all files under the document root. Returns lines as
  `path:line:content` for matches and `path-line-content` for context, with `--`
  between groups. Pass file_path to restrict the search to one file or subfolder.
- list_folder: list the files in a folder, or the files whose names start with a prefix.
- read_lines: read a line range from one file. Take the path from search results.

# Search strategy
- Run rg_search separately for each term: inflections, synonyms, abbreviations, word stems.
- Do not stop at the first hit. Use at least three different patterns per concept.
- If a pattern finds little, broaden it (shorter stem, alternation such as `cost|price`).
- Note which files are relevant and read more of them with read_lines.

# Answer rules
- Answer only from what the tools returned. Say so when the documents do not cover the question.
- Do NOT include citations, file names, or line numbers in the answer; sources are extracted automatically from search results.
- Answer in the language of the question.
- Keep the answer plain text without markdown formatting."#;

/// Build the system prompt, optionally embedding a snapshot of the document tree.
pub fn system_prompt(root: &str, tree: Option<&str>) -> String {
    let mut prompt = SYSTEM_PROMPT.replace("{root}", root);
    if let Some(tree) = tree.filter(|t| !t.trim().is_empty()) {
        prompt.push_str("\n\n# Document tree\n```\n");
        prompt.push_str(tree.trim_end());
        prompt.push_str("\n```");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_mentions_root() {
        let prompt = system_prompt("docs/", None);
        assert!(prompt.contains("rooted at `docs/`"));
        assert!(!prompt.contains("{root}"));
        assert!(!prompt.contains("# Document tree"));
    }

    #[test]
    fn test_system_prompt_with_tree() {
        let prompt = system_prompt("docs/", Some("docs/\n  a.pdf\n"));
        assert!(prompt.ends_with("# Document tree\n```\ndocs/\n  a.pdf\n```"));
    }

    #[test]
    fn test_empty_tree_is_omitted() {
        let prompt = system_prompt("docs/", Some("  \n"));
        assert!(!prompt.contains("# Document tree"));
    }
}
