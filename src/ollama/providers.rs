/// Model-name prefix → publishing organisation.
///
/// Longest prefix wins, so "codegemma" is matched before "code...".
const PROVIDER_PREFIXES: &[(&str, &str)] = &[
    ("llama", "Meta"),
    ("codellama", "Meta"),
    ("gemma", "Google"),
    ("codegemma", "Google"),
    ("embeddinggemma", "Google"),
    ("shieldgemma", "Google"),
    ("medgemma", "Google"),
    ("phi", "Microsoft"),
    ("wizardlm", "Microsoft"),
    ("orca", "Microsoft"),
    ("granite", "IBM"),
    ("mistral", "Mistral"),
    ("mixtral", "Mistral"),
    ("codestral", "Mistral"),
    ("magistral", "Mistral"),
    ("devstral", "Mistral"),
    ("ministral", "Mistral"),
    ("nemotron", "NVIDIA"),
    ("llama3-chatqa", "NVIDIA"),
    ("gpt-oss", "OpenAI"),
    ("kimi", "Moonshot AI"),
    ("qwen", "Alibaba"),
    ("qwq", "Alibaba"),
    ("deepseek", "DeepSeek"),
    ("command-r", "Cohere"),
    ("aya", "Cohere"),
    ("glm", "Zhipu AI"),
    ("minimax", "MiniMax"),
    ("falcon", "TII"),
    ("starcoder", "BigCode"),
    ("smollm", "Hugging Face"),
    ("olmo", "AI2"),
    ("nomic-embed", "Nomic AI"),
    ("mxbai-embed", "Mixedbread"),
    ("snowflake-arctic", "Snowflake"),
    ("exaone", "LG AI Research"),
    ("yi", "01.AI"),
];

/// Provider for an Ollama library model name; empty when unknown.
pub fn infer_provider(model_name: &str) -> String {
    let name = model_name.to_lowercase();
    PROVIDER_PREFIXES
        .iter()
        .filter(|(prefix, _)| name.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, provider)| provider.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_families() {
        assert_eq!(infer_provider("llama3.2"), "Meta");
        assert_eq!(infer_provider("gemma3"), "Google");
        assert_eq!(infer_provider("codegemma"), "Google");
        assert_eq!(infer_provider("llama3-chatqa"), "NVIDIA");
        assert_eq!(infer_provider("gpt-oss"), "OpenAI");
        assert_eq!(infer_provider("Granite3.3"), "IBM");
        assert_eq!(infer_provider("qwen3-coder"), "Alibaba");
    }

    #[test]
    fn unknown_is_empty() {
        assert_eq!(infer_provider("tinydolphin"), "");
    }
}
