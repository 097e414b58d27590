/// Instruction sent as the system message unless the caller overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assertion evaluator. Evaluate if the given content meets the specified criterion.\n\nRespond in JSON format:\n{\"result\": \"PASS\" or \"FAIL\", \"reasoning\": \"brief explanation\"}";

pub(crate) fn build_user_message(criterion: &str, content: &str) -> String {
    format!("Criterion: {criterion}\n\nContent:\n{content}")
}
