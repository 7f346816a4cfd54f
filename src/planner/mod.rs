pub mod ollama;
pub mod prompt;

pub use ollama::{parse_plan_content, OllamaPlanner};
pub use prompt::{format_user_prompt, load_system_prompt, DEFAULT_SYSTEM_PROMPT};
