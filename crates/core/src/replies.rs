//! Fixed reply lines spoken by the agent.

use crate::intent::Intent;

/// Placeholder replaced by the user's trimmed input.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// The canned lines for each intent, plus the greeting, acknowledgment and
/// fallback lines. Templates containing `{input}` echo the user's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTemplates {
    pub greeting: String,
    pub status: String,
    pub help: String,
    pub thanks: String,
    pub generic: String,
    pub acknowledgment: String,
    pub fallback: String,
}

impl Default for ReplyTemplates {
    fn default() -> Self {
        Self {
            greeting: "Good evening, sir. JARVIS online and ready. How may I assist you today?"
                .to_string(),
            status: "All systems operational. Core processors running at optimal efficiency. Network connectivity stable. Ready for your commands, sir."
                .to_string(),
            help: "I can assist with code generation, system analysis, and various technical tasks. Simply describe what you'd like me to build or analyze."
                .to_string(),
            thanks: "You're welcome, sir. Always at your service.".to_string(),
            generic: "Understood, sir. Processing your request: \"{input}\". How would you like me to proceed?"
                .to_string(),
            acknowledgment: "Prompt received: \"{input}\"".to_string(),
            fallback: "My apologies, sir. I'm having trouble reaching my language systems at the moment. Please try again shortly."
                .to_string(),
        }
    }
}

impl ReplyTemplates {
    /// The line spoken for a conversational intent.
    ///
    /// `CodeRequest` maps to the acknowledgment line, since the rest of that
    /// turn is driven by the task script.
    pub fn for_intent(&self, intent: Intent, input: &str) -> String {
        let template = match intent {
            Intent::CodeRequest => &self.acknowledgment,
            Intent::Greeting => &self.greeting,
            Intent::StatusQuery => &self.status,
            Intent::HelpRequest => &self.help,
            Intent::Thanks => &self.thanks,
            Intent::Generic => &self.generic,
        };
        fill(template, input)
    }

    pub fn acknowledge(&self, input: &str) -> String {
        fill(&self.acknowledgment, input)
    }
}

fn fill(template: &str, input: &str) -> String {
    template.replace(INPUT_PLACEHOLDER, input)
}
