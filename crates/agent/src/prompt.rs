use std::sync::Arc;

use tera::{Context, Tera};
use thiserror::Error;

use selma_core::{ChatMessage, Language, MessageRole};
use selma_db::repositories::{
    MessageRepository, RepositoryError, UserRepository, DEFAULT_HISTORY_WINDOW,
};

/// System-instruction sources, one per supported language. A supported
/// language without a template is a packaging bug and must fail loudly.
const SYSTEM_TEMPLATES: &[(Language, &str)] = &[
    (Language::En, include_str!("../templates/system_en.txt")),
    (Language::Ru, include_str!("../templates/system_ru.txt")),
];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no profile exists for `{user_key}`; user creation must precede prompt assembly")]
    ProfileNotFound { user_key: String },
    #[error("no system template registered for language `{language}`")]
    MissingTemplate { language: Language },
    #[error("system template rendering failed: {0}")]
    Render(#[from] tera::Error),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Builds the ordered prompt the completion provider sees: one synthesized
/// system instruction followed by the bounded chronological history.
pub struct ContextAssembler {
    users: Arc<dyn UserRepository>,
    messages: Arc<dyn MessageRepository>,
    templates: Tera,
    history_window: u32,
}

impl ContextAssembler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Result<Self, PromptError> {
        let mut templates = Tera::default();
        for (language, source) in SYSTEM_TEMPLATES {
            templates.add_raw_template(language.as_tag(), source)?;
        }

        Ok(Self { users, messages, templates, history_window: DEFAULT_HISTORY_WINDOW })
    }

    pub async fn build_prompt(&self, user_key: &str) -> Result<Vec<ChatMessage>, PromptError> {
        let history = self.messages.recent_history(user_key, self.history_window).await?;
        let profile = self
            .users
            .profile(user_key)
            .await?
            .ok_or_else(|| PromptError::ProfileNotFound { user_key: user_key.to_string() })?;

        let template_name = profile.language.as_tag();
        if !self.templates.get_template_names().any(|name| name == template_name) {
            return Err(PromptError::MissingTemplate { language: profile.language });
        }

        let mut context = Context::new();
        context.insert("display_name", &profile.display_name);
        let system_content = self.templates.render(template_name, &context)?;

        let mut prompt = Vec::with_capacity(history.len() + 1);
        prompt.push(ChatMessage::new(MessageRole::System, system_content));
        prompt.extend(history.iter().map(ChatMessage::from));

        Ok(prompt)
    }
}
