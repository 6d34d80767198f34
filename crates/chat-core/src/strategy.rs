//! Per-modality prompt assembly.
//!
//! One orchestrator serves all three modalities; what differs between them
//! lives behind [`ModalityStrategy`].

use chat_types::{
    artifact::ArtifactMetadata,
    message::{Message, Role},
    session::{Modality, Turn},
};

pub trait ModalityStrategy: Send + Sync {
    fn modality(&self) -> Modality;

    /// System prompt for a session, given its attached artifact.
    fn system_prompt(&self, artifact: Option<&ArtifactMetadata>) -> String;

    /// Turns are refused until an artifact is attached.
    fn requires_artifact(&self) -> bool {
        false
    }

    /// Message used for the first turn when a session starts with an
    /// artifact and no user text.
    fn opening_message(&self) -> &str {
        "Hello!"
    }

    /// Replay a stored turn as a provider message.
    fn history_message(&self, turn: &Turn, _artifact: Option<&ArtifactMetadata>) -> Message {
        match turn.role {
            Role::Assistant => Message::assistant(&turn.content),
            _ => Message::user(&turn.content),
        }
    }
}

pub struct TextStrategy;

impl ModalityStrategy for TextStrategy {
    fn modality(&self) -> Modality {
        Modality::Text
    }

    fn system_prompt(&self, _artifact: Option<&ArtifactMetadata>) -> String {
        "You are a helpful assistant. Answer clearly and concisely, \
         using the earlier conversation as context."
            .to_string()
    }
}

pub struct ImageStrategy;

impl ModalityStrategy for ImageStrategy {
    fn modality(&self) -> Modality {
        Modality::Image
    }

    fn system_prompt(&self, artifact: Option<&ArtifactMetadata>) -> String {
        let mut prompt = String::from(
            "You are a vision assistant. Answer questions about the image the user shared.",
        );
        if let Some(ArtifactMetadata::Image(img)) = artifact {
            prompt.push_str(&format!(
                "\nImage: {} ({}x{} {}, {:.2} KB).",
                img.filename, img.width, img.height, img.format, img.size_kb
            ));
        }
        prompt
    }

    fn requires_artifact(&self) -> bool {
        true
    }

    fn opening_message(&self) -> &str {
        "Describe this image."
    }

    fn history_message(&self, turn: &Turn, artifact: Option<&ArtifactMetadata>) -> Message {
        match turn.role {
            Role::Assistant => Message::assistant(&turn.content),
            _ => match attached_image(turn, artifact) {
                Some(url) => Message::user_with_image(&turn.content, url),
                None => Message::user(&turn.content),
            },
        }
    }
}

/// Image shown with the user turn that carried the attachment. Uploads
/// resolve to the session's inline data URL.
fn attached_image<'a>(turn: &'a Turn, artifact: Option<&'a ArtifactMetadata>) -> Option<&'a str> {
    let reference = turn.attachment_ref.as_deref()?;
    if let Some(url) = match artifact {
        Some(ArtifactMetadata::Image(img)) => img.image_url(),
        _ => None,
    } {
        return Some(url);
    }
    (reference.starts_with("http://") || reference.starts_with("https://")).then_some(reference)
}

pub struct CsvStrategy;

impl ModalityStrategy for CsvStrategy {
    fn modality(&self) -> Modality {
        Modality::Csv
    }

    fn system_prompt(&self, artifact: Option<&ArtifactMetadata>) -> String {
        let mut prompt = String::from(
            "You are a data analyst. Answer questions about the user's CSV dataset; \
             say so when the question needs data you were not given.",
        );
        if let Some(ArtifactMetadata::Csv(csv)) = artifact {
            prompt.push_str(&format!(
                "\nDataset: {} rows x {} columns from {}.\nColumns: {}.",
                csv.row_count,
                csv.column_count,
                csv.source_value,
                csv.column_names.join(", ")
            ));
        }
        prompt
    }

    fn requires_artifact(&self) -> bool {
        true
    }

    fn opening_message(&self) -> &str {
        "I've uploaded a CSV file. Please give me an overview."
    }
}

/// The strategy for each modality.
pub struct StrategySet {
    text: Box<dyn ModalityStrategy>,
    image: Box<dyn ModalityStrategy>,
    csv: Box<dyn ModalityStrategy>,
}

impl StrategySet {
    pub fn get(&self, modality: Modality) -> &dyn ModalityStrategy {
        match modality {
            Modality::Text => self.text.as_ref(),
            Modality::Image => self.image.as_ref(),
            Modality::Csv => self.csv.as_ref(),
        }
    }

    /// Replace the strategy for the modality it reports.
    pub fn with(mut self, strategy: Box<dyn ModalityStrategy>) -> Self {
        match strategy.modality() {
            Modality::Text => self.text = strategy,
            Modality::Image => self.image = strategy,
            Modality::Csv => self.csv = strategy,
        }
        self
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self {
            text: Box::new(TextStrategy),
            image: Box::new(ImageStrategy),
            csv: Box::new(CsvStrategy),
        }
    }
}
